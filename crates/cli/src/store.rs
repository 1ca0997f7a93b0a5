//! Flat JSON document store: one array of projects in a single file.
//!
//! Every command loads the whole document and writes it back whole. Two
//! processes editing at once will lose one of the writes.

use std::path::Path;

use anyhow::Context;
use proofdeck_core::project::Project;

/// Load all projects. A missing file is an empty store.
pub async fn load_projects(path: &Path) -> anyhow::Result<Vec<Project>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "Store file missing, starting empty");
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let projects: Vec<Project> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse project store {}", path.display()))?;
    tracing::debug!(path = %path.display(), count = projects.len(), "Loaded project store");
    Ok(projects)
}

/// Write all projects, creating parent directories as needed.
///
/// The document is written to a sibling temp file first and renamed into
/// place.
pub async fn save_projects(path: &Path, projects: &[Project], pretty: bool) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let json = if pretty {
        serde_json::to_string_pretty(projects)?
    } else {
        serde_json::to_string(projects)?
    };

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to replace {}", path.display()))?;

    tracing::debug!(path = %path.display(), count = projects.len(), "Saved project store");
    Ok(())
}
