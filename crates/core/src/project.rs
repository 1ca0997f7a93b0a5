//! Projects group the creatives shared with one client for review.

use serde::{Deserialize, Serialize};

use crate::creative::{Creative, CreativeStatus};
use crate::error::CoreError;
use crate::types::{EntityId, Timestamp};

/// Maximum length for project and client names.
pub const MAX_NAME_LENGTH: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub client_name: String,
    pub created_at: Timestamp,
    #[serde(default)]
    pub creatives: Vec<Creative>,
}

/// Per-project counts shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: EntityId,
    pub name: String,
    pub client_name: String,
    pub created_at: Timestamp,
    pub creative_count: usize,
    pub approved_count: usize,
    pub pending_count: usize,
    pub revision_count: usize,
}

impl ProjectSummary {
    /// Share of approved creatives, rounded to a whole percent.
    pub fn approval_percent(&self) -> u32 {
        approval_percent(self.approved_count, self.creative_count)
    }
}

/// `approved / total` as a rounded percentage; 0 for an empty project.
pub fn approval_percent(approved: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((approved as f64 / total as f64) * 100.0).round() as u32
}

fn validate_name(field: &str, value: &str) -> Result<(), CoreError> {
    if value.chars().count() > MAX_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "{field} exceeds maximum length of {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

impl Project {
    /// Create an empty project. The name is required; the client name may
    /// be blank.
    pub fn new(name: &str, client_name: Option<&str>, now: Timestamp) -> Result<Self, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation("Project name is required".to_string()));
        }
        let client_name = client_name.unwrap_or_default().trim();
        validate_name("Project name", name)?;
        validate_name("Client name", client_name)?;

        Ok(Self {
            id: EntityId::new_v4(),
            name: name.to_string(),
            client_name: client_name.to_string(),
            created_at: now,
            creatives: Vec::new(),
        })
    }

    pub fn summary(&self) -> ProjectSummary {
        let count = |status: CreativeStatus| {
            self.creatives.iter().filter(|c| c.status == status).count()
        };
        ProjectSummary {
            id: self.id,
            name: self.name.clone(),
            client_name: self.client_name.clone(),
            created_at: self.created_at,
            creative_count: self.creatives.len(),
            approved_count: count(CreativeStatus::Approved),
            pending_count: count(CreativeStatus::Pending),
            revision_count: count(CreativeStatus::RevisionRequested),
        }
    }

    pub fn find_creative(&self, id: EntityId) -> Result<&Creative, CoreError> {
        self.creatives
            .iter()
            .find(|c| c.id == id)
            .ok_or(CoreError::NotFound {
                entity: "creative",
                id,
            })
    }

    pub fn find_creative_mut(&mut self, id: EntityId) -> Result<&mut Creative, CoreError> {
        self.creatives
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(CoreError::NotFound {
                entity: "creative",
                id,
            })
    }

    /// Append creatives from one upload batch, preserving their order.
    pub fn add_creatives(&mut self, creatives: impl IntoIterator<Item = Creative>) {
        self.creatives.extend(creatives);
    }

    pub fn remove_creative(&mut self, id: EntityId) -> Result<Creative, CoreError> {
        let idx = self
            .creatives
            .iter()
            .position(|c| c.id == id)
            .ok_or(CoreError::NotFound {
                entity: "creative",
                id,
            })?;
        Ok(self.creatives.remove(idx))
    }

    /// Path of the client-facing gallery for this project.
    pub fn review_path(&self) -> String {
        format!("/review/{}", self.id)
    }

    /// Path of the client-facing page for one creative.
    pub fn creative_review_path(&self, creative_id: EntityId) -> Result<String, CoreError> {
        let creative = self.find_creative(creative_id)?;
        Ok(format!("/review/{}/{}", self.id, creative.id))
    }
}

/// Look a project up by id in a loaded store.
pub fn find_project(projects: &[Project], id: EntityId) -> Result<&Project, CoreError> {
    projects.iter().find(|p| p.id == id).ok_or(CoreError::NotFound {
        entity: "project",
        id,
    })
}

/// Remove a project from a loaded store, returning it.
pub fn remove_project(projects: &mut Vec<Project>, id: EntityId) -> Result<Project, CoreError> {
    let idx = projects
        .iter()
        .position(|p| p.id == id)
        .ok_or(CoreError::NotFound {
            entity: "project",
            id,
        })?;
    Ok(projects.remove(idx))
}

pub fn find_project_mut(projects: &mut [Project], id: EntityId) -> Result<&mut Project, CoreError> {
    projects
        .iter_mut()
        .find(|p| p.id == id)
        .ok_or(CoreError::NotFound {
            entity: "project",
            id,
        })
}
