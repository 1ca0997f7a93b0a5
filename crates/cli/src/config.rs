use std::path::PathBuf;

use anyhow::Context;

/// CLI configuration loaded from environment variables.
///
/// All fields have defaults suitable for local use.
#[derive(Debug, Clone, PartialEq)]
pub struct CliConfig {
    /// JSON document holding every project (default: `data/projects.json`).
    pub data_file: PathBuf,
    /// Author used for edits when `--author` is not given.
    pub default_author: Option<String>,
    /// LCS table size above which a diff logs a warning (default: `250000`).
    pub diff_warn_cells: usize,
    /// Pretty-print JSON output and the saved store (default: `true`).
    pub pretty_json: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("data/projects.json"),
            default_author: None,
            diff_warn_cells: 250_000,
            pretty_json: true,
        }
    }
}

impl CliConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default              |
    /// |-----------------------------|----------------------|
    /// | `PROOFDECK_DATA_FILE`       | `data/projects.json` |
    /// | `PROOFDECK_DEFAULT_AUTHOR`  | unset                |
    /// | `PROOFDECK_DIFF_WARN_CELLS` | `250000`             |
    /// | `PROOFDECK_PRETTY_JSON`     | `true`               |
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let data_file = lookup("PROOFDECK_DATA_FILE")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.data_file);

        let default_author = lookup("PROOFDECK_DEFAULT_AUTHOR")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let diff_warn_cells = match lookup("PROOFDECK_DIFF_WARN_CELLS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("PROOFDECK_DIFF_WARN_CELLS must be a valid usize, got '{raw}'"))?,
            None => defaults.diff_warn_cells,
        };

        let pretty_json = match lookup("PROOFDECK_PRETTY_JSON") {
            Some(raw) => parse_bool(&raw)
                .with_context(|| format!("PROOFDECK_PRETTY_JSON must be true or false, got '{raw}'"))?,
            None => defaults.pretty_json,
        };

        Ok(Self {
            data_file,
            default_author,
            diff_warn_cells,
            pretty_json,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
