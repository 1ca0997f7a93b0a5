//! Edit history for tracked text fields (captions, extracted image text).
//!
//! A [`TextRevisionLog`] keeps the first ingested value, every pre-edit
//! snapshot with its author, and the current value. Diffs are never stored;
//! [`TextRevisionLog::changes_from_original`] and [`TextRevisionLog::timeline`]
//! compute them on demand through [`crate::word_diff`].
//!
//! Concurrent edits to the same log are serialized by the caller. Two
//! writers racing at the storage layer can overwrite each other without
//! either pre-image reaching `history`.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;
use crate::word_diff::{self, DiffResult};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A pre-edit snapshot. `author` and `timestamp` describe the edit that
/// replaced `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub text: String,
    pub author: String,
    pub timestamp: Timestamp,
}

/// Ordered edit history of one text field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRevisionLog {
    /// Value captured when the log was created. Never changes.
    pub original: String,
    /// Pre-images, oldest first.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    pub current: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_edited_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_edited_at: Option<Timestamp>,
}

/// One step of the history, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    /// Index of the pre-image in `history`.
    pub index: usize,
    pub before: String,
    pub after: String,
    /// Who made this change and when.
    pub author: String,
    pub timestamp: Timestamp,
    pub diff: DiffResult,
}

// ---------------------------------------------------------------------------
// Recording edits
// ---------------------------------------------------------------------------

/// Record a save of a tracked field.
///
/// - No log yet: `new_text` is ingested as the original value. No history
///   entry is produced, whether or not an author was given.
/// - Unchanged value: the log is returned as-is.
/// - Changed value: the previous value is pushed onto `history` under
///   `author`. A missing or blank author is an [`CoreError::InvalidEdit`].
pub fn record_edit(
    log: Option<TextRevisionLog>,
    new_text: &str,
    author: Option<&str>,
    now: Timestamp,
) -> Result<TextRevisionLog, CoreError> {
    match log {
        None => Ok(TextRevisionLog::ingest(new_text)),
        Some(mut log) => {
            log.apply_edit(new_text, author, now)?;
            Ok(log)
        }
    }
}

impl TextRevisionLog {
    /// Create a log whose original and current values are `text`.
    pub fn ingest(text: &str) -> Self {
        Self {
            original: text.to_string(),
            history: Vec::new(),
            current: text.to_string(),
            last_edited_by: None,
            last_edited_at: None,
        }
    }

    /// Apply an authored edit in place. Returns `true` if the value changed.
    pub fn apply_edit(
        &mut self,
        new_text: &str,
        author: Option<&str>,
        now: Timestamp,
    ) -> Result<bool, CoreError> {
        if new_text == self.current {
            return Ok(false);
        }

        let author = author
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| {
                CoreError::InvalidEdit(
                    "an author is required to edit a value that has already been recorded"
                        .to_string(),
                )
            })?;

        let previous = std::mem::replace(&mut self.current, new_text.to_string());
        self.history.push(HistoryEntry {
            text: previous,
            author: author.to_string(),
            timestamp: now,
        });
        self.last_edited_by = Some(author.to_string());
        self.last_edited_at = Some(now);

        Ok(true)
    }

    /// Number of authored edits recorded so far.
    pub fn edit_count(&self) -> usize {
        self.history.len()
    }

    pub fn has_edits(&self) -> bool {
        !self.history.is_empty()
    }

    /// Every value the field has held, oldest first, ending with `current`.
    pub fn values(&self) -> Vec<&str> {
        self.history
            .iter()
            .map(|entry| entry.text.as_str())
            .chain(std::iter::once(self.current.as_str()))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Presentation
    // -----------------------------------------------------------------------

    /// Diff of the original value against the current one, or `None` when
    /// they are equal.
    pub fn changes_from_original(&self) -> Option<DiffResult> {
        if self.original == self.current {
            return None;
        }
        Some(word_diff::diff(&self.original, &self.current))
    }

    /// History steps, most recent first.
    ///
    /// Step `i` goes from `history[i].text` to the next snapshot, or to
    /// `current` for the last entry.
    pub fn timeline(&self) -> Vec<TimelineEntry> {
        self.history
            .iter()
            .enumerate()
            .rev()
            .map(|(index, entry)| {
                let after = self
                    .history
                    .get(index + 1)
                    .map_or(self.current.as_str(), |next| next.text.as_str());

                TimelineEntry {
                    index,
                    before: entry.text.clone(),
                    after: after.to_string(),
                    author: entry.author.clone(),
                    timestamp: entry.timestamp,
                    diff: word_diff::diff(&entry.text, after),
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
