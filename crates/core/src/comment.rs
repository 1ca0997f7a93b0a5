//! Review comments: validation, threading, and pin markers.
//!
//! Comments belong to a creative. A comment may carry a [`PinAnnotation`]
//! anchoring it to a spot on the image, and may reply to a top-level
//! comment. Replies are one level deep.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::pin::{self, MarkerPosition, PinAnnotation};
use crate::types::{EntityId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length for a comment's text, in characters.
pub const MAX_COMMENT_LENGTH: usize = 10_000;

/// Maximum length for a comment author label.
pub const MAX_AUTHOR_LENGTH: usize = 200;

/// Author recorded when a reviewer leaves the name field empty.
pub const DEFAULT_COMMENT_AUTHOR: &str = "Anonymous";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: EntityId,
    pub author: String,
    pub text: String,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin: Option<PinAnnotation>,
}

/// Comment as submitted by a reviewer, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub author: Option<String>,
    pub text: String,
    pub parent_id: Option<EntityId>,
    pub pin: Option<PinAnnotation>,
}

/// A top-level comment with its replies, oldest reply first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentThread<'a> {
    pub root: &'a Comment,
    pub replies: Vec<&'a Comment>,
}

/// Numbered overlay marker for a pinned comment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinMarker {
    pub number: usize,
    pub comment_id: EntityId,
    pub position: MarkerPosition,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Trim comment text and check it is non-empty and within the length limit.
pub fn validate_comment_text(text: &str) -> Result<String, CoreError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Comment text is required".to_string()));
    }
    let length = trimmed.chars().count();
    if length > MAX_COMMENT_LENGTH {
        return Err(CoreError::Validation(format!(
            "Comment text exceeds maximum length of {MAX_COMMENT_LENGTH} characters (got {length})"
        )));
    }
    Ok(trimmed.to_string())
}

/// Trim the author label, falling back to [`DEFAULT_COMMENT_AUTHOR`].
pub fn resolve_author(author: Option<&str>) -> Result<String, CoreError> {
    let author = author.map(str::trim).filter(|a| !a.is_empty());
    match author {
        None => Ok(DEFAULT_COMMENT_AUTHOR.to_string()),
        Some(a) if a.chars().count() > MAX_AUTHOR_LENGTH => Err(CoreError::Validation(format!(
            "Author exceeds maximum length of {MAX_AUTHOR_LENGTH} characters"
        ))),
        Some(a) => Ok(a.to_string()),
    }
}

impl Comment {
    /// Validate a submission and stamp it with a fresh id.
    ///
    /// Parent existence is checked by the owning creative; this only
    /// validates the comment's own fields.
    pub fn create(input: NewComment, now: Timestamp) -> Result<Self, CoreError> {
        let text = validate_comment_text(&input.text)?;
        let author = resolve_author(input.author.as_deref())?;
        if let Some(pin) = &input.pin {
            pin.validate()?;
        }

        Ok(Self {
            id: EntityId::new_v4(),
            author,
            text,
            created_at: now,
            parent_id: input.parent_id,
            pin: input.pin,
        })
    }

    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }

    pub fn is_pinned(&self) -> bool {
        self.pin.is_some()
    }
}

// ---------------------------------------------------------------------------
// Threads and markers
// ---------------------------------------------------------------------------

/// Group comments into threads ordered by the root's creation time.
///
/// A reply whose parent is missing from `comments` is shown as a root.
pub fn build_threads(comments: &[Comment]) -> Vec<CommentThread<'_>> {
    let is_root = |c: &Comment| match c.parent_id {
        None => true,
        Some(parent) => !comments.iter().any(|p| p.id == parent),
    };

    let mut threads: Vec<CommentThread<'_>> = comments
        .iter()
        .filter(|c| is_root(c))
        .map(|root| {
            let mut replies: Vec<&Comment> = comments
                .iter()
                .filter(|c| c.parent_id == Some(root.id))
                .collect();
            replies.sort_by_key(|c| c.created_at);
            CommentThread { root, replies }
        })
        .collect();

    threads.sort_by_key(|t| t.root.created_at);
    threads
}

/// Number the pinned top-level comments 1..N in creation order.
pub fn pin_markers(comments: &[Comment]) -> Vec<PinMarker> {
    let mut pinned: Vec<(&Comment, &PinAnnotation)> = comments
        .iter()
        .filter(|c| !c.is_reply())
        .filter_map(|c| c.pin.as_ref().map(|p| (c, p)))
        .collect();
    pinned.sort_by_key(|(c, _)| c.created_at);

    pinned
        .into_iter()
        .enumerate()
        .map(|(i, (comment, pin))| PinMarker {
            number: i + 1,
            comment_id: comment.id,
            position: pin::marker_position(pin),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
