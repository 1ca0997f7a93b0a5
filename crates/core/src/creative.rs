//! Creatives: uploaded images, videos and PDFs under review.
//!
//! Covers the review status lifecycle, upload classification and naming,
//! the tracked caption / extracted-text fields, and comment management.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::comment::{self, Comment, CommentThread, NewComment};
use crate::error::CoreError;
use crate::revision::{self, TextRevisionLog};
use crate::types::{EntityId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Image extensions accepted for upload (lowercase, without the dot).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg", "bmp"];

/// Video extensions accepted for upload.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "webm", "mkv", "m4v", "wmv"];

/// Document extensions accepted for upload.
pub const PDF_EXTENSIONS: &[&str] = &["pdf"];

/// Maximum size of a single uploaded file (500 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 500 * 1024 * 1024;

/// Maximum number of files in one upload batch.
pub const MAX_FILES_PER_UPLOAD: usize = 50;

/// Characters outside this set are replaced in stored file names.
static UNSAFE_FILE_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_-]").expect("valid regex"));

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Review state of a creative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreativeStatus {
    #[default]
    Pending,
    Approved,
    RevisionRequested,
}

/// All valid status strings.
const VALID_STATUS_STRINGS: &[&str] = &["pending", "approved", "revision_requested"];

impl CreativeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::RevisionRequested => "revision_requested",
        }
    }

    /// Badge label shown to reviewers.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending Review",
            Self::Approved => "Approved",
            Self::RevisionRequested => "Revision Requested",
        }
    }

    /// Parse a status from its wire string.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "revision_requested" => Ok(Self::RevisionRequested),
            _ => Err(CoreError::Validation(format!(
                "Invalid status '{s}'. Must be one of: {}",
                VALID_STATUS_STRINGS.join(", ")
            ))),
        }
    }
}

impl std::fmt::Display for CreativeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Media classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
    Pdf,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Pdf => "pdf",
        }
    }

    /// Classify an extension (without the dot, any case).
    pub fn from_extension(extension: &str) -> Option<Self> {
        let ext = extension.to_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Video)
        } else if PDF_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Pdf)
        } else {
            None
        }
    }
}

/// Split a file name into stem and extension (including the dot).
///
/// Dot-files such as `.env` have no extension.
fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(pos) if pos > 0 => file_name.split_at(pos),
        _ => (file_name, ""),
    }
}

/// Classify an uploaded file by its name, rejecting unsupported types.
pub fn classify_upload(file_name: &str) -> Result<MediaType, CoreError> {
    let (_, ext) = split_extension(file_name);
    ext.strip_prefix('.')
        .and_then(MediaType::from_extension)
        .ok_or_else(|| {
            CoreError::Validation(format!(
                "File type not supported for '{file_name}'. Please upload images, videos, or PDFs."
            ))
        })
}

/// Name under which an upload is stored: sanitized stem, upload time in
/// milliseconds, original extension.
pub fn stored_file_name(original_name: &str, uploaded_at: Timestamp) -> String {
    let (stem, ext) = split_extension(original_name);
    let safe_stem = UNSAFE_FILE_CHARS_RE.replace_all(stem, "_");
    format!("{safe_stem}_{}{ext}", uploaded_at.timestamp_millis())
}

/// Validate the size of a single uploaded file.
pub fn validate_upload_size(size_bytes: u64) -> Result<(), CoreError> {
    if size_bytes > MAX_UPLOAD_BYTES {
        return Err(CoreError::Validation(
            "File too large. Maximum size is 500MB per file.".to_string(),
        ));
    }
    Ok(())
}

/// Validate the number of files in one upload batch.
pub fn validate_upload_batch(count: usize) -> Result<(), CoreError> {
    if count == 0 {
        return Err(CoreError::Validation("No files were uploaded".to_string()));
    }
    if count > MAX_FILES_PER_UPLOAD {
        return Err(CoreError::Validation(format!(
            "Too many files. Maximum is {MAX_FILES_PER_UPLOAD} files at once."
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Creative
// ---------------------------------------------------------------------------

/// Text fields whose edits are tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedField {
    Caption,
    ImageText,
}

impl TrackedField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Caption => "caption",
            Self::ImageText => "image_text",
        }
    }
}

/// A file received by the upload layer, already written to storage.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub stored_name: String,
    pub size_bytes: u64,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creative {
    pub id: EntityId,
    pub original_name: String,
    pub file_name: String,
    pub file_path: String,
    pub file_size: u64,
    pub mime_type: String,
    pub media_type: MediaType,
    pub uploaded_at: Timestamp,
    #[serde(default)]
    pub status: CreativeStatus,
    #[serde(default)]
    pub title: String,
    #[serde(
        default,
        deserialize_with = "deserialize_text_log",
        skip_serializing_if = "Option::is_none"
    )]
    pub caption: Option<TextRevisionLog>,
    #[serde(
        default,
        deserialize_with = "deserialize_text_log",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_text: Option<TextRevisionLog>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default = "first_revision")]
    pub revision_number: u32,
}

fn first_revision() -> u32 {
    1
}

/// Accept either a revision log or a bare string (records written before
/// edit tracking). A bare non-empty string becomes an ingested log.
fn deserialize_text_log<'de, D>(deserializer: D) -> Result<Option<TextRevisionLog>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StoredText {
        Log(TextRevisionLog),
        Plain(String),
    }

    Ok(match Option::<StoredText>::deserialize(deserializer)? {
        Some(StoredText::Log(log)) => Some(log),
        Some(StoredText::Plain(text)) if !text.is_empty() => Some(TextRevisionLog::ingest(&text)),
        _ => None,
    })
}

impl Creative {
    /// Build a pending creative for a freshly stored upload.
    pub fn from_upload(
        project_id: EntityId,
        upload: UploadedFile,
        now: Timestamp,
    ) -> Result<Self, CoreError> {
        let media_type = classify_upload(&upload.original_name)?;
        validate_upload_size(upload.size_bytes)?;

        Ok(Self {
            id: EntityId::new_v4(),
            file_path: format!("/uploads/{project_id}/{}", upload.stored_name),
            original_name: upload.original_name,
            file_name: upload.stored_name,
            file_size: upload.size_bytes,
            mime_type: upload.mime_type,
            media_type,
            uploaded_at: now,
            status: CreativeStatus::Pending,
            title: String::new(),
            caption: None,
            image_text: None,
            comments: Vec::new(),
            revision_number: first_revision(),
        })
    }

    /// Title if set, otherwise the uploaded file name.
    pub fn display_title(&self) -> &str {
        let title = self.title.trim();
        if title.is_empty() {
            &self.original_name
        } else {
            title
        }
    }

    /// Change the review status and return the previous one.
    ///
    /// Every request for revision opens a new revision round.
    pub fn set_status(&mut self, status: CreativeStatus) -> CreativeStatus {
        if status == CreativeStatus::RevisionRequested {
            self.revision_number += 1;
        }
        std::mem::replace(&mut self.status, status)
    }

    pub fn text_log(&self, field: TrackedField) -> Option<&TextRevisionLog> {
        match field {
            TrackedField::Caption => self.caption.as_ref(),
            TrackedField::ImageText => self.image_text.as_ref(),
        }
    }

    fn text_log_slot(&mut self, field: TrackedField) -> &mut Option<TextRevisionLog> {
        match field {
            TrackedField::Caption => &mut self.caption,
            TrackedField::ImageText => &mut self.image_text,
        }
    }

    /// Save a tracked text field. Returns `true` if the stored value changed.
    ///
    /// The first save ingests the value; later saves need an author.
    pub fn record_text(
        &mut self,
        field: TrackedField,
        new_text: &str,
        author: Option<&str>,
        now: Timestamp,
    ) -> Result<bool, CoreError> {
        let slot = self.text_log_slot(field);
        let updated = revision::record_edit(slot.clone(), new_text, author, now)?;
        let changed = slot.as_ref() != Some(&updated);
        *slot = Some(updated);
        Ok(changed)
    }

    // -----------------------------------------------------------------------
    // Comments
    // -----------------------------------------------------------------------

    /// Add a comment, checking that a reply targets an existing top-level
    /// comment.
    pub fn add_comment(&mut self, input: NewComment, now: Timestamp) -> Result<&Comment, CoreError> {
        if let Some(parent_id) = input.parent_id {
            let parent = self.find_comment(parent_id)?;
            if parent.is_reply() {
                return Err(CoreError::Validation(
                    "Replies can only be added to top-level comments".to_string(),
                ));
            }
        }

        let created = Comment::create(input, now)?;
        self.comments.push(created);
        Ok(&self.comments[self.comments.len() - 1])
    }

    pub fn find_comment(&self, id: EntityId) -> Result<&Comment, CoreError> {
        self.comments
            .iter()
            .find(|c| c.id == id)
            .ok_or(CoreError::NotFound {
                entity: "comment",
                id,
            })
    }

    /// Remove a comment together with its replies. Returns the removed comment.
    pub fn remove_comment(&mut self, id: EntityId) -> Result<Comment, CoreError> {
        let idx = self
            .comments
            .iter()
            .position(|c| c.id == id)
            .ok_or(CoreError::NotFound {
                entity: "comment",
                id,
            })?;

        let removed = self.comments.remove(idx);
        self.comments.retain(|c| c.parent_id != Some(id));
        Ok(removed)
    }

    pub fn comment_threads(&self) -> Vec<CommentThread<'_>> {
        comment::build_threads(&self.comments)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::pin::PinAnnotation;

    fn at(minute: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn upload(name: &str) -> UploadedFile {
        UploadedFile {
            original_name: name.to_string(),
            stored_name: stored_file_name(name, at(0)),
            size_bytes: 2048,
            mime_type: "image/png".to_string(),
        }
    }

    fn creative() -> Creative {
        Creative::from_upload(EntityId::new_v4(), upload("hero banner.png"), at(0)).unwrap()
    }

    fn note(text: &str) -> NewComment {
        NewComment {
            author: Some("Lee".to_string()),
            text: text.to_string(),
            ..Default::default()
        }
    }

    // -- CreativeStatus -----------------------------------------------------

    #[test]
    fn status_round_trip() {
        for s in VALID_STATUS_STRINGS {
            assert_eq!(CreativeStatus::from_str(s).unwrap().as_str(), *s);
        }
    }

    #[test]
    fn invalid_status_rejected() {
        let err = CreativeStatus::from_str("archived").unwrap_err();
        assert!(err.to_string().contains("Invalid status"));
    }

    #[test]
    fn status_labels() {
        assert_eq!(CreativeStatus::Pending.label(), "Pending Review");
        assert_eq!(CreativeStatus::RevisionRequested.label(), "Revision Requested");
    }

    // -- classification -----------------------------------------------------

    #[test]
    fn classifies_by_extension_case_insensitively() {
        assert_eq!(classify_upload("hero.PNG").unwrap(), MediaType::Image);
        assert_eq!(classify_upload("spot.final.mov").unwrap(), MediaType::Video);
        assert_eq!(classify_upload("deck.pdf").unwrap(), MediaType::Pdf);
    }

    #[test]
    fn unsupported_extension_rejected() {
        let err = classify_upload("notes.docx").unwrap_err();
        assert!(err.to_string().contains("File type not supported"));
    }

    #[test]
    fn missing_extension_rejected() {
        assert!(classify_upload("README").is_err());
        assert!(classify_upload(".png").is_err());
    }

    #[test]
    fn stored_name_is_sanitized_and_timestamped() {
        let millis = at(0).timestamp_millis();
        assert_eq!(
            stored_file_name("Hero banner (v2).PNG", at(0)),
            format!("Hero_banner__v2__{millis}.PNG")
        );
    }

    #[test]
    fn upload_limits() {
        assert!(validate_upload_size(MAX_UPLOAD_BYTES).is_ok());
        assert!(validate_upload_size(MAX_UPLOAD_BYTES + 1).is_err());
        assert!(validate_upload_batch(MAX_FILES_PER_UPLOAD).is_ok());
        assert!(validate_upload_batch(MAX_FILES_PER_UPLOAD + 1).is_err());
        assert!(validate_upload_batch(0).is_err());
    }

    // -- from_upload --------------------------------------------------------

    #[test]
    fn from_upload_starts_pending_at_revision_one() {
        let project_id = EntityId::new_v4();
        let c = Creative::from_upload(project_id, upload("spot.mp4"), at(0)).unwrap();
        assert_eq!(c.status, CreativeStatus::Pending);
        assert_eq!(c.revision_number, 1);
        assert_eq!(c.media_type, MediaType::Video);
        assert!(c.file_path.starts_with(&format!("/uploads/{project_id}/spot_")));
        assert!(c.caption.is_none());
        assert!(c.comments.is_empty());
    }

    #[test]
    fn display_title_falls_back_to_file_name() {
        let mut c = creative();
        assert_eq!(c.display_title(), "hero banner.png");
        c.title = "Hero v2".to_string();
        assert_eq!(c.display_title(), "Hero v2");
    }

    // -- set_status ---------------------------------------------------------

    #[test]
    fn revision_request_bumps_revision_number() {
        let mut c = creative();
        assert_eq!(c.set_status(CreativeStatus::RevisionRequested), CreativeStatus::Pending);
        assert_eq!(c.revision_number, 2);
        c.set_status(CreativeStatus::RevisionRequested);
        assert_eq!(c.revision_number, 3);
        c.set_status(CreativeStatus::Approved);
        assert_eq!(c.revision_number, 3);
        assert_eq!(c.status, CreativeStatus::Approved);
    }

    // -- record_text --------------------------------------------------------

    #[test]
    fn record_text_ingests_then_tracks_edits() {
        let mut c = creative();
        assert!(c.record_text(TrackedField::ImageText, "50% OFF", None, at(1)).unwrap());
        assert!(c.record_text(TrackedField::ImageText, "60% OFF", Some("Ivy"), at(2)).unwrap());
        assert!(!c.record_text(TrackedField::ImageText, "60% OFF", Some("Ivy"), at(3)).unwrap());

        let log = c.text_log(TrackedField::ImageText).unwrap();
        assert_eq!(log.original, "50% OFF");
        assert_eq!(log.current, "60% OFF");
        assert_eq!(log.edit_count(), 1);
        assert!(c.text_log(TrackedField::Caption).is_none());
    }

    #[test]
    fn record_text_without_author_after_ingest_fails() {
        let mut c = creative();
        c.record_text(TrackedField::Caption, "Hello", None, at(1)).unwrap();
        let result = c.record_text(TrackedField::Caption, "Hi", None, at(2));
        assert_matches!(result, Err(CoreError::InvalidEdit(_)));
        assert_eq!(c.caption.unwrap().current, "Hello");
    }

    #[test]
    fn record_text_stores_the_same_log_as_record_edit() {
        let mut c = creative();
        c.record_text(TrackedField::Caption, "Buy now", Some("Ann"), at(1)).unwrap();
        c.record_text(TrackedField::Caption, "Buy now!", Some("Ann"), at(2)).unwrap();

        let first = revision::record_edit(None, "Buy now", Some("Ann"), at(1)).unwrap();
        let expected = revision::record_edit(Some(first), "Buy now!", Some("Ann"), at(2)).unwrap();
        assert_eq!(c.caption, Some(expected));
    }

    // -- comments -----------------------------------------------------------

    #[test]
    fn reply_to_missing_comment_is_not_found() {
        let mut c = creative();
        let input = NewComment {
            parent_id: Some(EntityId::new_v4()),
            ..note("hi")
        };
        assert_matches!(
            c.add_comment(input, at(1)),
            Err(CoreError::NotFound { entity: "comment", .. })
        );
    }

    #[test]
    fn reply_to_reply_rejected() {
        let mut c = creative();
        let root = c.add_comment(note("root"), at(1)).unwrap().id;
        let child = c
            .add_comment(
                NewComment {
                    parent_id: Some(root),
                    ..note("child")
                },
                at(2),
            )
            .unwrap()
            .id;
        let result = c.add_comment(
            NewComment {
                parent_id: Some(child),
                ..note("grandchild")
            },
            at(3),
        );
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    #[test]
    fn remove_comment_drops_replies() {
        let mut c = creative();
        let root = c.add_comment(note("root"), at(1)).unwrap().id;
        c.add_comment(
            NewComment {
                parent_id: Some(root),
                ..note("child")
            },
            at(2),
        )
        .unwrap();
        let other = c
            .add_comment(
                NewComment {
                    pin: Some(PinAnnotation { x: 5.0, y: 5.0 }),
                    ..note("pinned")
                },
                at(3),
            )
            .unwrap()
            .id;

        let removed = c.remove_comment(root).unwrap();
        assert_eq!(removed.text, "root");
        assert_eq!(c.comments.len(), 1);
        assert_eq!(c.comments[0].id, other);
        assert_eq!(c.comment_threads().len(), 1);
    }

    #[test]
    fn remove_missing_comment_is_not_found() {
        let mut c = creative();
        assert!(c.remove_comment(EntityId::new_v4()).is_err());
    }

    // -- serde --------------------------------------------------------------

    #[test]
    fn legacy_plain_caption_is_ingested() {
        let json = serde_json::json!({
            "id": EntityId::new_v4(),
            "originalName": "a.png",
            "fileName": "a_1.png",
            "filePath": "/uploads/p/a_1.png",
            "fileSize": 10,
            "mimeType": "image/png",
            "mediaType": "image",
            "uploadedAt": "2024-03-01T09:00:00Z",
            "status": "approved",
            "caption": "Launch day",
            "imageText": "",
            "title": "",
            "comments": []
        });
        let c: Creative = serde_json::from_value(json).unwrap();
        assert_eq!(c.caption.unwrap().original, "Launch day");
        assert!(c.image_text.is_none());
        assert_eq!(c.status, CreativeStatus::Approved);
        assert_eq!(c.revision_number, 1);
    }

    #[test]
    fn tracked_log_survives_round_trip() {
        let mut c = creative();
        c.record_text(TrackedField::Caption, "Buy now", None, at(1)).unwrap();
        c.record_text(TrackedField::Caption, "Buy now!", Some("Alice"), at(2)).unwrap();

        let json = serde_json::to_string(&c).unwrap();
        let back: Creative = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
