use crate::types::EntityId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: EntityId },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// An edit was recorded on an existing text log without an author.
    #[error("Invalid edit: {0}")]
    InvalidEdit(String),
}
