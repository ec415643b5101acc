use anyhow::Error;
use thiserror::Error;

/// Application-level error types for gdrm-rs.
///
/// ## Exit Codes
///
/// Each variant maps to an exit code (via `exit_code()`):
/// - 1: General errors (Credential, List, Delete, Pipeline)
/// - 2: Configuration errors (InvalidConfig, InvalidCriteria)
/// - 3: Partial failure (some objects deleted, some failed)
#[derive(Error, Debug, PartialEq)]
pub enum GdrmError {
    /// Container id or time window cannot form a valid query.
    #[error("Invalid selection criteria: {0}")]
    InvalidCriteria(String),

    /// Configuration error (non-retryable).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Service-account credential could not be loaded.
    #[error("Credential error: {0}")]
    Credential(String),

    /// Listing failed. The run is aborted before any deletion.
    #[error("Listing failed: {0}")]
    List(String),

    /// A single delete request failed.
    #[error("Delete failed: {0}")]
    Delete(String),

    /// The object was already gone when the delete request reached the service.
    #[error("Object not found: {0}")]
    NotFoundOnDelete(String),

    /// Partial failure during deletion.
    #[error("Partial failure: {deleted} deleted, {failed} failed")]
    PartialFailure { deleted: u64, failed: u64 },

    /// General pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

impl GdrmError {
    /// Get the appropriate process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            GdrmError::InvalidConfig(_) | GdrmError::InvalidCriteria(_) => 2,
            GdrmError::PartialFailure { .. } => 3,
            _ => 1,
        }
    }
}

/// Check if an anyhow::Error wraps a not-found response to a delete request.
pub fn is_not_found_on_delete_error(e: &Error) -> bool {
    matches!(
        e.downcast_ref::<GdrmError>(),
        Some(GdrmError::NotFoundOnDelete(_))
    )
}

/// Extract the exit code from an anyhow::Error, defaulting to 1.
pub fn exit_code_from_error(e: &Error) -> i32 {
    if let Some(err) = e.downcast_ref::<GdrmError>() {
        return err.exit_code();
    }
    1
}
