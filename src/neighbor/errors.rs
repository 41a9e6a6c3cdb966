use thiserror::Error;

/// Low-level backend failures. Every variant surfaces to callers as
/// [`NeighborError::StorageUnavailable`].
#[derive(Debug, Error)]
pub enum StorageFault {
    /// Wrapper around rusqlite's error type (open, prepare, execute, commit).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Wrapper around IO errors on legacy family files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Item attributes could not be serialized for the database.
    #[error("attribute column error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can arise while reading or writing Neighbor data.
#[derive(Debug, Error)]
pub enum NeighborError {
    /// Out-of-domain numeric input (negative XP, level below 1, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Family invariant violation.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Attempt to write a derived-only property.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Malformed persisted data: an item or legacy line, or a stored attribute column.
    #[error("format error: {0}")]
    Format(String),

    /// Item attribute lookup miss. `suggestions` holds near-miss keys.
    #[error("Attribute '{attribute}' not present in Item values.{}", render_suggestions(.suggestions))]
    NotFound {
        attribute: String,
        suggestions: Vec<String>,
    },

    /// The database or a legacy file could not be opened, read or written.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageFault),
}

impl From<rusqlite::Error> for NeighborError {
    fn from(err: rusqlite::Error) -> Self {
        NeighborError::StorageUnavailable(err.into())
    }
}

impl From<std::io::Error> for NeighborError {
    fn from(err: std::io::Error) -> Self {
        NeighborError::StorageUnavailable(err.into())
    }
}

impl From<serde_json::Error> for NeighborError {
    fn from(err: serde_json::Error) -> Self {
        NeighborError::StorageUnavailable(err.into())
    }
}

fn render_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        return String::new();
    }
    format!(" Could you have meant: [{}]?", suggestions.join(", "))
}
