/// Errors that can occur while persisting notification state.
///
/// Loading never surfaces these to callers (a fresh store is an acceptable
/// degraded mode); they are returned from saves so the engine can log them
/// and expose the last failure to operators.
///
/// # Examples
///
/// ```rust
/// use trendwatch_storage::error::StorageError;
///
/// let err = StorageError::Other("disk quota exceeded".to_string());
/// assert!(err.to_string().contains("quota"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading, writing or renaming the state file failed.
    #[error("Storage: I/O error on '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// The state document could not be serialized or parsed.
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic storage error for cases not covered by other variants.
    #[error("Storage: {0}")]
    Other(String),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
