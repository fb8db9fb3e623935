/// Errors returned by [`crate::TrendSource`] implementations.
///
/// Every variant is recoverable: the scheduler skips the affected keyword
/// or cycle and logs the error.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The HTTP request failed (connect, timeout, body read).
    #[error("Source: HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The upstream answered with a non-success status.
    #[error("Source: {endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },

    /// The upstream payload did not have the expected shape.
    #[error("Source: unexpected payload from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    /// The source had nothing usable to report.
    #[error("Source: no data ({0})")]
    Empty(String),
}

/// Convenience `Result` alias for trend source operations.
pub type Result<T> = std::result::Result<T, SourceError>;
