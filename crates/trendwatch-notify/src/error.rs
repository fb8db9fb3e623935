/// Errors that can occur within the notification subsystem.
///
/// # Examples
///
/// ```rust
/// use trendwatch_notify::error::NotifyError;
///
/// let err = NotifyError::InvalidConfig("missing token".to_string());
/// assert!(err.to_string().contains("token"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Channel configuration is missing a required field or contains an invalid value.
    #[error("Notify: invalid channel configuration: {0}")]
    InvalidConfig(String),

    /// The channel type is not registered in the plugin registry.
    #[error("Notify: unknown channel type '{0}'")]
    UnknownChannelType(String),

    /// Building the HTTP client failed.
    #[error("Notify: HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Every delivery attempt failed.
    #[error("Notify: {channel} delivery failed after {attempts} attempts: {reason}")]
    DeliveryFailed {
        channel: String,
        attempts: u32,
        reason: String,
    },
}

/// Convenience `Result` alias for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
