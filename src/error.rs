#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Missing or invalid provider configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An authenticated call was attempted without a session.
    #[error("Not authenticated")]
    Unauthenticated,

    /// The identity provider rejected or failed an operation.
    #[error("Identity provider {operation} failed: {detail}")]
    Provider {
        operation: &'static str,
        detail: String,
    },

    /// A provider call exceeded the configured timeout.
    #[error("Identity provider {operation} timed out")]
    Timeout { operation: &'static str },

    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Shorthand for a provider failure.
    pub fn provider(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::Provider {
            operation,
            detail: detail.into(),
        }
    }
}
