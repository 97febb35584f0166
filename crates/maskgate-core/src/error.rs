//! Error types for maskgate

/// Result type alias using maskgate's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error taxonomy for the gateway.
///
/// Every rejection a caller can observe maps to exactly one variant; the
/// proxy crate translates variants to HTTP statuses.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or empty credential outside the exempt paths
    #[error("invalid or missing API key")]
    Unauthorized,

    /// Caller identifier is blocklisted or was just flagged as suspicious
    #[error("access denied: {0}")]
    Blocked(String),

    /// One of the global sliding windows is exhausted
    #[error("rate limit exceeded")]
    RateLimited,

    /// Target service name does not resolve to a configured upstream
    #[error("unknown service: {0}")]
    UnknownService(String),

    /// Upstream AI service returned a non-2xx response
    #[error("upstream returned status {status}")]
    Upstream { status: u16, body: String },

    /// Transport or timeout failure talking to the upstream
    #[error("dispatch failure: {0}")]
    Dispatch(String),

    /// Pattern compilation errors
    #[error("pattern error: {0}")]
    Pattern(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a new blocked error with a reason string
    pub fn blocked(reason: impl Into<String>) -> Self {
        Self::Blocked(reason.into())
    }

    /// Create a new unknown-service error
    pub fn unknown_service(name: impl Into<String>) -> Self {
        Self::UnknownService(name.into())
    }

    /// Create a new dispatch failure
    pub fn dispatch(msg: impl Into<String>) -> Self {
        Self::Dispatch(msg.into())
    }

    /// Create a new pattern error
    pub fn pattern(msg: impl Into<String>) -> Self {
        Self::Pattern(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
