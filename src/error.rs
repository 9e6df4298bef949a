//! Error types for source dispatch and lookup.
//!
//! Per-source failures (`RateLimitExceeded`, `LookupFailure`, `Timeout`) are
//! captured inside a [`SourceResult`](crate::models::SourceResult) and never
//! fail a whole analysis. `UnknownSource` and `MalformedParameters` are
//! dispatch-level errors that reject the request before any source runs.

/// Errors raised while resolving or invoking a data source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The requested source identifier is not in the registry.
    #[error("Unsupported API: {0}")]
    UnknownSource(String),

    /// The per-source request window is exhausted.
    #[error("Rate limit exceeded for {0}. Please wait.")]
    RateLimitExceeded(String),

    /// The bound lookup capability returned an error.
    #[error("lookup failed: {0}")]
    LookupFailure(String),

    /// Caller-supplied parameters are not a JSON object.
    #[error("malformed parameters: {0}")]
    MalformedParameters(String),

    /// The lookup did not finish before its deadline.
    #[error("timed out: {0}")]
    Timeout(String),
}

impl SourceError {
    /// Stable machine-readable code used in result envelopes and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownSource(_) => "UNKNOWN_SOURCE",
            Self::RateLimitExceeded(_) => "RATE_LIMIT_EXCEEDED",
            Self::LookupFailure(_) => "LOOKUP_FAILED",
            Self::MalformedParameters(_) => "MALFORMED_PARAMETERS",
            Self::Timeout(_) => "TIMEOUT",
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LookupFailure(_) | Self::Timeout(_))
    }
}

/// Convenience alias for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;
