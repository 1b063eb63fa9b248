use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Adapter, process or network unreachable. Recoverable by retry or fallback.
    #[error("{stage}: connection failed: {reason}")]
    Connection { stage: &'static str, reason: String },
    #[error("stream mismatch: {0}")]
    VerificationMismatch(String),
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    /// Player binary missing or process spawn failed.
    #[error("{stage}: resource unavailable: {reason}")]
    ResourceUnavailable { stage: &'static str, reason: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn connection(stage: &'static str, reason: impl ToString) -> Self {
        Error::Connection {
            stage,
            reason: reason.to_string(),
        }
    }

    pub fn resource_unavailable(stage: &'static str, reason: impl ToString) -> Self {
        Error::ResourceUnavailable {
            stage,
            reason: reason.to_string(),
        }
    }

    /// Whether a retry or a fallback tier can still help.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }
}
