// src/error.rs
use thiserror::Error;

/// Failure of a single outbound explorer or price-feed call.
///
/// Cloned freely: one failed account lookup can blank several snapshot fields,
/// each of which records its own diagnostic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request to {source_name} timed out")]
    Timeout { source_name: String },

    #[error("request to {source_name} failed: {reason}")]
    Transport { source_name: String, reason: String },

    #[error("{source_name} answered HTTP {status}")]
    Status { source_name: String, status: u16 },

    #[error("{source_name} returned a malformed body: {reason}")]
    Decode { source_name: String, reason: String },

    #[error("{source_name} reported an error: {message}")]
    Remote { source_name: String, message: String },
}

impl FetchError {
    pub fn from_reqwest(source_name: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout { source_name: source_name.to_string() }
        } else if let Some(status) = err.status() {
            FetchError::Status { source_name: source_name.to_string(), status: status.as_u16() }
        } else if err.is_decode() {
            FetchError::Decode { source_name: source_name.to_string(), reason: err.to_string() }
        } else {
            FetchError::Transport { source_name: source_name.to_string(), reason: err.to_string() }
        }
    }

    pub fn decode(source_name: &str, reason: impl ToString) -> Self {
        FetchError::Decode { source_name: source_name.to_string(), reason: reason.to_string() }
    }

    pub fn remote(source_name: &str, message: impl ToString) -> Self {
        FetchError::Remote { source_name: source_name.to_string(), message: message.to_string() }
    }
}

/// Failure of the external risk classifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("classifier is not configured")]
    NotConfigured,

    #[error("classifier request failed: {0}")]
    Request(String),

    #[error("classifier answered HTTP {0}")]
    Status(u16),

    #[error("classifier returned no usable text")]
    EmptyResponse,
}

/// Result of one remote call, consumed by the normalizer.
pub type Fetched<T> = Result<T, FetchError>;
