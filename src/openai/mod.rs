pub mod chat;
pub mod embeddings;


use thiserror::Error;

/// Environment variable holding the API key. The key is read from the
/// environment only and never written to the configuration file.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[inline]
pub fn api_key_from_env() -> Option<String> {
    std::env::var(API_KEY_ENV)
        .ok()
        .filter(|key| !key.trim().is_empty())
}

/// Failure classes for calls to the OpenAI-compatible API. Each class maps
/// to one fixed user-facing diagnostic via [`ApiError::user_message`], so
/// callers never compose their own wording.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("service error: {0}")]
    Service(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether the index builder may retry this failure. Query-time callers
    /// never retry regardless of class.
    #[inline]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Service(_) | Self::Network(_)
        )
    }

    /// The exact diagnostic shown to a chat user when this failure aborts a
    /// turn. Service and network failures share one message; only malformed
    /// payloads fall through to the catch-all wording.
    #[inline]
    pub fn user_message(&self) -> String {
        match self {
            Self::RateLimited => {
                "Error: Rate limit exceeded. Please wait and try again later.".to_string()
            }
            Self::InvalidRequest(detail) => format!("Error: Invalid request - {detail}"),
            Self::Service(detail) | Self::Network(detail) => {
                format!("Error: API error encountered - {detail}")
            }
            Self::Decode(detail) => format!("An unexpected error occurred: {detail}"),
        }
    }
}

impl From<ureq::Error> for ApiError {
    #[inline]
    fn from(error: ureq::Error) -> Self {
        match error {
            ureq::Error::StatusCode(429) => Self::RateLimited,
            ureq::Error::StatusCode(code) if (400..500).contains(&code) => {
                Self::InvalidRequest(format!("HTTP {code}"))
            }
            ureq::Error::StatusCode(code) => Self::Service(format!("HTTP {code}")),
            ureq::Error::ConnectionFailed
            | ureq::Error::HostNotFound
            | ureq::Error::Timeout(_)
            | ureq::Error::Io(_) => Self::Network(error.to_string()),
            other => Self::Network(other.to_string()),
        }
    }
}
