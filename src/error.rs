//! Client errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(String),
}

impl ClientError {
    /// HTTP status of an API error, if this is one
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Transport failures and 5xx: the server most likely never stored
    /// what was sent
    pub fn is_offline(&self) -> bool {
        match self {
            ClientError::Http(_) => true,
            other => other.status().is_some_and(|status| status >= 500),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_errors() {
        assert!(ClientError::Api { status: 503, message: String::new() }.is_offline());
        assert!(!ClientError::Api { status: 400, message: String::new() }.is_offline());
        assert!(!ClientError::Api { status: 409, message: String::new() }.is_offline());
        assert!(!ClientError::Config("x".into()).is_offline());
    }
}
