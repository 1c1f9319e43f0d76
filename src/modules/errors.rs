use reqwest::StatusCode;
use thiserror::Error;

/// Everything that can go wrong while the panel talks to its server.
#[derive(Debug, Error)]
pub enum PanelError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Start batch cannot be greater than end batch")]
    BatchRange { start: i64, end: i64 },

    #[error("invalid server url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("could not reach {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{status}{}", detail(.message))]
    Status {
        status: StatusCode,
        message: Option<String>,
    },

    #[error("{message}")]
    Application { message: String },

    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

fn detail(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(" ({m})"))
        .unwrap_or_default()
}

impl PanelError {
    /// Failed locally; no request was sent.
    pub fn is_validation(&self) -> bool {
        matches!(self, PanelError::InvalidJson(_) | PanelError::BatchRange { .. })
    }

    /// The server could not be reached at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, PanelError::Transport { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_carry_server_message() {
        let err = PanelError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: Some("disk full".to_string()),
        };
        assert_eq!(err.to_string(), "500 Internal Server Error (disk full)");

        let err = PanelError::Status {
            status: StatusCode::BAD_REQUEST,
            message: None,
        };
        assert_eq!(err.to_string(), "400 Bad Request");
        assert!(!err.is_transport());
    }

    #[test]
    fn validation_errors_are_local() {
        let err = PanelError::BatchRange { start: 5, end: 1 };
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Start batch cannot be greater than end batch");

        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(PanelError::InvalidJson(parse).is_validation());
    }
}
