use thiserror::Error;

/// Error type shared by every service and parser in the crate.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned HTTP {code} for {url}")]
    Status { code: u16, url: String },

    #[error("XML error: {0}")]
    Xml(String),

    #[error("OCS request failed with status {status_code}: {message}")]
    Ocs { status_code: i32, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn status(code: u16, url: impl Into<String>) -> Self {
        Self::Status { code, url: url.into() }
    }

    pub fn xml<S: Into<String>>(message: S) -> Self {
        Self::Xml(message.into())
    }

    pub fn ocs(status_code: i32, message: impl Into<String>) -> Self {
        Self::Ocs { status_code, message: message.into() }
    }

    /// Whether a retry with backoff has a chance of succeeding.
    ///
    /// Network-level failures, 5xx responses, and 429 are retryable;
    /// everything else (auth failures, malformed XML, bad config) is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http(err) => {
                err.is_timeout()
                    || err.is_connect()
                    || err.is_request()
                    || err
                        .status()
                        .map(|s| s.is_server_error() || s.as_u16() == 429)
                        .unwrap_or(true)
            }
            ClientError::Status { code, .. } => *code >= 500 || *code == 429,
            ClientError::Io(_) => true,
            _ => false,
        }
    }
}

impl From<quick_xml::Error> for ClientError {
    fn from(err: quick_xml::Error) -> Self {
        ClientError::Xml(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_retryability() {
        assert!(ClientError::status(503, "http://x").is_retryable());
        assert!(ClientError::status(429, "http://x").is_retryable());
        assert!(!ClientError::status(401, "http://x").is_retryable());
        assert!(!ClientError::status(404, "http://x").is_retryable());
    }

    #[test]
    fn test_parse_errors_not_retryable() {
        assert!(!ClientError::xml("unexpected EOF").is_retryable());
        assert!(!ClientError::config("missing server URL").is_retryable());
        assert!(!ClientError::ocs(997, "unauthorised").is_retryable());
    }
}
