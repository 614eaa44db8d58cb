//! Transport-level failure shape handed to the error classifier.

use reqwest::Response;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportFailure {
    /// The server answered with a non-success status.
    #[error("request failed with status {status}")]
    Response { status: u16, body: Option<Value> },
    /// No response arrived: connect, timeout or request-building errors.
    #[error("network error: {message}")]
    Network { message: String },
    #[error("{}", .message.as_deref().unwrap_or("unexpected client failure"))]
    Other { message: Option<String> },
}

impl TransportFailure {
    pub fn response(status: u16, body: Option<Value>) -> Self {
        Self::Response { status, body }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: Some(message.into()),
        }
    }

    /// Reads the status and body of a failed response. Non-JSON bodies are kept
    /// as a JSON string so message extraction still sees them.
    pub async fn from_response(response: Response) -> Self {
        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(text) if text.trim().is_empty() => None,
            Ok(text) => Some(serde_json::from_str(&text).unwrap_or(Value::String(text))),
            Err(error) => {
                tracing::debug!(status, %error, "failed to read error response body");
                None
            }
        };
        Self::Response { status, body }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<&Value> {
        match self {
            Self::Response { body, .. } => body.as_ref(),
            _ => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// The failure's own message, if it carries one.
    pub fn own_message(&self) -> Option<&str> {
        match self {
            Self::Response { .. } => None,
            Self::Network { message } => Some(message.as_str()),
            Self::Other { message } => message.as_deref().filter(|m| !m.is_empty()),
        }
    }
}

impl From<reqwest::Error> for TransportFailure {
    fn from(error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            return Self::Response {
                status: status.as_u16(),
                body: None,
            };
        }
        if error.is_connect() || error.is_timeout() || error.is_request() {
            return Self::Network {
                message: error.to_string(),
            };
        }
        Self::Other {
            message: Some(error.to_string()),
        }
    }
}

/// Passes successful responses through and turns everything else into a
/// [`TransportFailure::Response`].
pub async fn ensure_success(response: Response) -> Result<Response, TransportFailure> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(TransportFailure::from_response(response).await)
    }
}
