use std::time::Duration;

use thiserror::Error;

/// Why a request to the NHL API produced no data this tick.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("received status code {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failures of the Discord gateway connection.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("invalid gateway payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("unexpected gateway message: {0}")]
    Protocol(String),
    /// Close codes Discord documents as "do not reconnect" (bad token, bad intents, ...).
    #[error("gateway refused the session (close code {0})")]
    Rejected(u16),
    #[error("gateway connection is down")]
    Disconnected,
    #[error("gateway did not respond within {0:?}")]
    Timeout(Duration),
    #[error("gateway has been shut down")]
    Closed,
}

impl GatewayError {
    /// Whether a later attempt can succeed without operator intervention.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Rejected(_) | Self::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(GatewayError::Disconnected.is_retryable());
        assert!(GatewayError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(GatewayError::Protocol("op 42".into()).is_retryable());
        assert!(!GatewayError::Closed.is_retryable());
        assert!(!GatewayError::Rejected(4004).is_retryable());
    }
}
