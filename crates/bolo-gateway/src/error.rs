use thiserror::Error;

/// Uniform credential failure. Carries no detail: missing, malformed,
/// expired and forged tokens all look the same to a client.
#[derive(Debug, Error)]
#[error("unauthorized")]
pub struct AuthError;

/// Sent to the originating connection when validation fails.
pub const INVALID_MESSAGE: &str = "Invalid message data";
/// Sent to the originating connection when the store rejects a send.
pub const SEND_FAILED: &str = "Failed to send message";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("validation failed: {0}")]
    Validation(String),

    /// The store failed; nothing was broadcast. Safe to retry.
    #[error("persistence failed: {0:#}")]
    Persistence(anyhow::Error),
}

impl GatewayError {
    /// Text for the `error` event sent back to the originating connection.
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::Validation(_) => INVALID_MESSAGE,
            Self::Persistence(_) => SEND_FAILED,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}
