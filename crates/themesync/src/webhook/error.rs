use thiserror::Error;

/// Errors raised while accepting a webhook delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Missing X-Hub-Signature-256 header")]
    MissingSignature,

    #[error("Malformed signature header: {0}")]
    MalformedSignature(String),

    #[error("Signature does not match payload")]
    InvalidSignature,

    #[error("Invalid {event} payload: {message}")]
    InvalidPayload { event: String, message: String },
}

impl WebhookError {
    /// Whether the delivery failed authentication rather than parsing.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        !matches!(self, WebhookError::InvalidPayload { .. })
    }
}
