//! Payment Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment lifecycle errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Required initiation input missing or invalid
    #[error("Validation error: {0}")]
    Validation(String),

    /// No payment recorded for the booking reference
    #[error("Payment not found: {0}")]
    NotFound(String),

    /// A payment already exists for the booking reference
    #[error("Duplicate booking reference: {0}")]
    DuplicateReference(String),

    /// Gateway returned a non-success response or could not be reached
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Payment has no transaction id to verify against
    #[error("Payment not initiated: {0}")]
    NotInitiated(String),

    /// Confirmation could not be scheduled
    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        Self::Gateway(err.to_string())
    }
}

/// Confirmation delivery errors
#[derive(Error, Debug)]
pub enum NotificationError {
    /// Mail transport rejected or failed to deliver the message
    #[error("Mail delivery failed: {0}")]
    Mail(String),

    /// Sender or recipient address could not be parsed
    #[error("Invalid mail address: {0}")]
    InvalidAddress(String),

    /// Queue is at capacity
    #[error("Notification queue full")]
    QueueFull,

    /// Worker has shut down
    #[error("Notification queue closed")]
    QueueClosed,
}
