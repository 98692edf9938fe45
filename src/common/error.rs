//! Error types for the application.

use thiserror::Error;

use crate::delivery::failure::FailureCategory;

/// Top-level application error.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Feed error: {0}")]
    Feed(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {message}")]
    IoError { path: String, message: String },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Malformed numeric text inside an otherwise matching game message.
///
/// Never leaves the parser: callers log it and drop the signal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Malformed count '{text}'")]
    MalformedCount { text: String },

    #[error("Malformed duration '{text}'")]
    MalformedDuration { text: String },
}

/// Delivery-related errors.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Transport failure ({category:?}): {message}")]
    Transport {
        category: FailureCategory,
        message: String,
    },

    #[error("Endpoint responded with HTTP {status}")]
    Status { status: u16 },

    #[error("Retry queue full ({capacity} items), delivery dropped")]
    QueueFull { capacity: usize },

    #[error("Failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl DeliveryError {
    /// Failure category used by the reliability layer.
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::Transport { category, .. } => *category,
            Self::Status { status } => FailureCategory::from_status(*status),
            // Local failures never reach the endpoint; treat them as permanent.
            Self::QueueFull { .. } | Self::Serialize(_) => FailureCategory::Client,
        }
    }
}

/// Result type alias using AppError.
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for delivery operations.
pub type DeliveryResult<T> = std::result::Result<T, DeliveryError>;
