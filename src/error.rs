use thiserror::Error;

/// Classifies configuration retrieval errors for programmatic matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// The document does not exist at the configured location
    NotFound,
    /// Transport-level failure (connection refused, bad status, etc.)
    Transport,
    /// Credentials were rejected
    AuthFailed,
    /// The document could not be read or decoded as text
    InvalidData,
    /// Fetcher is missing required settings
    NotConfigured,
}

/// Rule tracker error types
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Invalid configuration document: {0}")]
    Document(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid query, unknown fields: {}", .0.join(", "))]
    InvalidQuery(Vec<String>),

    #[error("Fetch error for {device}: {message}")]
    FetchError {
        kind: FetchErrorKind,
        device: String,
        message: String,
    },

    #[error("Inventory error: {0}")]
    InventoryError(String),

    #[error("Options error: {0}")]
    OptionsError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),
}

impl TrackerError {
    pub(crate) fn fetch(
        kind: FetchErrorKind,
        device: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        TrackerError::FetchError {
            kind,
            device: device.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
