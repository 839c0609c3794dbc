use std::fmt;
use thiserror::Error;

/// Error types for burp-studio
#[derive(Error, Debug)]
pub enum BurpError {
    // Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid configuration file: {path}")]
    InvalidConfig { path: String },

    // Transport errors: the backend never produced a response
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Request timed out: {url}")]
    Timeout { url: String },

    // Application errors: the backend answered but refused or failed
    #[error("{message}")]
    Api { status: Option<u16>, message: String },

    #[error("Unknown scraper: {scraper_id}")]
    UnknownScraper { scraper_id: String },

    // Client-side validation
    #[error("Parameter {name} is required")]
    MissingParameter { name: String },

    #[error("Invalid value for {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    // Export errors
    #[error("Export error: {message}")]
    Export { message: String },

    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Nothing to export: {reason}")]
    NothingToExport { reason: String },

    // Storage errors
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Version conflict on key {key}: expected {expected:?}, found {found:?}")]
    VersionConflict {
        key: String,
        expected: Option<i64>,
        found: Option<i64>,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Session errors
    #[error("Invalid state: {state}")]
    InvalidState { state: String },

    #[error("Operation cancelled")]
    Cancelled,
}

impl BurpError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Create an application-level API error
    pub fn api(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Api { status, message: message.into() }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    /// Create an export error
    pub fn export(message: impl Into<String>) -> Self {
        Self::Export { message: message.into() }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage { message: message.into() }
    }

    /// Create an invalid state error
    pub fn invalid_state(state: impl Into<String>) -> Self {
        Self::InvalidState { state: state.into() }
    }

    /// Get error category for logging and call-history analytics
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration { .. } | Self::InvalidConfig { .. } => "configuration",
            Self::Network { .. } | Self::Timeout { .. } => "transport",
            Self::Api { .. } | Self::UnknownScraper { .. } => "api",
            Self::MissingParameter { .. } | Self::InvalidParameter { .. } | Self::Validation { .. } => "validation",
            Self::Export { .. } | Self::UnsupportedFormat { .. } | Self::NothingToExport { .. } => "export",
            Self::Storage { .. } | Self::VersionConflict { .. } => "storage",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
            Self::InvalidState { .. } | Self::Cancelled => "session",
        }
    }

    /// Transport failures never reached the backend; everything else did or never left the client.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }

    /// Single user-facing message, as shown in the error banner.
    ///
    /// An error status without an `error` body reads like a transport
    /// failure; a `success: false` body without one is a failed scrape.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network { .. } => "Network error occurred".to_string(),
            Self::Timeout { .. } => "The scraper did not answer in time".to_string(),
            Self::Api { status: Some(_), message } if message.is_empty() => {
                "Network error occurred".to_string()
            }
            Self::Api { message, .. } if message.is_empty() => "Scraping failed".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for BurpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else if err.is_decode() {
            Self::api(err.status().map(|s| s.as_u16()), format!("Malformed response: {}", err))
        } else {
            Self::network(err.to_string())
        }
    }
}

impl From<rusqlite::Error> for BurpError {
    fn from(err: rusqlite::Error) -> Self {
        Self::storage(err.to_string())
    }
}

impl From<csv::Error> for BurpError {
    fn from(err: csv::Error) -> Self {
        Self::export(err.to_string())
    }
}

impl From<toml::de::Error> for BurpError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(err.to_string())
    }
}

impl From<toml::ser::Error> for BurpError {
    fn from(err: toml::ser::Error) -> Self {
        Self::config(err.to_string())
    }
}

/// Result type alias for burp-studio
pub type BurpResult<T> = std::result::Result<T, BurpError>;

/// Where an error happened, for log lines
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub operation: String,
    pub component: String,
    pub request_id: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            component: component.into(),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Error with the operation it came from
#[derive(Debug)]
pub struct ContextualError {
    pub error: BurpError,
    pub context: ErrorContext,
}

impl ContextualError {
    pub fn new(error: BurpError, context: ErrorContext) -> Self {
        Self { error, context }
    }
}

impl fmt::Display for ContextualError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}::{}", self.error, self.context.component, self.context.operation)?;

        if let Some(request_id) = &self.context.request_id {
            write!(f, " [req: {}]", request_id)?;
        }

        Ok(())
    }
}

impl std::error::Error for ContextualError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
