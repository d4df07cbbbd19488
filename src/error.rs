//! Error types for remote deck operations.
//!
//! Only input validation and lookups surface as errors to callers. Network and
//! storage failures are caught at the I/O boundary, logged, and converted into
//! state (disconnected, empty list, defaults) by the components themselves.

use thiserror::Error;

/// Primary error type for remote deck operations.
#[derive(Error, Debug)]
pub enum RdError {
    // Lookup errors
    #[error("Device not found: {id}")]
    DeviceNotFound { id: String },

    #[error("Profile not found: {id}")]
    ProfileNotFound { id: String },

    #[error("Button not found: {id}")]
    ButtonNotFound { id: String },

    #[error("Template not found: {id}")]
    TemplateNotFound { id: String },

    #[error("No active device selected")]
    NoActiveDevice,

    // User input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Connectivity
    #[error("Not connected to {target}")]
    NotConnected { target: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Agent request failed: {0}")]
    Agent(String),

    // Storage
    #[error("Storage error: {0}")]
    Storage(String),

    // Configuration errors
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Configuration parse error: {0}")]
    ConfigParse(String),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl RdError {
    /// Returns true if the error is recoverable by the user.
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotFound { .. }
                | Self::ProfileNotFound { .. }
                | Self::ButtonNotFound { .. }
                | Self::TemplateNotFound { .. }
                | Self::NoActiveDevice
                | Self::InvalidInput(_)
                | Self::NotConnected { .. }
                | Self::ConfigNotFound { .. }
        )
    }

    /// Returns true for failures that come from the network boundary.
    pub const fn is_network_error(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Agent(_) | Self::NotConnected { .. }
        )
    }

    /// Returns a suggestion for how to fix the error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::DeviceNotFound { .. } => Some("Run: rdeck devices"),
            Self::TemplateNotFound { .. } => Some("Run: rdeck templates"),
            Self::NoActiveDevice => Some("Add a device with: rdeck add-device"),
            Self::NotConnected { .. } => {
                Some("Check that the agent is running and reachable on the network")
            }
            Self::ConfigNotFound { .. } => Some("Unset RDECK_CONFIG to use defaults"),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for RdError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Convenience type alias for Results using RdError.
pub type Result<T> = std::result::Result<T, RdError>;

/// Extension trait for adding context to errors.
pub trait ResultExt<T> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| RdError::Other(format!("{}: {e}", f().into())))
    }
}
