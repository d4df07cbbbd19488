//! Runtime settings loaded from a YAML or TOML file.
//!
//! The file is optional. When `RDECK_CONFIG` is unset and the default file
//! does not exist, every field takes its default.
//!
//! # Example TOML
//!
//! ```toml
//! storage_path = "~/decks/rdeck.db"
//! reconnect_delay_ms = 5000
//! default_port = 9000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};

use super::path::{default_config_path, default_storage_path, resolve_path};
use crate::connection::ConnectionOptions;
use crate::error::{RdError, Result};
use crate::model::DEFAULT_PORT;
use crate::store::{HttpAgentClient, StoreOptions};

/// Environment variable naming an explicit settings file.
pub const CONFIG_ENV: &str = "RDECK_CONFIG";

/// Settings file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format (.yaml, .yml).
    Yaml,
    /// TOML format (.toml).
    Toml,
}

impl ConfigFormat {
    /// Detect format from file extension.
    #[must_use]
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Database file. Relative paths resolve against the settings file.
    pub storage_path: Option<PathBuf>,
    pub reconnect_delay_ms: u64,
    pub handshake_timeout_ms: u64,
    /// Bound on each migration fetch at startup.
    pub fetch_timeout_ms: u64,
    pub push_timeout_ms: u64,
    pub default_port: u16,
    pub ws_path: String,
    pub config_path: String,

    /// File these settings were read from.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_path: None,
            reconnect_delay_ms: 3000,
            handshake_timeout_ms: 10_000,
            fetch_timeout_ms: 3000,
            push_timeout_ms: 5000,
            default_port: DEFAULT_PORT,
            ws_path: "/ws".to_string(),
            config_path: "/config".to_string(),
            source: None,
        }
    }
}

impl Settings {
    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        let timings = [
            ("reconnect_delay_ms", self.reconnect_delay_ms),
            ("handshake_timeout_ms", self.handshake_timeout_ms),
            ("fetch_timeout_ms", self.fetch_timeout_ms),
            ("push_timeout_ms", self.push_timeout_ms),
        ];
        for (name, value) in timings {
            if value == 0 {
                return Err(RdError::ConfigInvalid(format!("{name} must be greater than 0")));
            }
        }
        if self.default_port == 0 {
            return Err(RdError::ConfigInvalid("default_port must be non-zero".into()));
        }
        for (name, path) in [("ws_path", &self.ws_path), ("config_path", &self.config_path)] {
            if !path.starts_with('/') {
                return Err(RdError::ConfigInvalid(format!("{name} must start with '/': {path}")));
            }
        }
        Ok(())
    }

    /// Resolved database location.
    pub fn storage_path(&self) -> Result<PathBuf> {
        match &self.storage_path {
            Some(path) => {
                let base = self
                    .source
                    .as_deref()
                    .and_then(Path::parent)
                    .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
                resolve_path(path, &base)
            }
            None => default_storage_path(),
        }
    }

    #[must_use]
    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            retry_delay: Duration::from_millis(self.reconnect_delay_ms),
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
            ws_path: self.ws_path.clone(),
        }
    }

    #[must_use]
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            fetch_timeout: Duration::from_millis(self.fetch_timeout_ms),
            default_port: self.default_port,
        }
    }

    #[must_use]
    pub fn agent_client(&self) -> HttpAgentClient {
        HttpAgentClient::new(
            self.config_path.clone(),
            Duration::from_millis(self.fetch_timeout_ms),
            Duration::from_millis(self.push_timeout_ms),
        )
    }
}

/// Load settings from `$RDECK_CONFIG`, else the default location.
///
/// An explicit path that does not exist is an error. A missing default
/// file yields defaults.
pub fn discover_settings() -> Result<Settings> {
    match std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        Some(path) => load_settings(PathBuf::from(path)),
        None => {
            let path = default_config_path()?;
            if path.exists() {
                load_settings(path)
            } else {
                debug!(path = %path.display(), "No settings file, using defaults");
                Ok(Settings::default())
            }
        }
    }
}

/// Load settings from a file. The format comes from the extension.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();

    let format = ConfigFormat::from_extension(path).ok_or_else(|| {
        RdError::ConfigParse(format!(
            "Unknown settings format for '{}': expected .yaml, .yml, or .toml",
            path.display()
        ))
    })?;

    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RdError::ConfigNotFound {
                path: path.display().to_string(),
            }
        } else {
            RdError::Io(e)
        }
    })?;
    debug!(bytes = content.len(), ?format, "Read settings file");

    let mut settings = load_settings_from_str(&content, format)?;
    settings.source = Some(path.to_path_buf());
    info!("Settings loaded");
    Ok(settings)
}

/// Parse and validate settings text.
pub fn load_settings_from_str(content: &str, format: ConfigFormat) -> Result<Settings> {
    trace!(?format, "Parsing settings");
    let settings: Settings = if content.trim().is_empty() {
        Settings::default()
    } else {
        match format {
            ConfigFormat::Yaml => serde_yaml::from_str(content)
                .map_err(|e| RdError::ConfigParse(format!("YAML: {e}")))?,
            ConfigFormat::Toml => {
                toml::from_str(content).map_err(|e| RdError::ConfigParse(format!("TOML: {e}")))?
            }
        }
    };
    settings.validate()?;
    Ok(settings)
}
