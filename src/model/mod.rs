//! Device / profile / button data model.
//!
//! A [`Device`] owns its ordered [`Profile`] list, and each profile owns its
//! ordered [`Button`] list. Nothing is shared by reference across devices:
//! every clone is a full deep copy, and [`deep_copy_profiles`] is the
//! explicit entry point used by template application and device duplication.
//!
//! The JSON shape matches what the host agent stores and serves, so these
//! types are used for both local persistence and the agent config endpoint.

pub mod defaults;
pub mod tabs;

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::trace;
use uuid::Uuid;

/// Default agent port.
pub const DEFAULT_PORT: u16 = 8002;

/// Default grid rows/cols for a profile.
pub const DEFAULT_GRID: u32 = 3;

/// Prefix reserved for built-in template ids. Templates carrying it are
/// never written to storage.
pub const BUILTIN_TEMPLATE_PREFIX: &str = "builtin_";

/// Generate a fresh id with a kind prefix (e.g. `btn_3f2a...`).
#[must_use]
pub fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

/// Operating system of a remote host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Mac,
    Windows,
    Linux,
}

impl Os {
    /// OS this binary was built for.
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::Mac
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Linux
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mac => "mac",
            Self::Windows => "windows",
            Self::Linux => "linux",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for Os {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mac" | "macos" | "darwin" => Ok(Self::Mac),
            "windows" | "win" => Ok(Self::Windows),
            "linux" => Ok(Self::Linux),
            other => Err(format!("unknown os '{other}': expected mac, windows or linux")),
        }
    }
}

/// What a button does when pressed.
///
/// Parameter conventions:
/// - `Hotkey`: key tokens pressed together (`["ctrl", "c"]`)
/// - `Press`: a single key name (`["enter"]`)
/// - `Type`: text to type (`["Hello"]`)
/// - `OpenUrl`: a URL
/// - `OpenApp`: an application path or name
/// - `System`: a named system command (`["mute"]`)
///
/// Unrecognized kinds are preserved verbatim in `Other` so a config written
/// by a newer agent survives a round-trip through this client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Hotkey,
    Press,
    Type,
    OpenUrl,
    OpenApp,
    System,
    Other(String),
}

impl ActionKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Hotkey => "hotkey",
            Self::Press => "press",
            Self::Type => "type",
            Self::OpenUrl => "open_url",
            Self::OpenApp => "open_app",
            Self::System => "system",
            Self::Other(s) => s,
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "hotkey" => Self::Hotkey,
            "press" => Self::Press,
            "type" => Self::Type,
            "open_url" => Self::OpenUrl,
            "open_app" => Self::OpenApp,
            "system" => Self::System,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ActionKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActionKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// One actionable grid cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Button {
    pub id: String,
    #[serde(default)]
    pub label: String,
    /// Symbolic icon name, resolved by the UI.
    #[serde(default)]
    pub icon: String,
    pub action: ActionKind,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col_span: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_span: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    /// Display-only empty cell. Never persisted.
    #[serde(skip)]
    pub is_placeholder: bool,
}

impl Button {
    /// Create a button with the given id, label and action.
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        icon: impl Into<String>,
        action: ActionKind,
        params: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            icon: icon.into(),
            action,
            params,
            col_span: None,
            row_span: None,
            background_color: None,
            is_placeholder: false,
        }
    }

    /// The button created when an empty cell is activated.
    #[must_use]
    pub fn new_default() -> Self {
        let mut button = Self::new(
            new_id("btn"),
            "New Btn",
            "square",
            ActionKind::Press,
            Vec::new(),
        );
        button.col_span = Some(1);
        button.row_span = Some(1);
        button
    }

    /// Set the grid span (each clamped to at least 1).
    #[must_use]
    pub fn with_span(mut self, col_span: u32, row_span: u32) -> Self {
        self.col_span = Some(col_span.max(1));
        self.row_span = Some(row_span.max(1));
        self
    }

    /// Effective column span (missing or zero counts as 1).
    #[must_use]
    pub fn col_span(&self) -> u32 {
        self.col_span.unwrap_or(1).max(1)
    }

    /// Effective row span (missing or zero counts as 1).
    #[must_use]
    pub fn row_span(&self) -> u32 {
        self.row_span.unwrap_or(1).max(1)
    }

    /// Number of grid cells this button covers.
    #[must_use]
    pub fn cells(&self) -> u32 {
        self.col_span().saturating_mul(self.row_span())
    }
}

const fn default_grid() -> u32 {
    DEFAULT_GRID
}

/// A named grid of buttons. The first five profiles of a device are its tabs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    #[serde(default = "default_grid")]
    pub rows: u32,
    #[serde(default = "default_grid")]
    pub cols: u32,
    #[serde(default)]
    pub buttons: Vec<Button>,
}

impl Profile {
    pub fn new(id: impl Into<String>, name: impl Into<String>, buttons: Vec<Button>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rows: DEFAULT_GRID,
            cols: DEFAULT_GRID,
            buttons,
        }
    }

    /// A fresh 3x3 profile with one starter button.
    #[must_use]
    pub fn new_default() -> Self {
        let starter = Button::new(new_id("btn"), "Btn 1", "square", ActionKind::Press, Vec::new());
        Self::new(new_id("profile"), "New Profile", vec![starter])
    }

    /// Set the grid shape (each dimension clamped to at least 1).
    #[must_use]
    pub fn with_grid(mut self, rows: u32, cols: u32) -> Self {
        self.rows = rows.max(1);
        self.cols = cols.max(1);
        self
    }

    /// Total grid cells.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.rows.max(1).saturating_mul(self.cols.max(1))
    }

    #[must_use]
    pub fn button(&self, id: &str) -> Option<&Button> {
        self.buttons.iter().find(|b| b.id == id)
    }
}

/// A remote host running the command agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub os: Os,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_color: Option<String>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Device {
    #[must_use]
    pub fn profile(&self, id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    /// `host:port` label for logs.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Frozen snapshot of a profile list used to initialize new devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub os: Os,
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

impl Template {
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        self.id.starts_with(BUILTIN_TEMPLATE_PREFIX)
    }
}

/// Deep-copy a profile list.
///
/// The result owns every profile and button outright; mutating it never
/// affects `source`. Display-only placeholder buttons are dropped.
#[must_use]
pub fn deep_copy_profiles(source: &[Profile]) -> Vec<Profile> {
    trace!(count = source.len(), "Deep-copying profiles");
    source
        .iter()
        .map(|profile| Profile {
            id: profile.id.clone(),
            name: profile.name.clone(),
            rows: profile.rows,
            cols: profile.cols,
            buttons: profile
                .buttons
                .iter()
                .filter(|b| !b.is_placeholder)
                .cloned()
                .collect(),
        })
        .collect()
}
