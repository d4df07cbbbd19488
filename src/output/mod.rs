//! Output mode abstraction for robot and human output.

use std::path::Path;

use serde::Serialize;

use crate::cli::Cli;
use crate::config::Settings;
use crate::connection::ConnectionSnapshot;
use crate::controller::PressOutcome;
use crate::error::RdError;
use crate::layout::GridUsage;
use crate::model::tabs;
use crate::model::{Button, Device, Os, Profile, Template};

pub mod human;
pub mod robot;

pub use human::HumanOutput;
pub use robot::RobotOutput;

// === Views ===

/// One device as listed by `rdeck devices`.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceView {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    /// `host:port`.
    pub endpoint: String,
    pub os: Os,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_color: Option<String>,
    pub profiles: usize,
    pub active: bool,
}

impl DeviceView {
    #[must_use]
    pub fn new(device: &Device, active: bool) -> Self {
        Self {
            id: device.id.clone(),
            name: device.name.clone(),
            host: device.host.clone(),
            port: device.port,
            endpoint: device.endpoint(),
            os: device.os,
            theme_color: device.theme_color.clone(),
            profiles: device.profiles.len(),
            active,
        }
    }
}

/// One profile as listed by `rdeck profiles`.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub id: String,
    pub name: String,
    pub rows: u32,
    pub cols: u32,
    pub buttons: usize,
    pub usage: GridUsage,
    /// Among the first profiles shown as tabs.
    pub tab: bool,
    pub active: bool,
}

impl ProfileView {
    #[must_use]
    pub fn list(device: &Device, active: Option<&str>) -> Vec<Self> {
        let is_active = |p: &Profile| active == Some(p.id.as_str());
        let shown = tabs::active_tabs(&device.profiles)
            .iter()
            .map(|p| Self::new(p, true, is_active(p)));
        let stored = tabs::stored_profiles(&device.profiles)
            .iter()
            .map(|p| Self::new(p, false, is_active(p)));
        shown.chain(stored).collect()
    }

    #[must_use]
    pub fn new(profile: &Profile, tab: bool, active: bool) -> Self {
        Self {
            id: profile.id.clone(),
            name: profile.name.clone(),
            rows: profile.rows,
            cols: profile.cols,
            buttons: profile.buttons.len(),
            usage: GridUsage::of(&profile.buttons, profile.rows, profile.cols),
            tab,
            active,
        }
    }
}

/// One grid cell as shown by `rdeck buttons`.
#[derive(Debug, Clone, Serialize)]
pub struct CellView {
    pub id: String,
    pub label: String,
    pub icon: String,
    pub action: String,
    pub params: Vec<String>,
    pub col_span: u32,
    pub row_span: u32,
    pub placeholder: bool,
}

impl From<&Button> for CellView {
    fn from(button: &Button) -> Self {
        Self {
            id: button.id.clone(),
            label: button.label.clone(),
            icon: button.icon.clone(),
            action: button.action.as_str().to_string(),
            params: button.params.clone(),
            col_span: button.col_span(),
            row_span: button.row_span(),
            placeholder: button.is_placeholder,
        }
    }
}

/// A profile's grid with empty cells filled in.
#[derive(Debug, Clone, Serialize)]
pub struct GridView {
    pub profile: String,
    pub name: String,
    pub rows: u32,
    pub cols: u32,
    pub usage: GridUsage,
    pub cells: Vec<CellView>,
}

impl GridView {
    #[must_use]
    pub fn new(profile: &Profile, cells: &[Button]) -> Self {
        Self {
            profile: profile.id.clone(),
            name: profile.name.clone(),
            rows: profile.rows,
            cols: profile.cols,
            usage: GridUsage::of(&profile.buttons, profile.rows, profile.cols),
            cells: cells.iter().map(CellView::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateView {
    pub id: String,
    pub name: String,
    pub os: Os,
    pub profiles: usize,
    pub builtin: bool,
}

impl From<&Template> for TemplateView {
    fn from(template: &Template) -> Self {
        Self {
            id: template.id.clone(),
            name: template.name.clone(),
            os: template.os,
            profiles: template.profiles.len(),
            builtin: template.is_builtin(),
        }
    }
}

/// Build metadata for `rdeck version`.
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    pub version: &'static str,
    pub git_sha: &'static str,
    pub git_dirty: bool,
    pub build_timestamp: &'static str,
    pub rustc_version: &'static str,
    pub target: &'static str,
}

/// JSON formatting options for robot mode.
#[derive(Debug, Clone, Copy)]
pub enum RobotFormat {
    /// Pretty-printed JSON (default for --robot).
    Json,
    /// Single-line JSON (--format=json-compact).
    JsonCompact,
}

/// Determines how command output is rendered.
#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    /// JSON output for scripting.
    Robot(RobotFormat),
    /// Styled terminal output for human users.
    Human { color: bool },
}

impl OutputMode {
    /// Create OutputMode from CLI arguments.
    #[must_use]
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.use_json() {
            let format = if cli.use_compact_json() {
                RobotFormat::JsonCompact
            } else {
                RobotFormat::Json
            };
            Self::Robot(format)
        } else {
            Self::Human { color: !cli.no_color }
        }
    }

    /// Returns true if output should be JSON.
    #[must_use]
    pub const fn is_robot(&self) -> bool {
        matches!(self, Self::Robot(_))
    }

    /// Convert into the appropriate Output implementation.
    #[must_use]
    pub fn into_output(self) -> Box<dyn Output> {
        match self {
            Self::Robot(format) => Box::new(RobotOutput::new(format)),
            Self::Human { color } => Box::new(HumanOutput::new(color)),
        }
    }
}

/// Trait for all output operations.
///
/// Commands call these methods without knowing the output mode.
pub trait Output {
    // Basic messages
    fn success(&self, message: &str, id: Option<&str>);
    fn error(&self, error: &RdError);
    fn warning(&self, message: &str);

    // Listings
    fn device_list(&self, devices: &[DeviceView]);
    fn profile_list(&self, device: &DeviceView, profiles: &[ProfileView]);
    fn button_grid(&self, grid: &GridView);
    fn template_list(&self, templates: &[TemplateView]);

    // Agent interaction
    fn press_outcome(&self, outcome: &PressOutcome);
    fn grid_usage(&self, profile_id: &str, usage: &GridUsage);
    /// One line per change while watching.
    fn connection_event(&self, snapshot: &ConnectionSnapshot);

    // Metadata
    fn settings(&self, settings: &Settings, path: &Path, exists: bool);
    fn version_info(&self, info: &VersionInfo);
}
