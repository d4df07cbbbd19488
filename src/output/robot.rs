//! Robot mode JSON output implementation.

use std::path::Path;

use serde::Serialize;
use tracing::{instrument, trace};

use crate::config::Settings;
use crate::connection::ConnectionSnapshot;
use crate::controller::PressOutcome;
use crate::error::RdError;
use crate::layout::GridUsage;

use super::{DeviceView, GridView, Output, ProfileView, RobotFormat, TemplateView, VersionInfo};

/// JSON output for scripting. Results go to stdout, errors to stderr.
pub struct RobotOutput {
    format: RobotFormat,
}

fn encode<T: Serialize + ?Sized>(data: &T, pretty: bool) -> String {
    let encoded = if pretty {
        serde_json::to_string_pretty(data)
    } else {
        serde_json::to_string(data)
    };
    encoded.unwrap_or_else(|e| {
        serde_json::json!({ "error": true, "message": format!("serialization failed: {e}") })
            .to_string()
    })
}

impl RobotOutput {
    pub const fn new(format: RobotFormat) -> Self {
        Self { format }
    }

    fn output_json<T: Serialize + ?Sized>(&self, data: &T) {
        let json = encode(data, matches!(self.format, RobotFormat::Json));
        trace!(json_len = json.len(), "JSON serialized");
        println!("{json}");
    }

    /// Single-line JSON regardless of format (for streaming events).
    fn output_json_line<T: Serialize + ?Sized>(&self, data: &T) {
        println!("{}", encode(data, false));
    }
}

impl Output for RobotOutput {
    fn success(&self, message: &str, id: Option<&str>) {
        self.output_json(&serde_json::json!({
            "success": true,
            "message": message,
            "id": id,
        }));
    }

    #[instrument(skip(self))]
    fn error(&self, error: &RdError) {
        eprintln!(
            "{}",
            encode(
                &serde_json::json!({
                    "error": true,
                    "message": error.to_string(),
                    "suggestion": error.suggestion(),
                    "recoverable": error.is_user_recoverable(),
                }),
                true
            )
        );
    }

    fn warning(&self, message: &str) {
        eprintln!("{}", encode(&serde_json::json!({ "warning": true, "message": message }), false));
    }

    fn device_list(&self, devices: &[DeviceView]) {
        self.output_json(devices);
    }

    fn profile_list(&self, device: &DeviceView, profiles: &[ProfileView]) {
        self.output_json(&serde_json::json!({
            "device": device,
            "profiles": profiles,
        }));
    }

    fn button_grid(&self, grid: &GridView) {
        self.output_json(grid);
    }

    fn template_list(&self, templates: &[TemplateView]) {
        self.output_json(templates);
    }

    fn press_outcome(&self, outcome: &PressOutcome) {
        self.output_json(outcome);
    }

    fn grid_usage(&self, profile_id: &str, usage: &GridUsage) {
        self.output_json(&serde_json::json!({
            "profile": profile_id,
            "usage": usage,
        }));
    }

    fn connection_event(&self, snapshot: &ConnectionSnapshot) {
        self.output_json_line(snapshot);
    }

    fn settings(&self, settings: &Settings, path: &Path, exists: bool) {
        self.output_json(&serde_json::json!({
            "path": path.display().to_string(),
            "exists": exists,
            "storage_path": settings.storage_path().ok().map(|p| p.display().to_string()),
            "settings": settings,
        }));
    }

    fn version_info(&self, info: &VersionInfo) {
        self.output_json(info);
    }
}
