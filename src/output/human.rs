//! Human-friendly output styled with `console`.

use std::path::Path;

use console::{Style, style};

use crate::config::Settings;
use crate::connection::{ConnectionSnapshot, ConnectionState};
use crate::controller::PressOutcome;
use crate::error::RdError;
use crate::layout::GridUsage;

use super::{DeviceView, GridView, Output, ProfileView, TemplateView, VersionInfo};

/// Styled terminal output for human users.
pub struct HumanOutput {
    accent: Style,
    muted: Style,
}

impl HumanOutput {
    /// Colors are disabled globally through `console` when `color` is false.
    pub fn new(color: bool) -> Self {
        if !color {
            console::set_colors_enabled(false);
            console::set_colors_enabled_stderr(false);
        }
        Self {
            accent: Style::new().cyan().bold(),
            muted: Style::new().dim(),
        }
    }

    fn usage_line(usage: &GridUsage) -> String {
        let text = format!("{}/{} cells", usage.used, usage.total);
        if usage.overflow {
            format!("{} {}", style(text).red(), style("(overflow)").red().bold())
        } else {
            text
        }
    }

    fn marker(active: bool) -> String {
        if active {
            style("*").green().bold().to_string()
        } else {
            " ".to_string()
        }
    }
}

impl Output for HumanOutput {
    fn success(&self, message: &str, id: Option<&str>) {
        match id {
            Some(id) => println!("{} {message} {}", style("[OK]").green().bold(), self.muted.apply_to(id)),
            None => println!("{} {message}", style("[OK]").green().bold()),
        }
    }

    fn error(&self, error: &RdError) {
        eprintln!("{}: {error}", style("Error").red().bold());
        if let Some(suggestion) = error.suggestion() {
            eprintln!("{}: {suggestion}", style("Hint").yellow());
        }
    }

    fn warning(&self, message: &str) {
        eprintln!("{}: {message}", style("Warning").yellow().bold());
    }

    fn device_list(&self, devices: &[DeviceView]) {
        if devices.is_empty() {
            println!("No devices. Add one with: rdeck add-device <NAME> <HOST>");
            return;
        }
        for device in devices {
            println!(
                "{} {:<24} {:<21} {:<8} {} profiles  {}",
                Self::marker(device.active),
                self.accent.apply_to(&device.name),
                device.endpoint,
                device.os,
                device.profiles,
                self.muted.apply_to(&device.id),
            );
        }
    }

    fn profile_list(&self, device: &DeviceView, profiles: &[ProfileView]) {
        println!("{} {}", self.accent.apply_to(&device.name), self.muted.apply_to(&device.id));
        if profiles.is_empty() {
            println!("  No profiles. Add one with: rdeck profile add");
            return;
        }
        let mut stored_header = false;
        for profile in profiles {
            if !profile.tab && !stored_header {
                println!("  {}", self.muted.apply_to("Stored (not shown as tabs):"));
                stored_header = true;
            }
            println!(
                "{} {:<20} {}x{}  {}  {}",
                Self::marker(profile.active),
                profile.name,
                profile.rows,
                profile.cols,
                Self::usage_line(&profile.usage),
                self.muted.apply_to(&profile.id),
            );
        }
    }

    fn button_grid(&self, grid: &GridView) {
        println!(
            "{} {}x{}  {}",
            self.accent.apply_to(&grid.name),
            grid.rows,
            grid.cols,
            Self::usage_line(&grid.usage)
        );
        for cell in &grid.cells {
            if cell.placeholder {
                println!("  {:<16} {}", self.muted.apply_to("+ (empty)"), self.muted.apply_to(&cell.id));
                continue;
            }
            let span = if cell.col_span > 1 || cell.row_span > 1 {
                format!(" [{}x{}]", cell.col_span, cell.row_span)
            } else {
                String::new()
            };
            println!(
                "  {:<16} {} {}{span}  {}",
                cell.label,
                cell.action,
                cell.params.join(" "),
                self.muted.apply_to(&cell.id),
            );
        }
    }

    fn template_list(&self, templates: &[TemplateView]) {
        for template in templates {
            let kind = if template.builtin { "built-in" } else { "user" };
            println!(
                "  {:<24} {:<8} {:<8} {} profiles  {}",
                self.accent.apply_to(&template.name),
                template.os,
                kind,
                template.profiles,
                self.muted.apply_to(&template.id),
            );
        }
    }

    fn press_outcome(&self, outcome: &PressOutcome) {
        match outcome {
            PressOutcome::Added { button_id } => {
                self.success("Added a new button", Some(button_id));
            }
            PressOutcome::Sent { action, params } => {
                self.success(&format!("Sent {action} {}", params.join(" ")), None);
            }
            PressOutcome::Dropped { action } => {
                self.warning(&format!("Not connected, {action} was not sent"));
            }
        }
    }

    fn grid_usage(&self, profile_id: &str, usage: &GridUsage) {
        self.success(&format!("Grid updated: {}", Self::usage_line(usage)), Some(profile_id));
        if usage.overflow {
            self.warning("Buttons need more cells than the grid has; remove buttons or enlarge the grid");
        }
    }

    fn connection_event(&self, snapshot: &ConnectionSnapshot) {
        let target = snapshot
            .target
            .as_ref()
            .map_or_else(|| "-".to_string(), ToString::to_string);
        let state = match snapshot.state {
            ConnectionState::Connected => style("connected").green(),
            ConnectionState::Connecting => style("connecting").yellow(),
            ConnectionState::Disconnected if snapshot.retry_pending => style("retrying").yellow(),
            ConnectionState::Disconnected => style("disconnected").red(),
        };
        match snapshot.telemetry {
            Some(t) => println!(
                "{target:<21} {state:<12} cpu {:>5.1}%  mem {:>5.1}%  disk {:>5.1}%",
                t.cpu, t.memory, t.disk
            ),
            None => println!("{target:<21} {state}"),
        }
    }

    fn settings(&self, settings: &Settings, path: &Path, exists: bool) {
        let origin = if exists { "" } else { " (not found, using defaults)" };
        println!("{} {}{origin}", self.accent.apply_to("Settings:"), path.display());
        match settings.storage_path() {
            Ok(storage) => println!("  storage_path         {}", storage.display()),
            Err(e) => println!("  storage_path         {}", style(e).red()),
        }
        println!("  reconnect_delay_ms   {}", settings.reconnect_delay_ms);
        println!("  handshake_timeout_ms {}", settings.handshake_timeout_ms);
        println!("  fetch_timeout_ms     {}", settings.fetch_timeout_ms);
        println!("  push_timeout_ms      {}", settings.push_timeout_ms);
        println!("  default_port         {}", settings.default_port);
        println!("  ws_path              {}", settings.ws_path);
        println!("  config_path          {}", settings.config_path);
    }

    fn version_info(&self, info: &VersionInfo) {
        println!("rdeck {}", info.version);
        println!("git: {}{}", info.git_sha, if info.git_dirty { " (dirty)" } else { "" });
        println!("built: {}", info.build_timestamp);
        println!("rustc: {}", info.rustc_version);
        println!("target: {}", info.target);
    }
}
