//! Remote deck driver - headless access to devices, profiles and agents.
//!
//! Provides both human-friendly and agent-friendly (robot mode) interfaces.
#![forbid(unsafe_code)]

use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use rdeck::cli::{self, Cli, Commands, ProfileCommand};
use rdeck::config::{self, CONFIG_ENV, Settings};
use rdeck::connection::{ConnectionManager, ConnectionState, WsConnector};
use rdeck::controller::{AppController, PressOutcome};
use rdeck::error::{RdError, Result};
use rdeck::logging;
use rdeck::model::{ActionKind, Device, Os};
use rdeck::output::{
    DeviceView, GridView, Output, OutputMode, ProfileView, TemplateView, VersionInfo,
};
use rdeck::store::{MemoryKv, NewDevice, ProfileSource, ProfileStore, SqliteKv};

type App = AppController<WsConnector>;

/// Build information embedded at compile time.
mod build_info {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    pub fn git_sha() -> &'static str {
        option_env!("VERGEN_GIT_SHA").unwrap_or("unknown")
    }

    pub fn git_dirty() -> bool {
        option_env!("VERGEN_GIT_DIRTY") == Some("true")
    }

    pub fn build_timestamp() -> &'static str {
        option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown")
    }

    pub fn rustc_semver() -> &'static str {
        option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown")
    }

    pub fn target() -> &'static str {
        option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown")
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.use_json(), cli.verbose, cli.quiet);

    if !io::stdout().is_terminal() {
        console::set_colors_enabled(false);
    }
    let output = OutputMode::from_cli(&cli).into_output();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    if let Err(e) = runtime.block_on(run(&cli, output.as_ref())) {
        output.error(&e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: &Cli, out: &dyn Output) -> Result<()> {
    let command = match &cli.command {
        None => {
            print_quick_start(cli);
            return Ok(());
        }
        Some(Commands::Version) => {
            cmd_version(out);
            return Ok(());
        }
        Some(Commands::Completions(args)) => {
            cmd_completions(args);
            return Ok(());
        }
        Some(Commands::Config(args)) => return cmd_config(out, args),
        Some(command) => command,
    };

    let settings = config::discover_settings()?;
    let mut app = open_app(&settings)?;
    let result = dispatch(cli, out, &mut app, command).await;
    app.shutdown(Duration::from_millis(settings.push_timeout_ms)).await;
    result
}

async fn dispatch(cli: &Cli, out: &dyn Output, app: &mut App, command: &Commands) -> Result<()> {
    app.load().await;
    if let Some(id) = &cli.device {
        app.select_device(id)?;
    }

    match command {
        Commands::Devices => cmd_devices(out, app),
        Commands::AddDevice(args) => cmd_add_device(out, app, args),
        Commands::DeleteDevice(args) => cmd_delete_device(out, app, args),
        Commands::Profiles => cmd_profiles(out, app),
        Commands::Profile(command) => cmd_profile(out, app, command),
        Commands::Buttons(args) => cmd_buttons(out, app, args),
        Commands::Templates => cmd_templates(out, app),
        Commands::SaveTemplate(args) => cmd_save_template(out, app, args),
        Commands::Press(args) => cmd_press(out, app, args).await,
        Commands::Send(args) => cmd_send(out, app, args).await,
        Commands::Watch(args) => cmd_watch(out, app, args).await,
        Commands::Sync => cmd_sync(out, app).await,
        Commands::Config(_) | Commands::Version | Commands::Completions(_) => Ok(()),
    }
}

/// Open storage and wire the store and connection together. An unusable
/// database degrades to in-memory state for this run.
fn open_app(settings: &Settings) -> Result<App> {
    let agent = Arc::new(settings.agent_client());
    let path = settings.storage_path()?;
    let store = match SqliteKv::open(&path) {
        Ok(kv) => ProfileStore::new(kv, agent, settings.store_options()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Storage unavailable, changes will not be saved");
            ProfileStore::new(MemoryKv::new(), agent, settings.store_options())
        }
    };
    let connection = ConnectionManager::new(
        WsConnector::new(settings.ws_path.clone()),
        Handle::current(),
        settings.connection_options(),
    );
    Ok(AppController::new(store, connection))
}

fn active_device(app: &App) -> Result<&Device> {
    app.store().active_device().ok_or(RdError::NoActiveDevice)
}

// === Quick Start ===

#[derive(Serialize)]
struct RobotQuickStart {
    tool: &'static str,
    version: &'static str,
    description: &'static str,
    commands: Vec<(&'static str, &'static str)>,
    output_modes: &'static str,
    device_selection: &'static str,
}

const QUICK_START: &[(&str, &str)] = &[
    ("devices", "rdeck devices"),
    ("add_device", "rdeck add-device <NAME> <HOST> [--template <ID> | --clone]"),
    ("profiles", "rdeck profiles"),
    ("grid", "rdeck buttons [--profile <ID>]"),
    ("edit_button", "rdeck profile button-set <BUTTON_ID> --label <TEXT> --params <ARGS>..."),
    ("press", "rdeck press <BUTTON_ID>"),
    ("send", "rdeck send hotkey ctrl c"),
    ("telemetry", "rdeck watch"),
    ("sync", "rdeck sync"),
];

fn print_quick_start(cli: &Cli) {
    if cli.use_json() {
        let help = RobotQuickStart {
            tool: "rdeck",
            version: build_info::VERSION,
            description: "Headless driver for remote deck devices and their agents",
            commands: QUICK_START.to_vec(),
            output_modes: "--format=text (default), --robot or --format=json, --format=json-compact",
            device_selection: "--device <ID> or RDECK_DEVICE (defaults to the first device)",
        };
        match serde_json::to_string_pretty(&help) {
            Ok(json) => println!("{json}"),
            Err(e) => debug!(error = %e, "Failed to encode quick start"),
        }
    } else {
        println!("{} {}\n", console::style("rdeck").bold().cyan(), build_info::VERSION);
        for (name, usage) in QUICK_START {
            println!("  {:<12} {usage}", console::style(name).bold());
        }
        println!("\nRun 'rdeck --help' for all commands.");
    }
}

// === Devices ===

fn cmd_devices(out: &dyn Output, app: &App) -> Result<()> {
    let active = app.store().selection().device_id.clone();
    let views: Vec<DeviceView> = app
        .store()
        .devices()
        .iter()
        .map(|d| DeviceView::new(d, active.as_deref() == Some(d.id.as_str())))
        .collect();
    out.device_list(&views);
    Ok(())
}

fn cmd_add_device(out: &dyn Output, app: &mut App, args: &cli::AddDeviceArgs) -> Result<()> {
    let source = match (&args.template, args.clone) {
        (Some(id), _) => ProfileSource::Template(id.clone()),
        (None, true) => ProfileSource::CloneActive,
        (None, false) => ProfileSource::Empty,
    };
    let new = NewDevice {
        name: args.name.clone(),
        host: args.host.clone(),
        port: args.port,
        os: args.os.unwrap_or_else(Os::current),
        theme_color: args.color.clone(),
    };
    let id = app.add_device(new, source)?;
    out.success(&format!("Added device {}", args.name.trim()), Some(&id));
    Ok(())
}

fn cmd_delete_device(out: &dyn Output, app: &mut App, args: &cli::DeleteDeviceArgs) -> Result<()> {
    if !args.yes {
        return Err(RdError::InvalidInput(format!(
            "Deleting {} cannot be undone; pass --yes to confirm",
            args.id
        )));
    }
    app.delete_device(&args.id)?;
    out.success("Deleted device", Some(&args.id));
    Ok(())
}

// === Profiles ===

fn cmd_profiles(out: &dyn Output, app: &App) -> Result<()> {
    let device = active_device(app)?;
    let active = app.store().selection().profile_id.as_deref();
    out.profile_list(&DeviceView::new(device, true), &ProfileView::list(device, active));
    Ok(())
}

fn cmd_profile(out: &dyn Output, app: &mut App, command: &ProfileCommand) -> Result<()> {
    match command {
        ProfileCommand::Add { name } => {
            let id = app.add_profile(name.as_deref())?;
            out.success("Added profile", Some(&id));
        }
        ProfileCommand::Remove { id } => {
            app.remove_profile(id)?;
            out.success("Removed profile", Some(id));
        }
        ProfileCommand::Rename { id, name } => {
            app.rename_profile(id, name)?;
            out.success(&format!("Renamed profile to {}", name.trim()), Some(id));
        }
        ProfileCommand::Move { id, direction } => {
            app.move_profile(id, (*direction).into())?;
            out.success("Moved profile", Some(id));
        }
        ProfileCommand::Resize { id, rows, cols } => {
            let usage = app.resize_grid(id, *rows, *cols)?;
            out.grid_usage(id, &usage);
        }
        ProfileCommand::Reorder { from, to, profile } => {
            if let Some(profile) = profile {
                app.select_profile(profile)?;
            }
            app.reorder_buttons(from, to)?;
            out.success(&format!("Moved {from} to the slot of {to}"), None);
        }
        ProfileCommand::ButtonSet(args) => cmd_button_set(out, app, args)?,
        ProfileCommand::ButtonRemove { id, profile, yes } => {
            if !yes {
                return Err(RdError::InvalidInput(format!(
                    "Deleting button {id} cannot be undone; pass --yes to confirm"
                )));
            }
            if let Some(profile) = profile {
                app.select_profile(profile)?;
            }
            app.remove_button(id)?;
            out.success("Removed button", Some(id));
        }
    }
    Ok(())
}

fn cmd_button_set(out: &dyn Output, app: &mut App, args: &cli::ButtonSetArgs) -> Result<()> {
    if let Some(profile) = &args.profile {
        app.select_profile(profile)?;
    }
    let mut button = app
        .store()
        .active_profile()
        .and_then(|p| p.button(&args.id))
        .cloned()
        .ok_or_else(|| RdError::ButtonNotFound { id: args.id.clone() })?;

    if let Some(label) = &args.label {
        button.label.clone_from(label);
    }
    if let Some(icon) = &args.icon {
        button.icon.clone_from(icon);
    }
    if let Some(action) = &args.action {
        button.action = ActionKind::parse(action);
    }
    if let Some(params) = &args.params {
        button.params.clone_from(params);
    }
    if args.col_span.is_some() || args.row_span.is_some() {
        let (cols, rows) = (button.col_span(), button.row_span());
        button = button.with_span(args.col_span.unwrap_or(cols), args.row_span.unwrap_or(rows));
    }
    if let Some(color) = &args.color {
        button.background_color = Some(color.trim().to_string()).filter(|c| !c.is_empty());
    }

    let usage = app.update_button(button)?;
    if usage.overflow {
        out.warning(&format!(
            "Buttons need {} cells but the grid has {}",
            usage.used, usage.total
        ));
    }
    out.success("Updated button", Some(&args.id));
    Ok(())
}

fn cmd_buttons(out: &dyn Output, app: &mut App, args: &cli::ButtonsArgs) -> Result<()> {
    if let Some(profile) = &args.profile {
        app.select_profile(profile)?;
    }
    let cells = app.display_buttons();
    let profile = app
        .store()
        .active_profile()
        .ok_or_else(|| RdError::InvalidInput("Device has no profiles".into()))?;
    out.button_grid(&GridView::new(profile, &cells));
    Ok(())
}

// === Templates ===

fn cmd_templates(out: &dyn Output, app: &App) -> Result<()> {
    let views: Vec<TemplateView> = app.store().templates().iter().map(TemplateView::from).collect();
    out.template_list(&views);
    Ok(())
}

fn cmd_save_template(out: &dyn Output, app: &mut App, args: &cli::SaveTemplateArgs) -> Result<()> {
    let device_id = active_device(app)?.id.clone();
    let id = app.save_as_template(&device_id, &args.name)?;
    out.success(&format!("Saved template {}", args.name.trim()), Some(&id));
    Ok(())
}

// === Agent ===

/// Connect to the active device and wait for the link, failing with
/// `NotConnected` after `timeout_secs`.
async fn connect_and_wait(app: &mut App, timeout_secs: u64) -> Result<()> {
    app.connect();
    if app.connection().wait_connected(Duration::from_secs(timeout_secs)).await {
        return Ok(());
    }
    let target = app
        .connection()
        .target()
        .map_or_else(|| "-".to_string(), |t| t.to_string());
    Err(RdError::NotConnected { target })
}

async fn cmd_press(out: &dyn Output, app: &mut App, args: &cli::PressArgs) -> Result<()> {
    if let Some(profile) = &args.profile {
        app.select_profile(profile)?;
    }
    let needs_link = app
        .display_buttons()
        .iter()
        .any(|b| b.id == args.button && !b.is_placeholder);
    if needs_link {
        connect_and_wait(app, args.timeout).await?;
    }

    let outcome = app.press(&args.button)?;
    if let PressOutcome::Dropped { .. } = outcome {
        let target = app.snapshot().target.map_or_else(|| "-".to_string(), |t| t.to_string());
        return Err(RdError::NotConnected { target });
    }
    out.press_outcome(&outcome);
    Ok(())
}

async fn cmd_send(out: &dyn Output, app: &mut App, args: &cli::SendArgs) -> Result<()> {
    connect_and_wait(app, args.timeout).await?;
    if !app.send_raw(&args.action, args.params.clone()) {
        let target = app.snapshot().target.map_or_else(|| "-".to_string(), |t| t.to_string());
        return Err(RdError::NotConnected { target });
    }
    out.press_outcome(&PressOutcome::Sent {
        action: args.action.clone(),
        params: args.params.clone(),
    });
    Ok(())
}

async fn cmd_watch(out: &dyn Output, app: &mut App, args: &cli::WatchArgs) -> Result<()> {
    app.connect();
    let mut rx = app.connection().subscribe();
    let deadline = (args.timeout > 0).then(|| tokio::time::Instant::now() + Duration::from_secs(args.timeout));

    loop {
        let snapshot = rx.borrow_and_update().clone();
        out.connection_event(&snapshot);
        if args.once && snapshot.state == ConnectionState::Connected && snapshot.telemetry.is_some() {
            return Ok(());
        }

        let timeout = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted");
                return Ok(());
            }
            () = timeout => {
                debug!("Watch timeout reached");
                return Ok(());
            }
        }
    }
}

async fn cmd_sync(out: &dyn Output, app: &App) -> Result<()> {
    let device = active_device(app)?;
    app.store().sync_device(&device.id).await?;
    out.success(&format!("Synced {} profiles", device.profiles.len()), Some(&device.id));
    Ok(())
}

// === Utilities ===

fn cmd_config(out: &dyn Output, args: &cli::ConfigArgs) -> Result<()> {
    let path = match std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        Some(path) => path.into(),
        None => config::default_config_path()?,
    };
    if args.path {
        println!("{}", path.display());
        return Ok(());
    }
    let settings = config::discover_settings()?;
    out.settings(&settings, &path, path.exists());
    Ok(())
}

fn cmd_version(out: &dyn Output) {
    out.version_info(&VersionInfo {
        version: build_info::VERSION,
        git_sha: build_info::git_sha(),
        git_dirty: build_info::git_dirty(),
        build_timestamp: build_info::build_timestamp(),
        rustc_version: build_info::rustc_semver(),
        target: build_info::target(),
    });
}

fn cmd_completions(args: &cli::CompletionsArgs) {
    use clap::CommandFactory;
    clap_complete::generate(args.shell, &mut Cli::command(), "rdeck", &mut io::stdout());
}
