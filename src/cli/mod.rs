//! CLI argument definitions.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::model::Os;
use crate::model::tabs::Direction;

/// Remote deck driver - manage devices and profiles and send commands to
/// host agents from the terminal.
///
/// Robot Mode: Use --robot or --format=json for machine-parseable output.
#[derive(Parser, Debug)]
#[command(name = "rdeck", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (text for humans, json for agents/scripts)
    #[arg(
        long,
        short = 'f',
        default_value = "text",
        global = true,
        env = "RDECK_FORMAT"
    )]
    pub format: OutputFormat,

    /// Robot mode: equivalent to --format=json
    #[arg(long, global = true)]
    pub robot: bool,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (only errors are logged)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Device to operate on (defaults to the first device)
    #[arg(long, short = 'd', global = true, env = "RDECK_DEVICE")]
    pub device: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format selection.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text with optional color
    #[default]
    Text,
    /// Pretty JSON
    Json,
    /// Compact JSON (single line)
    JsonCompact,
}

impl Cli {
    /// Returns true if output should be JSON (robot mode or explicit --format=json).
    pub const fn use_json(&self) -> bool {
        self.robot || matches!(self.format, OutputFormat::Json | OutputFormat::JsonCompact)
    }

    /// Returns true if output should be compact JSON.
    pub const fn use_compact_json(&self) -> bool {
        matches!(self.format, OutputFormat::JsonCompact)
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    // === Devices ===
    /// List configured devices
    Devices,

    /// Add a device
    AddDevice(AddDeviceArgs),

    /// Delete a device
    DeleteDevice(DeleteDeviceArgs),

    // === Profiles ===
    /// List the profiles of a device
    Profiles,

    /// Edit the profiles of a device
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// Show the grid of a profile, including empty cells
    Buttons(ButtonsArgs),

    // === Templates ===
    /// List templates
    Templates,

    /// Save a device's profiles as a template
    SaveTemplate(SaveTemplateArgs),

    // === Agent ===
    /// Press a button (or fill an empty cell)
    Press(PressArgs),

    /// Send a raw command to the agent
    Send(SendArgs),

    /// Stream connection state and telemetry
    Watch(WatchArgs),

    /// Push a device's profiles to its agent
    Sync,

    // === Utilities ===
    /// Show effective settings
    Config(ConfigArgs),

    /// Show version and build information
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// === Argument Structs ===

#[derive(Args, Debug)]
pub struct AddDeviceArgs {
    /// Display name
    pub name: String,

    /// Agent host name or address
    pub host: String,

    /// Agent port (defaults to the configured default port)
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Operating system of the host (defaults to this machine's)
    #[arg(long)]
    pub os: Option<Os>,

    /// Theme color (e.g. "#3b82f6")
    #[arg(long)]
    pub color: Option<String>,

    /// Start with a copy of the current device's profiles
    #[arg(long, conflicts_with = "template")]
    pub clone: bool,

    /// Start with a copy of a template's profiles
    #[arg(long, short = 't')]
    pub template: Option<String>,
}

#[derive(Args, Debug)]
pub struct DeleteDeviceArgs {
    /// Device id
    pub id: String,

    /// Confirm the deletion
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// Append a new profile
    Add {
        /// Profile name
        name: Option<String>,
    },
    /// Remove a profile
    Remove {
        /// Profile id
        id: String,
    },
    /// Rename a profile
    Rename {
        /// Profile id
        id: String,
        /// New name
        name: String,
    },
    /// Move a profile one position up or down
    Move {
        /// Profile id
        id: String,
        /// Direction
        direction: MoveDirection,
    },
    /// Change a profile's grid shape
    Resize {
        /// Profile id
        id: String,
        /// Number of rows
        rows: u32,
        /// Number of columns
        cols: u32,
    },
    /// Move a button into another button's slot
    Reorder {
        /// Button to move
        from: String,
        /// Button whose slot it takes
        to: String,
        /// Profile id (defaults to the first profile)
        #[arg(long)]
        profile: Option<String>,
    },
    /// Edit a button's fields
    ButtonSet(ButtonSetArgs),
    /// Delete a button
    ButtonRemove {
        /// Button id
        id: String,
        /// Profile id (defaults to the first profile)
        #[arg(long)]
        profile: Option<String>,
        /// Confirm the deletion
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

/// Fields left out keep their current value.
#[derive(Args, Debug)]
pub struct ButtonSetArgs {
    /// Button id
    pub id: String,

    /// Profile id (defaults to the first profile)
    #[arg(long)]
    pub profile: Option<String>,

    /// Button label
    #[arg(long)]
    pub label: Option<String>,

    /// Symbolic icon name
    #[arg(long)]
    pub icon: Option<String>,

    /// Action kind (hotkey, press, type, open_url, open_app, system)
    #[arg(long)]
    pub action: Option<String>,

    /// Action parameters; pass the flag alone to clear them
    #[arg(long, num_args = 0..)]
    pub params: Option<Vec<String>>,

    /// Columns covered
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub col_span: Option<u32>,

    /// Rows covered
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub row_span: Option<u32>,

    /// Background color; an empty value clears it
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MoveDirection {
    Up,
    Down,
}

impl From<MoveDirection> for Direction {
    fn from(value: MoveDirection) -> Self {
        match value {
            MoveDirection::Up => Self::Up,
            MoveDirection::Down => Self::Down,
        }
    }
}

#[derive(Args, Debug)]
pub struct ButtonsArgs {
    /// Profile id (defaults to the first profile)
    #[arg(long)]
    pub profile: Option<String>,
}

#[derive(Args, Debug)]
pub struct SaveTemplateArgs {
    /// Template name
    pub name: String,
}

#[derive(Args, Debug)]
pub struct PressArgs {
    /// Button id (or a placeholder id from `rdeck buttons`)
    pub button: String,

    /// Profile id (defaults to the first profile)
    #[arg(long)]
    pub profile: Option<String>,

    /// Seconds to wait for the connection
    #[arg(long, short = 't', default_value = "5")]
    pub timeout: u64,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Action name (e.g. hotkey, type, open_url)
    pub action: String,

    /// Action parameters, sent verbatim
    pub params: Vec<String>,

    /// Seconds to wait for the connection
    #[arg(long, short = 't', default_value = "5")]
    pub timeout: u64,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Exit after the first telemetry update
    #[arg(long)]
    pub once: bool,

    /// Timeout in seconds (0 = no timeout)
    #[arg(long, short = 't', default_value = "0")]
    pub timeout: u64,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Only print the settings file path
    #[arg(long)]
    pub path: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
