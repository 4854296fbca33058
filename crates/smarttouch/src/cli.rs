//! Clap derive structures for the `smarttouch` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// smarttouch -- control Govee lights and host the touch-panel state engine
#[derive(Debug, Parser)]
#[command(
    name = "smarttouch",
    version,
    about = "Control Govee lights from the command line",
    long_about = "Control Govee lights through the Govee cloud API.\n\n\
        One-shot commands read and change device state. `watch` and `serve`\n\
        run the state-sync engine that keeps touch-panel views consistent\n\
        with the devices.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Govee API key
    #[arg(long, env = "SMARTTOUCH_API_KEY", global = true, hide_env = true)]
    pub api_key: Option<String>,

    /// Govee API base URL (overrides config)
    #[arg(long, env = "SMARTTOUCH_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Config file path
    #[arg(long, env = "SMARTTOUCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SMARTTOUCH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Request timeout in seconds (overrides config)
    #[arg(long, env = "SMARTTOUCH_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List devices and read their live state
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Turn a device on or off
    #[command(alias = "p")]
    Power(PowerArgs),

    /// Set a device's brightness (1-100)
    #[command(alias = "b")]
    Brightness(BrightnessArgs),

    /// Set a device's colour temperature in Kelvin
    #[command(alias = "ct", alias = "kelvin")]
    ColorTemp(ColorTempArgs),

    /// Act on every device at once
    #[command(alias = "a")]
    All(AllArgs),

    /// Run the state engine and print view patches as JSON lines
    Watch(WatchArgs),

    /// Run the state engine over stdin/stdout (JSON lines)
    Serve(ServeArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List discovered devices
    #[command(alias = "ls")]
    List,

    /// Show a device's cached details
    Get {
        /// Device id or name
        device: String,
    },

    /// Read a device's live state from the cloud
    State {
        /// Device id or name
        device: String,
    },
}

// ── Single-device controls ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PowerArg {
    On,
    Off,
    /// Flip the last-known state (unknown turns on)
    Toggle,
}

#[derive(Debug, Args)]
pub struct PowerArgs {
    /// Device id or name
    pub device: String,

    /// Desired power state
    pub state: PowerArg,
}

#[derive(Debug, Args)]
pub struct BrightnessArgs {
    /// Device id or name
    pub device: String,

    /// Brightness percent, 1-100
    #[arg(allow_negative_numbers = true)]
    pub value: i64,
}

#[derive(Debug, Args)]
pub struct ColorTempArgs {
    /// Device id or name
    pub device: String,

    /// Colour temperature in Kelvin
    #[arg(allow_negative_numbers = true)]
    pub kelvin: i64,
}

// ── All devices ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AllArgs {
    #[command(subcommand)]
    pub command: AllCommand,
}

#[derive(Debug, Subcommand)]
pub enum AllCommand {
    /// Turn every device on
    On,

    /// Turn every device off
    Off,

    /// Majority rule: off if most devices are on, otherwise on
    Toggle,

    /// Apply one brightness and colour temperature everywhere
    Set {
        /// Brightness percent (defaults to the current average)
        #[arg(long, allow_negative_numbers = true)]
        brightness: Option<i64>,

        /// Colour temperature in Kelvin (defaults to the current average)
        #[arg(long, allow_negative_numbers = true)]
        kelvin: Option<i64>,
    },
}

// ── Engine hosts ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PresentationArg {
    /// Single overlay panel
    Modal,
    /// Panel expanded inside the list row
    Inline,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Open the control surface for this device (id or name)
    #[arg(long, short = 'd')]
    pub device: Option<String>,

    /// Surface presentation (overrides config)
    #[arg(long)]
    pub presentation: Option<PresentationArg>,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Skip the startup discovery event on stdout
    #[arg(long)]
    pub no_initial: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive setup wizard
    Init,

    /// Display the resolved configuration
    Show,

    /// Set a configuration value
    Set {
        /// Config key (e.g. base_url, timeout, poll_interval, presentation)
        key: String,

        /// New value
        value: String,
    },

    /// Print the config file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
