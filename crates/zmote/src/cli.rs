//! Clap derive structures for the `zmote` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// zmote -- discover and drive zmote infrared blasters
#[derive(Debug, Parser)]
#[command(
    name = "zmote",
    version,
    about = "Discover zmote infrared blasters and send IR codes from the command line",
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
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, env = "ZMOTE_CONFIG", global = true)]
    pub config_file: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "ZMOTE_OUTPUT",
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

    /// Request timeout in seconds (overrides the device profile)
    #[arg(long, env = "ZMOTE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
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
    /// Scan the network for zmote devices
    #[command(alias = "scan")]
    Discover(DiscoverArgs),

    /// Run background discovery and print events until interrupted
    Watch,

    /// Check that a device answers with its UUID
    Check(DeviceArgs),

    /// Send a button of the device's remote
    #[command(alias = "key")]
    SendKey(SendKeyArgs),

    /// Send a raw IR code
    #[command(alias = "code")]
    SendCode(SendCodeArgs),

    /// List the buttons of the device's remote file
    Buttons(DeviceArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Command Arguments ────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// Hard cap on the scan in seconds
    #[arg(long)]
    pub scan_timeout: Option<u64>,

    /// Seconds of silence that end the scan
    #[arg(long)]
    pub receive_timeout: Option<u64>,
}

#[derive(Debug, Args)]
pub struct DeviceArgs {
    /// Device profile name or UUID (defaults to default_device)
    pub device: Option<String>,
}

#[derive(Debug, Args)]
pub struct SendKeyArgs {
    /// Device profile name or UUID
    pub device: String,

    /// Button key as listed by `zmote buttons`
    pub button: String,

    /// Number of times to send
    #[arg(long, short = 'r', default_value = "1")]
    pub repeat: u32,
}

#[derive(Debug, Args)]
pub struct SendCodeArgs {
    /// Device profile name or UUID
    pub device: String,

    /// Raw code, e.g. "38000,1,1,96,24,..."
    pub code: String,

    /// Number of times to send
    #[arg(long, short = 'r', default_value = "1")]
    pub repeat: u32,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the configuration file path
    Path,

    /// Display the resolved configuration
    Show,

    /// Add or replace a device profile
    Add(AddDeviceArgs),
}

#[derive(Debug, Args)]
pub struct AddDeviceArgs {
    /// Profile name
    pub name: String,

    /// Device UUID
    #[arg(long)]
    pub uuid: String,

    /// Fixed device URL (otherwise discovered)
    #[arg(long)]
    pub url: Option<String>,

    /// Remote configuration file (JSON)
    #[arg(long)]
    pub remote_file: Option<PathBuf>,

    /// Remote name
    #[arg(long)]
    pub remote: Option<String>,

    /// Retries while the device is busy
    #[arg(long)]
    pub retry: Option<u32>,

    /// Request timeout in seconds
    #[arg(long = "device-timeout")]
    pub device_timeout: Option<u64>,

    /// Make this the default device
    #[arg(long)]
    pub default: bool,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
