//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with help text.

use miette::Diagnostic;
use thiserror::Error;

use zmote_config::ConfigError;
use zmote_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const COMMUNICATION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(zmote::configuration),
        help("Inspect the device profile with: zmote config show")
    )]
    Configuration { message: String },

    #[error("No device given")]
    #[diagnostic(
        code(zmote::no_device),
        help(
            "Name a device on the command line, or set default_device with:\n\
             zmote config add <name> --uuid <UUID> --default"
        )
    )]
    NoDevice,

    #[error("Device '{name}' not found in configuration")]
    #[diagnostic(
        code(zmote::device_not_found),
        help(
            "Configured devices: {available}\n\
             Add one with: zmote config add {name} --uuid <UUID>"
        )
    )]
    DeviceNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(zmote::config))]
    Config(Box<ConfigError>),

    // ── Devices ──────────────────────────────────────────────────────

    #[error("Device '{uuid}' was not found on the network")]
    #[diagnostic(
        code(zmote::device_offline),
        help(
            "Check that the device is powered and on this network (zmote discover),\n\
             or set a fixed url in its profile."
        )
    )]
    DeviceOffline { uuid: String },

    #[error("Button '{button}' not found for device '{device}'")]
    #[diagnostic(
        code(zmote::button_not_found),
        help("Run: zmote buttons {device} to see available buttons")
    )]
    ButtonNotFound { button: String, device: String },

    #[error("{message}")]
    #[diagnostic(
        code(zmote::communication),
        help("Check the device URL and that the device is reachable.")
    )]
    Communication { message: String },

    #[error("Discovery failed: {message}")]
    #[diagnostic(
        code(zmote::discovery),
        help("Discovery needs UDP ports 9130/9131 and multicast on the local network.")
    )]
    Discovery { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(zmote::validation))]
    Validation { field: String, reason: String },

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render configuration: {0}")]
    #[diagnostic(code(zmote::toml))]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration { .. } | Self::NoDevice | Self::Config(_) => exit_code::CONFIG,
            Self::DeviceNotFound { .. }
            | Self::DeviceOffline { .. }
            | Self::ButtonNotFound { .. } => exit_code::NOT_FOUND,
            Self::Communication { .. } | Self::Discovery { .. } => exit_code::COMMUNICATION,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Io(_) | Self::Toml(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Discovery { message } => Self::Discovery { message },
            other if other.is_configuration() => Self::Configuration {
                message: other.to_string(),
            },
            other => Self::Communication {
                message: other.to_string(),
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoDevice => Self::NoDevice,
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}
