//! Shared helpers for command handlers.

use std::path::PathBuf;
use std::time::Duration;

use zmote_api::TransportConfig;
use zmote_config::{Config, ConfigError};
use zmote_core::{DiscoveryRegistry, TransmitService, ZmoteConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Config file selected by `--config-file`, or the platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config_file
        .clone()
        .unwrap_or_else(zmote_config::config_path)
}

/// Load the configuration file merged with `ZMOTE__*` overrides.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(zmote_config::load_config_from(&config_file(global))?)
}

/// A device profile turned into a `ZmoteConfig`, with `--timeout` applied.
pub struct ResolvedDevice {
    pub name: String,
    pub config: ZmoteConfig,
}

/// Resolve `name` (profile name or UUID, default device when `None`).
pub fn resolve_device(
    cfg: &Config,
    name: Option<&str>,
    global: &GlobalOpts,
) -> Result<ResolvedDevice, CliError> {
    let (key, profile) = cfg.device(name).map_err(|e| match e {
        ConfigError::UnknownDevice { name } => CliError::DeviceNotFound {
            name,
            available: available_devices(cfg),
        },
        other => other.into(),
    })?;

    let mut config = zmote_config::profile_to_zmote_config(profile, &cfg.defaults)?;
    if let Some(timeout) = global.timeout {
        config = config.with_timeout_secs(timeout);
    }

    Ok(ResolvedDevice {
        name: key.to_owned(),
        config,
    })
}

fn available_devices(cfg: &Config) -> String {
    if cfg.devices.is_empty() {
        "(none)".into()
    } else {
        cfg.devices.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Fill in the device URL from discovery when the profile has no fixed one.
pub async fn locate(cfg: &Config, config: ZmoteConfig) -> Result<ZmoteConfig, CliError> {
    if config.url().is_some() {
        return Ok(config);
    }

    tracing::info!(uuid = %config.uuid, "no fixed url, scanning for device");
    let registry = DiscoveryRegistry::new(cfg.discovery_config());
    registry.scan().await?;

    match registry.get_device(&config.uuid) {
        Some(device) => Ok(config.with_discovered(&device)),
        None => Err(CliError::DeviceOffline { uuid: config.uuid }),
    }
}

/// Transmit service whose HTTP clients honor the device timeout.
pub fn transmit_service(config: &ZmoteConfig) -> TransmitService {
    let transport = TransportConfig::default().with_timeout(config.timeout());
    TransmitService::new(transport)
}

/// Seconds from a CLI flag, or the configured value.
pub fn secs_or(flag: Option<u64>, configured: Duration) -> Duration {
    flag.map_or(configured, Duration::from_secs)
}
