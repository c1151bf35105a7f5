//! Configuration for the zmote CLI.
//!
//! TOML device profiles merged from defaults, the config file and
//! `ZMOTE__*` environment variables, and their translation into
//! `zmote_core::ZmoteConfig` / `DiscoveryConfig`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use zmote_core::{DEFAULT_RETRY, DEFAULT_TIMEOUT_SECS, DiscoveryConfig, ZmoteConfig};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no device named '{name}' in the configuration")]
    UnknownDevice { name: String },

    #[error("no device given and no default_device configured")]
    NoDevice,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Device used when a command names none.
    pub default_device: Option<String>,

    /// Global defaults for every device.
    #[serde(default)]
    pub defaults: Defaults,

    /// Discovery timing.
    #[serde(default)]
    pub discovery: DiscoverySettings,

    /// Named device profiles.
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceProfile>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Retries while a device reports busy.
    #[serde(default = "default_retry")]
    pub retry: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            retry: default_retry(),
        }
    }
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_retry() -> u32 {
    DEFAULT_RETRY
}

/// Discovery timing, all in seconds.
#[derive(Debug, Deserialize, Serialize)]
pub struct DiscoverySettings {
    /// Silence that ends an active scan.
    #[serde(default = "default_receive_timeout")]
    pub receive_timeout: u64,

    /// Hard cap on one active scan.
    #[serde(default = "default_scan_timeout")]
    pub scan_timeout: u64,

    /// Interval between background cycles.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            receive_timeout: default_receive_timeout(),
            scan_timeout: default_scan_timeout(),
            refresh_interval: default_refresh_interval(),
        }
    }
}

fn default_receive_timeout() -> u64 {
    10
}
fn default_scan_timeout() -> u64 {
    30
}
fn default_refresh_interval() -> u64 {
    60
}

/// A named zmote device.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeviceProfile {
    /// Device UUID as announced during discovery.
    pub uuid: String,

    /// Fixed device URL. Without it the URL comes from discovery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Remote configuration file (JSON) with the button codes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,

    /// Remote name inside the device configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,

    /// Override the default retry count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<u32>,

    /// Override the default timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl Config {
    /// Resolve a device by profile name, falling back to UUID match and
    /// then to `default_device` when `name` is `None`.
    pub fn device(&self, name: Option<&str>) -> Result<(&str, &DeviceProfile), ConfigError> {
        let name = name
            .or(self.default_device.as_deref())
            .ok_or(ConfigError::NoDevice)?;

        if let Some((key, profile)) = self.devices.get_key_value(name) {
            return Ok((key.as_str(), profile));
        }

        self.devices
            .iter()
            .find(|(_, p)| p.uuid.eq_ignore_ascii_case(name))
            .map(|(k, p)| (k.as_str(), p))
            .ok_or_else(|| ConfigError::UnknownDevice { name: name.into() })
    }

    /// Reject discovery timings of zero; the background loop would spin.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let settings = &self.discovery;
        let timings = [
            ("discovery.receive_timeout", settings.receive_timeout),
            ("discovery.scan_timeout", settings.scan_timeout),
            ("discovery.refresh_interval", settings.refresh_interval),
        ];
        match timings.into_iter().find(|(_, secs)| *secs == 0) {
            Some((field, _)) => Err(ConfigError::Validation {
                field: field.into(),
                reason: "must be at least 1 second".into(),
            }),
            None => Ok(()),
        }
    }

    /// Discovery timing for `zmote_core::DiscoveryRegistry`.
    pub fn discovery_config(&self) -> DiscoveryConfig {
        let settings = &self.discovery;
        DiscoveryConfig {
            receive_timeout: Duration::from_secs(settings.receive_timeout),
            scan_timeout: Duration::from_secs(settings.scan_timeout),
            refresh_interval: Duration::from_secs(settings.refresh_interval),
            ..DiscoveryConfig::default()
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "zmote", "zmote").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("zmote");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the Config from `path` + environment. A missing file yields the
/// defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ZMOTE__").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `ZmoteConfig` from a profile, filling unset values from the
/// global defaults.
pub fn profile_to_zmote_config(
    profile: &DeviceProfile,
    defaults: &Defaults,
) -> Result<ZmoteConfig, ConfigError> {
    let uuid = profile.uuid.trim();
    if uuid.is_empty() {
        return Err(ConfigError::Validation {
            field: "uuid".into(),
            reason: "must not be empty".into(),
        });
    }

    let mut config = ZmoteConfig::new(uuid)
        .with_retry(profile.retry.unwrap_or(defaults.retry))
        .with_timeout_secs(profile.timeout.unwrap_or(defaults.timeout));

    if let Some(url) = profile.url.as_deref().filter(|u| !u.trim().is_empty()) {
        url::Url::parse(url).map_err(|_| ConfigError::Validation {
            field: "url".into(),
            reason: format!("invalid URL: {url}"),
        })?;
        config = config.with_url(url);
    }
    if let Some(path) = &profile.config_file {
        config = config.with_config_file(path);
    }
    if let Some(remote) = &profile.remote {
        config = config.with_remote(remote);
    }

    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const SAMPLE: &str = r#"
default_device = "living-room"

[defaults]
timeout = 5
retry = 2

[discovery]
receive_timeout = 3

[devices.living-room]
uuid = "CI001f1234"
url = "http://192.168.1.50"
config_file = "/etc/zmote/tv.json"
remote = "tv"

[devices.bedroom]
uuid = "CI00aa0000"
retry = 0
"#;

    fn load(body: &str) -> Config {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, body).unwrap();
        load_config_from(&path).unwrap()
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();

        assert!(cfg.devices.is_empty());
        assert_eq!(cfg.defaults.timeout, DEFAULT_TIMEOUT_SECS);
        assert_eq!(cfg.discovery.scan_timeout, 30);
    }

    #[test]
    fn resolves_devices_by_name_uuid_and_default() {
        let cfg = load(SAMPLE);

        assert_eq!(cfg.device(None).unwrap().0, "living-room");
        assert_eq!(cfg.device(Some("bedroom")).unwrap().0, "bedroom");
        assert_eq!(cfg.device(Some("ci00AA0000")).unwrap().0, "bedroom");
        assert!(matches!(
            cfg.device(Some("kitchen")),
            Err(ConfigError::UnknownDevice { .. })
        ));
    }

    #[test]
    fn profile_inherits_defaults() {
        let cfg = load(SAMPLE);

        let (_, living) = cfg.device(Some("living-room")).unwrap();
        let zmote = profile_to_zmote_config(living, &cfg.defaults).unwrap();
        assert_eq!(zmote.uuid, "CI001f1234");
        assert_eq!(zmote.url(), Some("http://192.168.1.50"));
        assert_eq!(zmote.retry, 2);
        assert_eq!(zmote.timeout_secs, 5);
        assert_eq!(zmote.remote.as_deref(), Some("tv"));

        let (_, bedroom) = cfg.device(Some("bedroom")).unwrap();
        let zmote = profile_to_zmote_config(bedroom, &cfg.defaults).unwrap();
        assert_eq!(zmote.retry, 0);
        assert_eq!(zmote.url(), None);
    }

    #[test]
    fn rejects_bad_profiles() {
        let defaults = Defaults::default();
        let blank = DeviceProfile::default();
        assert!(profile_to_zmote_config(&blank, &defaults).is_err());

        let bad_url = DeviceProfile {
            uuid: "CI1".into(),
            url: Some("::nope".into()),
            ..DeviceProfile::default()
        };
        assert!(matches!(
            profile_to_zmote_config(&bad_url, &defaults),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn zero_refresh_interval_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[discovery]\nrefresh_interval = 0\n").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(
            matches!(&err, ConfigError::Validation { field, .. } if field == "discovery.refresh_interval"),
            "got: {err:?}"
        );
    }

    #[test]
    fn discovery_settings_translate() {
        let cfg = load(SAMPLE);
        let discovery = cfg.discovery_config();

        assert_eq!(discovery.receive_timeout, Duration::from_secs(3));
        assert_eq!(discovery.refresh_interval, Duration::from_secs(60));
    }

    #[test]
    fn save_round_trips_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.devices.insert(
            "office".into(),
            DeviceProfile {
                uuid: "CI0fff".into(),
                remote: Some("projector".into()),
                ..DeviceProfile::default()
            },
        );
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.devices["office"].uuid, "CI0fff");
        assert_eq!(loaded.devices["office"].remote.as_deref(), Some("projector"));
    }
}
