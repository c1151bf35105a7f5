// ── Runtime configuration ──
//
// These types describe one zmote device and how discovery runs. They
// never touch disk; the CLI (through zmote-config) builds them and hands
// them in.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;
use zmote_api::discovery::DiscoveryEndpoint;

use crate::error::CoreError;
use crate::model::{DeviceDescriptor, non_blank};

/// Timeout used when a device configuration does not set one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Retries used when a device configuration does not set any.
pub const DEFAULT_RETRY: u32 = 1;

/// Configuration of one logical zmote device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZmoteConfig {
    /// Device UUID as announced during discovery (e.g. `CI001f1a2b`).
    pub uuid: String,
    /// URL set by the user. Wins over the discovered one.
    pub override_url: Option<String>,
    /// URL learned from discovery.
    pub discovered_url: Option<String>,
    /// Remote configuration file holding the button codes.
    pub config_file: Option<PathBuf>,
    /// Name of the remote inside the device configuration.
    pub remote: Option<String>,
    /// Extra attempts while the device reports busy.
    pub retry: u32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl ZmoteConfig {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            override_url: None,
            discovered_url: None,
            config_file: None,
            remote: None,
            retry: DEFAULT_RETRY,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.override_url = Some(url.into());
        self
    }

    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Record the URL a discovered device announced.
    pub fn with_discovered(mut self, device: &DeviceDescriptor) -> Self {
        self.discovered_url = Some(device.url.clone());
        self
    }

    /// The override URL if set, else the discovered one.
    pub fn url(&self) -> Option<&str> {
        non_blank(self.override_url.as_deref()).or_else(|| non_blank(self.discovered_url.as_deref()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Key identifying this configuration among all configs of a device.
    pub(crate) fn remote_key(&self) -> String {
        non_blank(self.remote.as_deref()).unwrap_or_default().to_owned()
    }

    // ── Validation ───────────────────────────────────────────────────

    pub fn require_uuid(&self) -> Result<&str, CoreError> {
        non_blank(Some(self.uuid.as_str())).ok_or_else(|| CoreError::config("a device UUID is required"))
    }

    pub fn require_url(&self) -> Result<Url, CoreError> {
        let raw = self.url().ok_or_else(|| {
            CoreError::config(format!("no URL known for device '{}'", self.uuid))
        })?;
        Url::parse(raw).map_err(|e| CoreError::config(format!("invalid device URL '{raw}': {e}")))
    }

    pub fn require_config_file(&self) -> Result<&PathBuf, CoreError> {
        self.config_file
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| {
                CoreError::config(format!(
                    "no remote configuration file set for device '{}'",
                    self.uuid
                ))
            })
    }
}

/// How the discovery registry scans and how long observations stay valid.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub endpoint: DiscoveryEndpoint,
    /// An active scan ends after this long without a reply.
    pub receive_timeout: Duration,
    /// Hard cap on a single scan.
    pub scan_timeout: Duration,
    /// Interval between background discovery cycles.
    pub refresh_interval: Duration,
    /// Observations older than this are treated as offline.
    pub staleness: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            endpoint: DiscoveryEndpoint::default(),
            receive_timeout: Duration::from_secs(10),
            scan_timeout: Duration::from_secs(30),
            refresh_interval: Duration::from_secs(60),
            staleness: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn override_url_wins() {
        let mut cfg = ZmoteConfig::new("CI1").with_url("http://10.0.0.9");
        cfg.discovered_url = Some("http://10.0.0.5".into());
        assert_eq!(cfg.url(), Some("http://10.0.0.9"));

        cfg.override_url = Some("  ".into());
        assert_eq!(cfg.url(), Some("http://10.0.0.5"));
    }

    #[test]
    fn validation_reports_missing_fields() {
        let cfg = ZmoteConfig::new("  ");
        assert!(cfg.require_uuid().unwrap_err().is_configuration());
        assert!(cfg.require_url().is_err());
        assert!(cfg.require_config_file().is_err());
    }

    #[test]
    fn rejects_unparsable_url() {
        let cfg = ZmoteConfig::new("CI1").with_url("not a url");
        assert!(cfg.require_url().unwrap_err().is_configuration());
    }
}
