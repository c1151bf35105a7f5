//! Discover command handler.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;

use zmote_config::Config;
use zmote_core::{DeviceDescriptor, DiscoveryRegistry, PresenceEntry};

use crate::cli::{DiscoverArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Output types ────────────────────────────────────────────────────

#[derive(Serialize)]
struct Discovered {
    #[serde(flatten)]
    device: DeviceDescriptor,
    last_seen: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<String>,
}

impl Discovered {
    fn new(entry: PresenceEntry, cfg: &Config) -> Self {
        let profile = cfg
            .devices
            .iter()
            .find(|(_, p)| p.uuid.eq_ignore_ascii_case(&entry.device.uuid))
            .map(|(name, _)| name.clone());
        Self {
            device: entry.device,
            last_seen: entry.last_seen_at,
            profile,
        }
    }
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "UUID")]
    uuid: String,
    #[tabled(rename = "Profile")]
    profile: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Revision")]
    revision: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "Last Seen")]
    last_seen: String,
}

impl From<&Discovered> for DeviceRow {
    fn from(d: &Discovered) -> Self {
        Self {
            uuid: d.device.uuid.clone(),
            profile: d.profile.clone().unwrap_or_else(|| "-".into()),
            model: format!(
                "{} {}",
                d.device.device_type,
                d.device.model.as_deref().unwrap_or("")
            )
            .trim_end()
            .to_owned(),
            revision: d.device.revision.clone().unwrap_or_else(|| "-".into()),
            url: d.device.url.clone(),
            last_seen: d.last_seen.format("%H:%M:%S").to_string(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: DiscoverArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = util::load(global)?;

    let mut discovery = cfg.discovery_config();
    discovery.scan_timeout = util::secs_or(args.scan_timeout, discovery.scan_timeout);
    discovery.receive_timeout = util::secs_or(args.receive_timeout, discovery.receive_timeout);

    let registry = DiscoveryRegistry::new(discovery);
    registry.scan().await?;

    let found: Vec<Discovered> = registry
        .devices()
        .into_iter()
        .map(|entry| Discovered::new(entry, &cfg))
        .collect();

    let out = output::render_list(
        &global.output,
        &found,
        |d| DeviceRow::from(d),
        |d| d.device.uuid.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
