// ── Discovered device model ──

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use zmote_api::Announcement;

/// A zmote device as announced on the network. Identity is the UUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceDescriptor {
    pub make: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub model: Option<String>,
    pub revision: Option<String>,
    pub uuid: String,
    pub url: String,
}

impl DeviceDescriptor {
    /// Accept an announcement if it comes from a zmote and carries both a
    /// UUID and a URL. Everything else is not ours and is ignored.
    pub fn from_announcement(announcement: Announcement) -> Option<Self> {
        if !announcement.is_zmote() {
            return None;
        }

        let Announcement {
            make,
            device_type,
            model,
            revision,
            url,
            uuid,
        } = announcement;

        Some(Self {
            make: make?,
            device_type: device_type?,
            model,
            revision,
            uuid: uuid?,
            url: url?,
        })
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} [{}] @ {}",
            self.make,
            self.device_type,
            self.model.as_deref().unwrap_or("-"),
            self.revision.as_deref().unwrap_or("-"),
            self.uuid,
            self.url
        )
    }
}

/// A presence observation held by the discovery registry.
#[derive(Debug, Clone)]
pub struct PresenceEntry {
    pub device: DeviceDescriptor,
    /// Monotonic time of the last announcement, used for staleness.
    pub last_seen: Instant,
    /// Wall-clock time of the last announcement, for display.
    pub last_seen_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn announcement(make: &str, device_type: &str) -> Announcement {
        Announcement {
            make: Some(make.into()),
            device_type: Some(device_type.into()),
            model: Some("ZV-2".into()),
            revision: Some("2.1.4".into()),
            url: Some("http://10.0.0.5".into()),
            uuid: Some("CI001".into()),
        }
    }

    #[test]
    fn accepts_zmote() {
        let d = DeviceDescriptor::from_announcement(announcement("zmote.io", "ZMT2")).unwrap();
        assert_eq!(d.uuid, "CI001");
        assert_eq!(
            d.to_string(),
            "zmote.io ZMT2 ZV-2 2.1.4 [CI001] @ http://10.0.0.5"
        );
    }

    #[test]
    fn requires_uuid_and_url() {
        let mut a = announcement("zmote.io", "ZMT2");
        a.uuid = None;
        assert!(DeviceDescriptor::from_announcement(a).is_none());

        let mut a = announcement("zmote.io", "ZMT2");
        a.url = None;
        assert!(DeviceDescriptor::from_announcement(a).is_none());
    }

    #[test]
    fn rejects_other_makes() {
        assert!(DeviceDescriptor::from_announcement(announcement("amx", "ZMT2")).is_none());
    }
}
