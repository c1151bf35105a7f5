// ── Discovery notifications ──

use serde::Serialize;

use crate::model::DeviceDescriptor;

/// Synchronous observer of discovery cycles.
///
/// Called on the discovery task, in registration order. Keep callbacks
/// short; a panicking listener is logged and skipped.
pub trait DiscoveryListener: Send + Sync + 'static {
    /// A cycle starts. Delivered before the request goes out.
    fn discovery_started(&self) {}

    /// An accepted announcement was received.
    fn device_discovered(&self, device: &DeviceDescriptor);

    /// A cycle ended by timeout, stop or error.
    fn discovery_finished(&self) {}
}

impl<F> DiscoveryListener for F
where
    F: Fn(&DeviceDescriptor) + Send + Sync + 'static,
{
    fn device_discovered(&self, device: &DeviceDescriptor) {
        self(device);
    }
}

/// Discovery activity as broadcast to async subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiscoveryEvent {
    Started,
    DeviceDiscovered {
        device: DeviceDescriptor,
    },
    Finished {
        /// Distinct devices seen during the cycle.
        found: usize,
        /// Set when the cycle could not run.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}
