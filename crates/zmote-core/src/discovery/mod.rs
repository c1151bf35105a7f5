// ── Discovery ──

mod clock;
mod listener;
mod registry;

pub use clock::{Clock, SystemClock};
pub use listener::{DiscoveryEvent, DiscoveryListener};
pub use registry::DiscoveryRegistry;
