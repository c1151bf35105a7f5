//! Domain layer between `zmote-api` and the calling layer (CLI).
//!
//! - **[`DiscoveryRegistry`]**: owns the UDP discovery task and the presence
//!   map. Active scans end at the first quiet receive and drop devices that
//!   did not answer; background discovery repeats on an interval and lets
//!   silent devices expire after the staleness window.
//!
//! - **[`CodeCache`]**: button to infrared code lookup over a remote
//!   configuration file, re-parsed only when a [`ConfigFileWatcher`] sees the
//!   file change. Each button keeps one [`IrCode`] so toggle codes alternate.
//!
//! - **[`TransmitService`]**: multiplexes [`ZmoteConfig`]s onto one client per
//!   device and one cache per remote file, and sends codes with busy retries.

pub mod config;
pub mod discovery;
pub mod error;
pub mod model;
pub mod remote;
pub mod service;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DEFAULT_RETRY, DEFAULT_TIMEOUT_SECS, DiscoveryConfig, ZmoteConfig};
pub use discovery::{Clock, DiscoveryEvent, DiscoveryListener, DiscoveryRegistry, SystemClock};
pub use error::{CoreError, ErrorKind};
pub use model::{ButtonEntry, DeviceDescriptor, IrCode, IrCodeState, PresenceEntry, RemoteDocument};
pub use remote::{CodeCache, ConfigFileWatcher, FileSource, RemoteSource};
pub use service::{ClientFactory, HttpClientFactory, IrClient, TransmitService};
