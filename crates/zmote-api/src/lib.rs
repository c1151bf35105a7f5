// zmote-api: Async Rust client for zmote infrared blasters (HTTP + UDP discovery)

pub mod client;
pub mod discovery;
pub mod error;
pub mod transport;

pub use client::ZmoteClient;
pub use discovery::Announcement;
pub use error::Error;
pub use transport::TransportConfig;
