// ── Domain model ──

mod device;
mod ir_code;
mod remote;

pub use device::{DeviceDescriptor, PresenceEntry};
pub use ir_code::{IrCode, IrCodeState};
pub use remote::{ButtonEntry, RemoteDocument, normalize_key};

pub(crate) use remote::non_blank;
