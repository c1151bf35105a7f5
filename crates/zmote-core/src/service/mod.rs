mod transmit;
mod transport;

pub use transmit::TransmitService;
pub use transport::{ClientFactory, HttpClientFactory, IrClient};
