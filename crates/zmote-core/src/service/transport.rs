// ── Device client seam ──
//
// The transmit service talks to devices through these traits so tests can
// script device answers without HTTP. Production uses `ZmoteClient`.

use std::future::Future;
use std::time::Duration;

use url::Url;
use zmote_api::{Error, TransportConfig, ZmoteClient};

/// The two device operations the transmit service needs.
pub trait IrClient: Send + Sync + 'static {
    /// Confirm the device answers with its UUID.
    fn check(&self, timeout: Duration) -> impl Future<Output = Result<(), Error>> + Send;

    /// Transmit one raw code.
    fn sendir(&self, code: &str, timeout: Duration)
    -> impl Future<Output = Result<(), Error>> + Send;
}

impl IrClient for ZmoteClient {
    async fn check(&self, timeout: Duration) -> Result<(), Error> {
        ZmoteClient::check(self, timeout).await
    }

    async fn sendir(&self, code: &str, timeout: Duration) -> Result<(), Error> {
        ZmoteClient::sendir(self, code, timeout).await
    }
}

/// Builds one client per device.
pub trait ClientFactory: Send + Sync + 'static {
    type Client: IrClient;

    fn create(&self, uuid: &str, base_url: Url) -> Result<Self::Client, Error>;
}

/// Creates [`ZmoteClient`]s, each with its own connection pool.
#[derive(Debug, Clone, Default)]
pub struct HttpClientFactory {
    transport: TransportConfig,
}

impl HttpClientFactory {
    pub fn new(transport: TransportConfig) -> Self {
        Self { transport }
    }
}

impl ClientFactory for HttpClientFactory {
    type Client = ZmoteClient;

    fn create(&self, uuid: &str, base_url: Url) -> Result<ZmoteClient, Error> {
        ZmoteClient::new(base_url, uuid, &self.transport)
    }
}
