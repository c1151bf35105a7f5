// zmote HTTP client
//
// Wraps `reqwest::Client` with the device's two endpoints: the identity
// probe (`GET /uuid`) and the v2 infrared send (`POST /v2/{uuid}`).
// Response bodies are plain text and classified by prefix.

use std::time::Duration;

use reqwest::StatusCode;
use tokio::sync::Mutex;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Body prefix of a successful `sendir`.
const SENDIR_SUCCESS: &str = "completeir";
/// Body prefix while the device is still emitting a previous code.
const SENDIR_BUSY: &str = "busyIR";
/// Body prefix of a device-side failure.
const SENDIR_ERROR: &str = "error";

/// Outcome of a `sendir` response, before it is turned into a `Result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendirStatus {
    Complete,
    Busy,
    Failed,
}

/// HTTP client for a single zmote device.
///
/// Requests are serialized per instance: the device only handles one
/// transmission at a time, and interleaving requests would corrupt its
/// output state. Different devices use different instances and run
/// concurrently.
pub struct ZmoteClient {
    http: reqwest::Client,
    base_url: Url,
    uuid: String,
    in_flight: Mutex<()>,
}

impl ZmoteClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the device root as announced during discovery
    /// (e.g. `http://192.168.1.50`).
    pub fn new(
        base_url: Url,
        uuid: impl Into<String>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, uuid))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, uuid: impl Into<String>) -> Self {
        Self {
            http,
            base_url,
            uuid: uuid.into(),
            in_flight: Mutex::new(()),
        }
    }

    /// The device UUID this client talks to.
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// The device base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build `{base}/{path}` without dropping a path prefix on the base URL.
    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Verify the device is reachable and identifies with our UUID.
    ///
    /// The body must start with `uuid,{UUID}` (case-insensitive).
    pub async fn check(&self, timeout: Duration) -> Result<(), Error> {
        let url = self.endpoint("uuid")?;
        let _guard = self.in_flight.lock().await;
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::from_request(e, timeout))?;
        let body = resp
            .text()
            .await
            .map_err(|e| Error::from_request(e, timeout))?;
        trace!(body = %body, "uuid response");

        if body.is_empty() {
            return Err(Error::EmptyResponse);
        }

        let expected = format!("uuid,{}", self.uuid).to_ascii_lowercase();
        if !body.to_ascii_lowercase().starts_with(&expected) {
            return Err(Error::UuidMismatch {
                expected: self.uuid.clone(),
                url: self.base_url.to_string(),
            });
        }

        Ok(())
    }

    /// Transmit a raw infrared code on output `1:1`.
    pub async fn sendir(&self, code: &str, timeout: Duration) -> Result<(), Error> {
        let url = self.endpoint(&format!("v2/{}", self.uuid))?;
        let body = format!("sendir,1:1,0,{code}");
        let _guard = self.in_flight.lock().await;
        debug!("POST {}", url);

        let resp = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::from_request(e, timeout))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| Error::from_request(e, timeout))?;
        trace!(%status, body = %text, "sendir response");

        parse_sendir_response(status, &text)
    }
}

/// Classify a `sendir` response body by its prefix.
pub fn classify_sendir(body: &str) -> SendirStatus {
    if body.starts_with(SENDIR_SUCCESS) {
        SendirStatus::Complete
    } else if body.starts_with(SENDIR_BUSY) {
        SendirStatus::Busy
    } else {
        SendirStatus::Failed
    }
}

/// Turn a `sendir` response into a `Result`.
///
/// An empty body is never a success, whatever the status. A 200 with a
/// body matching none of the known prefixes counts as delivered; any other
/// status with such a body is reported as unexpected.
pub fn parse_sendir_response(status: StatusCode, body: &str) -> Result<(), Error> {
    if body.is_empty() {
        return Err(Error::EmptyResponse);
    }

    match classify_sendir(body) {
        SendirStatus::Complete => Ok(()),
        SendirStatus::Busy => Err(Error::Busy),
        SendirStatus::Failed if body.starts_with(SENDIR_ERROR) => Err(Error::DeviceRejected {
            message: body.trim().to_owned(),
        }),
        SendirStatus::Failed if status == StatusCode::OK => {
            debug!(body = %body.trim(), "unrecognized sendir reply, treating as sent");
            Ok(())
        }
        SendirStatus::Failed => Err(Error::UnexpectedResponse {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn complete_is_success() {
        assert!(parse_sendir_response(StatusCode::OK, "completeir,1:1,0").is_ok());
    }

    #[test]
    fn busy_is_retryable() {
        let err = parse_sendir_response(StatusCode::OK, "busyIR,1:1,0").unwrap_err();
        assert!(err.is_busy());
    }

    #[test]
    fn error_prefix_is_rejection() {
        let err = parse_sendir_response(StatusCode::OK, "error,1:1,3").unwrap_err();
        assert!(matches!(err, Error::DeviceRejected { .. }));
    }

    #[test]
    fn empty_body_is_never_success() {
        assert!(matches!(
            parse_sendir_response(StatusCode::OK, ""),
            Err(Error::EmptyResponse)
        ));
        assert!(matches!(
            parse_sendir_response(StatusCode::INTERNAL_SERVER_ERROR, ""),
            Err(Error::EmptyResponse)
        ));
    }

    #[test]
    fn ok_status_with_unknown_body_is_sent() {
        assert!(parse_sendir_response(StatusCode::OK, "ok,1:1,0").is_ok());
    }

    #[test]
    fn non_ok_status_with_unknown_body_fails() {
        let err = parse_sendir_response(StatusCode::NOT_FOUND, "not found").unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse { status: 404, .. }));
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let client = ZmoteClient::with_client(
            reqwest::Client::new(),
            Url::parse("http://10.0.0.5/zmote/").unwrap(),
            "CI001",
        );
        assert_eq!(
            client.endpoint("v2/CI001").unwrap().as_str(),
            "http://10.0.0.5/zmote/v2/CI001"
        );
    }
}
