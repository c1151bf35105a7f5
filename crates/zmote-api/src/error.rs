use thiserror::Error;

/// Top-level error type for the `zmote-api` crate.
///
/// Covers every failure mode of the device-facing protocols: HTTP
/// transport, response classification, and discovery socket setup.
/// `zmote-core` maps these into the configuration/communication taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    // ── Device responses ────────────────────────────────────────────
    /// The device is still processing a previous transmission.
    #[error("Device is busy")]
    Busy,

    /// The device answered without a body.
    #[error("Empty response received from device")]
    EmptyResponse,

    /// The device explicitly rejected the request (`error,...`).
    #[error("Device rejected request: {message}")]
    DeviceRejected { message: String },

    /// A response that is neither success, busy nor a device error.
    #[error("Unexpected response (HTTP {status}): {body}")]
    UnexpectedResponse { status: u16, body: String },

    /// The device at the URL reports a different identity.
    #[error("Device at {url} is not the zmote with UUID '{expected}'")]
    UuidMismatch { expected: String, url: String },

    // ── Discovery ───────────────────────────────────────────────────
    /// Socket setup or I/O failure on the discovery socket.
    #[error("Discovery socket error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if the device reported a transient busy state.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::Busy => true,
            _ => false,
        }
    }

    /// Translate a reqwest failure, surfacing timeouts as [`Error::Timeout`].
    pub(crate) fn from_request(err: reqwest::Error, timeout: std::time::Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                timeout_secs: timeout.as_secs(),
            }
        } else {
            Self::Transport(err)
        }
    }
}
