// ── Core error types ──
//
// User-facing errors from zmote-core. Consumers never see HTTP statuses
// or response bodies directly: `CoreError::device` folds wire-level
// failures for a named device into the configuration/communication
// taxonomy.
// A busy device is not part of it; the transmit loop retries busy
// responses and reports exhaustion as a communication error.

use thiserror::Error;

/// Coarse classification of a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid configuration. Retrying will not help.
    Configuration,
    /// The device could not be reached or answered badly.
    Communication,
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Remote configuration '{path}' is invalid: {reason}")]
    RemoteFile { path: String, reason: String },

    #[error("Device '{uuid}' is not registered")]
    NotRegistered { uuid: String },

    // ── Communication errors ─────────────────────────────────────────
    #[error("Communication with device '{uuid}' failed: {message}")]
    Communication { uuid: String, message: String },

    #[error("Device '{uuid}' stayed busy after {attempts} attempt(s) (retry budget {retry})")]
    RetriesExhausted {
        uuid: String,
        attempts: u32,
        retry: u32,
    },

    #[error("Discovery failed: {message}")]
    Discovery { message: String },
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } | Self::RemoteFile { .. } | Self::NotRegistered { .. } => {
                ErrorKind::Configuration
            }
            Self::Communication { .. } | Self::RetriesExhausted { .. } | Self::Discovery { .. } => {
                ErrorKind::Communication
            }
        }
    }

    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    pub fn is_communication(&self) -> bool {
        self.kind() == ErrorKind::Communication
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Wrap a wire error for the device `uuid`.
    pub(crate) fn device(uuid: &str, err: &zmote_api::Error) -> Self {
        match err {
            zmote_api::Error::InvalidUrl(e) => Self::Configuration {
                message: format!("invalid URL for device '{uuid}': {e}"),
            },
            zmote_api::Error::ClientBuild(reason) => Self::Configuration {
                message: format!("cannot create client for device '{uuid}': {reason}"),
            },
            other => Self::Communication {
                uuid: uuid.to_owned(),
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_errors_map_to_taxonomy() {
        let busy = CoreError::device("CI1", &zmote_api::Error::Busy);
        assert!(busy.is_communication());

        let url = CoreError::device(
            "CI1",
            &zmote_api::Error::InvalidUrl(url::ParseError::EmptyHost),
        );
        assert!(url.is_configuration());
    }

    #[test]
    fn exhausted_names_device_and_budget() {
        let err = CoreError::RetriesExhausted {
            uuid: "CI1".into(),
            attempts: 3,
            retry: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("CI1"));
        assert!(msg.contains("retry budget 2"));
    }
}
