// ── Modification-aware remote reader ──

use std::io;
use std::time::SystemTime;

use tracing::{error, warn};

use super::source::RemoteSource;
use crate::error::CoreError;
use crate::model::RemoteDocument;

/// Tracks the modification time of a [`RemoteSource`] so documents are only
/// parsed again after they changed.
pub struct ConfigFileWatcher<S> {
    source: S,
    /// Timestamp of the last read. `None` forces the next read.
    last_modified: Option<SystemTime>,
}

impl<S: RemoteSource> ConfigFileWatcher<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            last_modified: None,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// `true` if the source changed since it was last read.
    ///
    /// When the timestamp cannot be read the answer is "not modified", so
    /// a transient access problem never throws away a working mapping.
    pub fn is_modified(&self) -> bool {
        match self.source.modified() {
            Ok(modified) => self.last_modified != Some(modified),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                error!(
                    source = %self.source.location(),
                    error = %e,
                    "access to remote configuration denied"
                );
                false
            }
            Err(e) => {
                warn!(
                    source = %self.source.location(),
                    error = %e,
                    "cannot read modification time of remote configuration"
                );
                false
            }
        }
    }

    /// Read and parse the document.
    ///
    /// The timestamp is recorded before parsing. Any failure clears it, so
    /// the next call tries again instead of trusting a broken document.
    pub fn read(&mut self) -> Result<RemoteDocument, CoreError> {
        self.last_modified = self.source.modified().ok();

        let parsed = self
            .source
            .read()
            .map_err(|e| e.to_string())
            .and_then(|bytes| RemoteDocument::from_slice(&bytes).map_err(|e| e.to_string()));

        parsed.map_err(|reason| {
            self.last_modified = None;
            let path = self.source.location();
            error!(%path, %reason, "remote configuration could not be read");
            CoreError::RemoteFile { path, reason }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;

    /// In-memory source with a settable timestamp and a read counter.
    #[derive(Clone)]
    pub(crate) struct MemorySource {
        pub(crate) state: Arc<Mutex<(SystemTime, Vec<u8>)>>,
        pub(crate) reads: Arc<AtomicUsize>,
        pub(crate) deny: Arc<Mutex<bool>>,
    }

    impl MemorySource {
        pub(crate) fn new(body: &str) -> Self {
            Self {
                state: Arc::new(Mutex::new((SystemTime::UNIX_EPOCH, body.as_bytes().to_vec()))),
                reads: Arc::new(AtomicUsize::new(0)),
                deny: Arc::new(Mutex::new(false)),
            }
        }

        /// Replace the content and bump the timestamp.
        pub(crate) fn write(&self, body: &str) {
            let mut state = self.state.lock().unwrap();
            state.0 += Duration::from_secs(1);
            state.1 = body.as_bytes().to_vec();
        }

        pub(crate) fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    impl RemoteSource for MemorySource {
        fn location(&self) -> String {
            "memory://remote.json".into()
        }

        fn modified(&self) -> io::Result<SystemTime> {
            if *self.deny.lock().unwrap() {
                return Err(io::Error::from(io::ErrorKind::PermissionDenied));
            }
            Ok(self.state.lock().unwrap().0)
        }

        fn read(&self) -> io::Result<Vec<u8>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.state.lock().unwrap().1.clone())
        }
    }

    #[test]
    fn modified_until_first_read() {
        let source = MemorySource::new("{}");
        let mut watcher = ConfigFileWatcher::new(source.clone());

        assert!(watcher.is_modified());
        watcher.read().unwrap();
        assert!(!watcher.is_modified());

        source.write(r#"{"keys":[]}"#);
        assert!(watcher.is_modified());
    }

    #[test]
    fn access_denied_is_not_modified() {
        let source = MemorySource::new("{}");
        let watcher = ConfigFileWatcher::new(source.clone());
        *source.deny.lock().unwrap() = true;

        assert!(!watcher.is_modified());
    }

    #[test]
    fn parse_failure_forces_retry() {
        let source = MemorySource::new("{ not json");
        let mut watcher = ConfigFileWatcher::new(source.clone());

        let err = watcher.read().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("memory://remote.json"));

        // Same timestamp, but the failed read must not count as seen.
        assert!(watcher.is_modified());
    }
}
