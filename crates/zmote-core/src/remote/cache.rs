// ── Button code cache ──
//
// Maps normalized button keys to persistent `IrCode` instances. The
// backing document is only parsed again after its source changed; every
// lookup asks the watcher first.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use super::source::{FileSource, RemoteSource};
use super::watcher::ConfigFileWatcher;
use crate::error::CoreError;
use crate::model::{IrCode, RemoteDocument, non_blank, normalize_key};

struct CacheState<S> {
    watcher: ConfigFileWatcher<S>,
    codes: HashMap<String, Arc<IrCode>>,
}

/// Button lookup for one remote configuration source.
///
/// Shared between every device configuration that points at the same
/// file, so toggle state is shared as well.
pub struct CodeCache<S = FileSource> {
    location: String,
    state: Mutex<CacheState<S>>,
}

impl CodeCache<FileSource> {
    /// Open the file at `path` and parse it eagerly.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        Self::new(FileSource::open(path)?)
    }
}

impl<S: RemoteSource> CodeCache<S> {
    /// Build a cache over `source`. The first parse happens here, so a
    /// broken document is reported at construction.
    pub fn new(source: S) -> Result<Self, CoreError> {
        let location = source.location();
        let mut state = CacheState {
            watcher: ConfigFileWatcher::new(source),
            codes: HashMap::new(),
        };
        state.reload()?;

        Ok(Self {
            location,
            state: Mutex::new(state),
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Look up a button, re-reading the source first if it changed.
    ///
    /// Returns `Ok(None)` for unknown or blank keys. A source that changed
    /// and no longer parses is an error; the previous mapping stays in
    /// place for later lookups.
    pub fn get_code(&self, button: &str) -> Result<Option<Arc<IrCode>>, CoreError> {
        let Some(key) = normalize_key(button) else {
            return Ok(None);
        };

        let mut state = self.lock();
        state.refresh()?;
        Ok(state.codes.get(&key).cloned())
    }

    /// All buttons, sorted by key, after refreshing.
    pub fn entries(&self) -> Result<Vec<(String, Arc<IrCode>)>, CoreError> {
        let mut state = self.lock();
        state.refresh()?;

        let mut entries: Vec<_> = state
            .codes
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    /// Number of buttons currently cached. Does not refresh.
    pub fn len(&self) -> usize {
        self.lock().codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState<S>> {
        self.state.lock().expect("code cache lock poisoned")
    }
}

impl<S: RemoteSource> CacheState<S> {
    fn refresh(&mut self) -> Result<(), CoreError> {
        if self.watcher.is_modified() {
            self.reload()?;
        }
        Ok(())
    }

    /// Parse the source and swap in the new mapping. On failure the
    /// current mapping is left untouched.
    fn reload(&mut self) -> Result<(), CoreError> {
        let location = self.watcher.source().location();
        let document = self.watcher.read()?;
        let codes = build_codes(&location, &document);

        if codes.is_empty() {
            warn!(source = %location, "remote configuration has no usable buttons");
        } else {
            info!(source = %location, buttons = codes.len(), "loaded remote configuration");
        }

        self.codes = codes;
        Ok(())
    }
}

fn build_codes(location: &str, document: &RemoteDocument) -> HashMap<String, Arc<IrCode>> {
    let mut codes = HashMap::new();

    for (index, button) in document.buttons().iter().enumerate() {
        let key = button.key.as_deref().and_then(normalize_key);
        let code = non_blank(button.code.as_deref());

        let (Some(key), Some(code)) = (key, code) else {
            warn!(
                source = %location,
                index,
                key = ?button.key,
                "dropping button without key or code"
            );
            continue;
        };

        let alternate = non_blank(button.tcode.as_deref()).map(str::to_owned);
        if codes
            .insert(key.clone(), Arc::new(IrCode::with_toggle(code, alternate)))
            .is_some()
        {
            debug!(source = %location, %key, "duplicate button key, last entry wins");
        }
    }

    codes
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::remote::watcher::tests::MemorySource;

    const REMOTE: &str = r#"{"name":"tv","keys":[
        {"key":"Power","code":"38000,1,1,96,24","tcode":"38000,1,1,96,48"},
        {"key":"mute","code":"38000,1,1,24,24"},
        {"key":"","code":"1,2,3"},
        {"key":"input"}
    ]}"#;

    #[test]
    fn lookup_is_case_and_whitespace_insensitive() {
        let cache = CodeCache::new(MemorySource::new(REMOTE)).unwrap();

        let power = cache.get_code("  POWER ").unwrap().unwrap();
        assert_eq!(power.main(), "38000,1,1,96,24");
        assert!(cache.get_code("volume").unwrap().is_none());
        assert!(cache.get_code("   ").unwrap().is_none());
    }

    #[test]
    fn invalid_buttons_are_dropped() {
        let cache = CodeCache::new(MemorySource::new(REMOTE)).unwrap();
        assert_eq!(cache.len(), 2);
        assert!(cache.get_code("input").unwrap().is_none());
    }

    #[test]
    fn unchanged_source_is_not_reparsed() {
        let source = MemorySource::new(REMOTE);
        let cache = CodeCache::new(source.clone()).unwrap();

        for _ in 0..5 {
            cache.get_code("mute").unwrap();
        }
        assert_eq!(source.reads(), 1);
    }

    #[test]
    fn toggle_state_persists_across_lookups() {
        let cache = CodeCache::new(MemorySource::new(REMOTE)).unwrap();

        let first = cache.get_code("power").unwrap().unwrap().next_code().to_owned();
        let second = cache.get_code("power").unwrap().unwrap().next_code().to_owned();
        let third = cache.get_code("power").unwrap().unwrap().next_code().to_owned();

        assert_eq!(first, "38000,1,1,96,24");
        assert_eq!(second, "38000,1,1,96,48");
        assert_eq!(third, first);
    }

    #[test]
    fn changed_source_replaces_mapping() {
        let source = MemorySource::new(REMOTE);
        let cache = CodeCache::new(source.clone()).unwrap();

        source.write(r#"{"keys":[{"key":"volup","code":"9,9,9"}]}"#);

        assert!(cache.get_code("volup").unwrap().is_some());
        assert!(cache.get_code("power").unwrap().is_none());
        assert_eq!(source.reads(), 2);
    }

    #[test]
    fn broken_update_keeps_previous_mapping() {
        let source = MemorySource::new(REMOTE);
        let cache = CodeCache::new(source.clone()).unwrap();

        source.write("{ broken");
        let err = cache.get_code("power").unwrap_err();
        assert!(err.is_configuration());

        // Still broken: every lookup retries and fails.
        assert!(cache.get_code("power").is_err());
        assert_eq!(cache.len(), 2);

        source.write(r#"{"keys":[{"key":"power","code":"1,1,1"}]}"#);
        let power = cache.get_code("power").unwrap().unwrap();
        assert_eq!(power.main(), "1,1,1");
    }

    #[test]
    fn empty_remote_is_not_an_error() {
        let cache = CodeCache::new(MemorySource::new(r#"{"name":"empty"}"#)).unwrap();
        assert!(cache.is_empty());
        assert!(cache.entries().unwrap().is_empty());
    }

    #[test]
    fn broken_first_load_fails_construction() {
        assert!(CodeCache::new(MemorySource::new("not json")).is_err());
    }

    #[test]
    fn opens_file_from_disk() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), REMOTE).unwrap();

        let cache = CodeCache::open(file.path()).unwrap();
        let keys: Vec<_> = cache.entries().unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["mute", "power"]);
    }
}
