// ── Transmit service ──
//
// Multiplexes logical device configurations onto one client per device
// UUID and one code cache per remote file. Registration is serialized;
// sends only read the concurrent maps and never hold a map guard across
// an await.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, info, warn};
use url::Url;

use zmote_api::TransportConfig;

use super::transport::{ClientFactory, HttpClientFactory, IrClient};
use crate::config::ZmoteConfig;
use crate::error::CoreError;
use crate::model::{IrCode, non_blank};
use crate::remote::CodeCache;

/// Identity of one registered configuration: a device plus a remote.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ConfigKey {
    uuid: String,
    remote: String,
}

impl ConfigKey {
    fn of(config: &ZmoteConfig) -> Result<Self, CoreError> {
        Ok(Self {
            uuid: config.require_uuid()?.to_owned(),
            remote: config.remote_key(),
        })
    }
}

struct ClientEntry<C> {
    client: Arc<C>,
    url: Url,
}

/// Sends infrared codes to registered zmote devices.
pub struct TransmitService<F: ClientFactory = HttpClientFactory> {
    factory: F,
    clients: DashMap<String, ClientEntry<F::Client>>,
    caches: DashMap<PathBuf, Arc<CodeCache>>,
    /// Remote file (if any) of every registered configuration. The mutex
    /// also serializes registration.
    registrations: Mutex<HashMap<ConfigKey, Option<PathBuf>>>,
}

impl TransmitService<HttpClientFactory> {
    pub fn new(transport: TransportConfig) -> Self {
        Self::with_factory(HttpClientFactory::new(transport))
    }
}

impl<F: ClientFactory> TransmitService<F> {
    pub fn with_factory(factory: F) -> Self {
        Self {
            factory,
            clients: DashMap::new(),
            caches: DashMap::new(),
            registrations: Mutex::new(HashMap::new()),
        }
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Make `config` usable for sending.
    ///
    /// Ensures a client for the device (replaced when the URL changed) and
    /// a parsed code cache for its remote file (shared with every other
    /// configuration naming the same file). Idempotent. On error nothing
    /// is changed.
    pub fn register(&self, config: &ZmoteConfig) -> Result<(), CoreError> {
        let key = ConfigKey::of(config)?;
        let uuid = key.uuid.clone();
        let url = config.require_url()?;
        let path = config.config_file.as_deref().map(canonical).transpose()?;

        let mut registrations = self.lock_registrations();

        // Build everything that can fail before touching shared state.
        let new_cache = match &path {
            Some(path) if !self.caches.contains_key(path) => {
                Some(Arc::new(CodeCache::open(path)?))
            }
            _ => None,
        };

        let needs_client = self.clients.get(&uuid).is_none_or(|e| e.url != url);
        let new_client = if needs_client {
            let client = self
                .factory
                .create(&uuid, url.clone())
                .map_err(|e| CoreError::device(&uuid, &e))?;
            Some(client)
        } else {
            None
        };

        if let (Some(path), Some(cache)) = (&path, new_cache) {
            debug!(path = %path.display(), "code cache created");
            self.caches.insert(path.clone(), cache);
        }

        if let Some(client) = new_client {
            let entry = ClientEntry {
                client: Arc::new(client),
                url: url.clone(),
            };
            match self.clients.insert(uuid.clone(), entry) {
                Some(old) => {
                    info!(%uuid, old = %old.url, new = %url, "device URL changed, client replaced");
                }
                None => debug!(%uuid, %url, "client created"),
            }
        }

        if let Some(Some(old_path)) = registrations.insert(key, path.clone()) {
            if path.as_ref() != Some(&old_path) {
                self.release_cache(&registrations, &old_path);
            }
        }

        Ok(())
    }

    /// Drop the references held by `config`. Clients and caches nobody
    /// else uses are disposed. Unknown configurations are ignored.
    pub fn unregister(&self, config: &ZmoteConfig) {
        let Ok(key) = ConfigKey::of(config) else {
            debug!("ignoring unregistration without UUID");
            return;
        };

        let mut registrations = self.lock_registrations();
        let Some(path) = registrations.remove(&key) else {
            debug!(uuid = %key.uuid, remote = %key.remote, "configuration was not registered");
            return;
        };

        let last_user = !registrations.keys().any(|k| k.uuid == key.uuid);
        if last_user && self.clients.remove(&key.uuid).is_some() {
            info!(uuid = %key.uuid, "client disposed");
        }
        if let Some(path) = path {
            self.release_cache(&registrations, &path);
        }
    }

    /// Dispose every client and cache.
    pub fn shutdown(&self) {
        let mut registrations = self.lock_registrations();
        let clients = self.clients.len();
        registrations.clear();
        self.clients.clear();
        self.caches.clear();
        info!(clients, "transmit service shut down");
    }

    /// `true` if a client exists for `uuid`.
    pub fn is_registered(&self, uuid: &str) -> bool {
        self.clients.contains_key(uuid.trim())
    }

    /// Number of live device clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// The code cache serving `config`, as recorded at registration.
    pub fn code_cache(&self, config: &ZmoteConfig) -> Result<Arc<CodeCache>, CoreError> {
        config.require_config_file()?;
        let key = ConfigKey::of(config)?;
        let not_registered = || CoreError::NotRegistered {
            uuid: key.uuid.clone(),
        };

        let path = self
            .lock_registrations()
            .get(&key)
            .cloned()
            .flatten()
            .ok_or_else(not_registered)?;
        self.caches
            .get(&path)
            .map(|c| Arc::clone(c.value()))
            .ok_or_else(not_registered)
    }

    // ── Sending ──────────────────────────────────────────────────────

    /// Send a raw code `repeat` times.
    pub async fn send_code(
        &self,
        config: &ZmoteConfig,
        code: &str,
        repeat: u32,
    ) -> Result<bool, CoreError> {
        let code = non_blank(Some(code))
            .ok_or_else(|| CoreError::config("cannot send an empty code"))?;
        self.transmit(config, &IrCode::new(code), repeat).await
    }

    /// Look up `button` in the configuration's remote and send it `repeat`
    /// times. Returns `Ok(false)` if the remote has no such button.
    pub async fn send_key(
        &self,
        config: &ZmoteConfig,
        button: &str,
        repeat: u32,
    ) -> Result<bool, CoreError> {
        let cache = self.code_cache(config)?;
        let Some(code) = cache.get_code(button)? else {
            warn!(
                uuid = %config.uuid,
                %button,
                remote = config.remote.as_deref().unwrap_or("-"),
                source = cache.location(),
                "no code for button"
            );
            return Ok(false);
        };

        self.transmit(config, &code, repeat).await
    }

    /// Ask the device for its UUID. Communication problems mean offline.
    pub async fn check_online(&self, config: &ZmoteConfig) -> Result<bool, CoreError> {
        let (uuid, client) = self.client(config)?;

        match client.check(config.timeout()).await {
            Ok(()) => Ok(true),
            Err(e) => {
                let err = CoreError::device(&uuid, &e);
                if err.is_communication() {
                    debug!(%uuid, error = %e, "device check failed");
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Send `code` in `repeat` rounds. Every round gets `retry + 1`
    /// attempts while the device is busy, each with the next toggle code.
    async fn transmit(
        &self,
        config: &ZmoteConfig,
        code: &IrCode,
        repeat: u32,
    ) -> Result<bool, CoreError> {
        let (uuid, client) = self.client(config)?;
        let timeout = config.timeout();
        let retry = config.retry;

        for round in 1..=repeat.max(1) {
            send_round(&uuid, client.as_ref(), code, retry, timeout).await?;
            debug!(%uuid, round, "code sent");
        }

        Ok(true)
    }

    fn client(&self, config: &ZmoteConfig) -> Result<(String, Arc<F::Client>), CoreError> {
        let uuid = config.require_uuid()?;
        let client = self
            .clients
            .get(uuid)
            .map(|e| Arc::clone(&e.client))
            .ok_or_else(|| CoreError::NotRegistered {
                uuid: uuid.to_owned(),
            })?;
        Ok((uuid.to_owned(), client))
    }

    fn release_cache(&self, registrations: &HashMap<ConfigKey, Option<PathBuf>>, path: &Path) {
        let in_use = registrations.values().any(|p| p.as_deref() == Some(path));
        if !in_use && self.caches.remove(path).is_some() {
            debug!(path = %path.display(), "code cache released");
        }
    }

    fn lock_registrations(&self) -> MutexGuard<'_, HashMap<ConfigKey, Option<PathBuf>>> {
        self.registrations.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn send_round<C: IrClient>(
    uuid: &str,
    client: &C,
    code: &IrCode,
    retry: u32,
    timeout: Duration,
) -> Result<(), CoreError> {
    let attempts = retry.saturating_add(1);

    for attempt in 1..=attempts {
        match client.sendir(code.next_code(), timeout).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_busy() => debug!(%uuid, attempt, attempts, "device busy"),
            Err(e) => {
                warn!(%uuid, attempt, error = %e, transient = e.is_transient(), "sendir failed");
                return Err(CoreError::Communication {
                    uuid: uuid.to_owned(),
                    message: format!("{e} (retry budget {retry})"),
                });
            }
        }
    }

    Err(CoreError::RetriesExhausted {
        uuid: uuid.to_owned(),
        attempts,
        retry,
    })
}

/// Resolve a remote file path so different spellings share one cache.
fn canonical(path: &Path) -> Result<PathBuf, CoreError> {
    if path.as_os_str().is_empty() {
        return Err(CoreError::config("remote configuration path is empty"));
    }
    Ok(std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()))
}
