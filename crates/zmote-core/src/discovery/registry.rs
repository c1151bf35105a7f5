// ── Discovery registry ──
//
// Owns the discovery task and the presence map. One task at most runs per
// registry: an active scan (ends at the first receive timeout, then drops
// devices that did not answer) or the background loop (one cycle per
// refresh interval, relying on staleness to expire silent devices).

use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, RwLock};

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use zmote_api::Announcement;
use zmote_api::discovery::{DiscoverySocket, MAX_DATAGRAM};

use super::clock::{Clock, SystemClock};
use super::listener::{DiscoveryEvent, DiscoveryListener};
use crate::config::DiscoveryConfig;
use crate::error::CoreError;
use crate::model::{DeviceDescriptor, PresenceEntry};

const EVENT_CHANNEL_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanMode {
    Active,
    Background,
}

struct ScanTask {
    mode: ScanMode,
    cancel: CancellationToken,
    /// Cancelled when the task exits, however it exits.
    done: CancellationToken,
    handle: JoinHandle<()>,
}

/// What a finished listen phase saw.
struct Listened {
    seen: HashSet<String>,
    /// `false` if the cycle was stopped before it ended on its own.
    completed: bool,
}

/// Presence registry fed by UDP discovery.
///
/// Cheaply cloneable; clones share state. Background work only runs
/// between a `start_*` call and [`stop`](Self::stop).
#[derive(Clone)]
pub struct DiscoveryRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    config: DiscoveryConfig,
    clock: Arc<dyn Clock>,
    /// Keyed by lowercased UUID.
    presence: DashMap<String, PresenceEntry>,
    listeners: RwLock<Vec<Arc<dyn DiscoveryListener>>>,
    event_tx: broadcast::Sender<DiscoveryEvent>,
    task: Mutex<Option<ScanTask>>,
}

impl DiscoveryRegistry {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a registry that judges staleness with `clock`.
    pub fn with_clock(config: DiscoveryConfig, clock: Arc<dyn Clock>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            inner: Arc::new(RegistryInner {
                config,
                clock,
                presence: DashMap::new(),
                listeners: RwLock::new(Vec::new()),
                event_tx,
                task: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.inner.config
    }

    // ── Listeners ────────────────────────────────────────────────────

    pub fn add_listener(&self, listener: Arc<dyn DiscoveryListener>) {
        self.inner
            .listeners
            .write()
            .expect("listener lock poisoned")
            .push(listener);
    }

    /// Remove a listener previously added. Returns `false` if unknown.
    pub fn remove_listener(&self, listener: &Arc<dyn DiscoveryListener>) -> bool {
        let mut listeners = self.inner.listeners.write().expect("listener lock poisoned");
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    /// Subscribe to the event broadcast stream.
    pub fn events(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.inner.event_tx.subscribe()
    }

    // ── Presence ─────────────────────────────────────────────────────

    /// `true` if the device announced itself within the staleness window.
    pub fn is_online(&self, uuid: &str) -> bool {
        self.inner.fresh_entry(uuid).is_some()
    }

    /// The last announcement of a device, if still fresh.
    pub fn get_device(&self, uuid: &str) -> Option<DeviceDescriptor> {
        self.inner.fresh_entry(uuid).map(|e| e.device)
    }

    /// Every fresh observation, sorted by UUID. Stale ones are evicted.
    pub fn devices(&self) -> Vec<PresenceEntry> {
        let inner = &self.inner;
        let now = inner.clock.now();
        inner.presence.retain(|_, e| !inner.is_stale(e, now));

        let mut entries: Vec<_> = inner.presence.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| a.device.uuid.cmp(&b.device.uuid));
        entries
    }

    /// Feed one received datagram through the registry as if it arrived
    /// on the discovery socket. Returns the accepted device.
    pub fn accept_datagram(&self, datagram: &[u8]) -> Option<DeviceDescriptor> {
        self.inner.accept(datagram)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start an active scan in the background.
    ///
    /// Returns `false` if a discovery task is already running; the call is
    /// then coalesced into it. Must be called within a tokio runtime.
    pub fn start_scan(&self) -> bool {
        self.start(ScanMode::Active)
    }

    /// Start background discovery, one cycle per refresh interval.
    ///
    /// Returns `false` if a discovery task is already running.
    pub fn start_background(&self) -> bool {
        self.start(ScanMode::Background)
    }

    /// Run an active scan to completion and return the fresh devices.
    ///
    /// Joins a discovery that is already running instead of starting a
    /// second one. The joined task may have sent its last event before we
    /// subscribed, so its exit also ends the wait.
    pub async fn scan(&self) -> Result<Vec<DeviceDescriptor>, CoreError> {
        let mut events = self.events();
        self.start_scan();

        let done = self
            .inner
            .task
            .lock()
            .expect("task lock poisoned")
            .as_ref()
            .map(|t| t.done.clone());
        // Stopped between start and here.
        let Some(done) = done else {
            return Ok(self.devices().into_iter().map(|e| e.device).collect());
        };

        loop {
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Ok(DiscoveryEvent::Finished {
                        error: Some(message),
                        ..
                    }) => return Err(CoreError::Discovery { message }),
                    Ok(DiscoveryEvent::Finished { .. })
                    | Err(broadcast::error::RecvError::Closed) => break,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                },
                () = done.cancelled() => break,
            }
        }

        Ok(self.devices().into_iter().map(|e| e.device).collect())
    }

    /// `true` while a discovery task is running.
    pub fn is_running(&self) -> bool {
        self.inner
            .task
            .lock()
            .expect("task lock poisoned")
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    /// Stop the running discovery and wait for it to wind down.
    ///
    /// The socket is closed with the task. Calling this with nothing
    /// running is a no-op.
    pub async fn stop(&self) {
        let task = self.inner.task.lock().expect("task lock poisoned").take();
        let Some(task) = task else {
            return;
        };

        task.cancel.cancel();
        if let Err(e) = task.handle.await {
            warn!(error = %e, "discovery task ended abnormally");
        }
        debug!(mode = ?task.mode, "discovery stopped");
    }

    fn start(&self, mode: ScanMode) -> bool {
        let mut slot = self.inner.task.lock().expect("task lock poisoned");
        if slot.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            debug!(requested = ?mode, "discovery already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let done = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let token = cancel.clone();
        let exit_guard = done.clone().drop_guard();
        let handle = tokio::spawn(async move {
            let _exit = exit_guard;
            match mode {
                ScanMode::Active => {
                    let deadline = Instant::now() + inner.config.scan_timeout;
                    inner.run_cycle(&token, mode, deadline).await;
                }
                ScanMode::Background => background_task(inner, token).await,
            }
        });

        info!(?mode, "discovery started");
        *slot = Some(ScanTask {
            mode,
            cancel,
            done,
            handle,
        });
        true
    }
}

async fn background_task(inner: Arc<RegistryInner>, cancel: CancellationToken) {
    let interval = inner.config.refresh_interval;

    loop {
        let deadline = Instant::now() + interval;
        inner.run_cycle(&cancel, ScanMode::Background, deadline).await;

        // A failed cycle returns early; wait out the rest of the interval.
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep_until(deadline) => {}
        }
    }
}

impl RegistryInner {
    fn is_stale(&self, entry: &PresenceEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.last_seen) > self.config.staleness
    }

    fn fresh_entry(&self, uuid: &str) -> Option<PresenceEntry> {
        let key = uuid.trim().to_lowercase();
        let now = self.clock.now();
        let entry = self.presence.get(&key).map(|e| e.value().clone())?;

        if self.is_stale(&entry, now) {
            self.presence.remove_if(&key, |_, e| self.is_stale(e, now));
            debug!(uuid = %entry.device.uuid, "presence expired");
            return None;
        }
        Some(entry)
    }

    // ── Cycle ────────────────────────────────────────────────────────

    async fn run_cycle(&self, cancel: &CancellationToken, mode: ScanMode, deadline: Instant) {
        self.notify(|l| l.discovery_started());
        let _ = self.event_tx.send(DiscoveryEvent::Started);

        let (found, error) = match self.listen(cancel, mode, deadline).await {
            Ok(listened) => {
                if listened.completed && mode == ScanMode::Active {
                    self.reconcile(&listened.seen);
                }
                (listened.seen.len(), None)
            }
            Err(e) => {
                warn!(error = %e, "discovery cycle failed");
                (0, Some(e.to_string()))
            }
        };

        debug!(?mode, found, "discovery cycle finished");
        self.notify(|l| l.discovery_finished());
        let _ = self.event_tx.send(DiscoveryEvent::Finished { found, error });
    }

    async fn listen(
        &self,
        cancel: &CancellationToken,
        mode: ScanMode,
        deadline: Instant,
    ) -> Result<Listened, zmote_api::Error> {
        let socket = DiscoverySocket::open(self.config.endpoint)?;
        socket.send_request().await?;

        let mut seen = HashSet::new();
        let mut buf = [0u8; MAX_DATAGRAM];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Listened {
                    seen,
                    completed: true,
                });
            }
            let wait = match mode {
                ScanMode::Active => remaining.min(self.config.receive_timeout),
                ScanMode::Background => remaining,
            };

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Ok(Listened { seen, completed: false });
                }
                received = tokio::time::timeout(wait, socket.recv(&mut buf)) => match received {
                    Err(_) => {
                        trace!(?wait, "discovery receive timed out");
                        if mode == ScanMode::Active {
                            return Ok(Listened { seen, completed: true });
                        }
                    }
                    Ok(Ok((len, from))) => {
                        trace!(%from, len, "discovery datagram");
                        if let Some(device) = self.accept(&buf[..len]) {
                            seen.insert(device.uuid.to_lowercase());
                        }
                    }
                    Ok(Err(e)) => return Err(e),
                },
            }
        }
    }

    /// Drop devices that did not answer a completed active scan.
    fn reconcile(&self, seen: &HashSet<String>) {
        self.presence.retain(|key, entry| {
            let keep = seen.contains(key);
            if !keep {
                info!(uuid = %entry.device.uuid, "device did not answer, removing");
            }
            keep
        });
    }

    // ── Announcements ────────────────────────────────────────────────

    fn accept(&self, datagram: &[u8]) -> Option<DeviceDescriptor> {
        let announcement = Announcement::from_datagram(datagram)?;
        let device = DeviceDescriptor::from_announcement(announcement)?;

        let entry = PresenceEntry {
            device: device.clone(),
            last_seen: self.clock.now(),
            last_seen_at: chrono::Utc::now(),
        };
        let previous = self.presence.insert(device.uuid.to_lowercase(), entry);

        match previous {
            Some(prev) if prev.device == device => debug!(uuid = %device.uuid, "device still present"),
            Some(_) => info!(%device, "device changed"),
            None => info!(%device, "device discovered"),
        }

        self.notify(|l| l.device_discovered(&device));
        let _ = self.event_tx.send(DiscoveryEvent::DeviceDiscovered {
            device: device.clone(),
        });
        Some(device)
    }

    /// Call every listener in registration order. A panicking listener is
    /// logged and the rest still run.
    fn notify(&self, call: impl Fn(&dyn DiscoveryListener)) {
        let listeners = self.listeners.read().expect("listener lock poisoned").clone();

        for listener in &listeners {
            if catch_unwind(AssertUnwindSafe(|| call(listener.as_ref()))).is_err() {
                warn!("discovery listener panicked");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use super::*;
    use crate::discovery::clock::manual::ManualClock;

    fn beacon(uuid: &str, url: &str) -> Vec<u8> {
        format!(
            "AMXB<-UUID={uuid}><-Make=zmote.io><-Model=ZV-2><-Revision=2.1.4>\
             <-Config-URL={url}><-Type=ZMT2>"
        )
        .into_bytes()
    }

    struct Panicking;

    impl DiscoveryListener for Panicking {
        fn device_discovered(&self, _: &DeviceDescriptor) {
            panic!("listener bug");
        }
    }

    fn registry() -> (DiscoveryRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let registry = DiscoveryRegistry::with_clock(DiscoveryConfig::default(), clock.clone());
        (registry, clock)
    }

    #[tokio::test]
    async fn accepts_zmote_announcements_only() {
        let (registry, _) = registry();

        assert!(registry.accept_datagram(&beacon("CI001", "http://10.0.0.5")).is_some());
        assert!(registry.accept_datagram(b"AMXB<-Make=AMX><-Type=NX><-UUID=x>").is_none());
        assert!(registry.accept_datagram(&beacon("AB001", "http://10.0.0.8")).is_none());
        assert!(registry.accept_datagram(b"garbage").is_none());

        assert!(registry.is_online("CI001"));
        assert!(registry.is_online("ci001"));
        assert!(!registry.is_online("CI002"));
    }

    #[tokio::test]
    async fn stale_devices_are_evicted_lazily() {
        let (registry, clock) = registry();
        registry.accept_datagram(&beacon("CI001", "http://10.0.0.5"));

        clock.advance(Duration::from_secs(60));
        assert!(registry.is_online("CI001"), "exactly 60s old is still fresh");

        clock.advance(Duration::from_secs(1));
        assert!(registry.get_device("CI001").is_none());
        assert!(registry.devices().is_empty());

        // A fresh announcement brings it back, with its new address.
        registry.accept_datagram(&beacon("CI001", "http://10.0.0.7"));
        assert!(registry.is_online("CI001"));
        assert_eq!(registry.get_device("CI001").unwrap().url, "http://10.0.0.7");
    }

    #[tokio::test]
    async fn scan_joining_a_silent_task_returns_when_it_exits() {
        let (registry, _) = registry();

        // A task that already sent its last event but has not exited yet.
        let done = CancellationToken::new();
        let exit_guard = done.clone().drop_guard();
        let (release, released) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _exit = exit_guard;
            let _ = released.await;
        });
        *registry.inner.task.lock().unwrap() = Some(ScanTask {
            mode: ScanMode::Active,
            cancel: CancellationToken::new(),
            done,
            handle,
        });

        let scan = tokio::spawn({
            let registry = registry.clone();
            async move { registry.scan().await }
        });
        tokio::task::yield_now().await;
        assert!(!scan.is_finished());

        release.send(()).unwrap();
        let devices = tokio::time::timeout(Duration::from_secs(1), scan)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(devices.is_empty());
    }

    #[tokio::test]
    async fn reannouncement_refreshes_presence_and_url() {
        let (registry, clock) = registry();
        registry.accept_datagram(&beacon("CI001", "http://10.0.0.5"));
        clock.advance(Duration::from_secs(45));
        registry.accept_datagram(&beacon("CI001", "http://10.0.0.6"));
        clock.advance(Duration::from_secs(45));

        let device = registry.get_device("CI001").unwrap();
        assert_eq!(device.url, "http://10.0.0.6");
    }

    #[tokio::test]
    async fn listeners_run_in_order_and_survive_panics() {
        let (registry, _) = registry();
        let calls = Arc::new(StdMutex::new(Vec::new()));

        let first = Arc::clone(&calls);
        registry.add_listener(Arc::new(move |d: &DeviceDescriptor| {
            first.lock().unwrap().push(format!("first:{}", d.uuid));
        }));
        registry.add_listener(Arc::new(Panicking));
        let third = Arc::clone(&calls);
        registry.add_listener(Arc::new(move |d: &DeviceDescriptor| {
            third.lock().unwrap().push(format!("third:{}", d.uuid));
        }));

        registry.accept_datagram(&beacon("CI001", "http://10.0.0.5"));

        assert_eq!(*calls.lock().unwrap(), ["first:CI001", "third:CI001"]);
    }

    #[tokio::test]
    async fn removed_listener_is_not_called() {
        let (registry, _) = registry();
        let calls = Arc::new(StdMutex::new(0));

        let counter = Arc::clone(&calls);
        let listener: Arc<dyn DiscoveryListener> = Arc::new(move |_: &DeviceDescriptor| {
            *counter.lock().unwrap() += 1;
        });
        registry.add_listener(Arc::clone(&listener));
        assert!(registry.remove_listener(&listener));
        assert!(!registry.remove_listener(&listener));

        registry.accept_datagram(&beacon("CI001", "http://10.0.0.5"));
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn events_are_broadcast() {
        let (registry, _) = registry();
        let mut events = registry.events();

        registry.accept_datagram(&beacon("CI001", "http://10.0.0.5"));

        match events.recv().await.unwrap() {
            DiscoveryEvent::DeviceDiscovered { device } => assert_eq!(device.uuid, "CI001"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn reconcile_drops_silent_devices() {
        let (registry, _) = registry();
        registry.accept_datagram(&beacon("CI001", "http://10.0.0.5"));
        registry.accept_datagram(&beacon("CI002", "http://10.0.0.6"));

        registry.inner.reconcile(&HashSet::from(["ci002".to_owned()]));

        assert!(!registry.is_online("CI001"));
        assert!(registry.is_online("CI002"));
    }

    #[tokio::test]
    async fn stop_without_task_is_a_noop() {
        let (registry, _) = registry();
        registry.stop().await;
        registry.stop().await;
        assert!(!registry.is_running());
    }
}
