use tokio::time::Instant;

/// Source of monotonic time for presence staleness.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// The tokio clock. Honors paused time in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
