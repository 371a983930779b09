//! Clocks for the deferred queue.
//!
//! Deferred tasks are due at an [`Instant`] read from a [`TimeSource`].
//! An embedding host uses [`RealTimeSource`]; tests and the replay binary
//! use [`TestTimeSource`], whose logical time only moves when told to, so
//! the deferred-creation window can be crossed deterministically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of the current instant
pub trait TimeSource: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Instant;

    /// Time passed since `earlier`, zero if `earlier` is in the future
    fn elapsed_since(&self, earlier: Instant) -> Duration {
        self.now().saturating_duration_since(earlier)
    }
}

pub type SharedTimeSource = Arc<dyn TimeSource>;

/// The system monotonic clock
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTimeSource;

impl RealTimeSource {
    pub fn shared() -> SharedTimeSource {
        Arc::new(Self)
    }
}

impl TimeSource for RealTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that stands still until [`advance`](Self::advance) is called.
///
/// ```
/// use buildview::services::time_source::{TestTimeSource, TimeSource};
/// use std::time::Duration;
///
/// let clock = TestTimeSource::new();
/// let start = clock.now();
/// clock.advance(Duration::from_millis(100));
/// assert_eq!(clock.elapsed_since(start), Duration::from_millis(100));
/// ```
#[derive(Debug)]
pub struct TestTimeSource {
    origin: Instant,
    /// Logical nanoseconds since `origin`
    offset_nanos: AtomicU64,
}

impl Default for TestTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TestTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_nanos: AtomicU64::new(0),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.offset_nanos.fetch_add(nanos, Ordering::SeqCst);
    }

    /// Logical time passed since creation
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}

impl TimeSource for TestTimeSource {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }
}
