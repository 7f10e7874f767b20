//! Wall-clock source used for orphan expiration.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub type ClockFn = dyn Fn() -> Duration + Send + Sync;

/// A function wrapper supplying the current time to the orphan pool.
///
/// The pool only compares instants it obtained from the same clock, so
/// monotonicity is not required; a backward jump merely delays the next
/// expiration sweep.
#[derive(Clone)]
pub struct Clock {
    f: Arc<ClockFn>,
}

impl Clock {
    pub fn new(f: Arc<ClockFn>) -> Self {
        Self { f }
    }

    /// Current time as a duration since the Unix epoch.
    pub fn now(&self) -> Duration {
        (self.f)()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(Arc::new(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
        }))
    }
}

impl std::fmt::Debug for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clock").finish_non_exhaustive()
    }
}
