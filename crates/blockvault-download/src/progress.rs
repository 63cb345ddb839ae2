//! Progress reporting helpers.

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Callback invoked with signed byte deltas.
///
/// Deltas are positive as bytes arrive and may go negative to compensate for
/// a failed partial attempt; the net sum at success equals the total
/// ciphertext bytes transferred.
pub type ProgressCallback = Arc<dyn Fn(i64) + Send + Sync>;

/// Rate-limiter for progress updates.
///
/// UI consumers subscribing to byte-level deltas can use this to avoid
/// re-rendering on every network chunk.
pub struct ProgressThrottle {
    last_emit: Option<Instant>,
    min_interval: Duration,
    pending: i64,
}

impl ProgressThrottle {
    /// Create a new throttle with the specified minimum interval.
    #[must_use]
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            last_emit: None,
            min_interval,
            pending: 0,
        }
    }

    /// Create a throttle with a default interval of 100ms.
    #[must_use]
    pub const fn default_interval() -> Self {
        Self::new(Duration::from_millis(100))
    }

    /// Accumulate a delta; returns the folded total when enough time has
    /// passed to emit, `None` otherwise.
    pub fn record(&mut self, delta: i64) -> Option<i64> {
        self.pending += delta;
        let now = Instant::now();
        match self.last_emit {
            Some(last) if now.duration_since(last) < self.min_interval => None,
            _ => {
                self.last_emit = Some(now);
                Some(std::mem::take(&mut self.pending))
            }
        }
    }

    /// Drain whatever is pending regardless of the interval.
    pub fn flush(&mut self) -> Option<i64> {
        self.last_emit = None;
        let pending = std::mem::take(&mut self.pending);
        (pending != 0).then_some(pending)
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::default_interval()
    }
}
