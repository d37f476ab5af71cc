use std::time::{Duration, Instant};

use parking_lot::Mutex;

struct ThrottleState {
    last_emit: Option<Instant>,
    pending: bool
}

/// Coalesces player updates into at most one `players_update` per interval.
///
/// Requests only mark the snapshot dirty. The broadcaster polls and emits
/// once the interval since the previous emission has passed, so the
/// broadcast always carries the newest state and the final update of a burst
/// is never lost.
pub struct BroadcastThrottle {
    min_interval: Duration,
    state: Mutex<ThrottleState>
}

impl BroadcastThrottle {
    pub fn new(min_interval: Duration) -> BroadcastThrottle {
        BroadcastThrottle {
            min_interval,
            state: Mutex::new(ThrottleState { last_emit: None, pending: false })
        }
    }

    pub fn interval(&self) -> Duration {
        self.min_interval
    }

    pub fn request(&self) {
        self.state.lock().pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().pending
    }

    /// Returns true when the caller should broadcast now. Clears the pending
    /// flag and records `now` as the emission time.
    pub fn poll(&self, now: Instant) -> bool {
        let mut state = self.state.lock();
        if !state.pending {
            return false;
        }
        let due = match state.last_emit {
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
            None => true
        };
        if due {
            state.pending = false;
            state.last_emit = Some(now);
        }
        due
    }

    /// How long the broadcaster sleeps between polls.
    pub fn poll_period(&self) -> Duration {
        (self.min_interval / 4).max(Duration::from_millis(1))
    }
}
