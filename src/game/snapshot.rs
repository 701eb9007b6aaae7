//! Periodic full-state snapshot scheduling

use std::time::{Duration, Instant};

use crate::ws::protocol::ServerMsg;

use super::state::ArenaState;
use super::Outbound;

/// Decides when a full `arena_state` broadcast is due.
///
/// Driven by wall-clock time rather than tick count, so a slow tick loop still heals
/// clients on schedule.
pub struct SnapshotTimer {
    interval: Duration,
    last_sent: Instant,
}

impl SnapshotTimer {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            last_sent: now,
        }
    }

    /// Check if a snapshot is due at `now`; resets the timer when it is.
    pub fn should_send(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_sent) >= self.interval {
            self.last_sent = now;
            true
        } else {
            false
        }
    }

    /// Build the snapshot message for every connection
    pub fn build(state: &ArenaState) -> Outbound {
        Outbound::all(ServerMsg::ArenaState(state.clone()))
    }
}
