//! Shared rate-limit gate
//!
//! One gate per credential. A rate limit seen by any caller blocks every
//! caller until the hinted instant; `min_interval` spaces all requests.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct GateState {
    blocked_until: Option<Instant>,
    next_slot: Option<Instant>,
}

#[derive(Debug)]
pub(crate) struct RateLimitGate {
    state: Mutex<GateState>,
    min_interval: Duration,
}

/// Token fired while waiting for the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cancelled;

impl RateLimitGate {
    pub(crate) fn new(min_interval: Duration) -> Self {
        Self {
            state: Mutex::new(GateState::default()),
            min_interval,
        }
    }

    /// Wait until a request may be sent, then claim the slot
    pub(crate) async fn acquire(&self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        loop {
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }

            let ready_at = {
                let mut state = self.state.lock();
                let now = Instant::now();
                let ready_at = [state.blocked_until, state.next_slot]
                    .into_iter()
                    .flatten()
                    .max()
                    .filter(|at| *at > now);
                if ready_at.is_none() {
                    state.blocked_until = None;
                    state.next_slot = Some(now + self.min_interval);
                }
                ready_at
            };

            let Some(ready_at) = ready_at else {
                return Ok(());
            };

            tokio::select! {
                () = cancel.cancelled() => return Err(Cancelled),
                () = sleep_until(ready_at) => {}
            }
        }
    }

    /// Hold every caller for `wait` from now, never shortening an existing block
    pub(crate) fn block_for(&self, wait: Duration) {
        let until = Instant::now() + wait;
        let mut state = self.state.lock();
        if state.blocked_until.map_or(true, |current| current < until) {
            state.blocked_until = Some(until);
        }
    }

    #[cfg(test)]
    pub(crate) fn blocked_until(&self) -> Option<Instant> {
        self.state.lock().blocked_until
    }
}
