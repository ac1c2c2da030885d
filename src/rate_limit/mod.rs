// Outbound call pacing for the CRM provider's rate limits.
//
// One Pacer instance is shared by every outbound REST call. Callers queue
// on the slot mutex and sleep until their reserved slot, so calls are
// serialized with a minimum inter-call interval instead of failing when
// the limiter is saturated.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Minimum-spacing scheduler gated on the monotonic clock.
pub struct Pacer {
    min_interval: Duration,
    next_slot: Mutex<Instant>,
}

impl Pacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Reserves the next call slot and waits until it arrives.
    ///
    /// The slot is claimed under the lock and the sleep happens outside it,
    /// so queued callers each get a distinct slot spaced `min_interval`
    /// apart in claim order.
    pub async fn acquire(&self) {
        let wait = {
            let mut slot = self.next_slot.lock().await;
            let now = Instant::now();
            let scheduled = (*slot).max(now);
            *slot = scheduled + self.min_interval;
            scheduled - now
        };

        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}
