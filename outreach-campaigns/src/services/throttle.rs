//! Inter-send pacing
//!
//! One throttle is shared by every send the service performs, so two batches
//! running at once still respect the provider's pacing between them.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Enforces a minimum interval between consecutive sends
pub struct SendThrottle {
    last_send: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl SendThrottle {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            last_send: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a send is allowed, then claim the slot
    pub async fn wait(&self) {
        let mut last = self.last_send.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Send throttle: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}
