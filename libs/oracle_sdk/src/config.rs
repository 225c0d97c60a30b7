//! SDK tuning knobs

use crate::poller::DEFAULT_POLL_INTERVAL;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay between finalization and the re-read in `update_price_and_wait`
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdkOptions {
    /// Period of the change poller
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Wait after finalization before reading state back
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY.as_millis() as u64
}

impl SdkOptions {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for SdkOptions {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}
