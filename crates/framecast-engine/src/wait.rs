//! How idle worker loops wait for more work.

use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

/// Scheduling policy for the swap, encoder and tick loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum WaitStrategy {
    /// Yield the processor and re-check immediately. Lowest latency, one
    /// busy core per loop.
    #[default]
    Spin,

    /// Sleep until notified, re-checking at least every `timeout_ms`.
    Block { timeout_ms: u64 },
}

/// Epoch counter that loops wait on and producers bump.
///
/// Loops read [`Wakeup::epoch`] before checking for work and pass it to
/// [`Wakeup::wait`], so a notification between the check and the wait is
/// never lost.
#[derive(Debug)]
pub struct Wakeup {
    strategy: WaitStrategy,
    epoch: Mutex<u64>,
    cond: Condvar,
}

impl Wakeup {
    pub fn new(strategy: WaitStrategy) -> Self {
        Self {
            strategy,
            epoch: Mutex::new(0),
            cond: Condvar::new(),
        }
    }

    pub fn strategy(&self) -> WaitStrategy {
        self.strategy
    }

    pub fn epoch(&self) -> u64 {
        *self.epoch.lock()
    }

    /// Signal that new work may be available.
    pub fn notify(&self) {
        if let WaitStrategy::Spin = self.strategy {
            return;
        }
        *self.epoch.lock() += 1;
        self.cond.notify_all();
    }

    /// Wait for a notification newer than `seen`.
    pub fn wait(&self, seen: u64) {
        match self.strategy {
            WaitStrategy::Spin => thread::yield_now(),
            WaitStrategy::Block { timeout_ms } => {
                let mut epoch = self.epoch.lock();
                if *epoch == seen {
                    self.cond
                        .wait_for(&mut epoch, Duration::from_millis(timeout_ms.max(1)));
                }
            }
        }
    }
}
