//! Single-shot hold timer for the owner loop

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Sleep};

/// At most one armed deadline, tagged with the trigger generation that
/// requested it. Cancelling drops the deadline, so it cannot fire late.
#[derive(Debug, Default)]
pub struct HoldTimer {
    armed: Option<(u64, Pin<Box<Sleep>>)>,
}

impl HoldTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm for `after`, replacing any running deadline.
    pub fn arm(&mut self, generation: u64, after: Duration) {
        let deadline = Instant::now() + after;
        self.armed = Some((generation, Box::pin(tokio::time::sleep_until(deadline))));
    }

    pub fn cancel(&mut self) {
        self.armed = None;
    }

    #[cfg(test)]
    fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Resolve with the generation once the armed deadline passes. Pending
    /// forever while disarmed.
    pub async fn fired(&mut self) -> u64 {
        match self.armed.as_mut() {
            Some((generation, sleep)) => {
                let generation = *generation;
                sleep.as_mut().await;
                self.armed = None;
                generation
            }
            None => std::future::pending().await,
        }
    }
}
