//! In-process human "resolved" signal

use super::{CapabilityResult, HumanSignal};
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::Notify;

/// A signal an operator fires by hand, e.g. from the terminal
///
/// Each `resolve` releases one waiting handler, oldest first. Resolving while
/// nobody waits is a no-op, so a stray keypress cannot pre-resolve a wall.
#[derive(Debug, Default)]
pub struct ManualSignal {
    notify: Notify,
    pending: Mutex<Vec<(i64, String)>>,
}

impl ManualSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases the oldest waiter; returns false if nobody was waiting
    pub fn resolve(&self) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if pending.is_empty() {
            return false;
        }
        pending.remove(0);
        self.notify.notify_one();
        true
    }

    /// Blocked URLs currently waiting for a human, oldest first
    pub fn pending(&self) -> Vec<(i64, String)> {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn forget(&self, source_id: i64, url: &str) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pos) = pending
            .iter()
            .position(|(id, u)| *id == source_id && u == url)
        {
            pending.remove(pos);
        }
    }
}

/// Drops the pending entry if the waiting future is cancelled or times out
struct PendingGuard<'a> {
    signal: &'a ManualSignal,
    source_id: i64,
    url: &'a str,
    resolved: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.signal.forget(self.source_id, self.url);
        }
    }
}

#[async_trait]
impl HumanSignal for ManualSignal {
    async fn wait_resolved(&self, source_id: i64, url: &str) -> CapabilityResult<()> {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((source_id, url.to_string()));

        let mut guard = PendingGuard {
            signal: self,
            source_id,
            url,
            resolved: false,
        };
        self.notify.notified().await;
        guard.resolved = true;
        Ok(())
    }
}
