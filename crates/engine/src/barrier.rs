//! Fall completion barrier
//!
//! The cascade driver arms the barrier with the fall ids of one pass, then
//! awaits [`FallBarrier::wait_idle`]. The animation layer reports each landed
//! token through [`FallBarrier::complete`]. The driver does not rescan until
//! the outstanding count is back to zero.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::types::FallId;

#[derive(Debug)]
struct Inner {
    outstanding: Mutex<HashSet<FallId>>,
    count: watch::Sender<usize>,
}

/// Shared outstanding-fall counter; clones share state
#[derive(Debug, Clone)]
pub struct FallBarrier {
    inner: Arc<Inner>,
}

impl FallBarrier {
    pub fn new() -> Self {
        let (count, _) = watch::channel(0usize);
        Self {
            inner: Arc::new(Inner {
                outstanding: Mutex::new(HashSet::new()),
                count,
            }),
        }
    }

    fn with_outstanding<R>(&self, f: impl FnOnce(&mut HashSet<FallId>) -> R) -> R {
        let mut set = self
            .inner
            .outstanding
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let out = f(&mut set);
        self.inner.count.send_replace(set.len());
        out
    }

    /// Register falls that must complete before the next rescan.
    /// Returns the new outstanding count.
    pub fn arm(&self, falls: impl IntoIterator<Item = FallId>) -> usize {
        self.with_outstanding(|set| {
            set.extend(falls);
            set.len()
        })
    }

    /// Mark one fall as landed. Unknown or repeated ids are ignored and
    /// return false.
    pub fn complete(&self, fall: FallId) -> bool {
        self.with_outstanding(|set| set.remove(&fall))
    }

    /// Drop every outstanding fall at once, waking the driver.
    /// Returns how many were released.
    pub fn release_all(&self) -> usize {
        self.with_outstanding(|set| {
            let released = set.len();
            set.clear();
            released
        })
    }

    pub fn outstanding(&self) -> usize {
        *self.inner.count.borrow()
    }

    /// Resolve once no fall is outstanding
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.count.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Default for FallBarrier {
    fn default() -> Self {
        Self::new()
    }
}
