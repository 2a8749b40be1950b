// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Per-repository exclusive lease.
//!
//! ```text
//! acquire(path)
//!    |
//!    v
//! normalize: gix work tree root -> canonicalize -> as given
//!    |
//!    v
//! slots[path] : Arc<tokio Mutex>   (FIFO, one per repository in use;
//!                                   idle slots pruned on acquire)
//!    |
//!    +-- wait == 0 --> try_lock_owned   (held --> Busy)
//!    +-- wait  > 0 --> lock_owned within wait (expired --> Busy)
//!    |
//!    v
//! RepoLease (released on drop)
//! ```
//!
//! Different repositories never contend. Requests for one repository are
//! served in arrival order.


use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, trace};

use crate::error::EngineError;
use crate::git::discover_workdir;

type Slot = Arc<AsyncMutex<()>>;

/// Registry of per-repository locks.
#[derive(Debug, Default)]
pub struct RepoMutex {
    slots: Mutex<HashMap<PathBuf, Slot>>,
    wait: Duration,
}

/// Proof of exclusive access to one repository.
///
/// Mutating components require a `&RepoLease`, so they cannot run unlocked.
#[derive(Debug)]
pub struct RepoLease {
    path: PathBuf,
    _guard: OwnedMutexGuard<()>,
}

impl RepoLease {
    /// Normalized repository path the lease covers.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RepoLease {
    fn drop(&mut self) {
        trace!(repo = %self.path.display(), "lease released");
    }
}

impl RepoMutex {
    /// `wait` bounds how long `acquire` queues; zero fails fast.
    #[must_use]
    pub fn new(wait: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            wait,
        }
    }

    /// Canonical key for `path`: the work tree root when inside a repository.
    #[must_use]
    pub fn normalize(path: &Path) -> PathBuf {
        let root = discover_workdir(path).unwrap_or_else(|| path.to_path_buf());
        root.canonicalize().unwrap_or(root)
    }

    /// Slot for `key`. Slots nobody holds or waits on are dropped first, so
    /// the registry only covers repositories in use.
    fn slot(&self, key: &Path) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        Arc::clone(slots.entry(key.to_path_buf()).or_default())
    }

    /// Takes the lease for the repository at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Busy`] if the lease is held and not released
    /// within the configured wait.
    pub async fn acquire(&self, path: &Path) -> Result<RepoLease, EngineError> {
        let key = Self::normalize(path);
        let slot = self.slot(&key);
        let busy = || EngineError::Busy {
            path: key.display().to_string(),
        };

        let guard = if self.wait.is_zero() {
            slot.try_lock_owned().map_err(|_| busy())?
        } else {
            tokio::time::timeout(self.wait, slot.lock_owned())
                .await
                .map_err(|_| busy())?
        };

        debug!(repo = %key.display(), "lease acquired");
        Ok(RepoLease {
            path: key,
            _guard: guard,
        })
    }

    /// Gives the lease back. Equivalent to dropping it.
    pub fn release(&self, lease: RepoLease) {
        drop(lease);
    }

    /// Whether some operation currently holds the repository at `path`.
    #[must_use]
    pub fn is_held(&self, path: &Path) -> bool {
        let key = Self::normalize(path);
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(&key).is_some_and(|slot| slot.try_lock().is_err())
    }
}
