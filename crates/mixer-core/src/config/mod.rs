//! Import-group roster configuration.
//!
//! Holds the live set of [`ImportGroup`]s and their backend rosters behind
//! an `RwLock<Arc<...>>`, so readers on the hot path never block on a
//! reload swapping the whole roster out from under them — the same pattern
//! the backing store used for health/config snapshots.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::model::ImportGroup;

/// A consistent snapshot of the import-group roster: its contents, the
/// epoch identifying this generation (embedded in every cursor minted
/// against it, §6.3), and when it was loaded.
#[derive(Debug, Clone)]
pub struct RosterSnapshot {
    /// The active import groups.
    pub groups: Vec<ImportGroup>,
    /// Monotonically increasing generation counter.
    pub view_epoch: u64,
    /// When this snapshot was loaded.
    pub loaded_at: DateTime<Utc>,
}

/// The mutable, thread-safe holder for the live roster.
#[derive(Debug)]
pub struct RosterConfig {
    inner: RwLock<Arc<RosterSnapshot>>,
}

impl RosterConfig {
    /// Creates a config holding the given initial groups at epoch 0.
    pub fn new(groups: Vec<ImportGroup>) -> Self {
        Self {
            inner: RwLock::new(Arc::new(RosterSnapshot {
                groups,
                view_epoch: 0,
                loaded_at: Utc::now(),
            })),
        }
    }

    /// Returns a cheaply cloneable handle to the current snapshot.
    pub fn current(&self) -> Arc<RosterSnapshot> {
        Arc::clone(&self.inner.read())
    }

    /// Replaces the roster with `groups`, bumping `view_epoch` by one — any
    /// cursor minted against the prior epoch becomes stale (§6.3).
    pub fn reload(&self, groups: Vec<ImportGroup>) {
        let previous_epoch = self.inner.read().view_epoch;
        let mut guard = self.inner.write();
        *guard = Arc::new(RosterSnapshot {
            groups,
            view_epoch: previous_epoch + 1,
            loaded_at: Utc::now(),
        });
    }
}
