//! Early-arrival buffering and the per-room sync state machine.
//!
//! ```text
//! Loading ──local added──▶ Bootstrapping ──preload complete──▶ Ready
//!    │                                                           ▲
//!    └──────────── local added, context already loaded ──────────┘
//! ```
//!
//! Remote snapshots are buffered in `Loading` and `Bootstrapping` and drained
//! exactly once on the way into `Ready`.

use std::collections::HashMap;

use crate::types::{PlayerSnapshot, RemoteEntityState};

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// session id → snapshot, held until the local context exists.
#[derive(Debug, Default, Clone)]
pub struct PendingSnapshotQueue {
    entries: HashMap<String, PlayerSnapshot>,
}

impl PendingSnapshotQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer `snapshot` for `key`; a later add for the same key replaces it.
    pub fn push(&mut self, key: impl Into<String>, snapshot: PlayerSnapshot) {
        self.entries.insert(key.into(), snapshot);
    }

    pub fn remove(&mut self, key: &str) -> Option<PlayerSnapshot> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&PlayerSnapshot> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take every entry, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<(String, PlayerSnapshot)> {
        self.entries.drain().collect()
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// What a bootstrap waiting on preload needs to resume.
#[derive(Debug, Clone)]
pub struct PendingBootstrap {
    pub player: RemoteEntityState,
    pub preloader: String,
}

#[derive(Debug)]
pub enum SyncState {
    /// Local entity not seen yet; remote snapshots are buffered.
    Loading { queue: PendingSnapshotQueue },
    /// Local entity seen, preload in flight; still buffering.
    Bootstrapping {
        queue: PendingSnapshotQueue,
        pending: PendingBootstrap,
    },
    /// Context built and queue drained; remote adds apply directly.
    Ready,
}

impl Default for SyncState {
    fn default() -> Self {
        SyncState::Loading {
            queue: PendingSnapshotQueue::new(),
        }
    }
}

impl SyncState {
    pub fn is_ready(&self) -> bool {
        matches!(self, SyncState::Ready)
    }

    pub fn is_bootstrapping(&self) -> bool {
        matches!(self, SyncState::Bootstrapping { .. })
    }

    /// The buffer, while one exists.
    pub fn queue(&self) -> Option<&PendingSnapshotQueue> {
        match self {
            SyncState::Loading { queue } | SyncState::Bootstrapping { queue, .. } => Some(queue),
            SyncState::Ready => None,
        }
    }

    pub fn queue_mut(&mut self) -> Option<&mut PendingSnapshotQueue> {
        match self {
            SyncState::Loading { queue } | SyncState::Bootstrapping { queue, .. } => Some(queue),
            SyncState::Ready => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SyncState::Loading { .. } => "loading",
            SyncState::Bootstrapping { .. } => "bootstrapping",
            SyncState::Ready => "ready",
        }
    }
}
