//! Bounded snapshot history with rollback.
//!
//! The surrounding system hands in opaque state blobs; we keep the most
//! recent five, optionally mirrored to disk one JSON file per snapshot,
//! and can roll back to any retained id. Rollback to an unknown id is a
//! structured failure, never an error.

use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::SnapshotConfig;

/// One retained system-state snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub state: Value,
}

/// Listing entry: id and timestamp without the state payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of a rollback attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackResult {
    pub success: bool,
    pub message: String,
    pub state: Option<Value>,
}

/// FIFO-bounded store of system-state snapshots.
#[derive(Debug)]
pub struct SnapshotStore {
    snapshots: VecDeque<Snapshot>,
    next_id: u64,
    max_snapshots: usize,
    storage_dir: Option<PathBuf>,
}

impl SnapshotStore {
    pub fn new(config: &SnapshotConfig) -> Self {
        Self {
            snapshots: VecDeque::new(),
            next_id: 0,
            max_snapshots: config.max_snapshots,
            storage_dir: config.snapshot_dir.as_ref().map(PathBuf::from),
        }
    }

    /// Record a new snapshot, evicting the oldest past capacity.
    ///
    /// Ids come from a monotonic counter so they never repeat, even
    /// after eviction has started recycling history slots.
    pub fn create_snapshot(&mut self, state: Value) -> Snapshot {
        let snapshot = Snapshot {
            id: self.next_id,
            timestamp: Utc::now(),
            state,
        };
        self.next_id += 1;

        self.persist(&snapshot);
        self.snapshots.push_back(snapshot.clone());
        while self.snapshots.len() > self.max_snapshots {
            if let Some(evicted) = self.snapshots.pop_front() {
                self.remove_persisted(evicted.id);
            }
        }
        snapshot
    }

    /// Retrieve the state stored under `id`, if still retained.
    pub fn rollback_to_snapshot(&self, id: u64) -> RollbackResult {
        match self.snapshots.iter().find(|s| s.id == id) {
            Some(snapshot) => RollbackResult {
                success: true,
                message: "system rolled back successfully".to_string(),
                state: Some(snapshot.state.clone()),
            },
            None => RollbackResult {
                success: false,
                message: format!("snapshot {} not found", id),
                state: None,
            },
        }
    }

    pub fn list_snapshots(&self) -> Vec<SnapshotSummary> {
        self.snapshots
            .iter()
            .map(|s| SnapshotSummary {
                id: s.id,
                timestamp: s.timestamp,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    // Disk mirroring is best effort; an IO failure costs durability of
    // one snapshot, never the request path.
    fn persist(&self, snapshot: &Snapshot) {
        let Some(dir) = &self.storage_dir else {
            return;
        };
        if let Err(err) = fs::create_dir_all(dir) {
            error!("failed to create snapshot directory {:?}: {}", dir, err);
            return;
        }
        let path = dir.join(format!("snapshot_{}.json", snapshot.id));
        match serde_json::to_vec_pretty(snapshot) {
            Ok(bytes) => {
                if let Err(err) = fs::write(&path, bytes) {
                    error!("failed to write snapshot {:?}: {}", path, err);
                }
            }
            Err(err) => error!("failed to serialize snapshot {}: {}", snapshot.id, err),
        }
    }

    fn remove_persisted(&self, id: u64) {
        let Some(dir) = &self.storage_dir else {
            return;
        };
        let path = dir.join(format!("snapshot_{}.json", id));
        if path.exists() {
            if let Err(err) = fs::remove_file(&path) {
                error!("failed to remove evicted snapshot {:?}: {}", path, err);
            }
        }
    }
}
