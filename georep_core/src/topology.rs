//! Mutable primary/replica selection state.
//!
//! One `DatabaseTopology` is owned by the embedding application and passed
//! by reference to anything that needs to read it. Simulations snapshot
//! the latencies they need at run start and never read it again mid-run.

use serde::{Deserialize, Serialize};

/// The currently selected primary region and its read replicas.
///
/// Invariant: the primary id is never also present in the replica set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseTopology {
    primary: Option<String>,
    read_replicas: Vec<String>,
}

/// A point-in-time capture of a topology, used to restore it after a
/// simulated failover run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub primary: Option<String>,
    pub read_replicas: Vec<String>,
}

impl DatabaseTopology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the primary region id, if one is selected.
    pub fn primary(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    /// Returns the replica ids in insertion order.
    pub fn read_replicas(&self) -> &[String] {
        &self.read_replicas
    }

    /// Primary first, then replicas in insertion order.
    pub fn active_region_ids(&self) -> Vec<&str> {
        self.primary
            .iter()
            .map(String::as_str)
            .chain(self.read_replicas.iter().map(String::as_str))
            .collect()
    }

    /// Makes `region_id` the primary, removing it from the replica set if
    /// it was there.
    pub fn set_primary(&mut self, region_id: &str) {
        self.read_replicas.retain(|id| id != region_id);
        self.primary = Some(region_id.to_string());
    }

    /// Adds a read replica. No-op if the id is the primary or already a
    /// replica.
    pub fn add_read_replica(&mut self, region_id: &str) {
        if self.primary.as_deref() == Some(region_id) {
            return;
        }
        if self.read_replicas.iter().any(|id| id == region_id) {
            return;
        }
        self.read_replicas.push(region_id.to_string());
    }

    /// Removes a read replica if present.
    pub fn remove_read_replica(&mut self, region_id: &str) {
        self.read_replicas.retain(|id| id != region_id);
    }

    /// Cycles a region through the selection states: with no primary the
    /// region becomes primary; toggling the primary clears it; toggling an
    /// existing replica removes it; anything else joins as a replica.
    pub fn toggle_region(&mut self, region_id: &str) {
        if self.primary.is_none() {
            self.set_primary(region_id);
        } else if self.primary.as_deref() == Some(region_id) {
            self.primary = None;
        } else if self.read_replicas.iter().any(|id| id == region_id) {
            self.remove_read_replica(region_id);
        } else {
            self.add_read_replica(region_id);
        }
    }

    /// Clears the primary and all replicas.
    pub fn clear(&mut self) {
        self.primary = None;
        self.read_replicas.clear();
    }

    /// Captures the current selection.
    pub fn snapshot(&self) -> TopologySnapshot {
        TopologySnapshot {
            primary: self.primary.clone(),
            read_replicas: self.read_replicas.clone(),
        }
    }

    /// Restores a previously captured selection. Goes through the regular
    /// mutators so the primary/replica invariant holds by construction.
    pub fn restore(&mut self, snapshot: &TopologySnapshot) {
        self.clear();
        if let Some(primary) = &snapshot.primary {
            self.set_primary(primary);
        }
        for id in &snapshot.read_replicas {
            self.add_read_replica(id);
        }
    }
}
