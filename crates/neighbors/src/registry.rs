//! Snapshot registry of BGP neighbors.

use crate::types::{NeighborEntry, NeighborStatus};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Point-in-time table of routing peers
///
/// The table is only ever swapped whole. Readers take a clone of the current
/// `Arc` and keep a stable view no matter how many refreshes follow.
#[derive(Debug)]
pub struct NeighborRegistry {
    snapshot: RwLock<Arc<[NeighborEntry]>>,
}

impl Default for NeighborRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NeighborRegistry {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::from(Vec::new())),
        }
    }

    /// Current table; later refreshes do not affect the returned view
    pub fn snapshot(&self) -> Arc<[NeighborEntry]> {
        // A poisoned lock still guards a complete snapshot
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the whole table; duplicates keep their last occurrence
    pub fn replace(&self, entries: impl IntoIterator<Item = NeighborEntry>) {
        let mut position: HashMap<IpAddr, usize> = HashMap::new();
        let mut table: Vec<NeighborEntry> = Vec::new();

        for entry in entries {
            match position.get(&entry.address) {
                Some(&idx) => table[idx] = entry,
                None => {
                    position.insert(entry.address, table.len());
                    table.push(entry);
                }
            }
        }

        let table: Arc<[NeighborEntry]> = Arc::from(table);
        debug!(neighbors = table.len(), "Neighbor table replaced");

        match self.snapshot.write() {
            Ok(mut guard) => *guard = table,
            Err(poisoned) => *poisoned.into_inner() = table,
        }
    }

    pub fn lookup(&self, address: IpAddr) -> Option<NeighborEntry> {
        self.snapshot()
            .iter()
            .find(|entry| entry.address == address)
            .cloned()
    }

    /// Rows for the BGP neighbor status listing
    pub fn status_listing(&self) -> Vec<NeighborStatus> {
        self.snapshot().iter().map(NeighborStatus::from).collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
