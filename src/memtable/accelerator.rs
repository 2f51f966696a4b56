//! Point lookup accelerator
//!
//! Hash index from a key's group (for memtables: the user key) to the first
//! skip list node of that group. Seeks for a known group start there and
//! walk level 0 instead of descending the towers.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::skiplist::NodePtr;

/// Map from group key to the node that currently starts the group.
///
/// Updated only on the (serialized) insert path; readers take a short
/// shared lock to fetch a starting node and then traverse lock-free.
pub struct PointLookupAccelerator {
    starts: RwLock<HashMap<Vec<u8>, NodePtr>>,
}

impl PointLookupAccelerator {
    pub(crate) fn new() -> Self {
        Self {
            starts: RwLock::new(HashMap::new()),
        }
    }

    /// `node` now starts `group`. Called after `node` is linked into level 0.
    pub(crate) fn record(&self, group: &[u8], node: NodePtr) {
        let mut starts = self.starts.write();
        match starts.get_mut(group) {
            Some(slot) => *slot = node,
            None => {
                starts.insert(group.to_vec(), node);
            }
        }
    }

    pub(crate) fn candidate(&self, group: &[u8]) -> Option<NodePtr> {
        self.starts.read().get(group).copied()
    }

    /// Number of distinct groups indexed
    pub fn len(&self) -> usize {
        self.starts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
