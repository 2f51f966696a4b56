//! MemTable Module
//!
//! In-memory data structure for recent writes.
//!
//! ## Responsibilities
//! - Ordered index of every mutation, keyed by internal key
//! - Single-writer / multi-reader access without reader locks
//! - Newest-visible-version point lookups at a snapshot sequence
//! - Ordered iteration for table building and user-level views
//!
//! ## Layers
//! ```text
//! MemTable ──► SkipList<MemTableKeyComparator> ──► Arena (nodes + keys)
//!                    └──► PointLookupAccelerator (optional)
//! ```

pub mod arena;
pub mod skiplist;

mod accelerator;
mod table;

pub use accelerator::PointLookupAccelerator;
pub use arena::Arena;
pub use skiplist::{SkipList, MAX_HEIGHT};
pub use table::{MemTable, MemTableIterator};

/// Result of a memtable point lookup
#[derive(Debug, Clone, PartialEq)]
pub enum MemTableEntry {
    /// A live value
    Value(Vec<u8>),

    /// A tombstone (deleted key)
    Tombstone,
}
