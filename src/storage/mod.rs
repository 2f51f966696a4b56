//! Storage Module
//!
//! Hand-off from the memtable to table files.
//!
//! ## Responsibilities
//! - Drive a sorted internal-key iterator into a table sink (`build_table`)
//! - Record file metadata (number, size, smallest/largest internal key)
//! - Optionally write a human-readable dump next to each table
//! - Remove partial output on any failure
//!
//! The table format itself lives behind `TableStore` / `TableSink`.
//! `FileTableStore` is a small self-checking format good enough to exercise
//! the driver; it is write-only, there is no read path.
//!
//! ## File Format (`FileTableStore`)
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Header (14 bytes)                                        │
//! │   Magic: "PRKV" (4) | Version: u16 (2) | Count: u64 (8)  │
//! ├──────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                    │
//! │   [KeyLen: u32][ValLen: u32][InternalKey][Value]         │
//! │   ... repeated for each entry ...                        │
//! ├──────────────────────────────────────────────────────────┤
//! │ Summary (bincode TableSummary, variable)                 │
//! ├──────────────────────────────────────────────────────────┤
//! │ SummaryLen: u32 (4)                                      │
//! └──────────────────────────────────────────────────────────┘
//! ```

mod builder;
mod file_store;

use std::path::PathBuf;

use crate::error::Result;
use crate::keys::InternalKey;

pub use builder::build_table;
pub use file_store::{FileTableSink, FileTableStore, TableSummary};

/// Streaming writer for one table
pub trait TableSink {
    /// Append an entry. Keys arrive in internal-key order.
    fn add(&mut self, internal_key: &[u8], value: &[u8]) -> Result<()>;

    /// Complete and persist the table, returning its size in bytes
    fn finish(&mut self) -> Result<u64>;
}

/// Creates, checks and deletes numbered tables
pub trait TableStore {
    type Sink: TableSink;

    fn create(&self, number: u64) -> Result<Self::Sink>;

    /// Delete table `number`; a missing table is not an error
    fn remove(&self, number: u64) -> Result<()>;

    /// Confirm a finished table of `file_size` bytes is usable
    fn verify(&self, number: u64, file_size: u64) -> Result<()>;

    /// Where the plaintext dump of table `number` goes
    fn dump_path(&self, number: u64) -> PathBuf;
}

/// Metadata describing a built table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetaData {
    pub number: u64,
    /// 0 when nothing was written
    pub file_size: u64,
    pub smallest: InternalKey,
    pub largest: InternalKey,
}

impl FileMetaData {
    pub fn new(number: u64) -> Self {
        Self {
            number,
            file_size: 0,
            smallest: InternalKey::default(),
            largest: InternalKey::default(),
        }
    }
}
