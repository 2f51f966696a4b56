//! # PrismKV
//!
//! The in-memory write path of an LSM key-value store:
//! - Arena-backed, lock-free-read skip list memtable
//! - Multi-version internal keys with snapshot reads
//! - Optional hash accelerator for point lookups
//! - Prefix namespaces ("column families") over one keyspace
//! - Fixed-width numeric secondary index
//! - Table building with an optional plaintext dump
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Engine                              │
//! │            (Single Writer / Multi Reader, sequences)        │
//! └───────┬─────────────────────┬───────────────────┬───────────┘
//!         │ write               │ read              │ build_table
//!         ▼                     ▼                   ▼
//!  ┌─────────────┐      ┌───────────────┐    ┌─────────────┐
//!  │  MemTable   │◄─────│  DbIterator   │    │   Storage   │
//!  │ (SkipList + │      │  (snapshot)   │    │ (TableSink) │
//!  │   Arena)    │      └───────┬───────┘    └─────────────┘
//!  └─────────────┘              │
//!                       ┌───────▼───────┐
//!                       │   Partition   │
//!                       │ (namespaces,  │
//!                       │ numeric index)│
//!                       └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod keys;
pub mod memtable;
pub mod iterator;
pub mod partition;
pub mod storage;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{PrismError, Result};
pub use config::Config;
pub use engine::{Engine, ReadOptions, Snapshot};
pub use iterator::StorageIterator;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of PrismKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
