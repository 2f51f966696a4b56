//! Engine Module
//!
//! Write path and read entry points over a single memtable.
//!
//! ## Responsibilities
//! - Assign sequence numbers to writes
//! - Route namespaced and indexed writes into the shared keyspace
//! - Hand out snapshots and snapshot-bound iterators
//! - Build tables from the memtable on request

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::config::Config;
use crate::error::{PrismError, Result};
use crate::iterator::DbIterator;
use crate::keys::{LookupKey, SequenceNumber, ValueType, MAX_SEQUENCE_NUMBER};
use crate::memtable::{MemTable, MemTableEntry, MemTableIterator};
use crate::partition::{
    index_entry_key, strip_padding, zero_pad, IndexHit, Namespace, NumericIndexIterator,
    PartitionIterator, INDEX_NAMESPACE, RECORD_NAMESPACE,
};
use crate::storage::{build_table, FileMetaData, FileTableStore, TableStore};

/// User view of the memtable at some sequence
pub type EngineIterator = DbIterator<MemTableIterator>;

/// A consistent read point: sees exactly the writes made before it was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Snapshot {
    sequence: SequenceNumber,
}

impl Snapshot {
    pub fn sequence(&self) -> SequenceNumber {
        self.sequence
    }
}

/// Options for reads; without a snapshot, reads see the latest write
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    pub snapshot: Option<Snapshot>,
}

impl ReadOptions {
    pub fn at(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Some(snapshot),
        }
    }
}

/// The storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** are serialized by `write_lock`. Each entry takes the next
///   sequence number, is inserted into the memtable, and only then is
///   `last_sequence` advanced.
/// - **Reads** never lock. They pick a sequence (a snapshot or the current
///   `last_sequence`) and ignore every entry above it, so a reader never
///   observes a write that has not been fully inserted.
pub struct Engine {
    config: Config,

    /// Skip-list memtable holding every write
    mem: MemTable,

    /// Sequence of the newest fully inserted entry
    last_sequence: AtomicU64,

    /// Next number handed to `build_table`
    next_table_number: AtomicU64,

    /// Serializes write operations
    write_lock: Mutex<()>,
}

impl Engine {
    /// Create an engine with the given config
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        info!(
            data_dir = %config.data_dir.display(),
            write_buffer_size = config.write_buffer_size,
            accelerator = config.point_lookup_accelerator,
            "Opening engine"
        );

        Ok(Self {
            mem: MemTable::with_accelerator(config.point_lookup_accelerator),
            config,
            last_sequence: AtomicU64::new(0),
            next_table_number: AtomicU64::new(1),
            write_lock: Mutex::new(()),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    // =========================================================================
    // Plain Writes
    // =========================================================================

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.apply(ValueType::Value, key, value)?;
        Ok(())
    }

    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.apply(ValueType::Deletion, key, &[])?;
        Ok(())
    }

    /// Write one entry at the next sequence. Caller holds `write_lock`.
    fn apply(&self, value_type: ValueType, key: &[u8], value: &[u8]) -> Result<SequenceNumber> {
        let sequence = self.last_sequence.load(Ordering::Relaxed) + 1;
        if sequence > MAX_SEQUENCE_NUMBER {
            return Err(PrismError::Storage(
                "sequence numbers exhausted".to_string(),
            ));
        }

        self.mem.add(sequence, value_type, key, value);
        // Publish only after the entry is reachable
        self.last_sequence.store(sequence, Ordering::Release);

        trace!(sequence, ?value_type, key_len = key.len(), "Applied write");
        if self.mem.should_flush(self.config.write_buffer_size) {
            debug!(
                memory_usage = self.mem.approximate_memory_usage(),
                limit = self.config.write_buffer_size,
                "Memtable over write buffer size"
            );
        }
        Ok(sequence)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current read point
    pub fn snapshot(&self) -> Snapshot {
        let sequence = self.last_sequence.load(Ordering::Acquire);
        debug!(sequence, "Created snapshot");
        Snapshot { sequence }
    }

    fn read_sequence(&self, options: &ReadOptions) -> SequenceNumber {
        match options.snapshot {
            Some(snapshot) => snapshot.sequence,
            None => self.last_sequence.load(Ordering::Acquire),
        }
    }

    /// Value of `key` as of the read point, `None` if absent or deleted
    pub fn get(&self, options: &ReadOptions, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let lookup = LookupKey::new(key, self.read_sequence(options));
        Ok(match self.mem.get(&lookup)? {
            Some(MemTableEntry::Value(value)) => Some(value),
            Some(MemTableEntry::Tombstone) | None => None,
        })
    }

    /// Ordered iterator over every live user key
    pub fn iter(&self, options: &ReadOptions) -> EngineIterator {
        DbIterator::new(self.mem.iter(), self.read_sequence(options))
    }

    // =========================================================================
    // Namespaces
    // =========================================================================

    pub fn put_cf(&self, namespace: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.put(&Namespace::new(namespace).qualify(key), value)
    }

    pub fn delete_cf(&self, namespace: &str, key: &[u8]) -> Result<()> {
        self.delete(&Namespace::new(namespace).qualify(key))
    }

    pub fn get_cf(
        &self,
        options: &ReadOptions,
        namespace: &str,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        self.get(options, &Namespace::new(namespace).qualify(key))
    }

    /// Iterator over one namespace; keys come back without the prefix
    pub fn partition_iter(
        &self,
        options: &ReadOptions,
        namespace: &str,
    ) -> PartitionIterator<EngineIterator> {
        PartitionIterator::new(self.iter(options), Namespace::new(namespace))
    }

    // =========================================================================
    // Numeric Index
    // =========================================================================

    /// Write `key -> value` under `Record` and the derived entry under
    /// `Index`. Both must be unsigned integers of at most `NUMERIC_WIDTH`
    /// digits. A previous, different value of `key` has its index entry
    /// tombstoned.
    pub fn put_with_index(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let padded_key = zero_pad(key)?;
        let padded_value = zero_pad(value)?;
        let record = Namespace::new(RECORD_NAMESPACE);
        let index = Namespace::new(INDEX_NAMESPACE);

        let _write_guard = self.write_lock.lock();

        if let Some(old) = self.current_record(&record, &padded_key)? {
            if old != padded_value {
                debug!(key = ?padded_key, "Retiring stale index entry");
                self.apply(
                    ValueType::Deletion,
                    &index.qualify(&index_entry_key(&old, &padded_key)),
                    &[],
                )?;
            }
        }

        self.apply(ValueType::Value, &record.qualify(&padded_key), &padded_value)?;
        self.apply(
            ValueType::Value,
            &index.qualify(&index_entry_key(&padded_value, &padded_key)),
            &padded_key,
        )?;
        Ok(())
    }

    /// Tombstone the `Record` entry of `key` and its index entry
    pub fn delete_with_index(&self, key: &[u8]) -> Result<()> {
        let padded_key = zero_pad(key)?;
        let record = Namespace::new(RECORD_NAMESPACE);
        let index = Namespace::new(INDEX_NAMESPACE);

        let _write_guard = self.write_lock.lock();

        if let Some(old) = self.current_record(&record, &padded_key)? {
            debug!(key = ?padded_key, "Removing index entry");
            self.apply(
                ValueType::Deletion,
                &index.qualify(&index_entry_key(&old, &padded_key)),
                &[],
            )?;
        }
        self.apply(ValueType::Deletion, &record.qualify(&padded_key), &[])?;
        Ok(())
    }

    /// Latest padded value of a record. Caller holds `write_lock`.
    fn current_record(&self, record: &Namespace, padded_key: &[u8]) -> Result<Option<Vec<u8>>> {
        let lookup = LookupKey::new(
            &record.qualify(padded_key),
            self.last_sequence.load(Ordering::Relaxed),
        );
        Ok(match self.mem.get(&lookup)? {
            Some(MemTableEntry::Value(value)) => Some(value),
            _ => None,
        })
    }

    /// Unpadded value of an indexed record
    pub fn get_with_index(&self, options: &ReadOptions, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let padded_key = zero_pad(key)?;
        let value = self.get_cf(options, RECORD_NAMESPACE, &padded_key)?;
        Ok(value.map(|v| strip_padding(&v).to_vec()))
    }

    /// Iterator over the index in value order
    pub fn index_iter(&self, options: &ReadOptions) -> NumericIndexIterator<EngineIterator> {
        NumericIndexIterator::new(self.iter(options))
    }

    /// Every indexed record with `lo <= value <= hi`, in value order
    pub fn scan_index(&self, options: &ReadOptions, lo: &[u8], hi: &[u8]) -> Result<Vec<IndexHit>> {
        self.index_iter(options).collect_range(lo, hi)
    }

    // =========================================================================
    // Table Building
    // =========================================================================

    /// Write the whole memtable to a new table in `store`.
    ///
    /// The memtable is left in place. Dumps follow `Config::dump_tables`.
    pub fn build_table<S: TableStore>(&self, store: &S) -> Result<FileMetaData> {
        let number = self.next_table_number.fetch_add(1, Ordering::Relaxed);
        let mut iter = self.mem.iter();
        build_table(store, &mut iter, number, self.config.dump_tables)
    }

    /// File store rooted at `data_dir`
    pub fn table_store(&self) -> Result<FileTableStore> {
        FileTableStore::open(&self.config.data_dir)
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn last_sequence(&self) -> SequenceNumber {
        self.last_sequence.load(Ordering::Acquire)
    }

    /// Entries in the memtable, every version and tombstone included
    pub fn memtable_entry_count(&self) -> usize {
        self.mem.entry_count()
    }

    pub fn memory_usage(&self) -> usize {
        self.mem.approximate_memory_usage()
    }

    /// True once the memtable has reached `write_buffer_size`
    pub fn should_flush(&self) -> bool {
        self.mem.should_flush(self.config.write_buffer_size)
    }

    /// Distinct user keys tracked by the point lookup accelerator
    pub fn accelerated_keys(&self) -> usize {
        self.mem.accelerated_keys()
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
