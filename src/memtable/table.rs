//! MemTable implementation
//!
//! Skip-list-backed memtable. Entries are encoded internal keys with their
//! payload; the skip list orders them with `MemTableKeyComparator`.

use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::Mutex;

use crate::error::Result;
use crate::iterator::StorageIterator;
use crate::keys::{
    decode_entry, encode_entry, entry_internal_key, LookupKey, MemTableKeyComparator,
    SequenceNumber, ValueType, LEN_PREFIX_SIZE, TAG_SIZE,
};

use super::skiplist::{Iter, SkipList};
use super::MemTableEntry;

type EntryList = SkipList<MemTableKeyComparator>;

/// In-memory table for recent writes
pub struct MemTable {
    /// Shared with iterators so they can outlive a borrow of the table
    list: Arc<EntryList>,

    /// Serializes inserts; readers never take it
    writer: Mutex<()>,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self::with_accelerator(false)
    }

    /// Create a new empty MemTable, optionally with the point lookup accelerator
    pub fn with_accelerator(enabled: bool) -> Self {
        Self {
            list: Arc::new(SkipList::with_options(MemTableKeyComparator, enabled)),
            writer: Mutex::new(()),
        }
    }

    /// Add an entry.
    ///
    /// `(user_key, sequence)` must be unique within the table; `value` is
    /// ignored for deletions.
    pub fn add(
        &self,
        sequence: SequenceNumber,
        value_type: ValueType,
        user_key: &[u8],
        value: &[u8],
    ) {
        let entry = encode_entry(sequence, value_type, user_key, value);

        let _writer = self.writer.lock();
        // SAFETY: `writer` serializes every insert into this list
        unsafe { self.list.insert_concurrent(&entry) };
    }

    /// Newest entry for `key.user_key()` with sequence `<=` the lookup sequence
    ///
    /// Returns:
    /// - `Ok(Some(Value))`: live value
    /// - `Ok(Some(Tombstone))`: deleted as of the lookup sequence
    /// - `Ok(None)`: no visible version in this table
    pub fn get(&self, key: &LookupKey) -> Result<Option<MemTableEntry>> {
        let mut iter = self.list.iter();
        iter.seek(key.memtable_key());
        if !iter.valid() {
            return Ok(None);
        }

        let entry = decode_entry(iter.key())?;
        if entry.user_key != key.user_key() {
            return Ok(None);
        }

        Ok(Some(match entry.value_type {
            ValueType::Value => MemTableEntry::Value(entry.value.to_vec()),
            ValueType::Deletion => MemTableEntry::Tombstone,
        }))
    }

    /// Iterator over internal keys and values, oldest user key first
    pub fn iter(&self) -> MemTableIterator {
        MemTableIterator {
            inner: Iter::new(Arc::clone(&self.list)),
            seek_buf: BytesMut::new(),
        }
    }

    /// Number of entries (tombstones and every version included)
    pub fn entry_count(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Bytes reserved by the memtable's arena
    pub fn approximate_memory_usage(&self) -> usize {
        self.list.memory_usage()
    }

    /// Check if should flush (usage >= limit)
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.approximate_memory_usage() >= size_limit
    }

    pub fn has_accelerator(&self) -> bool {
        self.list.has_accelerator()
    }

    /// Distinct user keys known to the accelerator (0 when disabled)
    pub fn accelerated_keys(&self) -> usize {
        self.list.accelerator().map_or(0, |acc| acc.len())
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over MemTable entries.
///
/// `key()` is the internal key `[user_key][tag]`; `seek()` takes one too.
/// Holds the skip list alive on its own.
pub struct MemTableIterator {
    inner: Iter<MemTableKeyComparator, Arc<EntryList>>,
    seek_buf: BytesMut,
}

impl StorageIterator for MemTableIterator {
    fn valid(&self) -> bool {
        self.inner.valid()
    }

    fn seek_to_first(&mut self) {
        self.inner.seek_to_first();
    }

    fn seek_to_last(&mut self) {
        self.inner.seek_to_last();
    }

    fn seek(&mut self, target: &[u8]) {
        assert!(target.len() >= TAG_SIZE, "seek target is not an internal key");
        self.seek_buf.clear();
        self.seek_buf.reserve(LEN_PREFIX_SIZE + target.len());
        self.seek_buf
            .extend_from_slice(&((target.len() - TAG_SIZE) as u32).to_le_bytes());
        self.seek_buf.extend_from_slice(target);
        self.inner.seek(&self.seek_buf);
    }

    fn next(&mut self) {
        self.inner.next();
    }

    fn prev(&mut self) {
        self.inner.prev();
    }

    fn key(&self) -> &[u8] {
        match entry_internal_key(self.inner.key()) {
            Some(key) => key,
            None => panic!("memtable entry with a corrupt length prefix"),
        }
    }

    fn value(&self) -> &[u8] {
        match decode_entry(self.inner.key()) {
            Ok(entry) => entry.value,
            Err(e) => panic!("memtable entry failed to decode: {}", e),
        }
    }

    fn status(&self) -> Result<()> {
        Ok(())
    }
}
