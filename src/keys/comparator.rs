//! Key comparators
//!
//! The skip list orders opaque byte strings; a `KeyComparator` supplies the
//! order. The internal-key comparators here implement MVCC ordering:
//! ascending user key, then descending `(sequence << 8) | type`.

use std::cmp::Ordering;

use bytes::Buf;

use super::codec::{entry_internal_key, extract_user_key, TAG_SIZE};

/// Total order over the keys stored in a skip list
pub trait KeyComparator: Send + Sync {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Group key used by the point lookup accelerator.
    ///
    /// Must be order-consistent with `compare`: whenever
    /// `lookup_key(a) < lookup_key(b)` bytewise, `a` sorts before `b`, so
    /// keys that share a lookup key are contiguous in the index.
    fn lookup_key<'a>(&self, key: &'a [u8]) -> &'a [u8] {
        key
    }
}

/// Plain lexicographic order
#[derive(Debug, Clone, Copy, Default)]
pub struct BytewiseComparator;

impl KeyComparator for BytewiseComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}

fn tag(internal_key: &[u8]) -> u64 {
    let mut trailer = &internal_key[internal_key.len() - TAG_SIZE..];
    trailer.get_u64_le()
}

/// Ascending user key, descending sequence
pub fn compare_internal_keys(a: &[u8], b: &[u8]) -> Ordering {
    extract_user_key(a)
        .cmp(extract_user_key(b))
        .then_with(|| tag(b).cmp(&tag(a)))
}

/// Orders `[user_key][tag]` internal keys
#[derive(Debug, Clone, Copy, Default)]
pub struct InternalKeyComparator;

impl KeyComparator for InternalKeyComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        compare_internal_keys(a, b)
    }

    fn lookup_key<'a>(&self, key: &'a [u8]) -> &'a [u8] {
        extract_user_key(key)
    }
}

/// Orders length-prefixed memtable entries by their internal keys
#[derive(Debug, Clone, Copy, Default)]
pub struct MemTableKeyComparator;

fn internal_key_of(entry: &[u8]) -> &[u8] {
    match entry_internal_key(entry) {
        Some(key) => key,
        None => panic!("memtable entry with a corrupt length prefix"),
    }
}

impl KeyComparator for MemTableKeyComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        compare_internal_keys(internal_key_of(a), internal_key_of(b))
    }

    fn lookup_key<'a>(&self, key: &'a [u8]) -> &'a [u8] {
        extract_user_key(internal_key_of(key))
    }
}
