//! Iterator Module
//!
//! The central iteration abstraction. Every sorted view (the raw memtable,
//! the snapshot-filtered user view, a namespace partition, the numeric
//! index) implements `StorageIterator`, and the views compose by wrapping
//! one another, so query code can take any of them behind a `Box<dyn _>`.
//!
//! End of data is signalled by `valid()` returning false. Calling `key()`,
//! `value()`, `next()` or `prev()` on an iterator that is not valid is a
//! programming error and panics. Decode failures surface through `status()`.

mod db_iter;

pub use db_iter::DbIterator;

use crate::error::Result;

/// Uniform cursor over a sorted key/value source
pub trait StorageIterator {
    /// Returns true if the iterator is positioned at a valid entry
    fn valid(&self) -> bool;

    /// Position at the first entry; valid iff the source is non-empty
    fn seek_to_first(&mut self);

    /// Position at the last entry; valid iff the source is non-empty
    fn seek_to_last(&mut self);

    /// Position at the first entry with key >= target
    fn seek(&mut self, target: &[u8]);

    /// Move to the next entry. Requires `valid()`.
    fn next(&mut self);

    /// Move to the previous entry. Requires `valid()`.
    fn prev(&mut self);

    /// Current key. Only meaningful while `valid()`; the slice lives until
    /// the iterator moves.
    fn key(&self) -> &[u8];

    /// Current value. Same lifetime rules as `key()`.
    fn value(&self) -> &[u8];

    /// First error encountered, if any
    fn status(&self) -> Result<()>;
}

impl<I: StorageIterator + ?Sized> StorageIterator for Box<I> {
    fn valid(&self) -> bool {
        (**self).valid()
    }

    fn seek_to_first(&mut self) {
        (**self).seek_to_first()
    }

    fn seek_to_last(&mut self) {
        (**self).seek_to_last()
    }

    fn seek(&mut self, target: &[u8]) {
        (**self).seek(target)
    }

    fn next(&mut self) {
        (**self).next()
    }

    fn prev(&mut self) {
        (**self).prev()
    }

    fn key(&self) -> &[u8] {
        (**self).key()
    }

    fn value(&self) -> &[u8] {
        (**self).value()
    }

    fn status(&self) -> Result<()> {
        (**self).status()
    }
}
