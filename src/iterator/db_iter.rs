//! Snapshot-filtered user view
//!
//! Turns an iterator over internal keys into one over user keys as of a
//! sequence number: every user key appears at most once, with its newest
//! version `<=` the sequence, and keys whose newest such version is a
//! tombstone are hidden.
//!
//! Moving forward, the inner iterator sits exactly on the entry being
//! yielded. Moving backward, it sits just before every entry of the yielded
//! user key, and the key/value are held in `saved_key` / `saved_value`.

use crate::error::{PrismError, Result};
use crate::keys::{extract_user_key, parse_internal_key, LookupKey, SequenceNumber, ValueType};

use super::StorageIterator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Reverse,
}

fn save(dst: &mut Vec<u8>, src: &[u8]) {
    dst.clear();
    dst.extend_from_slice(src);
}

/// User-level iterator at a snapshot sequence
pub struct DbIterator<I> {
    inner: I,
    sequence: SequenceNumber,
    direction: Direction,
    valid: bool,
    /// Forward: user key to skip past. Reverse: current key.
    saved_key: Vec<u8>,
    /// Reverse only: current value
    saved_value: Vec<u8>,
    corruption: Option<String>,
}

impl<I: StorageIterator> DbIterator<I> {
    /// Wrap `inner`, an iterator over internal keys, at `sequence`
    pub fn new(inner: I, sequence: SequenceNumber) -> Self {
        Self {
            inner,
            sequence,
            direction: Direction::Forward,
            valid: false,
            saved_key: Vec::new(),
            saved_value: Vec::new(),
            corruption: None,
        }
    }

    /// Sequence number this view is bound to
    pub fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    fn note_corruption(corruption: &mut Option<String>, e: PrismError) {
        if corruption.is_none() {
            *corruption = Some(e.to_string());
        }
    }

    /// Advance `inner` to the next visible entry, starting at its current position
    fn find_next_user_entry(&mut self, mut skipping: bool) {
        debug_assert!(self.inner.valid());
        debug_assert_eq!(self.direction, Direction::Forward);

        loop {
            match parse_internal_key(self.inner.key()) {
                Ok(ikey) if ikey.sequence <= self.sequence => match ikey.value_type {
                    ValueType::Deletion => {
                        // Hide every older version of this key
                        save(&mut self.saved_key, ikey.user_key);
                        skipping = true;
                    }
                    ValueType::Value => {
                        if !(skipping && ikey.user_key <= self.saved_key.as_slice()) {
                            self.valid = true;
                            self.saved_key.clear();
                            return;
                        }
                    }
                },
                Ok(_) => {}
                Err(e) => Self::note_corruption(&mut self.corruption, e),
            }

            self.inner.next();
            if !self.inner.valid() {
                break;
            }
        }

        self.saved_key.clear();
        self.valid = false;
    }

    /// Walk `inner` backward collecting the newest visible version of the
    /// previous user key
    fn find_prev_user_entry(&mut self) {
        debug_assert_eq!(self.direction, Direction::Reverse);

        let mut value_type = ValueType::Deletion;
        if self.inner.valid() {
            loop {
                match parse_internal_key(self.inner.key()) {
                    Ok(ikey) if ikey.sequence <= self.sequence => {
                        if value_type != ValueType::Deletion
                            && ikey.user_key < self.saved_key.as_slice()
                        {
                            // Crossed into an earlier user key
                            break;
                        }
                        value_type = ikey.value_type;
                        match value_type {
                            ValueType::Deletion => {
                                self.saved_key.clear();
                                self.saved_value.clear();
                            }
                            ValueType::Value => {
                                save(&mut self.saved_key, ikey.user_key);
                                save(&mut self.saved_value, self.inner.value());
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => Self::note_corruption(&mut self.corruption, e),
                }

                self.inner.prev();
                if !self.inner.valid() {
                    break;
                }
            }
        }

        if value_type == ValueType::Deletion {
            // Ran off the front
            self.valid = false;
            self.saved_key.clear();
            self.saved_value.clear();
            self.direction = Direction::Forward;
        } else {
            self.valid = true;
        }
    }

    fn invalidate(&mut self) {
        self.valid = false;
        self.saved_key.clear();
        self.saved_value.clear();
    }
}

impl<I: StorageIterator> StorageIterator for DbIterator<I> {
    fn valid(&self) -> bool {
        self.valid
    }

    fn seek_to_first(&mut self) {
        self.direction = Direction::Forward;
        self.saved_value.clear();
        self.inner.seek_to_first();
        if self.inner.valid() {
            self.find_next_user_entry(false);
        } else {
            self.valid = false;
        }
    }

    fn seek_to_last(&mut self) {
        self.direction = Direction::Reverse;
        self.saved_value.clear();
        self.inner.seek_to_last();
        self.find_prev_user_entry();
    }

    /// `target` is a user key
    fn seek(&mut self, target: &[u8]) {
        self.direction = Direction::Forward;
        self.saved_value.clear();
        self.saved_key.clear();

        let lookup = LookupKey::new(target, self.sequence);
        self.inner.seek(lookup.internal_key());
        if self.inner.valid() {
            self.find_next_user_entry(false);
        } else {
            self.valid = false;
        }
    }

    fn next(&mut self) {
        assert!(self.valid, "next() on an invalid iterator");

        if self.direction == Direction::Reverse {
            self.direction = Direction::Forward;
            // `inner` is just before the current key's entries; step onto them.
            // `saved_key` already names the key to skip past.
            if self.inner.valid() {
                self.inner.next();
            } else {
                self.inner.seek_to_first();
            }
        } else {
            save(&mut self.saved_key, extract_user_key(self.inner.key()));
            self.inner.next();
        }

        if !self.inner.valid() {
            self.invalidate();
            return;
        }
        self.find_next_user_entry(true);
    }

    fn prev(&mut self) {
        assert!(self.valid, "prev() on an invalid iterator");

        if self.direction == Direction::Forward {
            // Step before every entry of the current user key
            save(&mut self.saved_key, extract_user_key(self.inner.key()));
            loop {
                self.inner.prev();
                if !self.inner.valid() {
                    self.invalidate();
                    return;
                }
                if extract_user_key(self.inner.key()) < self.saved_key.as_slice() {
                    break;
                }
            }
            self.direction = Direction::Reverse;
        }

        self.find_prev_user_entry();
    }

    fn key(&self) -> &[u8] {
        assert!(self.valid, "key() on an invalid iterator");
        match self.direction {
            Direction::Forward => extract_user_key(self.inner.key()),
            Direction::Reverse => &self.saved_key,
        }
    }

    fn value(&self) -> &[u8] {
        assert!(self.valid, "value() on an invalid iterator");
        match self.direction {
            Direction::Forward => self.inner.value(),
            Direction::Reverse => &self.saved_value,
        }
    }

    fn status(&self) -> Result<()> {
        self.inner.status()?;
        match &self.corruption {
            Some(msg) => Err(PrismError::Corruption(msg.clone())),
            None => Ok(()),
        }
    }
}
