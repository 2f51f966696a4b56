//! Fixed-width numeric secondary index
//!
//! Unsigned decimal integers are left-padded with `'0'` to `NUMERIC_WIDTH`
//! bytes so byte order equals numeric order. The index partition stores
//! `pad(value) ++ "_" ++ pad(key)`; its iterator decodes both halves back to
//! their unpadded form.

use crate::error::{PrismError, Result};
use crate::iterator::StorageIterator;

use super::namespace::{Namespace, PartitionIterator};

/// Digits in every padded integer
pub const NUMERIC_WIDTH: usize = 8;

/// Namespace holding primary `key -> value` entries
pub const RECORD_NAMESPACE: &str = "Record";

/// Namespace holding derived `value_key -> key` entries
pub const INDEX_NAMESPACE: &str = "Index";

const INDEX_SEPARATOR: u8 = b'_';
const INDEX_KEY_LEN: usize = NUMERIC_WIDTH * 2 + 1;

/// Left-pad an unsigned decimal integer to `NUMERIC_WIDTH` digits.
///
/// Leading zeros in the input do not count against the width.
pub fn zero_pad(digits: &[u8]) -> Result<[u8; NUMERIC_WIDTH]> {
    if digits.is_empty() {
        return Err(PrismError::InvalidNumeric("empty integer".to_string()));
    }
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(PrismError::InvalidNumeric(format!(
            "'{}' is not an unsigned decimal integer",
            String::from_utf8_lossy(digits)
        )));
    }

    let first = digits.iter().position(|&d| d != b'0').unwrap_or(digits.len());
    let significant = &digits[first..];
    if significant.len() > NUMERIC_WIDTH {
        return Err(PrismError::InvalidNumeric(format!(
            "'{}' has more than {} digits",
            String::from_utf8_lossy(digits),
            NUMERIC_WIDTH
        )));
    }

    let mut padded = [b'0'; NUMERIC_WIDTH];
    padded[NUMERIC_WIDTH - significant.len()..].copy_from_slice(significant);
    Ok(padded)
}

/// Drop leading zeros, keeping at least one digit
pub fn strip_padding(padded: &[u8]) -> &[u8] {
    match padded.iter().position(|&d| d != b'0') {
        Some(first) => &padded[first..],
        None if padded.is_empty() => padded,
        None => &padded[padded.len() - 1..],
    }
}

/// Key of the derived entry for `(key, value)`, without the namespace prefix
pub fn index_entry_key(padded_value: &[u8], padded_key: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(padded_value.len() + 1 + padded_key.len());
    key.extend_from_slice(padded_value);
    key.push(INDEX_SEPARATOR);
    key.extend_from_slice(padded_key);
    key
}

fn is_index_key(key: &[u8]) -> bool {
    key.len() == INDEX_KEY_LEN
        && key[NUMERIC_WIDTH] == INDEX_SEPARATOR
        && key[..NUMERIC_WIDTH].iter().all(u8::is_ascii_digit)
        && key[NUMERIC_WIDTH + 1..].iter().all(u8::is_ascii_digit)
}

/// One row of an index range scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHit {
    /// Indexed value, unpadded
    pub value: Vec<u8>,
    /// Primary key carrying that value, unpadded
    pub key: Vec<u8>,
}

/// Iterator over the index partition in value order.
///
/// `key()` is the indexed value and `value()` the primary key, both with
/// padding removed. `seek()` takes an unpadded integer and lands on the
/// first entry whose value is `>=` it. A target that is not a valid integer,
/// or an index entry of the wrong shape, leaves the iterator invalid and is
/// reported by `status()`.
pub struct NumericIndexIterator<I> {
    inner: PartitionIterator<I>,
    valid: bool,
    fault: Option<Fault>,
}

/// First problem seen; `PrismError` is not `Clone`, so keep the parts
enum Fault {
    BadTarget(String),
    Malformed(String),
}

impl<I: StorageIterator> NumericIndexIterator<I> {
    /// `inner` iterates user keys across the whole keyspace
    pub fn new(inner: I) -> Self {
        Self {
            inner: PartitionIterator::new(inner, Namespace::new(INDEX_NAMESPACE)),
            valid: false,
            fault: None,
        }
    }

    /// Current padded value. Requires `valid()`.
    pub fn padded_value(&self) -> &[u8] {
        assert!(self.valid, "padded_value() on an invalid iterator");
        &self.inner.key()[..NUMERIC_WIDTH]
    }

    /// Every entry with `lo <= value <= hi`, in value order
    pub fn collect_range(&mut self, lo: &[u8], hi: &[u8]) -> Result<Vec<IndexHit>> {
        let upper = zero_pad(hi)?;
        zero_pad(lo)?;

        let mut hits = Vec::new();
        self.seek(lo);
        while self.valid && self.padded_value() <= upper.as_slice() {
            hits.push(IndexHit {
                value: self.key().to_vec(),
                key: self.value().to_vec(),
            });
            self.next();
        }
        self.status()?;
        Ok(hits)
    }

    /// A bad seek target only poisons the seek that used it
    fn clear_bad_target(&mut self) {
        if matches!(self.fault, Some(Fault::BadTarget(_))) {
            self.fault = None;
        }
    }

    fn settle(&mut self) {
        self.valid = false;
        if !self.inner.valid() {
            return;
        }
        if is_index_key(self.inner.key()) {
            self.valid = true;
        } else if self.fault.is_none() {
            self.fault = Some(Fault::Malformed(format!(
                "malformed index entry '{}'",
                String::from_utf8_lossy(self.inner.raw_key())
            )));
        }
    }
}

impl<I: StorageIterator> StorageIterator for NumericIndexIterator<I> {
    fn valid(&self) -> bool {
        self.valid
    }

    fn seek_to_first(&mut self) {
        self.clear_bad_target();
        self.inner.seek_to_first();
        self.settle();
    }

    fn seek_to_last(&mut self) {
        self.clear_bad_target();
        self.inner.seek_to_last();
        self.settle();
    }

    fn seek(&mut self, target: &[u8]) {
        self.clear_bad_target();
        match zero_pad(target) {
            Ok(padded) => {
                self.inner.seek(&padded);
                self.settle();
            }
            Err(e) => {
                self.valid = false;
                if self.fault.is_none() {
                    let msg = match e {
                        PrismError::InvalidNumeric(msg) => msg,
                        other => other.to_string(),
                    };
                    self.fault = Some(Fault::BadTarget(msg));
                }
            }
        }
    }

    fn next(&mut self) {
        assert!(self.valid, "next() on an invalid iterator");
        self.inner.next();
        self.settle();
    }

    fn prev(&mut self) {
        assert!(self.valid, "prev() on an invalid iterator");
        self.inner.prev();
        self.settle();
    }

    fn key(&self) -> &[u8] {
        assert!(self.valid, "key() on an invalid iterator");
        strip_padding(&self.inner.key()[..NUMERIC_WIDTH])
    }

    fn value(&self) -> &[u8] {
        assert!(self.valid, "value() on an invalid iterator");
        strip_padding(&self.inner.key()[NUMERIC_WIDTH + 1..])
    }

    fn status(&self) -> Result<()> {
        self.inner.status()?;
        match &self.fault {
            Some(Fault::BadTarget(msg)) => Err(PrismError::InvalidNumeric(msg.clone())),
            Some(Fault::Malformed(msg)) => Err(PrismError::Corruption(msg.clone())),
            None => Ok(()),
        }
    }
}
