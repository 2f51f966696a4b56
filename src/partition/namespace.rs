//! Namespace-scoped iteration

use crate::error::Result;
use crate::iterator::StorageIterator;

/// Byte appended to a namespace name to form its key prefix
pub const NAMESPACE_SEPARATOR: u8 = b'_';

/// A named prefix region of the keyspace. Purely a view; nothing is stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    name: String,
    prefix: Vec<u8>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut prefix = Vec::with_capacity(name.len() + 1);
        prefix.extend_from_slice(name.as_bytes());
        prefix.push(NAMESPACE_SEPARATOR);
        Self { name, prefix }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `name ++ "_"`
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Raw key for `key` inside this namespace
    pub fn qualify(&self, key: &[u8]) -> Vec<u8> {
        let mut raw = Vec::with_capacity(self.prefix.len() + key.len());
        raw.extend_from_slice(&self.prefix);
        raw.extend_from_slice(key);
        raw
    }

    pub fn contains(&self, raw_key: &[u8]) -> bool {
        raw_key.starts_with(&self.prefix)
    }

    pub fn strip<'a>(&self, raw_key: &'a [u8]) -> Option<&'a [u8]> {
        raw_key.strip_prefix(self.prefix.as_slice())
    }

    /// Smallest key sorting after every key of the namespace
    pub fn upper_bound(&self) -> Vec<u8> {
        let mut bound = self.prefix.clone();
        // The prefix always ends in the separator, which is below 0xff
        if let Some(last) = bound.last_mut() {
            *last += 1;
        }
        bound
    }
}

/// Iterator confined to one namespace.
///
/// Valid iff the wrapped iterator is valid and its current raw key starts
/// with the namespace prefix. Keys are reported with the prefix stripped;
/// seek targets are given without it.
pub struct PartitionIterator<I> {
    inner: I,
    namespace: Namespace,
    valid: bool,
}

impl<I: StorageIterator> PartitionIterator<I> {
    /// The returned iterator is not valid until positioned
    pub fn new(inner: I, namespace: Namespace) -> Self {
        Self {
            inner,
            namespace,
            valid: false,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Current raw (prefixed) key. Requires `valid()`.
    pub fn raw_key(&self) -> &[u8] {
        assert!(self.valid, "raw_key() on an invalid iterator");
        self.inner.key()
    }

    fn settle(&mut self) {
        self.valid = self.inner.valid() && self.namespace.contains(self.inner.key());
    }
}

impl<I: StorageIterator> StorageIterator for PartitionIterator<I> {
    fn valid(&self) -> bool {
        self.valid
    }

    fn seek_to_first(&mut self) {
        self.inner.seek(self.namespace.prefix());
        self.settle();
    }

    fn seek_to_last(&mut self) {
        self.inner.seek(&self.namespace.upper_bound());
        if self.inner.valid() {
            self.inner.prev();
        } else {
            self.inner.seek_to_last();
        }
        self.settle();
    }

    fn seek(&mut self, target: &[u8]) {
        self.inner.seek(&self.namespace.qualify(target));
        self.settle();
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
        &self.inner.key()[self.namespace.prefix().len()..]
    }

    fn value(&self) -> &[u8] {
        assert!(self.valid, "value() on an invalid iterator");
        self.inner.value()
    }

    fn status(&self) -> Result<()> {
        self.inner.status()
    }
}
