//! Partition Module
//!
//! Logical keyspaces carved out of the single sorted keyspace by key prefix.
//!
//! ## Namespaces ("column families")
//! A namespace `name` owns every key starting with `name ++ "_"`. Keys that
//! share a prefix are contiguous in byte order, so an iterator bounded by a
//! prefix check sees exactly one namespace without range endpoints. Writes
//! without a prefix land in the implicit default partition.
//!
//! Prefixes are not checked for overlap: namespace `a` owns `a_b_x`, which
//! is also a key of namespace `a_b`, and a literal unprefixed key `a_x` is
//! indistinguishable from `x` written under `a`. Pick names accordingly.
//!
//! ## Fixed-width numeric index
//! A derived partition (`Index`) mirroring `Record` entries keyed by their
//! zero-padded value, so value ranges become key ranges:
//! ```text
//! Record_00000001         -> 00000111
//! Index_00000111_00000001 -> 00000001
//! ```

mod namespace;
mod numeric;

pub use namespace::{Namespace, PartitionIterator, NAMESPACE_SEPARATOR};
pub use numeric::{
    index_entry_key, strip_padding, zero_pad, IndexHit, NumericIndexIterator, INDEX_NAMESPACE,
    NUMERIC_WIDTH, RECORD_NAMESPACE,
};
