//! Internal Key Module
//!
//! Every mutation is stored as an *internal key*: the user key, the
//! sequence number the write path assigned to it, and an operation tag.
//!
//! ## Ordering
//! Internal keys sort ascending by user key and, for equal user keys,
//! descending by sequence number. The newest version of a key is therefore
//! always the first one a forward scan meets, and a seek to
//! `(user_key, snapshot)` lands on the newest version visible at that
//! snapshot.
//!
//! ## Encodings
//! ```text
//! internal key:   [user_key][tag: u64 LE]            tag = (sequence << 8) | type
//! memtable entry: [ulen: u32 LE][user_key][tag: u64 LE][vlen: u32 LE][value]
//!                                                      └─ Value entries only ─┘
//! ```

mod codec;
mod comparator;

pub use codec::{
    append_internal_key, decode_entry, describe_entry, encode_entry, entry_internal_key,
    extract_user_key, pack_sequence_and_type, parse_internal_key, DecodedEntry, LookupKey,
    LEN_PREFIX_SIZE, TAG_SIZE,
};
pub use comparator::{
    compare_internal_keys, BytewiseComparator, InternalKeyComparator, KeyComparator,
    MemTableKeyComparator,
};

/// Monotonic counter assigned to every mutation by the write path
pub type SequenceNumber = u64;

/// Largest sequence number that fits next to the 8-bit tag
pub const MAX_SEQUENCE_NUMBER: SequenceNumber = (1 << 56) - 1;

/// Operation tag stored in the low byte of an internal key's trailer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    /// A tombstone
    Deletion = 0x0,

    /// A live value
    Value = 0x1,
}

/// Tag used when building seek targets.
///
/// `Value` is the highest tag, so `(user_key, seq, VALUE_TYPE_FOR_SEEK)` sorts
/// before every entry of `user_key` whose sequence is `<= seq`.
pub const VALUE_TYPE_FOR_SEEK: ValueType = ValueType::Value;

impl ValueType {
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0x0 => Some(ValueType::Deletion),
            0x1 => Some(ValueType::Value),
            _ => None,
        }
    }
}

/// Borrowed view of a decoded internal key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedInternalKey<'a> {
    pub user_key: &'a [u8],
    pub sequence: SequenceNumber,
    pub value_type: ValueType,
}

/// Owned, encoded internal key
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InternalKey {
    rep: Vec<u8>,
}

impl InternalKey {
    pub fn new(user_key: &[u8], sequence: SequenceNumber, value_type: ValueType) -> Self {
        let mut rep = bytes::BytesMut::with_capacity(user_key.len() + TAG_SIZE);
        append_internal_key(&mut rep, user_key, sequence, value_type);
        Self { rep: rep.to_vec() }
    }

    /// Adopt an already encoded internal key after validating it
    pub fn decode_from(encoded: &[u8]) -> crate::Result<Self> {
        parse_internal_key(encoded)?;
        Ok(Self {
            rep: encoded.to_vec(),
        })
    }

    pub fn encoded(&self) -> &[u8] {
        &self.rep
    }

    /// User key portion; empty for a default-constructed key
    pub fn user_key(&self) -> &[u8] {
        if self.rep.is_empty() {
            return &[];
        }
        extract_user_key(&self.rep)
    }

    pub fn is_empty(&self) -> bool {
        self.rep.is_empty()
    }
}
