//! Internal key codec
//!
//! Encoding and decoding of internal keys and memtable entries. Decoders
//! that can see untrusted bytes validate every length field and report
//! `Corruption` instead of reading past the end of the buffer.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{PrismError, Result};

use super::{ParsedInternalKey, SequenceNumber, ValueType, MAX_SEQUENCE_NUMBER, VALUE_TYPE_FOR_SEEK};

/// Size of the `(sequence << 8) | type` trailer
pub const TAG_SIZE: usize = 8;

/// Size of the length prefix in front of user keys and values
pub const LEN_PREFIX_SIZE: usize = 4;

// =============================================================================
// Internal Keys
// =============================================================================

/// Pack a sequence number and operation tag into the 8-byte trailer
pub fn pack_sequence_and_type(sequence: SequenceNumber, value_type: ValueType) -> u64 {
    assert!(
        sequence <= MAX_SEQUENCE_NUMBER,
        "sequence number {} does not fit in 56 bits",
        sequence
    );
    (sequence << 8) | value_type as u64
}

/// Append `[user_key][tag]` to `buf`
pub fn append_internal_key(
    buf: &mut BytesMut,
    user_key: &[u8],
    sequence: SequenceNumber,
    value_type: ValueType,
) {
    buf.put_slice(user_key);
    buf.put_u64_le(pack_sequence_and_type(sequence, value_type));
}

/// Decode an internal key, validating its trailer
pub fn parse_internal_key(internal_key: &[u8]) -> Result<ParsedInternalKey<'_>> {
    if internal_key.len() < TAG_SIZE {
        return Err(PrismError::Corruption(format!(
            "internal key too short: {} bytes",
            internal_key.len()
        )));
    }

    let split = internal_key.len() - TAG_SIZE;
    let mut trailer = &internal_key[split..];
    let tag = trailer.get_u64_le();
    let value_type = ValueType::from_u8((tag & 0xff) as u8).ok_or_else(|| {
        PrismError::Corruption(format!("unknown operation tag 0x{:02x}", tag & 0xff))
    })?;

    Ok(ParsedInternalKey {
        user_key: &internal_key[..split],
        sequence: tag >> 8,
        value_type,
    })
}

/// User key portion of an internal key produced by this crate
pub fn extract_user_key(internal_key: &[u8]) -> &[u8] {
    assert!(
        internal_key.len() >= TAG_SIZE,
        "internal key shorter than its tag"
    );
    &internal_key[..internal_key.len() - TAG_SIZE]
}

// =============================================================================
// MemTable Entries
// =============================================================================

fn length_prefix(len: usize) -> u32 {
    assert!(len <= u32::MAX as usize, "field of {} bytes exceeds u32 length prefix", len);
    len as u32
}

/// Encode a memtable entry.
///
/// Deletions carry no payload; `value` is ignored for them.
pub fn encode_entry(
    sequence: SequenceNumber,
    value_type: ValueType,
    user_key: &[u8],
    value: &[u8],
) -> BytesMut {
    let payload = match value_type {
        ValueType::Value => LEN_PREFIX_SIZE + value.len(),
        ValueType::Deletion => 0,
    };
    let mut buf =
        BytesMut::with_capacity(LEN_PREFIX_SIZE + user_key.len() + TAG_SIZE + payload);

    buf.put_u32_le(length_prefix(user_key.len()));
    append_internal_key(&mut buf, user_key, sequence, value_type);

    if value_type == ValueType::Value {
        buf.put_u32_le(length_prefix(value.len()));
        buf.put_slice(value);
    }

    buf
}

/// Internal key slice of an encoded entry (or lookup key).
///
/// Returns `None` when the length prefix points past the end of `entry`.
pub fn entry_internal_key(entry: &[u8]) -> Option<&[u8]> {
    let mut cursor = entry;
    if cursor.remaining() < LEN_PREFIX_SIZE {
        return None;
    }
    let user_len = cursor.get_u32_le() as usize;
    let end = user_len.checked_add(TAG_SIZE)?;
    cursor.get(..end)
}

/// Fully decoded memtable entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedEntry<'a> {
    /// `[user_key][tag]`, as handed to table sinks
    pub internal_key: &'a [u8],
    pub user_key: &'a [u8],
    pub sequence: SequenceNumber,
    pub value_type: ValueType,
    /// Empty for deletions
    pub value: &'a [u8],
}

/// Decode a memtable entry, validating every length field
pub fn decode_entry(entry: &[u8]) -> Result<DecodedEntry<'_>> {
    let internal_key = entry_internal_key(entry).ok_or_else(|| {
        PrismError::Corruption(format!(
            "entry of {} bytes has a truncated key",
            entry.len()
        ))
    })?;
    let parsed = parse_internal_key(internal_key)?;

    let mut rest = &entry[LEN_PREFIX_SIZE + internal_key.len()..];
    let value = match parsed.value_type {
        ValueType::Deletion => {
            if !rest.is_empty() {
                return Err(PrismError::Corruption(format!(
                    "tombstone carries {} trailing bytes",
                    rest.len()
                )));
            }
            rest
        }
        ValueType::Value => {
            if rest.remaining() < LEN_PREFIX_SIZE {
                return Err(PrismError::Corruption(
                    "value entry is missing its length prefix".to_string(),
                ));
            }
            let value_len = rest.get_u32_le() as usize;
            if rest.len() != value_len {
                return Err(PrismError::Corruption(format!(
                    "value length {} does not match remaining {} bytes",
                    value_len,
                    rest.len()
                )));
            }
            rest
        }
    };

    Ok(DecodedEntry {
        internal_key,
        user_key: parsed.user_key,
        sequence: parsed.sequence,
        value_type: parsed.value_type,
        value,
    })
}

// =============================================================================
// Lookup Keys
// =============================================================================

/// Seek target for reading `user_key` as of `sequence`.
///
/// Encoded in the memtable entry layout without a payload, so the same
/// comparator orders it against stored entries.
#[derive(Debug, Clone)]
pub struct LookupKey {
    data: Bytes,
}

impl LookupKey {
    pub fn new(user_key: &[u8], sequence: SequenceNumber) -> Self {
        let mut buf = BytesMut::with_capacity(LEN_PREFIX_SIZE + user_key.len() + TAG_SIZE);
        buf.put_u32_le(length_prefix(user_key.len()));
        append_internal_key(&mut buf, user_key, sequence, VALUE_TYPE_FOR_SEEK);
        Self { data: buf.freeze() }
    }

    /// Key suitable for seeking a memtable
    pub fn memtable_key(&self) -> &[u8] {
        &self.data
    }

    /// `[user_key][tag]`
    pub fn internal_key(&self) -> &[u8] {
        &self.data[LEN_PREFIX_SIZE..]
    }

    pub fn user_key(&self) -> &[u8] {
        &self.data[LEN_PREFIX_SIZE..self.data.len() - TAG_SIZE]
    }
}

// =============================================================================
// Diagnostics
// =============================================================================

/// Render an (internal key, value) pair as
/// `'<user_key>' @ <sequence> : val => '<value>'` or `... : del => ''`
pub fn describe_entry(internal_key: &[u8], value: &[u8]) -> Result<String> {
    let parsed = parse_internal_key(internal_key)?;
    let user_key = String::from_utf8_lossy(parsed.user_key);

    Ok(match parsed.value_type {
        ValueType::Value => format!(
            "'{}' @ {} : val => '{}'",
            user_key,
            parsed.sequence,
            String::from_utf8_lossy(value)
        ),
        ValueType::Deletion => format!("'{}' @ {} : del => ''", user_key, parsed.sequence),
    })
}
