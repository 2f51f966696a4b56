//! Internal Key Codec Tests
//!
//! Tests verify:
//! - Internal key layout and tag packing
//! - Comparator ordering (user key ascending, sequence descending)
//! - Memtable entry layout
//! - Corrupt input is reported, never read past
//! - Diagnostic rendering

use std::cmp::Ordering;

use prismkv::keys::{
    compare_internal_keys, decode_entry, describe_entry, encode_entry, pack_sequence_and_type,
    parse_internal_key, InternalKey, InternalKeyComparator, KeyComparator, LookupKey,
    MemTableKeyComparator, ValueType, MAX_SEQUENCE_NUMBER,
};
use prismkv::PrismError;

// =============================================================================
// Internal Key Tests
// =============================================================================

#[test]
fn test_internal_key_layout() {
    let key = InternalKey::new(b"user", 0x0102, ValueType::Value);
    let encoded = key.encoded();

    assert_eq!(&encoded[..4], b"user");
    assert_eq!(
        &encoded[4..],
        &((0x0102u64 << 8) | 1).to_le_bytes()[..]
    );
    assert_eq!(key.user_key(), b"user");
}

#[test]
fn test_tag_packing() {
    assert_eq!(pack_sequence_and_type(1, ValueType::Value), 0x101);
    assert_eq!(pack_sequence_and_type(1, ValueType::Deletion), 0x100);
    assert_eq!(
        pack_sequence_and_type(MAX_SEQUENCE_NUMBER, ValueType::Value),
        u64::MAX - 0xfe
    );
    assert_eq!(
        pack_sequence_and_type(MAX_SEQUENCE_NUMBER, ValueType::Deletion),
        u64::MAX - 0xff
    );
}

#[test]
#[should_panic(expected = "does not fit")]
fn test_sequence_overflow_panics() {
    pack_sequence_and_type(MAX_SEQUENCE_NUMBER + 1, ValueType::Value);
}

#[test]
fn test_parse_internal_key() {
    let key = InternalKey::new(b"k", 42, ValueType::Deletion);
    let parsed = parse_internal_key(key.encoded()).unwrap();

    assert_eq!(parsed.user_key, b"k");
    assert_eq!(parsed.sequence, 42);
    assert_eq!(parsed.value_type, ValueType::Deletion);
}

#[test]
fn test_parse_rejects_short_and_unknown_tag() {
    assert!(matches!(
        parse_internal_key(b"short"),
        Err(PrismError::Corruption(_))
    ));

    let mut bad = b"k".to_vec();
    bad.extend_from_slice(&((7u64 << 8) | 0x7f).to_le_bytes());
    assert!(matches!(
        parse_internal_key(&bad),
        Err(PrismError::Corruption(_))
    ));
    assert!(InternalKey::decode_from(&bad).is_err());
}

#[test]
fn test_default_internal_key_is_empty() {
    let key = InternalKey::default();
    assert!(key.is_empty());
    assert_eq!(key.user_key(), b"");
}

// =============================================================================
// Ordering Tests
// =============================================================================

#[test]
fn test_order_user_key_then_newest_first() {
    let a5 = InternalKey::new(b"a", 5, ValueType::Value);
    let a9 = InternalKey::new(b"a", 9, ValueType::Value);
    let b1 = InternalKey::new(b"b", 1, ValueType::Value);

    assert_eq!(compare_internal_keys(a9.encoded(), a5.encoded()), Ordering::Less);
    assert_eq!(compare_internal_keys(a5.encoded(), b1.encoded()), Ordering::Less);
    assert_eq!(compare_internal_keys(a9.encoded(), a9.encoded()), Ordering::Equal);
}

#[test]
fn test_value_sorts_before_deletion_at_same_sequence() {
    let put = InternalKey::new(b"k", 3, ValueType::Value);
    let del = InternalKey::new(b"k", 3, ValueType::Deletion);
    assert_eq!(
        InternalKeyComparator.compare(put.encoded(), del.encoded()),
        Ordering::Less
    );
}

#[test]
fn test_user_key_prefix_sorts_first() {
    // "ab" must sort before "abc" regardless of tag bytes
    let short = InternalKey::new(b"ab", 1, ValueType::Value);
    let long = InternalKey::new(b"abc", MAX_SEQUENCE_NUMBER, ValueType::Value);
    assert_eq!(compare_internal_keys(short.encoded(), long.encoded()), Ordering::Less);
}

#[test]
fn test_lookup_key_seeks_newest_visible() {
    let lookup = LookupKey::new(b"k", 5);
    let newer = encode_entry(6, ValueType::Value, b"k", b"x");
    let visible = encode_entry(5, ValueType::Value, b"k", b"x");
    let deleted = encode_entry(5, ValueType::Deletion, b"k", b"");

    let cmp = MemTableKeyComparator;
    assert_eq!(cmp.compare(&newer, lookup.memtable_key()), Ordering::Less);
    assert_eq!(cmp.compare(&visible, lookup.memtable_key()), Ordering::Equal);
    assert_eq!(cmp.compare(lookup.memtable_key(), &deleted), Ordering::Less);
    assert_eq!(cmp.lookup_key(lookup.memtable_key()), b"k");

    assert_eq!(lookup.user_key(), b"k");
    assert_eq!(lookup.internal_key().len(), 1 + 8);
}

// =============================================================================
// Entry Encoding Tests
// =============================================================================

#[test]
fn test_value_entry_layout() {
    let entry = encode_entry(7, ValueType::Value, b"key", b"val");

    let mut expected = Vec::new();
    expected.extend_from_slice(&3u32.to_le_bytes());
    expected.extend_from_slice(b"key");
    expected.extend_from_slice(&((7u64 << 8) | 1).to_le_bytes());
    expected.extend_from_slice(&3u32.to_le_bytes());
    expected.extend_from_slice(b"val");
    assert_eq!(&entry[..], &expected[..]);

    let decoded = decode_entry(&entry).unwrap();
    assert_eq!(decoded.user_key, b"key");
    assert_eq!(decoded.sequence, 7);
    assert_eq!(decoded.value_type, ValueType::Value);
    assert_eq!(decoded.value, b"val");
    assert_eq!(decoded.internal_key, &expected[4..15]);
}

#[test]
fn test_deletion_entry_has_no_payload() {
    let entry = encode_entry(7, ValueType::Deletion, b"key", b"ignored");
    assert_eq!(entry.len(), 4 + 3 + 8);

    let decoded = decode_entry(&entry).unwrap();
    assert_eq!(decoded.value_type, ValueType::Deletion);
    assert!(decoded.value.is_empty());
}

#[test]
fn test_decode_rejects_corrupt_entries() {
    let entry = encode_entry(7, ValueType::Value, b"key", b"val");

    // Truncated anywhere
    for len in 0..entry.len() {
        assert!(
            matches!(decode_entry(&entry[..len]), Err(PrismError::Corruption(_))),
            "prefix of {} bytes decoded",
            len
        );
    }

    // Key length past the end
    let mut huge = entry.to_vec();
    huge[..4].copy_from_slice(&u32::MAX.to_le_bytes());
    assert!(decode_entry(&huge).is_err());

    // Trailing garbage
    let mut long = entry.to_vec();
    long.push(0);
    assert!(decode_entry(&long).is_err());

    let mut tomb = encode_entry(1, ValueType::Deletion, b"k", b"").to_vec();
    tomb.push(0);
    assert!(decode_entry(&tomb).is_err());
}

// =============================================================================
// Diagnostic Tests
// =============================================================================

#[test]
fn test_describe_entry() {
    let put = InternalKey::new(b"name", 12, ValueType::Value);
    assert_eq!(
        describe_entry(put.encoded(), b"alice").unwrap(),
        "'name' @ 12 : val => 'alice'"
    );

    let del = InternalKey::new(b"name", 13, ValueType::Deletion);
    assert_eq!(
        describe_entry(del.encoded(), b"").unwrap(),
        "'name' @ 13 : del => ''"
    );

    assert!(describe_entry(b"bad", b"").is_err());
}
