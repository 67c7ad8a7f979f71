// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use std::collections::HashMap;

crate::define_id! {
    /// Test ID type for macro verification.
    pub struct TestId("tst-");
}

crate::define_str_id! {
    /// Test string ID type for macro verification.
    pub struct TestStrId;
}

#[test]
fn define_id_hash_map_lookup() {
    let mut map = HashMap::new();
    let id = TestId::new();
    map.insert(id, 42);
    assert_eq!(map.get(id.as_str()), Some(&42));
}

#[test]
fn define_id_new_has_prefix_and_fixed_length() {
    let id = TestId::new();
    assert!(id.as_str().starts_with("tst-"));
    assert_eq!(id.as_str().len(), ID_MAX_LEN);
}

#[test]
fn define_id_suffix_strips_prefix() {
    let id = TestId::from_string("tst-abc123");
    assert_eq!(id.suffix(), "abc123");
}

#[test]
fn define_id_short_truncates_suffix() {
    let id = TestId::from_string("tst-abcdefghijklmnop");
    assert_eq!(id.short(4), "abcd");
}

#[test]
fn short_fn_on_str() {
    let s = "abcdefghijklmnop";
    assert_eq!(short(s, 8), "abcdefgh");
    assert_eq!(short(s, 100), s);
    assert_eq!(short("abc", 8), "abc");
}

#[test]
fn idbuf_roundtrips_through_borrow_str() {
    let id = IdBuf::new("hello");
    assert_eq!(id.as_str(), "hello");
    assert!(!id.is_empty());
    assert_eq!(IdBuf::empty().as_str(), "");
}

#[test]
fn define_str_id_accepts_arbitrary_length() {
    let id = TestStrId::new("a".repeat(500));
    assert_eq!(id.as_str().len(), 500);
}

#[test]
fn event_id_next_increments() {
    assert_eq!(EventId::FIRST.next(), EventId(2));
}

proptest! {
    #[test]
    fn idbuf_serde_roundtrip(s in "[a-z0-9-]{0,23}") {
        let id = IdBuf::new(&s);
        let json = serde_json::to_string(&id).expect("string serializes");
        let parsed: IdBuf = serde_json::from_str(&json).expect("valid-length id parses");
        prop_assert_eq!(id.as_str(), parsed.as_str());
    }

    #[test]
    fn event_id_next_is_strictly_greater(n in 0u64..u64::MAX) {
        let id = EventId(n);
        prop_assert!(id.next() > id);
    }
}
