// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

crate::define_id! {
    /// Test ID type for macro verification.
    pub struct TestId("tst-");
}

#[test]
fn new_ids_have_prefix_and_fixed_length() {
    let id = TestId::new();
    assert!(id.as_str().starts_with("tst-"));
    assert_eq!(id.suffix().len(), 21);
}

#[test]
fn from_string_round_trips() {
    let id = TestId::from_string("tst-abc123");
    assert_eq!(id.as_str(), "tst-abc123");
    assert_eq!(id.suffix(), "abc123");
}

#[test]
fn display_matches_as_str() {
    let id = TestId::new();
    assert_eq!(format!("{id}"), id.as_str());
}

#[test]
fn two_new_ids_differ() {
    assert_ne!(TestId::new(), TestId::new());
}

#[test]
fn short_truncates_suffix() {
    let id = TestId::from_string("tst-abcdefghijklmnop");
    assert_eq!(id.short(4), "abcd");
    assert_eq!(id.short(100), "abcdefghijklmnop");
}

#[test]
fn short_fn_on_str() {
    let s = "abcdefghijklmnop";
    assert_eq!(short(s, 8), "abcdefgh");
    assert_eq!(short(s, 100), s);
    assert_eq!(short("abc", 8), "abc");
}

#[test]
fn hash_map_lookup_by_borrowed_str() {
    use std::collections::HashMap;
    let mut map: HashMap<TestId, u32> = HashMap::new();
    map.insert(TestId::from_string("tst-fixed"), 42);
    assert_eq!(map.get("tst-fixed"), Some(&42));
}

#[test]
fn alnum_generates_requested_length_and_charset() {
    let s = crate::id::alnum(20);
    assert_eq!(s.len(), 20);
    assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
}
