// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

#[test]
fn slug_replaces_separators_and_spaces() {
    let key = DedupKey::for_path("/transcripts/raw/team call.mp3");
    let (slug, digest) = key.as_str().split_once('~').unwrap();
    assert_eq!(slug, "transcripts_raw_team_call.mp3");
    assert_eq!(digest.len(), 16);
    assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn colliding_slugs_get_distinct_keys() {
    let a = DedupKey::for_path("/raw/a b.mp3");
    let b = DedupKey::for_path("/raw/a_b.mp3");
    let c = DedupKey::for_path("/raw/a/b.mp3");
    assert_ne!(a, b);
    assert_ne!(b, c);
    assert_ne!(a, c);
}

#[yare::parameterized(
    leading_slash      = { "/x.mp3" },
    leading_underscore = { "_last_updated" },
    only_separators    = { "/_/" },
    empty              = { "" },
)]
fn never_starts_with_underscore(path: &str) {
    assert!(!DedupKey::for_path(path).as_str().starts_with('_'));
}

proptest! {
    #[test]
    fn same_path_same_key(path in ".{0,64}") {
        prop_assert_eq!(DedupKey::for_path(&path), DedupKey::for_path(&path));
    }

    #[test]
    fn distinct_paths_distinct_keys(a in "[a-z /_]{1,24}", b in "[a-z /_]{1,24}") {
        prop_assume!(a != b);
        prop_assert_ne!(DedupKey::for_path(&a), DedupKey::for_path(&b));
    }

    #[test]
    fn keys_are_not_metadata(path in ".{0,64}") {
        prop_assert!(!DedupKey::for_path(&path).as_str().starts_with('_'));
    }
}
