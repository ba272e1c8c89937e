mod common;

use std::collections::HashSet;
use std::sync::Arc;

use csv_dynamic::{
    ColumnNames, DynamicError, LookupKind, LookupStrategy, NameLookup, RecyclingPool, SharedPool,
    heap_pool,
};
use proptest::prelude::*;

use common::sorted_names;

#[test]
fn header_names_resolve_to_their_positions() {
    let pool = heap_pool();
    let lookup = NameLookup::create(&["id", "name", "email"], &pool).expect("lookup");
    assert_eq!(lookup.kind(), LookupKind::AdaptiveRadixTrie);
    assert_eq!(lookup.try_lookup("email"), Some(2));
    assert_eq!(lookup.try_lookup("id"), Some(0));
    assert_eq!(lookup.try_lookup("name"), Some(1));
    assert_eq!(lookup.try_lookup("phone"), None);
    assert_eq!(lookup.try_lookup("nam"), None);
    assert_eq!(lookup.try_lookup("names"), None);
    assert_eq!(lookup.try_lookup(""), None);
}

#[test]
fn ordinals_beyond_trie_range_select_binary_search() {
    let pool = heap_pool();
    let names = sorted_names("n", 70_000);
    let lookup = NameLookup::create(&names, &pool).expect("lookup");
    assert_eq!(lookup.kind(), LookupKind::BinarySearch);
    assert_eq!(lookup.len(), 70_000);
    for ordinal in [0, 1, 32_767, 32_768, 50_000, 69_999] {
        assert_eq!(lookup.try_lookup(&names[ordinal]), Some(ordinal));
    }
    assert_eq!(lookup.try_lookup("n70000"), None);
    assert_eq!(lookup.try_lookup("n"), None);
}

#[test]
fn long_trie_jumps_select_binary_search() {
    // every ordinal fits a trie slot, but the nested groups sit too far apart
    let pool = heap_pool();
    let names: Vec<String> = (0..32_768).map(|i: u32| i.to_string()).collect();
    let lookup = NameLookup::create(&names, &pool).expect("lookup");
    assert_eq!(lookup.kind(), LookupKind::BinarySearch);
    assert_eq!(lookup.len(), 32_768);
    for (ordinal, name) in names.iter().enumerate() {
        assert_eq!(lookup.try_lookup(name), Some(ordinal), "{name}");
    }
    assert_eq!(lookup.try_lookup("32768"), None);
    assert_eq!(lookup.try_lookup("007"), None);
}

#[test]
fn duplicate_names_are_rejected() {
    let pool = heap_pool();
    let err = NameLookup::create(&["a", "b", "a"], &pool).unwrap_err();
    assert_eq!(
        err,
        DynamicError::DuplicateKey {
            name: "a".to_string()
        }
    );
    assert_eq!(
        err.to_string(),
        "two or more members with same name: 'a'"
    );
}

#[test]
fn shared_names_release_their_block_with_the_last_holder() {
    let recycling = Arc::new(RecyclingPool::new());
    let pool: SharedPool = recycling.clone();
    let names = ColumnNames::create(&["sku", "qty"], &pool).expect("names");
    let held = Arc::clone(&names);
    assert_eq!(recycling.outstanding(), 1);
    drop(names);
    assert_eq!(held.ordinal_of("qty").unwrap(), 1);
    assert_eq!(recycling.outstanding(), 1);
    drop(held);
    assert_eq!(recycling.outstanding(), 0);
}

#[test]
fn empty_name_set_finds_nothing() {
    let pool = heap_pool();
    let empty: [&str; 0] = [];
    let lookup = NameLookup::create(&empty, &pool).expect("lookup");
    assert!(lookup.is_empty());
    assert_eq!(lookup.try_lookup(""), None);
    assert_eq!(lookup.try_lookup("x"), None);
}

fn unique_names() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::hash_set("[a-cé_]{0,6}", 0..40)
        .prop_map(|set| set.into_iter().collect::<Vec<_>>())
}

proptest! {
    #[test]
    fn every_member_is_found_and_non_members_are_not(
        names in unique_names(),
        queries in proptest::collection::vec("[a-dé_]{0,7}", 0..20),
    ) {
        let pool = heap_pool();
        let trie = NameLookup::create(&names, &pool).expect("trie");
        let table = NameLookup::create_with(&names, &pool, LookupStrategy::BinarySearch)
            .expect("binary search");
        prop_assert_eq!(trie.kind(), LookupKind::AdaptiveRadixTrie);
        prop_assert_eq!(table.kind(), LookupKind::BinarySearch);

        for (ordinal, name) in names.iter().enumerate() {
            prop_assert_eq!(trie.try_lookup(name), Some(ordinal));
            prop_assert_eq!(table.try_lookup(name), Some(ordinal));
        }

        let members: HashSet<&str> = names.iter().map(String::as_str).collect();
        for query in &queries {
            let expected = if members.contains(query.as_str()) {
                names.iter().position(|n| n == query)
            } else {
                None
            };
            prop_assert_eq!(trie.try_lookup(query), expected);
            prop_assert_eq!(table.try_lookup(query), expected);
        }
    }
}
