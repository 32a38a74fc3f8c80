//! The order keys are written in.
//!
//! Keys whose name is unknown come first, by hash. Named keys follow,
//! compared case-insensitively; names that differ only in case fall back to
//! their raw bytes and then to the hash, so the order is total.

use std::cmp::Ordering;
use std::rc::Rc;

use attrib_core_store::{DictionaryEntry, KeyDictionary, Table};

fn compare_names(a: &[u8], b: &[u8]) -> Ordering {
    let folded = a
        .iter()
        .map(u8::to_ascii_lowercase)
        .cmp(b.iter().map(u8::to_ascii_lowercase));
    folded.then_with(|| a.cmp(b))
}

/// Sort `keys` in place.
pub fn sort_keys(keys: &mut [u32], dictionary: &KeyDictionary) {
    let mut named: Vec<(u32, Option<Rc<DictionaryEntry>>)> =
        keys.iter().map(|&k| (k, dictionary.get(k))).collect();
    named.sort_by(|(ka, a), (kb, b)| match (a, b) {
        (None, None) => ka.cmp(kb),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare_names(a.bytes(), b.bytes()).then(ka.cmp(kb)),
    });
    for (slot, (key, _)) in keys.iter_mut().zip(named) {
        *slot = key;
    }
}

/// Own keys of `table`, sorted.
pub fn own_keys(table: &Table, dictionary: &KeyDictionary) -> Vec<u32> {
    let mut keys = table.own_keys();
    sort_keys(&mut keys, dictionary);
    keys
}

/// Keys of `table` and all its ancestors, sorted.
pub fn merged_keys(table: &Table, dictionary: &KeyDictionary) -> Vec<u32> {
    let mut keys = table.merged_keys();
    sort_keys(&mut keys, dictionary);
    keys
}
