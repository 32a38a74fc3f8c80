//! Memoized binary serialization of shared tables.

use std::collections::HashMap;

use attrib_core_store::{Bytes, Table, TableId};

/// Serialized bytes keyed by table identity.
///
/// Identity stands in for content only because tables are copy-on-write:
/// an unchanged table serializes the same for every descendant that views
/// it. Mutating a table in place after its bytes were memoized makes those
/// bytes stale; callers must [`clear`](BinaryMemo::clear) the memo before
/// serializing again after any edit.
///
/// Each entry keeps its table alive so its identity cannot be reused by a
/// new allocation.
#[derive(Default)]
pub struct BinaryMemo {
    entries: HashMap<TableId, (Table, Bytes)>,
    hits: usize,
}

impl BinaryMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes previously recorded for `table`.
    pub fn get(&mut self, table: &Table) -> Option<Bytes> {
        let bytes = self.entries.get(&table.id()).map(|(_, bytes)| bytes.clone());
        if bytes.is_some() {
            self.hits += 1;
            log::trace!("Binary memo hit for table {:?}", table.id());
        }
        bytes
    }

    /// Record the serialized form of `table`.
    pub fn insert(&mut self, table: &Table, bytes: Bytes) {
        self.entries.insert(table.id(), (table.clone(), bytes));
    }

    pub fn contains(&self, table: &Table) -> bool {
        self.entries.contains_key(&table.id())
    }

    /// Number of lookups answered from the memo.
    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyed_by_identity() {
        let mut memo = BinaryMemo::new();
        let a = Table::new(None);
        let b = Table::new(None);
        memo.insert(&a, Bytes::from_static(b"\0\0\0\0"));

        assert!(memo.contains(&a));
        assert!(!memo.contains(&b));
        assert_eq!(memo.get(&a.clone()), Some(Bytes::from_static(b"\0\0\0\0")));
        assert_eq!(memo.get(&b), None);
        assert_eq!(memo.hits(), 1);
    }

    #[test]
    fn entries_keep_tables_alive() {
        let mut memo = BinaryMemo::new();
        let table = Table::new(None);
        memo.insert(&table, Bytes::new());
        assert_eq!(table.owner_count(), 2);
        memo.clear();
        assert_eq!(table.owner_count(), 1);
        assert!(memo.is_empty());
    }
}
