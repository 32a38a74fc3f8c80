//! Inheriting tables with copy-on-write materialization.
//!
//! A table never copies its ancestor. Reads fall through `inherit_from`;
//! when a read finds a table in an ancestor, a thin child view of it is
//! created and cached locally, so later writes land in the view and never
//! touch shared storage.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use crate::{Error, Value};

/// The reserved key naming the file an inherited table came from.
pub const REF_KEY: &str = "$REF";

/// How a table came to exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableKind {
    /// Built by a script (`{}`) or a loader, optionally with an ancestor.
    Plain,
    /// Materialized on first read of an inherited table-valued key.
    View,
    /// Returned by `Inherit`, `Reference` or `InheritMeta`; carries `$REF`.
    Reference,
}

/// Identity of a table, stable for as long as the table is alive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(usize);

struct TableInner {
    entries: RefCell<BTreeMap<u32, Value>>,
    source: Option<Rc<str>>,
    inherit_from: Option<Table>,
    kind: TableKind,
    unchanged: Cell<bool>,
}

/// A shared, reference-counted table handle.
///
/// Cloning the handle adds an owner; the table is destroyed when the last
/// handle is dropped. The ancestor link is fixed at construction.
#[derive(Clone)]
pub struct Table(Rc<TableInner>);

impl Table {
    fn build(
        inherit_from: Option<Table>,
        source: Option<Rc<str>>,
        kind: TableKind,
        unchanged: bool,
    ) -> Self {
        Table(Rc::new(TableInner {
            entries: RefCell::new(BTreeMap::new()),
            source,
            inherit_from,
            kind,
            unchanged: Cell::new(unchanged),
        }))
    }

    /// Create an empty table with no ancestor.
    pub fn new(source: Option<Rc<str>>) -> Self {
        Self::build(None, source, TableKind::Plain, false)
    }

    /// Create an empty child of `parent`.
    ///
    /// The child starts out unchanged: every lookup resolves to the parent.
    pub fn inheriting(parent: &Table, source: Option<Rc<str>>) -> Self {
        Self::build(Some(parent.clone()), source, TableKind::Plain, true)
    }

    /// Create the child returned by an inheritance call.
    ///
    /// `ref_key` (the hash of [`REF_KEY`]) is set to `name` without counting
    /// as a change.
    pub fn reference(
        parent: &Table,
        source: Option<Rc<str>>,
        ref_key: u32,
        name: Value,
    ) -> Self {
        let table = Self::build(Some(parent.clone()), source, TableKind::Reference, true);
        table.0.entries.borrow_mut().insert(ref_key, name);
        table
    }

    fn view_of(found: &Table, source: Option<Rc<str>>) -> Self {
        Self::build(Some(found.clone()), source, TableKind::View, true)
    }

    /// Check if two handles point at the same table.
    pub fn ptr_eq(a: &Table, b: &Table) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    /// The identity of this table.
    pub fn id(&self) -> TableId {
        TableId(Rc::as_ptr(&self.0) as usize)
    }

    /// Number of handles currently owning this table.
    pub fn owner_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Name of the file that defined this table.
    pub fn source(&self) -> Option<&str> {
        self.0.source.as_deref()
    }

    fn source_rc(&self) -> Option<Rc<str>> {
        self.0.source.clone()
    }

    /// The ancestor this table reads through.
    pub fn inherit_from(&self) -> Option<&Table> {
        self.0.inherit_from.as_ref()
    }

    /// How this table was created.
    pub fn kind(&self) -> TableKind {
        self.0.kind
    }

    /// Get an own entry, ignoring ancestors.
    pub fn own(&self, key: u32) -> Option<Value> {
        self.0.entries.borrow().get(&key).cloned()
    }

    /// Check for an own entry.
    pub fn contains_own(&self, key: u32) -> bool {
        self.0.entries.borrow().contains_key(&key)
    }

    /// Own keys in hash order.
    pub fn own_keys(&self) -> Vec<u32> {
        self.0.entries.borrow().keys().copied().collect()
    }

    /// Number of own entries.
    pub fn own_len(&self) -> usize {
        self.0.entries.borrow().len()
    }

    /// Keys of this table and every ancestor, deduplicated, in hash order.
    pub fn merged_keys(&self) -> Vec<u32> {
        let mut keys = BTreeSet::new();
        let mut current = Some(self.clone());
        while let Some(table) = current {
            keys.extend(table.0.entries.borrow().keys().copied());
            current = table.inherit_from().cloned();
        }
        keys.into_iter().collect()
    }

    /// Find the first table in the chain that defines `key`.
    ///
    /// Returns the value and whether it came from an ancestor.
    fn find(&self, key: u32) -> Option<(Value, bool)> {
        if let Some(value) = self.own(key) {
            return Some((value, false));
        }
        let mut current = self.inherit_from().cloned();
        while let Some(table) = current {
            if let Some(value) = table.own(key) {
                return Some((value, true));
            }
            current = table.inherit_from().cloned();
        }
        None
    }

    /// Resolve `key` through the chain without materializing anything.
    ///
    /// Returns `Value::Nil` when no table in the chain defines the key.
    pub fn lookup(&self, key: u32) -> Value {
        self.find(key).map(|(value, _)| value).unwrap_or_default()
    }

    /// Resolve `key` with copy-on-write semantics.
    ///
    /// A table found in an ancestor is wrapped in a fresh unchanged view,
    /// stored under `key` in this table, and returned. Later reads of the
    /// same key return that same view.
    pub fn get(&self, key: u32) -> Value {
        match self.find(key) {
            Some((Value::Table(found), true)) => {
                let view = Table::view_of(&found, self.source_rc());
                log::trace!("Materialized view of table {:?} under key {:#010x}", found.id(), key);
                // Not a change: the view resolves exactly like the ancestor.
                self.0
                    .entries
                    .borrow_mut()
                    .insert(key, Value::Table(view.clone()));
                Value::Table(view)
            }
            Some((value, _)) => value,
            None => Value::Nil,
        }
    }

    /// Write `value` under `key` in this table only.
    ///
    /// Ancestors are never touched. The write marks this table as changed.
    pub fn set(&self, key: u32, value: Value) -> Result<(), Error> {
        if value.is_function_marker() {
            return Err(Error::FunctionMarkerStored {
                marker: value.type_name(),
            });
        }
        self.0.entries.borrow_mut().insert(key, value);
        self.0.unchanged.set(false);
        Ok(())
    }

    /// Check if every key resolves exactly as in the ancestor.
    ///
    /// This is deep: a view whose own nested view was written to is changed.
    pub fn is_unchanged(&self) -> bool {
        self.0.unchanged.get()
            && self.0.entries.borrow().values().all(|value| match value {
                Value::Table(t) => t.is_unchanged(),
                _ => true,
            })
    }

    /// The table this one is a view of, following views all the way down.
    pub fn origin(&self) -> Table {
        let mut current = self.clone();
        while current.kind() == TableKind::View {
            match current.inherit_from() {
                Some(parent) => current = parent.clone(),
                None => break,
            }
        }
        current
    }

    /// Check if this table is a materialized view of `other` (or of a view of it).
    pub fn is_view_of(&self, other: &Table) -> bool {
        self.kind() == TableKind::View
            && self
                .inherit_from()
                .is_some_and(|parent| Table::ptr_eq(&parent.origin(), &other.origin()))
    }

    /// Number of ancestors above this table.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.inherit_from().cloned();
        while let Some(table) = current {
            depth += 1;
            current = table.inherit_from().cloned();
        }
        depth
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("source", &self.source())
            .field("own_len", &self.own_len())
            .field("depth", &self.depth())
            .field("unchanged", &self.0.unchanged.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyDictionary;

    fn key(dict: &KeyDictionary, name: &str) -> u32 {
        dict.hash_str(name)
    }

    #[test]
    fn lookup_walks_the_chain() {
        let dict = KeyDictionary::new();
        let grandparent = Table::new(None);
        grandparent.set(key(&dict, "speed"), Value::Float(3.0)).unwrap();
        let parent = Table::inheriting(&grandparent, None);
        parent.set(key(&dict, "armor"), Value::Float(10.0)).unwrap();
        let child = Table::inheriting(&parent, None);

        assert_eq!(child.lookup(key(&dict, "speed")), Value::Float(3.0));
        assert_eq!(child.lookup(key(&dict, "armor")), Value::Float(10.0));
        assert_eq!(child.lookup(key(&dict, "missing")), Value::Nil);
        assert_eq!(child.depth(), 2);
    }

    #[test]
    fn inherited_tables_materialize_once() {
        let dict = KeyDictionary::new();
        let weapon = Table::new(None);
        weapon.set(key(&dict, "damage"), Value::Float(5.0)).unwrap();
        let parent = Table::new(None);
        parent.set(key(&dict, "weapon"), Value::Table(weapon.clone())).unwrap();
        let child = Table::inheriting(&parent, None);

        let first = child.get(key(&dict, "weapon"));
        let second = child.get(key(&dict, "weapon"));
        let view = first.as_table().unwrap();

        assert_eq!(first, second);
        assert_eq!(view.kind(), TableKind::View);
        assert!(Table::ptr_eq(view.inherit_from().unwrap(), &weapon));
        assert!(view.is_unchanged());
        assert!(child.contains_own(key(&dict, "weapon")));
        // Materializing is not a change.
        assert!(child.is_unchanged());
    }

    #[test]
    fn own_tables_are_not_wrapped() {
        let dict = KeyDictionary::new();
        let inner = Table::new(None);
        let table = Table::new(None);
        table.set(key(&dict, "inner"), Value::Table(inner.clone())).unwrap();

        assert_eq!(table.get(key(&dict, "inner")), Value::Table(inner));
    }

    #[test]
    fn writes_never_touch_ancestors() {
        let dict = KeyDictionary::new();
        let weapon = Table::new(None);
        weapon.set(key(&dict, "damage"), Value::Float(5.0)).unwrap();
        let parent = Table::new(None);
        parent.set(key(&dict, "weapon"), Value::Table(weapon.clone())).unwrap();
        let child = Table::inheriting(&parent, None);

        let view = child.get(key(&dict, "weapon"));
        view.as_table()
            .unwrap()
            .set(key(&dict, "damage"), Value::Float(9.0))
            .unwrap();

        assert_eq!(weapon.lookup(key(&dict, "damage")), Value::Float(5.0));
        assert_eq!(
            view.as_table().unwrap().lookup(key(&dict, "damage")),
            Value::Float(9.0)
        );
        // The change below makes the whole child changed.
        assert!(!child.is_unchanged());
    }

    #[test]
    fn reference_sets_ref_without_changing() {
        let dict = KeyDictionary::new();
        let parent = Table::new(None);
        let ref_key = key(&dict, REF_KEY);
        let child = Table::reference(&parent, Some("a.lua".into()), ref_key, Value::from("b.lua"));

        assert_eq!(child.kind(), TableKind::Reference);
        assert_eq!(child.own(ref_key), Some(Value::from("b.lua")));
        assert_eq!(child.source(), Some("a.lua"));
        assert!(child.is_unchanged());

        child.set(key(&dict, "x"), Value::Boolean(true)).unwrap();
        assert!(!child.is_unchanged());
    }

    #[test]
    fn markers_cannot_be_stored() {
        let table = Table::new(None);
        let err = table.set(1, Value::InheritMetaFn).unwrap_err();
        assert!(matches!(err, Error::FunctionMarkerStored { .. }));
        assert_eq!(table.own_len(), 0);
    }

    #[test]
    fn merged_keys_are_deduplicated() {
        let parent = Table::new(None);
        parent.set(3, Value::Float(1.0)).unwrap();
        parent.set(1, Value::Float(1.0)).unwrap();
        let child = Table::inheriting(&parent, None);
        child.set(3, Value::Float(2.0)).unwrap();
        child.set(2, Value::Float(2.0)).unwrap();

        assert_eq!(child.merged_keys(), vec![1, 2, 3]);
        assert_eq!(child.own_keys(), vec![2, 3]);
    }

    #[test]
    fn origin_and_view_identity() {
        let base = Table::new(None);
        base.set(1, Value::Table(Table::new(None))).unwrap();
        let middle = Table::inheriting(&base, None);
        let top = Table::inheriting(&middle, None);

        let middle_view = middle.get(1);
        let top_view = top.get(1);
        let inner = base.own(1).unwrap();
        let inner = inner.as_table().unwrap();

        // top's view was created through middle's view, yet both reach `inner`.
        assert!(Table::ptr_eq(&top_view.as_table().unwrap().origin(), inner));
        assert!(top_view.as_table().unwrap().is_view_of(inner));
        assert!(top_view
            .as_table()
            .unwrap()
            .is_view_of(middle_view.as_table().unwrap()));
        assert!(!inner.is_view_of(inner));
    }

    #[test]
    fn dropping_last_owner_frees_the_chain() {
        let parent = Table::new(None);
        let child = Table::inheriting(&parent, None);
        assert_eq!(parent.owner_count(), 2);
        drop(child);
        assert_eq!(parent.owner_count(), 1);
    }

    #[test]
    fn nil_masks_an_inherited_value() {
        let parent = Table::new(None);
        parent.set(5, Value::Float(1.0)).unwrap();
        let child = Table::inheriting(&parent, None);
        child.set(5, Value::Nil).unwrap();

        assert_eq!(child.lookup(5), Value::Nil);
        assert_eq!(child.get(5), Value::Nil);
        assert_eq!(parent.lookup(5), Value::Float(1.0));
    }
}
