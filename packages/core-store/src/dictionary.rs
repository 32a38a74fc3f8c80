//! The key dictionary: hash to original string.

use std::borrow::Cow;
use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use bytes::Bytes;

use crate::hash::hash;

/// The string that produced a hash.
#[derive(Debug)]
pub struct DictionaryEntry {
    bytes: Bytes,
    wide: OnceCell<Vec<u16>>,
}

impl DictionaryEntry {
    fn new(bytes: Bytes) -> Self {
        Self {
            bytes,
            wide: OnceCell::new(),
        }
    }

    /// The raw bytes of the key.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Byte length of the key.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the key is the empty string.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The key as text, replacing invalid UTF-8.
    pub fn as_str_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// The key widened to 16-bit characters, built on first use.
    pub fn wide(&self) -> &[u16] {
        self.wide
            .get_or_init(|| self.bytes.iter().map(|&b| b as u16).collect())
    }
}

/// Remembers the string behind every hash computed through it.
///
/// The dictionary is caller-constructed and shared by handle (`Rc`) between
/// the dependency cache and the serializers of one session. Entries are
/// append-only: the first string recorded for a hash wins and a colliding
/// string is never corrected. Call [`KeyDictionary::clear`] at the end of a
/// session to release everything at once.
///
/// # Example
///
/// ```rust
/// use attrib_core_store::KeyDictionary;
///
/// let dict = KeyDictionary::new();
/// let key = dict.hash_str("health_max");
/// assert_eq!(dict.name(key).as_deref(), Some("health_max"));
/// ```
#[derive(Debug, Default)]
pub struct KeyDictionary {
    entries: RefCell<HashMap<u32, Rc<DictionaryEntry>>>,
}

impl KeyDictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash `bytes` and remember them.
    pub fn hash_bytes(&self, bytes: &[u8]) -> u32 {
        let key = hash(bytes);
        self.record(key, bytes);
        key
    }

    /// Hash a string and remember it.
    pub fn hash_str(&self, s: &str) -> u32 {
        self.hash_bytes(s.as_bytes())
    }

    /// Record `bytes` as the name of `key`.
    ///
    /// Returns `false` if the hash was already known (the existing name is kept).
    pub fn record(&self, key: u32, bytes: &[u8]) -> bool {
        let mut entries = self.entries.borrow_mut();
        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(
            key,
            Rc::new(DictionaryEntry::new(Bytes::copy_from_slice(bytes))),
        );
        true
    }

    /// Look up the entry for a hash.
    pub fn get(&self, key: u32) -> Option<Rc<DictionaryEntry>> {
        self.entries.borrow().get(&key).cloned()
    }

    /// The name of a hash as text, if known.
    pub fn name(&self, key: u32) -> Option<String> {
        self.get(key).map(|entry| entry.as_str_lossy().into_owned())
    }

    /// Check if a hash has a known name.
    pub fn contains(&self, key: u32) -> bool {
        self.entries.borrow().contains_key(&key)
    }

    /// Number of known hashes.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Check if no hash is known.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Forget everything. Intended for the end of an editing session.
    pub fn clear(&self) {
        let mut entries = self.entries.borrow_mut();
        log::debug!("Clearing key dictionary ({} entries)", entries.len());
        entries.clear();
    }
}
