//! In-memory streams and directories.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::SeekFrom;
use std::rc::Rc;

use bytes::Bytes;

use crate::{normalize_name, Directory, LLError, Stream};

/// A growable in-memory byte stream.
///
/// Streams handed out by [`MemoryDirectory`] share their buffer with the
/// directory entry, so bytes written through them are visible to later
/// readers.
///
/// # Example
///
/// ```rust
/// use attrib_ll_store::{MemoryStream, Stream, SeekFrom};
///
/// let mut stream = MemoryStream::new();
/// stream.write(&[0, 0, 0, 0]).unwrap();
/// stream.write(b"payload").unwrap();
/// stream.seek(SeekFrom::Start(0)).unwrap();
/// stream.write(&7u32.to_le_bytes()).unwrap();
///
/// assert_eq!(&stream.to_bytes()[..4], &[7, 0, 0, 0]);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStream {
    data: Rc<RefCell<Vec<u8>>>,
    pos: u64,
}

impl MemoryStream {
    /// Create an empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stream positioned at the start of `data`.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Rc::new(RefCell::new(data.into())),
            pos: 0,
        }
    }

    fn shared(data: Rc<RefCell<Vec<u8>>>) -> Self {
        Self { data, pos: 0 }
    }

    /// Snapshot of the whole buffer.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.data.borrow())
    }

    /// Total length of the buffer.
    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.borrow().is_empty()
    }
}

impl Stream for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LLError> {
        let data = self.data.borrow();
        let start = (self.pos as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), LLError> {
        let mut data = self.data.borrow_mut();
        let start = self.pos as usize;
        let end = start + bytes.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(bytes);
        self.pos = end as u64;
        Ok(())
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, LLError> {
        let len = self.data.borrow().len() as i64;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(delta) => self.pos as i64 + delta,
            SeekFrom::End(delta) => len + delta,
        };
        if target < 0 {
            return Err(LLError::InvalidSeek { position: target });
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

/// A directory of in-memory files.
///
/// Names are normalized with [`normalize_name`], so lookups are
/// case-insensitive and treat `/` and `\` alike. Every `open_read` is
/// counted, which makes it easy to assert how often a file was loaded.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    files: HashMap<String, Rc<RefCell<Vec<u8>>>>,
    reads: HashMap<String, usize>,
}

impl MemoryDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file.
    pub fn insert(&mut self, name: &str, data: impl Into<Vec<u8>>) {
        self.files
            .insert(normalize_name(name), Rc::new(RefCell::new(data.into())));
    }

    /// Get a snapshot of a file's contents.
    pub fn get(&self, name: &str) -> Option<Bytes> {
        self.files
            .get(&normalize_name(name))
            .map(|data| Bytes::copy_from_slice(&data.borrow()))
    }

    /// Check if a file exists.
    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(&normalize_name(name))
    }

    /// How many times `name` has been opened for reading.
    pub fn read_count(&self, name: &str) -> usize {
        self.reads.get(&normalize_name(name)).copied().unwrap_or(0)
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Directory for MemoryDirectory {
    fn open_read(&mut self, name: &str) -> Result<Option<Box<dyn Stream>>, LLError> {
        let key = normalize_name(name);
        log::debug!("Reading {}...", key);
        match self.files.get(&key) {
            Some(data) => {
                *self.reads.entry(key).or_insert(0) += 1;
                // Readers get a private copy so later writes don't shift under them.
                let snapshot = data.borrow().clone();
                Ok(Some(Box::new(MemoryStream::from_bytes(snapshot))))
            }
            None => Ok(None),
        }
    }

    fn open_write(&mut self, name: &str) -> Result<Box<dyn Stream>, LLError> {
        let key = normalize_name(name);
        log::debug!("Writing {}...", key);
        let data = Rc::new(RefCell::new(Vec::new()));
        self.files.insert(key, Rc::clone(&data));
        Ok(Box::new(MemoryStream::shared(data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seek_back_and_overwrite() {
        let mut stream = MemoryStream::new();
        stream.write(&[0u8; 8]).unwrap();
        stream.write(b"tail").unwrap();
        assert_eq!(stream.tell().unwrap(), 12);

        stream.seek(SeekFrom::Start(4)).unwrap();
        stream.write(&[1, 2, 3, 4]).unwrap();
        stream.seek(SeekFrom::End(0)).unwrap();
        assert_eq!(stream.tell().unwrap(), 12);

        assert_eq!(
            &stream.to_bytes()[..],
            &[0, 0, 0, 0, 1, 2, 3, 4, b't', b'a', b'i', b'l']
        );
    }

    #[test]
    fn write_past_end_zero_fills() {
        let mut stream = MemoryStream::new();
        stream.seek(SeekFrom::Start(3)).unwrap();
        stream.write(b"x").unwrap();
        assert_eq!(&stream.to_bytes()[..], &[0, 0, 0, b'x']);
    }

    #[test]
    fn negative_seek_is_rejected() {
        let mut stream = MemoryStream::from_bytes(b"abc".to_vec());
        let err = stream.seek(SeekFrom::Current(-1)).unwrap_err();
        assert!(matches!(err, LLError::InvalidSeek { position: -1 }));
    }

    #[test]
    fn read_stops_at_end() {
        let mut stream = MemoryStream::from_bytes(b"abc".to_vec());
        stream.seek(SeekFrom::Start(2)).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(stream.read(&mut buf).unwrap(), 1);
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn directory_names_are_normalized() {
        let mut dir = MemoryDirectory::new();
        dir.insert("Attrib/Units/Orc.lua", b"orc".to_vec());

        assert!(dir.contains("attrib\\units\\orc.lua"));
        assert!(dir.open_read("ATTRIB\\UNITS\\ORC.LUA").unwrap().is_some());
        assert!(dir.open_read("attrib\\units\\elf.lua").unwrap().is_none());
        assert_eq!(dir.read_count("attrib/units/orc.lua"), 1);
        assert_eq!(dir.read_count("attrib/units/elf.lua"), 0);
    }

    #[test]
    fn written_files_are_visible() {
        let mut dir = MemoryDirectory::new();
        {
            let mut out = dir.open_write("out.rgd").unwrap();
            out.write(b"\x01\x00\x00\x00").unwrap();
        }
        assert_eq!(dir.get("out.rgd").unwrap(), Bytes::from_static(b"\x01\x00\x00\x00"));
        assert_eq!(dir.len(), 1);
    }
}
