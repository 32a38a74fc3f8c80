//! Core traits for the LL layer.

use std::io::SeekFrom;

use bytes::{Bytes, BytesMut};

use crate::LLError;

/// A seekable byte stream.
///
/// This is the lowest-level I/O interface. Data is just bytes. No parsing,
/// no validation.
///
/// # Object Safety
///
/// This trait is object-safe: directories hand out `Box<dyn Stream>`.
pub trait Stream {
    /// Read up to `buf.len()` bytes, returning how many were read.
    ///
    /// `Ok(0)` means the end of the stream was reached.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LLError>;

    /// Write all of `data` at the current position.
    fn write(&mut self, data: &[u8]) -> Result<(), LLError>;

    /// Move the current position, returning the new absolute position.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, LLError>;

    /// The current absolute position.
    fn tell(&mut self) -> Result<u64, LLError> {
        self.seek(SeekFrom::Current(0))
    }

    /// Fill `buf` completely or fail with [`LLError::UnexpectedEof`].
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), LLError> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(LLError::UnexpectedEof {
                    wanted: buf.len(),
                    available: filled,
                });
            }
            filled += n;
        }
        Ok(())
    }
}

/// A named collection of files.
///
/// Attribute file names are opaque strings at this level; implementations
/// decide how (and whether) to fold case or separators.
pub trait Directory {
    /// Open a file for reading.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - The file does not exist (not an error condition).
    /// * `Ok(Some(stream))` - A stream positioned at the start of the file.
    /// * `Err(LLError)` - A transport or system error occurred.
    fn open_read(&mut self, name: &str) -> Result<Option<Box<dyn Stream>>, LLError>;

    /// Open a file for writing, creating or truncating it.
    fn open_write(&mut self, name: &str) -> Result<Box<dyn Stream>, LLError>;
}

/// Read everything from the current position to the end of the stream.
pub fn read_to_end(stream: &mut dyn Stream) -> Result<Bytes, LLError> {
    let mut out = BytesMut::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&chunk[..n]);
    }
    Ok(out.freeze())
}

// Blanket implementations for references and boxes

impl<T: Stream + ?Sized> Stream for &mut T {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LLError> {
        (**self).read(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), LLError> {
        (**self).write(data)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, LLError> {
        (**self).seek(pos)
    }
}

impl<T: Stream + ?Sized> Stream for Box<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LLError> {
        self.as_mut().read(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), LLError> {
        self.as_mut().write(data)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, LLError> {
        self.as_mut().seek(pos)
    }
}

impl<T: Directory + ?Sized> Directory for &mut T {
    fn open_read(&mut self, name: &str) -> Result<Option<Box<dyn Stream>>, LLError> {
        (**self).open_read(name)
    }

    fn open_write(&mut self, name: &str) -> Result<Box<dyn Stream>, LLError> {
        (**self).open_write(name)
    }
}

impl<T: Directory + ?Sized> Directory for Box<T> {
    fn open_read(&mut self, name: &str) -> Result<Option<Box<dyn Stream>>, LLError> {
        self.as_mut().open_read(name)
    }

    fn open_write(&mut self, name: &str) -> Result<Box<dyn Stream>, LLError> {
        self.as_mut().open_write(name)
    }
}
