use std::io::{Read, Seek, Write};
use std::{fs, io, path};

use attrib_ll_store::{Directory, LLError, SeekFrom, Stream};

use crate::LocalStoreError;

/// A [`Stream`] over an open file.
pub struct FileStream {
    file: fs::File,
}

impl FileStream {
    pub fn new(file: fs::File) -> Self {
        FileStream { file }
    }
}

impl Stream for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LLError> {
        Ok(self.file.read(buf)?)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), LLError> {
        Ok(self.file.write_all(data)?)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, LLError> {
        Ok(self.file.seek(pos)?)
    }
}

/// Attribute files under a root directory.
pub struct LocalDirectory {
    root: path::PathBuf,
    writable: bool,
}

impl LocalDirectory {
    pub fn new(root: path::PathBuf) -> Result<LocalDirectory, LocalStoreError> {
        let attr = fs::metadata(&root).map_err(|error| LocalStoreError::RootPathInvalid {
            path: root.clone(),
            error,
        })?;

        if !attr.is_dir() {
            return Err(LocalStoreError::RootPathInvalid {
                path: root,
                error: io::Error::other("Root path must be a directory."),
            });
        }

        // Game installs are often read-only; writes fail later instead.
        let writable = !attr.permissions().readonly();

        match root.canonicalize() {
            Ok(root) => Ok(LocalDirectory { root, writable }),
            Err(error) => Err(LocalStoreError::RootPathInvalid { path: root, error }),
        }
    }

    pub fn root(&self) -> &path::Path {
        &self.root
    }

    fn components(name: &str) -> Result<Vec<&str>, LocalStoreError> {
        let components: Vec<&str> = name.split(['\\', '/']).collect();
        let invalid = components
            .iter()
            .any(|c| c.is_empty() || *c == "." || *c == ".." || c.contains(':'));
        if invalid {
            return Err(LocalStoreError::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(components)
    }

    /// The path `name` maps to, as spelled.
    fn name_to_path(&self, name: &str) -> Result<path::PathBuf, LocalStoreError> {
        let mut file_path = self.root.clone();
        file_path.extend(Self::components(name)?);
        Ok(file_path)
    }

    /// Find an existing file for `name`, ignoring ASCII case.
    fn resolve(&self, name: &str) -> Result<Option<path::PathBuf>, LocalStoreError> {
        let exact = self.name_to_path(name)?;
        if exact.is_file() {
            return Ok(Some(exact));
        }

        let mut current = self.root.clone();
        for component in Self::components(name)? {
            let entries = match fs::read_dir(&current) {
                Ok(entries) => entries,
                Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(error) => {
                    return Err(LocalStoreError::Io {
                        path: current,
                        error,
                    })
                }
            };
            let found = entries.filter_map(Result::ok).find(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|n| n.eq_ignore_ascii_case(component))
            });
            match found {
                Some(entry) => current = entry.path(),
                None => return Ok(None),
            }
        }
        Ok(current.is_file().then_some(current))
    }
}

impl Directory for LocalDirectory {
    fn open_read(&mut self, name: &str) -> Result<Option<Box<dyn Stream>>, LLError> {
        let Some(file_path) = self.resolve(name)? else {
            log::debug!("No file for {} under {}", name, self.root.display());
            return Ok(None);
        };
        log::debug!("Reading {}...", file_path.display());
        let file = fs::File::open(&file_path).map_err(|error| LocalStoreError::Io {
            path: file_path,
            error,
        })?;
        Ok(Some(Box::new(FileStream::new(file))))
    }

    fn open_write(&mut self, name: &str) -> Result<Box<dyn Stream>, LLError> {
        if !self.writable {
            return Err(LocalStoreError::ReadOnly.into());
        }
        let file_path = match self.resolve(name)? {
            Some(existing) => existing,
            None => self.name_to_path(name)?,
        };
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).map_err(|error| LocalStoreError::Io {
                path: parent.to_path_buf(),
                error,
            })?;
        }

        log::debug!("Writing {}...", file_path.display());
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&file_path)
            .map_err(|error| LocalStoreError::Io {
                path: file_path,
                error,
            })?;
        Ok(Box::new(FileStream::new(file)))
    }
}
