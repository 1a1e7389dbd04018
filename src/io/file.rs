use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use bytes::Bytes;

use super::source::{check_range, ByteSink, ByteSource};
use crate::error::IoError;

/// Byte source backed by a local file.
///
/// The file length is cached at open time and kept current by writes, so
/// `size()` never touches the filesystem.
pub struct FileSource {
    file: File,
    len: u64,
    identifier: String,
    writable: bool,
}

impl FileSource {
    /// Open a file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let identifier = path.display().to_string();
        let file = File::open(path).map_err(|e| IoError::os(&identifier, e))?;
        Self::from_file(file, identifier, false)
    }

    /// Open an existing file for reading and in-place modification.
    pub fn open_rw(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let identifier = path.display().to_string();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| IoError::os(&identifier, e))?;
        Self::from_file(file, identifier, true)
    }

    /// Create (or truncate) a file for writing.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let identifier = path.display().to_string();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| IoError::os(&identifier, e))?;
        Self::from_file(file, identifier, true)
    }

    fn from_file(file: File, identifier: String, writable: bool) -> Result<Self, IoError> {
        let len = file
            .metadata()
            .map_err(|e| IoError::os(&identifier, e))?
            .len();
        Ok(Self {
            file,
            len,
            identifier,
            writable,
        })
    }

    fn ensure_writable(&self) -> Result<(), IoError> {
        if self.writable {
            Ok(())
        } else {
            Err(IoError::ReadOnly(self.identifier.clone()))
        }
    }
}

impl ByteSource for FileSource {
    fn read_exact_at(&mut self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_range(offset, len, self.len)?;
        if len == 0 {
            return Ok(Bytes::new());
        }

        let mut buf = vec![0u8; len];
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.read_exact(&mut buf))
            .map_err(|e| IoError::os(&self.identifier, e))?;
        Ok(Bytes::from(buf))
    }

    fn size(&self) -> u64 {
        self.len
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl ByteSink for FileSource {
    fn write_all_at(&mut self, offset: u64, data: &[u8]) -> Result<(), IoError> {
        self.ensure_writable()?;
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.write_all(data))
            .map_err(|e| IoError::os(&self.identifier, e))?;
        self.len = self.len.max(offset + data.len() as u64);
        Ok(())
    }

    fn set_len(&mut self, len: u64) -> Result<(), IoError> {
        self.ensure_writable()?;
        self.file
            .set_len(len)
            .map_err(|e| IoError::os(&self.identifier, e))?;
        self.len = len;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), IoError> {
        self.file
            .flush()
            .map_err(|e| IoError::os(&self.identifier, e))
    }
}
