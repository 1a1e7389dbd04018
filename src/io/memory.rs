use bytes::Bytes;

use super::source::{check_range, ByteSink, ByteSource};
use crate::error::IoError;

/// In-memory byte source, readable and writable.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    data: Vec<u8>,
    identifier: String,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Self {
        Self::with_identifier(data, "memory://")
    }

    pub fn with_identifier(data: Vec<u8>, identifier: impl Into<String>) -> Self {
        Self {
            data,
            identifier: identifier.into(),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl ByteSource for MemorySource {
    fn read_exact_at(&mut self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_range(offset, len, self.data.len() as u64)?;
        let start = offset as usize;
        Ok(Bytes::copy_from_slice(&self.data[start..start + len]))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl ByteSink for MemorySource {
    fn write_all_at(&mut self, offset: u64, data: &[u8]) -> Result<(), IoError> {
        let start = usize::try_from(offset).map_err(|_| IoError::RangeOutOfBounds {
            offset,
            requested: data.len() as u64,
            size: self.data.len() as u64,
        })?;
        let end = start + data.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn set_len(&mut self, len: u64) -> Result<(), IoError> {
        let len = usize::try_from(len).map_err(|_| IoError::RangeOutOfBounds {
            offset: 0,
            requested: len,
            size: self.data.len() as u64,
        })?;
        self.data.resize(len, 0);
        Ok(())
    }
}
