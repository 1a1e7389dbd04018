use std::num::NonZeroUsize;

use bytes::{Bytes, BytesMut};
use lru::LruCache;

use super::ByteSource;
use crate::error::IoError;

/// Default block size: 64KB.
/// Large enough to cover a whole IFD and its out-of-line arrays in one read.
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Default cache capacity in number of blocks.
/// 64 blocks * 64KB = 4MB default cache size.
pub const DEFAULT_BLOCK_CACHE_CAPACITY: usize = 64;

/// Block-based read cache that wraps any ByteSource.
///
/// Directory parsing issues many small reads at scattered offsets (entry
/// tables, out-of-line arrays, strip offset lists). Caching fixed-size,
/// block-aligned reads turns these into a handful of larger ones.
///
/// - Fixed-size blocks, LRU eviction once capacity is reached
/// - Reads spanning several blocks are stitched together
/// - Read-only: writes go to the underlying sink directly, so a cache must
///   not outlive a modification of the file it wraps
pub struct BlockCache<S> {
    inner: S,
    block_size: usize,
    cache: LruCache<u64, Bytes>,
}

impl<S: ByteSource> BlockCache<S> {
    /// Create a new BlockCache with the default block size and capacity.
    pub fn new(inner: S) -> Self {
        Self::with_capacity(inner, DEFAULT_BLOCK_SIZE, DEFAULT_BLOCK_CACHE_CAPACITY)
    }

    /// Create a new BlockCache with custom block size and capacity.
    ///
    /// Zero values are bumped to 1.
    pub fn with_capacity(inner: S, block_size: usize, capacity: usize) -> Self {
        Self {
            inner,
            block_size: block_size.max(1),
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Unwrap the cache, returning the underlying source.
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    fn get_block(&mut self, block_idx: u64) -> Result<Bytes, IoError> {
        if let Some(data) = self.cache.get(&block_idx) {
            return Ok(data.clone());
        }

        let offset = block_idx * self.block_size as u64;
        let size = self.inner.size();

        // The last block may be short
        let remaining = size.saturating_sub(offset);
        if remaining == 0 {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: self.block_size as u64,
                size,
            });
        }

        let len = std::cmp::min(self.block_size as u64, remaining) as usize;
        let data = self.inner.read_exact_at(offset, len)?;
        self.cache.put(block_idx, data.clone());
        Ok(data)
    }

    #[inline]
    fn block_for_offset(&self, offset: u64) -> u64 {
        offset / self.block_size as u64
    }

    #[inline]
    fn offset_within_block(&self, offset: u64) -> usize {
        (offset % self.block_size as u64) as usize
    }
}

impl<S: ByteSource> ByteSource for BlockCache<S> {
    fn read_exact_at(&mut self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        super::source::check_range(offset, len, self.inner.size())?;

        if len == 0 {
            return Ok(Bytes::new());
        }

        let start_block = self.block_for_offset(offset);
        let end_block = self.block_for_offset(offset + len as u64 - 1);

        if start_block == end_block {
            let block = self.get_block(start_block)?;
            let block_offset = self.offset_within_block(offset);
            return Ok(block.slice(block_offset..block_offset + len));
        }

        let mut result = BytesMut::with_capacity(len);
        let mut remaining = len;
        let mut current_offset = offset;

        for block_idx in start_block..=end_block {
            let block = self.get_block(block_idx)?;
            let block_offset = self.offset_within_block(current_offset);
            let bytes_in_block = std::cmp::min(block.len() - block_offset, remaining);

            result.extend_from_slice(&block[block_offset..block_offset + bytes_in_block]);

            remaining -= bytes_in_block;
            current_offset += bytes_in_block as u64;
        }

        Ok(result.freeze())
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn identifier(&self) -> &str {
        self.inner.identifier()
    }
}
