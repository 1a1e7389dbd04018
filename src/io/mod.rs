mod block_cache;
mod file;
mod memory;
mod source;

pub use block_cache::{BlockCache, DEFAULT_BLOCK_CACHE_CAPACITY, DEFAULT_BLOCK_SIZE};
pub use file::FileSource;
pub use memory::MemorySource;
pub use source::{
    read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le, ByteSink,
    ByteSource,
};
