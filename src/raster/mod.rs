//! Pixel-level access: decode regions of an image, encode whole images.
//!
//! Both directions share the chunk grid from
//! [`ChunkGrid`](crate::format::tiff::ChunkGrid) and the sample transforms
//! in [`pixel`](crate::pixel).

mod reader;
mod writer;

pub use reader::RasterReader;
pub use writer::{ChunkLayout, ImageSpec, ImageWriter};
