//! # micro-tiff
//!
//! Reading and writing of classic TIFF and BigTIFF containers as used for
//! multi-dimensional microscopy data.
//!
//! ## Features
//!
//! - **Directory parsing**: header check, IFD chain walking with cycle and
//!   bounds protection, every TIFF field type in either byte order
//! - **Pixel reconstruction**: strips or tiles, chunky or planar, any bit
//!   depth, with repair heuristics for common encoder bugs
//! - **Photometrics**: WhiteIsZero and CMYK inversion, YCbCr to RGB, CFA
//!   plane splitting, palette indices with the color map exposed
//! - **Codecs**: LZW, PackBits, Deflate, baseline JPEG, and JPEG-2000
//!   (decode only)
//! - **Writing**: directory chains, whole images in strips or tiles, and
//!   in-place overwrite of single tag values
//!
//! ## Architecture
//!
//! - [`io`] - byte sources and sinks, block cache
//! - [`mod@format`] - TIFF structures and JPEG stream helpers
//! - [`codec`] - compression schemes behind the [`Codec`] trait
//! - [`pixel`] - bit unpacking, predictor, color conversion
//! - [`raster`] - region reads and whole-image writes
//! - [`config`] - CLI configuration for the `micro-tiff` binary
//!
//! ## Example
//!
//! ```rust,no_run
//! use micro_tiff::{FileSource, RasterReader, Region};
//!
//! # fn main() -> Result<(), micro_tiff::TiffError> {
//! let mut reader = RasterReader::new(FileSource::open("image.tif")?)?;
//! let layout = reader.output_layout(0)?;
//! let samples = reader.read_region(0, Region::new(0, 0, 256, 256))?;
//! assert_eq!(samples.len(), layout.buffer_len(256, 256)?);
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod pixel;
pub mod raster;

// Re-export commonly used types
pub use codec::{codec_for, verify_round_trip, Codec, CodecOptions};
pub use error::{CodecError, IoError, TiffError};
pub use format::tiff::{
    check_header, overwrite_ifd_value, ByteOrder, Compression, Directory, OverwriteStrategy,
    Photometric, PlanarConfiguration, Predictor, Region, SampleGeometry, StripLayout, Tag,
    TagValue, TiffHeader, TiffParser, TiffWriter,
};
pub use io::{BlockCache, ByteSink, ByteSource, FileSource, MemorySource};
pub use pixel::OutputLayout;
pub use raster::{ChunkLayout, ImageSpec, ImageWriter, RasterReader};
