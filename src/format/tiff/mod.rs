//! TIFF and BigTIFF containers.
//!
//! # Key Concepts
//!
//! - **Byte order**: the header declares it (`II` little-endian, `MM`
//!   big-endian) and every multi-byte field follows it, pixel samples
//!   included.
//!
//! - **Classic TIFF vs BigTIFF**: classic files use 32-bit offsets and
//!   12-byte entries; BigTIFF uses 64-bit offsets and 20-byte entries. Both
//!   are handled by the same code paths, switched on [`TiffHeader`].
//!
//! - **IFD (Image File Directory)**: one image's tags. Directories form a
//!   chain through their next-IFD pointers. A parsed IFD is a
//!   [`Directory`]; [`RawIfd`] keeps the undecoded entries and their file
//!   positions for surgical edits.
//!
//! - **Inline vs offset values**: values that fit the entry slot are stored
//!   in it, larger ones elsewhere in the file with the slot holding their
//!   offset.
//!
//! - **Chunks**: pixel data is split into strips or tiles, described by
//!   [`StripLayout`] and located with [`ChunkGrid`].

mod directory;
mod geometry;
mod layout;
mod overwrite;
mod parser;
mod tags;
mod validation;
mod values;
mod writer;

pub use directory::{
    Directory, DEFAULT_REFERENCE_BLACK_WHITE, DEFAULT_YCBCR_COEFFICIENTS,
    DEFAULT_YCBCR_SUBSAMPLING,
};
pub use geometry::{ColorModel, SampleGeometry};
pub use layout::{ChunkGrid, ChunkInfo, Region, StripLayout};
pub use overwrite::{overwrite_ifd_value, OverwriteStrategy};
pub use parser::{
    check_header, ByteOrder, IfdEntry, RawIfd, TiffHeader, TiffParser, BIGTIFF_HEADER_SIZE,
    TIFF_HEADER_SIZE, VERSION_BIGTIFF, VERSION_TIFF,
};
pub use tags::{
    parse_tag, tag_name, Compression, FieldType, FillOrder, Photometric, PlanarConfiguration,
    Predictor, SampleFormat, Tag,
};
pub use validation::{normalize_bits_per_sample, validate_directory, ValidationError, ValidationResult};
pub use values::{Rational, SRational, TagValue, ValueReader};
pub use writer::{encode_ifd, word_align, TiffWriter};
