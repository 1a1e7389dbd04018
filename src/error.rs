use thiserror::Error;

/// I/O errors raised by byte sources and sinks
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error reported by the operating system
    #[error("I/O error on {identifier}: {message}")]
    Os { identifier: String, message: String },

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// The source does not support writing
    #[error("Source is read-only: {0}")]
    ReadOnly(String),

    /// File not found
    #[error("File not found: {0}")]
    NotFound(String),
}

impl IoError {
    /// Wrap a `std::io::Error` with the identifier of the resource it came from.
    pub fn os(identifier: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            return IoError::NotFound(identifier.to_string());
        }
        IoError::Os {
            identifier: identifier.to_string(),
            message: err.to_string(),
        }
    }
}

/// Errors raised by compression codecs
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// The codec cannot perform this operation (e.g. encoding JPEG-2000)
    #[error("{codec}: {operation} is not supported")]
    Unsupported {
        codec: &'static str,
        operation: &'static str,
    },

    /// Compressed stream is corrupt or truncated
    #[error("{codec} decode failed: {message}")]
    Decode {
        codec: &'static str,
        message: String,
    },

    /// Encoder rejected the input
    #[error("{codec} encode failed: {message}")]
    Encode {
        codec: &'static str,
        message: String,
    },

    /// Options do not describe the buffer handed to the codec
    #[error("{codec}: invalid options: {message}")]
    InvalidOptions {
        codec: &'static str,
        message: String,
    },

    /// A round-trip self-test produced different bytes
    #[error("{codec} round-trip mismatch: {message}")]
    RoundTrip {
        codec: &'static str,
        message: String,
    },
}

/// Errors that can occur when reading or writing TIFF files
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading or writing the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Codec failure while compressing or decompressing a chunk
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The stream does not start with a TIFF header
    #[error("Not a TIFF file")]
    NotTiff,

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// No directory exists at the requested index
    #[error("IFD index {index} out of range ({count} directories)")]
    IfdIndexOutOfRange { index: usize, count: usize },

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// A specifically requested tag is not present
    #[error("Tag not found: {0}")]
    TagNotFound(String),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: String, message: String },

    /// Compression scheme recognized but not implemented
    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(String),

    /// Photometric interpretation, predictor or layout recognized but not implemented
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Heuristic recovery could not reconstruct the strip layout
    #[error("Insufficient metadata: {0}")]
    InsufficientMetadata(String),

    /// A computed size overflows the addressable range
    #[error("Size overflow computing {what}")]
    TooLarge { what: &'static str },

    /// The requested region does not lie within the image
    #[error("Region {x},{y} {width}x{height} outside image {image_width}x{image_height}")]
    RegionOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },

    /// Caller-supplied buffer cannot hold the decoded region
    #[error("Buffer too small: need {required} bytes, got {actual}")]
    BufferTooSmall { required: usize, actual: usize },
}

impl TiffError {
    /// Build an `InvalidTagValue` error naming the offending tag.
    pub fn invalid_tag(tag: impl Into<String>, message: impl Into<String>) -> Self {
        TiffError::InvalidTagValue {
            tag: tag.into(),
            message: message.into(),
        }
    }

    /// Whether this error means "try another format" rather than a broken file.
    pub fn is_not_this_format(&self) -> bool {
        matches!(
            self,
            TiffError::NotTiff | TiffError::InvalidMagic(_) | TiffError::InvalidVersion(_)
        )
    }
}
