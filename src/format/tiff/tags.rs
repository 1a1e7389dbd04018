//! TIFF tag and field type definitions.
//!
//! This module defines the vocabulary for TIFF parsing and writing:
//! - Field types that determine how values are encoded
//! - A tag table mapping tag numbers to names in both directions, built
//!   at compile time from a single declaration list
//! - Code enumerations for compression, photometric interpretation,
//!   planar configuration, predictor, sample format and fill order
//!
//! The definitions support both classic TIFF and BigTIFF formats.

use crate::error::TiffError;

// =============================================================================
// TIFF Field Types
// =============================================================================

/// TIFF field types that determine how values are encoded.
///
/// Each field type has a fixed element size, which decides whether a value
/// fits inline in an IFD entry and how arrays are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum FieldType {
    /// Unsigned 8-bit integer
    Byte = 1,
    /// 8-bit ASCII character, NUL-terminated strings
    Ascii = 2,
    /// Unsigned 16-bit integer
    Short = 3,
    /// Unsigned 32-bit integer
    Long = 4,
    /// Two unsigned 32-bit integers: numerator, denominator
    Rational = 5,
    /// Signed 8-bit integer
    SByte = 6,
    /// Undefined byte data
    Undefined = 7,
    /// Signed 16-bit integer
    SShort = 8,
    /// Signed 32-bit integer
    SLong = 9,
    /// Two signed 32-bit integers
    SRational = 10,
    /// IEEE single precision
    Float = 11,
    /// IEEE double precision
    Double = 12,
    /// 32-bit IFD offset
    Ifd = 13,
    /// Unsigned 64-bit integer (BigTIFF)
    Long8 = 16,
    /// Signed 64-bit integer (BigTIFF)
    SLong8 = 17,
    /// 64-bit IFD offset (BigTIFF)
    Ifd8 = 18,
}

impl FieldType {
    /// Size of a single value of this type in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::SByte | FieldType::Undefined => 1,
            FieldType::Short | FieldType::SShort => 2,
            FieldType::Long | FieldType::SLong | FieldType::Float | FieldType::Ifd => 4,
            FieldType::Rational
            | FieldType::SRational
            | FieldType::Double
            | FieldType::Long8
            | FieldType::SLong8
            | FieldType::Ifd8 => 8,
        }
    }

    /// Create a FieldType from its numeric value.
    ///
    /// Returns `None` for unknown type values.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(FieldType::Byte),
            2 => Some(FieldType::Ascii),
            3 => Some(FieldType::Short),
            4 => Some(FieldType::Long),
            5 => Some(FieldType::Rational),
            6 => Some(FieldType::SByte),
            7 => Some(FieldType::Undefined),
            8 => Some(FieldType::SShort),
            9 => Some(FieldType::SLong),
            10 => Some(FieldType::SRational),
            11 => Some(FieldType::Float),
            12 => Some(FieldType::Double),
            13 => Some(FieldType::Ifd),
            16 => Some(FieldType::Long8),
            17 => Some(FieldType::SLong8),
            18 => Some(FieldType::Ifd8),
            _ => None,
        }
    }

    /// Get the numeric type code.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Whether this type only exists in BigTIFF files.
    #[inline]
    pub const fn is_bigtiff_only(self) -> bool {
        matches!(self, FieldType::Long8 | FieldType::SLong8 | FieldType::Ifd8)
    }

    /// Maximum bytes that can be stored inline in a classic TIFF IFD entry.
    pub const INLINE_THRESHOLD_TIFF: usize = 4;

    /// Maximum bytes that can be stored inline in a BigTIFF IFD entry.
    pub const INLINE_THRESHOLD_BIGTIFF: usize = 8;

    /// Total byte length of `count` values, or `None` on overflow.
    #[inline]
    pub fn byte_len(self, count: u64) -> Option<u64> {
        (self.size_in_bytes() as u64).checked_mul(count)
    }

    /// Check if a value with this type and count fits inline in an entry.
    #[inline]
    pub fn fits_inline(self, count: u64, is_bigtiff: bool) -> bool {
        let threshold = if is_bigtiff {
            Self::INLINE_THRESHOLD_BIGTIFF as u64
        } else {
            Self::INLINE_THRESHOLD_TIFF as u64
        };
        self.byte_len(count).is_some_and(|len| len <= threshold)
    }
}

// =============================================================================
// TIFF Tags
// =============================================================================

/// Declares the tag enumeration together with its number and name lookups,
/// so the two directions can never drift apart.
macro_rules! tiff_tags {
    ($( $(#[$doc:meta])* $name:ident = $value:literal, )+) => {
        /// Known TIFF tag numbers.
        ///
        /// Directories are keyed by raw `u16` so unknown tags survive a
        /// read/write round-trip; this enumeration names the ones the crate
        /// understands. Numbers 0 and 1 are synthetic and never written.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u16)]
        pub enum Tag {
            $( $(#[$doc])* $name = $value, )+
        }

        impl Tag {
            /// Every known tag, in declaration order.
            pub const ALL: &'static [Tag] = &[ $( Tag::$name, )+ ];

            /// Look up a tag by number.
            pub fn from_u16(value: u16) -> Option<Self> {
                match value {
                    $( $value => Some(Tag::$name), )+
                    _ => None,
                }
            }

            /// Canonical name of the tag.
            pub const fn name(self) -> &'static str {
                match self {
                    $( Tag::$name => stringify!($name), )+
                }
            }
        }
    };
}

tiff_tags! {
    /// Synthetic: byte order of the stream is little-endian
    LittleEndian = 0,
    /// Synthetic: stream is BigTIFF
    BigTiff = 1,

    NewSubfileType = 254,
    SubfileType = 255,
    /// Image width in pixels
    ImageWidth = 256,
    /// Image height (length) in pixels
    ImageLength = 257,
    BitsPerSample = 258,
    Compression = 259,
    PhotometricInterpretation = 262,
    Threshholding = 263,
    CellWidth = 264,
    CellLength = 265,
    FillOrder = 266,
    DocumentName = 269,
    ImageDescription = 270,
    Make = 271,
    Model = 272,
    StripOffsets = 273,
    Orientation = 274,
    SamplesPerPixel = 277,
    RowsPerStrip = 278,
    StripByteCounts = 279,
    MinSampleValue = 280,
    MaxSampleValue = 281,
    XResolution = 282,
    YResolution = 283,
    /// How components are organized (chunky vs planar)
    PlanarConfiguration = 284,
    PageName = 285,
    XPosition = 286,
    YPosition = 287,
    FreeOffsets = 288,
    FreeByteCounts = 289,
    GrayResponseUnit = 290,
    GrayResponseCurve = 291,
    T4Options = 292,
    T6Options = 293,
    ResolutionUnit = 296,
    PageNumber = 297,
    TransferFunction = 301,
    Software = 305,
    DateTime = 306,
    Artist = 315,
    HostComputer = 316,
    Predictor = 317,
    WhitePoint = 318,
    PrimaryChromaticities = 319,
    /// Palette for RGB_PALETTE images: 3 * 2^bits shorts
    ColorMap = 320,
    HalftoneHints = 321,
    TileWidth = 322,
    TileLength = 323,
    TileOffsets = 324,
    TileByteCounts = 325,
    SubIfds = 330,
    InkSet = 332,
    InkNames = 333,
    NumberOfInks = 334,
    DotRange = 336,
    TargetPrinter = 337,
    ExtraSamples = 338,
    SampleFormat = 339,
    SMinSampleValue = 340,
    SMaxSampleValue = 341,
    TransferRange = 342,
    /// Shared JPEG quantization and Huffman tables for abbreviated streams
    JpegTables = 347,
    JpegProc = 512,
    JpegInterchangeFormat = 513,
    JpegInterchangeFormatLength = 514,
    JpegRestartInterval = 515,
    JpegLosslessPredictors = 517,
    JpegPointTransforms = 518,
    JpegQTables = 519,
    JpegDcTables = 520,
    JpegAcTables = 521,
    YCbCrCoefficients = 529,
    YCbCrSubSampling = 530,
    YCbCrPositioning = 531,
    ReferenceBlackWhite = 532,
    Xmp = 700,
    ImageId = 32781,
    CfaRepeatPatternDim = 33421,
    CfaPattern = 33422,
    Copyright = 33432,
    ExifIfd = 34665,
    IccProfile = 34675,
    GpsIfd = 34853,
}

impl Tag {
    /// Get the numeric tag ID.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Look up a tag by name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        Tag::ALL
            .iter()
            .copied()
            .find(|tag| tag.name().eq_ignore_ascii_case(name))
    }

    /// Whether this tag is injected by the parser and never persisted.
    #[inline]
    pub const fn is_synthetic(self) -> bool {
        matches!(self, Tag::LittleEndian | Tag::BigTiff)
    }
}

impl From<Tag> for u16 {
    #[inline]
    fn from(tag: Tag) -> u16 {
        tag as u16
    }
}

/// Human-readable name for any tag number, known or not.
pub fn tag_name(tag: u16) -> String {
    match Tag::from_u16(tag) {
        Some(known) => known.name().to_string(),
        None => format!("Tag{}", tag),
    }
}

/// Parse a tag given either by name (`ImageDescription`) or by number (`270`).
pub fn parse_tag(text: &str) -> Option<u16> {
    if let Ok(number) = text.parse::<u16>() {
        return Some(number);
    }
    Tag::from_name(text).map(Tag::as_u16)
}

// =============================================================================
// Code Enumerations
// =============================================================================

/// Declares a `u16`-coded enumeration with an `Unknown` fallback variant.
macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$doc:meta])* $variant:ident = $value:literal => $label:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $( $(#[$doc])* $variant, )+
            /// A code this crate does not recognize
            Unknown(u16),
        }

        impl $name {
            pub fn from_u16(value: u16) -> Self {
                match value {
                    $( $value => $name::$variant, )+
                    other => $name::Unknown(other),
                }
            }

            pub const fn to_u16(self) -> u16 {
                match self {
                    $( $name::$variant => $value, )+
                    $name::Unknown(other) => other,
                }
            }

            pub fn name(self) -> String {
                match self {
                    $( $name::$variant => $label.to_string(), )+
                    $name::Unknown(other) => format!("Unknown ({})", other),
                }
            }
        }
    };
}

coded_enum! {
    /// TIFF compression scheme identifiers.
    ///
    /// Every code a reader is likely to meet is recognized by name so that
    /// unsupported schemes fail with a descriptive error instead of a number.
    pub enum Compression {
        None = 1 => "None",
        CcittRle = 2 => "CCITT modified Huffman RLE",
        CcittT4 = 3 => "CCITT T.4 (Group 3 fax)",
        CcittT6 = 4 => "CCITT T.6 (Group 4 fax)",
        Lzw = 5 => "LZW",
        /// "Old-style" JPEG, superseded by 7
        OldJpeg = 6 => "Old-style JPEG",
        Jpeg = 7 => "JPEG",
        /// Adobe-registered zlib code
        AdobeDeflate = 8 => "Deflate (Adobe)",
        JbigBw = 9 => "JBIG black and white",
        JbigColor = 10 => "JBIG color",
        Next = 32766 => "NeXT 2-bit RLE",
        CcittRlew = 32771 => "CCITT RLE (word aligned)",
        PackBits = 32773 => "PackBits",
        Thunderscan = 32809 => "ThunderScan",
        PixarFilm = 32908 => "Pixar companded 10-bit LZW",
        PixarLog = 32909 => "Pixar companded 11-bit ZIP",
        /// Original zlib code, same stream format as 8
        Deflate = 32946 => "Deflate",
        KodakDcs = 32947 => "Kodak DCS",
        /// Aperio JPEG-2000
        Jpeg2000 = 33003 => "JPEG-2000",
        Jpeg2000Lossy = 33004 => "JPEG-2000 (lossy)",
        /// JPEG written by some vendors under a private code
        AlternateJpeg = 33007 => "JPEG (alternate)",
        Jbig = 34661 => "ISO JBIG",
        SgiLog = 34676 => "SGI LogLuv",
        SgiLog24 = 34677 => "SGI LogLuv 24-bit",
        OlympusJpeg2000 = 34712 => "Olympus JPEG-2000",
        NikonNef = 34713 => "Nikon NEF",
        Lzma = 34925 => "LZMA2",
        Zstd = 50000 => "Zstandard",
        Webp = 50001 => "WebP",
        Lurawave = 65535 => "LuraWave",
    }
}

impl Compression {
    /// Whether a codec is wired up for this scheme.
    #[inline]
    pub const fn is_supported(self) -> bool {
        matches!(
            self,
            Compression::None
                | Compression::Lzw
                | Compression::Jpeg
                | Compression::AlternateJpeg
                | Compression::AdobeDeflate
                | Compression::Deflate
                | Compression::PackBits
                | Compression::Jpeg2000
        )
    }

    /// Whether the scheme is baseline JPEG (photometric is forced to RGB).
    #[inline]
    pub const fn is_jpeg(self) -> bool {
        matches!(self, Compression::Jpeg | Compression::AlternateJpeg)
    }
}

coded_enum! {
    /// How sample values map to color.
    pub enum Photometric {
        WhiteIsZero = 0 => "WhiteIsZero",
        BlackIsZero = 1 => "BlackIsZero",
        Rgb = 2 => "RGB",
        Palette = 3 => "RGB Palette",
        TransparencyMask = 4 => "Transparency Mask",
        Cmyk = 5 => "CMYK",
        YCbCr = 6 => "YCbCr",
        CieLab = 8 => "CIE L*a*b*",
        IccLab = 9 => "ICC L*a*b*",
        ItuLab = 10 => "ITU L*a*b*",
        CfaArray = 32803 => "CFA Array",
        LinearRaw = 34892 => "Linear Raw",
    }
}

impl Photometric {
    /// Interpretations recognized but never decoded.
    pub const fn is_supported(self) -> bool {
        !matches!(
            self,
            Photometric::TransparencyMask
                | Photometric::CieLab
                | Photometric::IccLab
                | Photometric::ItuLab
                | Photometric::Unknown(_)
        )
    }
}

/// Whether channel samples are interleaved per pixel or stored as planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanarConfiguration {
    /// Samples interleaved per pixel (value 1)
    Chunky,
    /// Each sample stored as its own plane (value 2)
    Planar,
}

impl PlanarConfiguration {
    pub fn from_u16(value: u16) -> Result<Self, TiffError> {
        match value {
            1 => Ok(PlanarConfiguration::Chunky),
            2 => Ok(PlanarConfiguration::Planar),
            other => Err(TiffError::invalid_tag(
                "PlanarConfiguration",
                format!("expected 1 or 2, got {}", other),
            )),
        }
    }

    pub const fn to_u16(self) -> u16 {
        match self {
            PlanarConfiguration::Chunky => 1,
            PlanarConfiguration::Planar => 2,
        }
    }
}

/// Reversible per-row transform applied before compression.
///
/// Only "none" and horizontal differencing are recognized; any other code
/// is rejected so data is never silently passed through undecoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predictor {
    None,
    Horizontal,
}

impl Predictor {
    pub fn from_u16(value: u16) -> Result<Self, TiffError> {
        match value {
            1 => Ok(Predictor::None),
            2 => Ok(Predictor::Horizontal),
            3 => Err(TiffError::Unsupported(
                "floating-point predictor (3)".to_string(),
            )),
            other => Err(TiffError::Unsupported(format!("predictor {}", other))),
        }
    }

    pub const fn to_u16(self) -> u16 {
        match self {
            Predictor::None => 1,
            Predictor::Horizontal => 2,
        }
    }
}

/// Interpretation of each sample's bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    Uint,
    Int,
    Float,
    Void,
}

impl SampleFormat {
    pub fn from_u16(value: u16) -> Self {
        match value {
            2 => SampleFormat::Int,
            3 => SampleFormat::Float,
            4 => SampleFormat::Void,
            _ => SampleFormat::Uint,
        }
    }
}

/// Bit order within each byte of non-byte-aligned data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillOrder {
    MsbFirst,
    LsbFirst,
}

impl FillOrder {
    pub fn from_u16(value: u16) -> Self {
        if value == 2 {
            FillOrder::LsbFirst
        } else {
            FillOrder::MsbFirst
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // FieldType Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_field_type_sizes() {
        assert_eq!(FieldType::Byte.size_in_bytes(), 1);
        assert_eq!(FieldType::Ascii.size_in_bytes(), 1);
        assert_eq!(FieldType::Short.size_in_bytes(), 2);
        assert_eq!(FieldType::Long.size_in_bytes(), 4);
        assert_eq!(FieldType::Rational.size_in_bytes(), 8);
        assert_eq!(FieldType::SRational.size_in_bytes(), 8);
        assert_eq!(FieldType::Float.size_in_bytes(), 4);
        assert_eq!(FieldType::Double.size_in_bytes(), 8);
        assert_eq!(FieldType::Long8.size_in_bytes(), 8);
        assert_eq!(FieldType::Ifd8.size_in_bytes(), 8);
    }

    #[test]
    fn test_field_type_from_u16() {
        for code in (1..=13).chain(16..=18) {
            let ty = FieldType::from_u16(code).unwrap();
            assert_eq!(ty.as_u16(), code);
        }
        assert_eq!(FieldType::from_u16(0), None);
        assert_eq!(FieldType::from_u16(14), None);
        assert_eq!(FieldType::from_u16(99), None);
    }

    #[test]
    fn test_fits_inline_tiff() {
        assert!(FieldType::Byte.fits_inline(4, false));
        assert!(FieldType::Short.fits_inline(2, false));
        assert!(FieldType::Long.fits_inline(1, false));

        assert!(!FieldType::Byte.fits_inline(5, false));
        assert!(!FieldType::Short.fits_inline(3, false));
        assert!(!FieldType::Rational.fits_inline(1, false));
        assert!(!FieldType::Long8.fits_inline(1, false));
    }

    #[test]
    fn test_fits_inline_bigtiff() {
        assert!(FieldType::Byte.fits_inline(8, true));
        assert!(FieldType::Rational.fits_inline(1, true));
        assert!(FieldType::Long8.fits_inline(1, true));

        assert!(!FieldType::Byte.fits_inline(9, true));
        assert!(!FieldType::Long.fits_inline(3, true));
        assert!(!FieldType::Long8.fits_inline(2, true));
    }

    #[test]
    fn test_fits_inline_overflowing_count() {
        assert!(!FieldType::Double.fits_inline(u64::MAX, true));
    }

    // -------------------------------------------------------------------------
    // Tag Table Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_tag_from_u16() {
        assert_eq!(Tag::from_u16(256), Some(Tag::ImageWidth));
        assert_eq!(Tag::from_u16(324), Some(Tag::TileOffsets));
        assert_eq!(Tag::from_u16(347), Some(Tag::JpegTables));
        assert_eq!(Tag::from_u16(0), Some(Tag::LittleEndian));
        assert_eq!(Tag::from_u16(9999), None);
    }

    #[test]
    fn test_tag_table_is_bijective() {
        for &tag in Tag::ALL {
            assert_eq!(Tag::from_u16(tag.as_u16()), Some(tag));
            assert_eq!(Tag::from_name(tag.name()), Some(tag));
        }
    }

    #[test]
    fn test_tag_names() {
        assert_eq!(Tag::ImageDescription.name(), "ImageDescription");
        assert_eq!(Tag::from_name("imagedescription"), Some(Tag::ImageDescription));
        assert_eq!(tag_name(270), "ImageDescription");
        assert_eq!(tag_name(65000), "Tag65000");
    }

    #[test]
    fn test_parse_tag() {
        assert_eq!(parse_tag("270"), Some(270));
        assert_eq!(parse_tag("Software"), Some(305));
        assert_eq!(parse_tag("NoSuchTag"), None);
    }

    #[test]
    fn test_synthetic_tags() {
        assert!(Tag::LittleEndian.is_synthetic());
        assert!(Tag::BigTiff.is_synthetic());
        assert!(!Tag::ImageWidth.is_synthetic());
    }

    // -------------------------------------------------------------------------
    // Code Enumeration Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_compression_codes() {
        assert_eq!(Compression::from_u16(1), Compression::None);
        assert_eq!(Compression::from_u16(32773), Compression::PackBits);
        assert_eq!(Compression::from_u16(33007), Compression::AlternateJpeg);
        assert_eq!(Compression::from_u16(4242), Compression::Unknown(4242));
        assert_eq!(Compression::Deflate.to_u16(), 32946);
        assert_eq!(Compression::Unknown(4242).to_u16(), 4242);
    }

    #[test]
    fn test_compression_support() {
        assert!(Compression::Lzw.is_supported());
        assert!(Compression::Jpeg2000.is_supported());
        assert!(!Compression::CcittT4.is_supported());
        assert!(!Compression::NikonNef.is_supported());
        assert!(Compression::AlternateJpeg.is_jpeg());
        assert_eq!(Compression::CcittT6.name(), "CCITT T.6 (Group 4 fax)");
    }

    #[test]
    fn test_photometric_support() {
        assert!(Photometric::WhiteIsZero.is_supported());
        assert!(Photometric::CfaArray.is_supported());
        assert!(!Photometric::TransparencyMask.is_supported());
        assert!(!Photometric::CieLab.is_supported());
        assert_eq!(Photometric::from_u16(32803), Photometric::CfaArray);
    }

    #[test]
    fn test_predictor_codes() {
        assert_eq!(Predictor::from_u16(1).unwrap(), Predictor::None);
        assert_eq!(Predictor::from_u16(2).unwrap(), Predictor::Horizontal);
        assert!(matches!(
            Predictor::from_u16(3),
            Err(TiffError::Unsupported(_))
        ));
        assert!(Predictor::from_u16(0).is_err());
    }

    #[test]
    fn test_planar_configuration_codes() {
        assert_eq!(
            PlanarConfiguration::from_u16(2).unwrap(),
            PlanarConfiguration::Planar
        );
        assert!(PlanarConfiguration::from_u16(3).is_err());
    }
}
