//! In-memory image directory.
//!
//! A [`Directory`] maps tag numbers to decoded [`TagValue`]s, ordered by tag
//! number. Besides the tags read from the file, the parser injects two
//! synthetic entries describing the stream the directory came from:
//!
//! - [`Tag::LittleEndian`] (0): 1 when the file is little-endian
//! - [`Tag::BigTiff`] (1): 1 when the file is BigTIFF
//!
//! Synthetic entries are never written back to disk.
//!
//! Typed getters return `Result` so that a tag with the wrong shape is
//! reported with its name instead of being silently coerced. The only
//! implicit conversion is widening: a scalar is a one-element array, and
//! BYTE/SHORT/LONG/LONG8 all read as `u64`.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::TiffError;

use super::parser::{ByteOrder, TiffHeader};
use super::tags::{
    tag_name, Compression, FillOrder, Photometric, PlanarConfiguration, Predictor, SampleFormat,
    Tag,
};
use super::values::TagValue;

/// BT.601 luma coefficients.
pub const DEFAULT_YCBCR_COEFFICIENTS: [f64; 3] = [0.299, 0.587, 0.114];

/// Default chroma subsampling (horizontal, vertical).
pub const DEFAULT_YCBCR_SUBSAMPLING: [u16; 2] = [2, 2];

/// Default reference black/white pairs for Y, Cb and Cr.
pub const DEFAULT_REFERENCE_BLACK_WHITE: [f64; 6] = [0.0, 255.0, 128.0, 255.0, 128.0, 255.0];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Directory {
    entries: BTreeMap<u16, TagValue>,
}

impl Directory {
    /// An empty directory with no synthetic tags.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty directory carrying the synthetic tags for `header`.
    pub fn for_header(header: &TiffHeader) -> Self {
        let mut dir = Self::new();
        dir.set_stream_flags(header.byte_order, header.is_bigtiff);
        dir
    }

    /// Set the synthetic byte-order and BigTIFF flags.
    pub fn set_stream_flags(&mut self, byte_order: ByteOrder, is_bigtiff: bool) {
        self.put(
            Tag::LittleEndian,
            TagValue::Byte(vec![byte_order.is_little_endian() as u8]),
        );
        self.put(Tag::BigTiff, TagValue::Byte(vec![is_bigtiff as u8]));
    }

    pub fn put(&mut self, tag: impl Into<u16>, value: TagValue) {
        self.entries.insert(tag.into(), value);
    }

    pub fn get(&self, tag: impl Into<u16>) -> Option<&TagValue> {
        self.entries.get(&tag.into())
    }

    pub fn remove(&mut self, tag: impl Into<u16>) -> Option<TagValue> {
        self.entries.remove(&tag.into())
    }

    pub fn contains(&self, tag: impl Into<u16>) -> bool {
        self.entries.contains_key(&tag.into())
    }

    /// All entries in ascending tag order, synthetic ones included.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &TagValue)> {
        self.entries.iter().map(|(&tag, value)| (tag, value))
    }

    /// Entries that are written to disk, in ascending tag order.
    pub fn persisted(&self) -> impl Iterator<Item = (u16, &TagValue)> {
        self.iter()
            .filter(|(tag, _)| !Tag::from_u16(*tag).is_some_and(Tag::is_synthetic))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn flag(&self, tag: Tag) -> Option<bool> {
        self.get(tag).and_then(TagValue::as_u64).map(|v| v != 0)
    }

    /// Whether the source stream is little-endian. Defaults to true for
    /// directories built in memory.
    pub fn is_little_endian(&self) -> bool {
        self.flag(Tag::LittleEndian).unwrap_or(true)
    }

    pub fn is_big_tiff(&self) -> bool {
        self.flag(Tag::BigTiff).unwrap_or(false)
    }

    pub fn byte_order(&self) -> ByteOrder {
        if self.is_little_endian() {
            ByteOrder::LittleEndian
        } else {
            ByteOrder::BigEndian
        }
    }

    // -------------------------------------------------------------------------
    // Typed getters
    // -------------------------------------------------------------------------

    /// First element of an unsigned integer tag.
    pub fn get_u64(&self, tag: Tag) -> Result<Option<u64>, TiffError> {
        match self.get(tag) {
            None => Ok(None),
            Some(value) => value
                .as_u64()
                .map(Some)
                .ok_or_else(|| wrong_shape(tag, value, "an unsigned integer")),
        }
    }

    pub fn require_u64(&self, tag: Tag) -> Result<u64, TiffError> {
        self.get_u64(tag)?.ok_or(TiffError::MissingTag(tag.name()))
    }

    pub fn get_u32(&self, tag: Tag) -> Result<Option<u32>, TiffError> {
        self.get_u64(tag)?
            .map(|v| {
                u32::try_from(v)
                    .map_err(|_| TiffError::invalid_tag(tag.name(), format!("{} exceeds 32 bits", v)))
            })
            .transpose()
    }

    pub fn require_u32(&self, tag: Tag) -> Result<u32, TiffError> {
        self.get_u32(tag)?.ok_or(TiffError::MissingTag(tag.name()))
    }

    /// All elements of an unsigned integer tag, widened to u64.
    pub fn get_u64_array(&self, tag: Tag) -> Result<Option<Vec<u64>>, TiffError> {
        match self.get(tag) {
            None => Ok(None),
            Some(value) => value
                .as_u64_vec()
                .map(Some)
                .ok_or_else(|| wrong_shape(tag, value, "unsigned integers")),
        }
    }

    pub fn get_u16_array(&self, tag: Tag) -> Result<Option<Vec<u16>>, TiffError> {
        let Some(values) = self.get_u64_array(tag)? else {
            return Ok(None);
        };
        values
            .into_iter()
            .map(|v| {
                u16::try_from(v)
                    .map_err(|_| TiffError::invalid_tag(tag.name(), format!("{} exceeds 16 bits", v)))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// Numeric values of any type, rationals included, as f64.
    pub fn get_f64_array(&self, tag: Tag) -> Result<Option<Vec<f64>>, TiffError> {
        match self.get(tag) {
            None => Ok(None),
            Some(value) => value
                .as_f64_vec()
                .map(Some)
                .ok_or_else(|| wrong_shape(tag, value, "numbers")),
        }
    }

    /// First string of an ASCII tag.
    pub fn get_string(&self, tag: Tag) -> Result<Option<&str>, TiffError> {
        match self.get(tag) {
            None => Ok(None),
            Some(TagValue::Ascii(strings)) => Ok(Some(strings.first().map_or("", String::as_str))),
            Some(value) => Err(wrong_shape(tag, value, "ASCII")),
        }
    }

    // -------------------------------------------------------------------------
    // Image parameters
    // -------------------------------------------------------------------------

    pub fn image_width(&self) -> Result<u32, TiffError> {
        self.require_u32(Tag::ImageWidth)
    }

    pub fn image_length(&self) -> Result<u32, TiffError> {
        self.require_u32(Tag::ImageLength)
    }

    /// BitsPerSample as stored. Absent means a single 1-bit sample.
    pub fn bits_per_sample(&self) -> Result<Vec<u16>, TiffError> {
        Ok(self
            .get_u16_array(Tag::BitsPerSample)?
            .unwrap_or_else(|| vec![1]))
    }

    pub fn samples_per_pixel(&self) -> Result<u16, TiffError> {
        match self.get_u32(Tag::SamplesPerPixel)? {
            None => Ok(1),
            Some(v) => u16::try_from(v).map_err(|_| {
                TiffError::invalid_tag(Tag::SamplesPerPixel.name(), format!("{} exceeds 16 bits", v))
            }),
        }
    }

    /// A 16-bit enumerated code, which some writers store as LONG.
    fn get_code(&self, tag: Tag) -> Result<Option<u16>, TiffError> {
        self.get_u64(tag)?
            .map(|v| {
                u16::try_from(v).map_err(|_| {
                    TiffError::invalid_tag(tag.name(), format!("code {} exceeds 16 bits", v))
                })
            })
            .transpose()
    }

    pub fn compression(&self) -> Result<Compression, TiffError> {
        Ok(self
            .get_code(Tag::Compression)?
            .map_or(Compression::None, Compression::from_u16))
    }

    pub fn photometric(&self) -> Result<Option<Photometric>, TiffError> {
        Ok(self
            .get_code(Tag::PhotometricInterpretation)?
            .map(Photometric::from_u16))
    }

    pub fn planar_configuration(&self) -> Result<PlanarConfiguration, TiffError> {
        match self.get_code(Tag::PlanarConfiguration)? {
            None => Ok(PlanarConfiguration::Chunky),
            Some(v) => PlanarConfiguration::from_u16(v),
        }
    }

    pub fn predictor(&self) -> Result<Predictor, TiffError> {
        match self.get_code(Tag::Predictor)? {
            None => Ok(Predictor::None),
            Some(v) => Predictor::from_u16(v),
        }
    }

    pub fn fill_order(&self) -> Result<FillOrder, TiffError> {
        Ok(self
            .get_code(Tag::FillOrder)?
            .map_or(FillOrder::MsbFirst, FillOrder::from_u16))
    }

    pub fn sample_format(&self) -> Result<SampleFormat, TiffError> {
        Ok(self
            .get_code(Tag::SampleFormat)?
            .map_or(SampleFormat::Uint, SampleFormat::from_u16))
    }

    pub fn tile_width(&self) -> Result<Option<u32>, TiffError> {
        self.get_u32(Tag::TileWidth)
    }

    pub fn tile_length(&self) -> Result<Option<u32>, TiffError> {
        self.get_u32(Tag::TileLength)
    }

    /// Tiled when tile dimensions are declared or strip offsets are absent.
    pub fn is_tiled(&self) -> bool {
        self.contains(Tag::TileWidth)
            || self.contains(Tag::TileLength)
            || !self.contains(Tag::StripOffsets)
    }

    pub fn rows_per_strip(&self) -> Result<Option<Vec<u64>>, TiffError> {
        self.get_u64_array(Tag::RowsPerStrip)
    }

    /// Offsets of each strip or tile.
    pub fn chunk_offsets(&self) -> Result<Option<Vec<u64>>, TiffError> {
        if self.is_tiled() {
            self.get_u64_array(Tag::TileOffsets)
        } else {
            self.get_u64_array(Tag::StripOffsets)
        }
    }

    /// Byte counts of each strip or tile.
    pub fn chunk_byte_counts(&self) -> Result<Option<Vec<u64>>, TiffError> {
        if self.is_tiled() {
            self.get_u64_array(Tag::TileByteCounts)
        } else {
            self.get_u64_array(Tag::StripByteCounts)
        }
    }

    /// Shared JPEG tables for abbreviated streams.
    pub fn jpeg_tables(&self) -> Option<&[u8]> {
        self.get(Tag::JpegTables).and_then(TagValue::as_bytes)
    }

    /// Palette as `[red..., green..., blue...]`, each `2^bits` entries.
    pub fn color_map(&self) -> Result<Option<Vec<u16>>, TiffError> {
        self.get_u16_array(Tag::ColorMap)
    }

    pub fn ycbcr_coefficients(&self) -> Result<[f64; 3], TiffError> {
        match self.get_f64_array(Tag::YCbCrCoefficients)? {
            None => Ok(DEFAULT_YCBCR_COEFFICIENTS),
            Some(v) if v.len() >= 3 => Ok([v[0], v[1], v[2]]),
            Some(v) => Err(TiffError::invalid_tag(
                Tag::YCbCrCoefficients.name(),
                format!("expected 3 values, got {}", v.len()),
            )),
        }
    }

    pub fn ycbcr_subsampling(&self) -> Result<[u16; 2], TiffError> {
        match self.get_u16_array(Tag::YCbCrSubSampling)? {
            None => Ok(DEFAULT_YCBCR_SUBSAMPLING),
            Some(v) if v.len() >= 2 && v[0] > 0 && v[1] > 0 => Ok([v[0], v[1]]),
            Some(v) => Err(TiffError::invalid_tag(
                Tag::YCbCrSubSampling.name(),
                format!("expected 2 non-zero values, got {:?}", v),
            )),
        }
    }

    pub fn reference_black_white(&self) -> Result<[f64; 6], TiffError> {
        match self.get_f64_array(Tag::ReferenceBlackWhite)? {
            None => Ok(DEFAULT_REFERENCE_BLACK_WHITE),
            Some(v) if v.len() >= 6 => Ok([v[0], v[1], v[2], v[3], v[4], v[5]]),
            Some(v) => Err(TiffError::invalid_tag(
                Tag::ReferenceBlackWhite.name(),
                format!("expected 6 values, got {}", v.len()),
            )),
        }
    }

    /// CFA color indices (0 = red, 1 = green, 2 = blue), row-major.
    pub fn cfa_pattern(&self) -> Option<&[u8]> {
        self.get(Tag::CfaPattern).and_then(TagValue::as_bytes)
    }

    /// CFA repeat dimensions (rows, columns).
    pub fn cfa_repeat_dim(&self) -> Result<Option<[u16; 2]>, TiffError> {
        match self.get_u16_array(Tag::CfaRepeatPatternDim)? {
            None => Ok(None),
            Some(v) if v.len() >= 2 && v[0] > 0 && v[1] > 0 => Ok(Some([v[0], v[1]])),
            Some(v) => Err(TiffError::invalid_tag(
                Tag::CfaRepeatPatternDim.name(),
                format!("expected 2 non-zero values, got {:?}", v),
            )),
        }
    }

    pub fn image_description(&self) -> Result<Option<&str>, TiffError> {
        self.get_string(Tag::ImageDescription)
    }
}

fn wrong_shape(tag: Tag, value: &TagValue, expected: &str) -> TiffError {
    TiffError::invalid_tag(
        tag.name(),
        format!("expected {}, found {:?} x{}", expected, value.field_type(), value.count()),
    )
}

impl Serialize for Directory {
    /// Serialized as a map from tag name to value, synthetic tags included.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (tag, value) in self.iter() {
            map.serialize_entry(&tag_name(tag), value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_strip_dir() -> Directory {
        let mut dir = Directory::new();
        dir.put(Tag::ImageWidth, TagValue::short(4));
        dir.put(Tag::ImageLength, TagValue::long(4));
        dir.put(Tag::BitsPerSample, TagValue::Short(vec![8, 8, 8]));
        dir.put(Tag::SamplesPerPixel, TagValue::short(3));
        dir.put(Tag::StripOffsets, TagValue::Long(vec![100, 124]));
        dir
    }

    #[test]
    fn test_widening_getters() {
        let dir = rgb_strip_dir();
        assert_eq!(dir.image_width().unwrap(), 4);
        assert_eq!(dir.image_length().unwrap(), 4);
        assert_eq!(dir.get_u64_array(Tag::StripOffsets).unwrap(), Some(vec![100, 124]));
        assert_eq!(dir.bits_per_sample().unwrap(), vec![8, 8, 8]);
    }

    #[test]
    fn test_missing_and_wrong_shape() {
        let mut dir = Directory::new();
        assert!(matches!(
            dir.image_width(),
            Err(TiffError::MissingTag("ImageWidth"))
        ));

        dir.put(Tag::ImageWidth, TagValue::ascii("wide"));
        match dir.image_width() {
            Err(TiffError::InvalidTagValue { tag, .. }) => assert_eq!(tag, "ImageWidth"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        let dir = rgb_strip_dir();
        assert_eq!(dir.compression().unwrap(), Compression::None);
        assert_eq!(dir.planar_configuration().unwrap(), PlanarConfiguration::Chunky);
        assert_eq!(dir.predictor().unwrap(), Predictor::None);
        assert_eq!(dir.fill_order().unwrap(), FillOrder::MsbFirst);
        assert_eq!(dir.ycbcr_subsampling().unwrap(), [2, 2]);
        assert_eq!(dir.ycbcr_coefficients().unwrap(), [0.299, 0.587, 0.114]);
        assert_eq!(
            dir.reference_black_white().unwrap(),
            [0.0, 255.0, 128.0, 255.0, 128.0, 255.0]
        );
        assert!(dir.is_little_endian());
        assert!(!dir.is_big_tiff());
    }

    #[test]
    fn test_is_tiled() {
        let mut dir = rgb_strip_dir();
        assert!(!dir.is_tiled());
        dir.put(Tag::TileWidth, TagValue::short(16));
        assert!(dir.is_tiled());

        let mut bare = Directory::new();
        bare.put(Tag::ImageWidth, TagValue::short(1));
        assert!(bare.is_tiled());
    }

    #[test]
    fn test_unsupported_predictor_is_error() {
        let mut dir = rgb_strip_dir();
        dir.put(Tag::Predictor, TagValue::short(3));
        assert!(matches!(dir.predictor(), Err(TiffError::Unsupported(_))));
    }

    #[test]
    fn test_long_codes_are_not_truncated() {
        let mut dir = rgb_strip_dir();
        dir.put(Tag::Predictor, TagValue::long(65538));
        dir.put(Tag::Compression, TagValue::long(65541));
        dir.put(Tag::PlanarConfiguration, TagValue::long(65537));
        assert!(matches!(dir.predictor(), Err(TiffError::InvalidTagValue { .. })));
        assert!(matches!(dir.compression(), Err(TiffError::InvalidTagValue { .. })));
        assert!(matches!(dir.planar_configuration(), Err(TiffError::InvalidTagValue { .. })));

        // In-range codes stored as LONG still decode
        dir.put(Tag::Predictor, TagValue::long(2));
        assert_eq!(dir.predictor().unwrap(), Predictor::Horizontal);
    }

    #[test]
    fn test_persisted_skips_synthetic() {
        let mut dir = rgb_strip_dir();
        dir.set_stream_flags(ByteOrder::BigEndian, true);
        assert!(dir.is_big_tiff());
        assert_eq!(dir.byte_order(), ByteOrder::BigEndian);

        let tags: Vec<u16> = dir.persisted().map(|(tag, _)| tag).collect();
        assert_eq!(tags, vec![256, 257, 258, 273, 277]);
        assert_eq!(dir.iter().count(), 7);
    }

    #[test]
    fn test_serialize_uses_tag_names() {
        let mut dir = Directory::new();
        dir.put(Tag::ImageWidth, TagValue::short(4));
        dir.put(65000u16, TagValue::Byte(vec![1]));
        let json = serde_json::to_value(&dir).unwrap();
        assert_eq!(json["ImageWidth"]["type"], "Short");
        assert_eq!(json["ImageWidth"]["values"][0], 4);
        assert!(json.get("Tag65000").is_some());
    }
}
