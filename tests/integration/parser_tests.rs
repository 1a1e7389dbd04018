//! Directory parsing integration tests.
//!
//! Tests verify:
//! - Header sniffing accepts exactly the four valid prefixes
//! - Classic and BigTIFF directories parse in both byte orders
//! - Broken IFD chains (cycles, bad pointers) terminate
//! - Single-entry lookups and the block cache keep reads down

use micro_tiff::format::tiff::{FieldType, Rational};
use micro_tiff::{check_header, BlockCache, ByteOrder, Tag, TagValue, TiffError, TiffParser};

use super::test_utils::{IfdBuilder, TiffBuilder, TrackingSource};

fn described_ifd(width: u32, description: &str) -> IfdBuilder {
    IfdBuilder::new()
        .long(Tag::ImageWidth, &[width])
        .long(Tag::ImageLength, &[3])
        .short(Tag::BitsPerSample, &[8, 8, 8])
        .short(Tag::SamplesPerPixel, &[3])
        .ascii(Tag::ImageDescription, description)
}

// =============================================================================
// Header Sniffing
// =============================================================================

#[test]
fn test_check_header_accepts_valid_prefixes() {
    assert_eq!(check_header(b"II*\0"), Some(ByteOrder::LittleEndian));
    assert_eq!(check_header(b"MM\0*"), Some(ByteOrder::BigEndian));
    assert_eq!(check_header(b"II+\0"), Some(ByteOrder::LittleEndian));
    assert_eq!(check_header(b"MM\0+"), Some(ByteOrder::BigEndian));
}

#[test]
fn test_check_header_rejects_everything_else() {
    assert_eq!(check_header(b"IM*\0"), None);
    assert_eq!(check_header(b"II\0*"), None);
    assert_eq!(check_header(b"MM*\0"), None);
    assert_eq!(check_header(b"II*"), None);
    assert_eq!(check_header(b""), None);
    assert_eq!(check_header(b"\x89PNG"), None);
}

#[test]
fn test_parser_reports_not_tiff() {
    let mut parser = TiffParser::new(TrackingSource::new(b"GIF89a....".to_vec(), "x.gif"));
    assert_eq!(parser.check_header().unwrap(), None);
    let err = parser.get_ifds().unwrap_err();
    assert!(matches!(err, TiffError::NotTiff));
    assert!(err.is_not_this_format());
}

// =============================================================================
// Byte Orders and BigTIFF
// =============================================================================

#[test]
fn test_parse_every_header_variant() {
    for bigtiff in [false, true] {
        for bo in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
            let data = TiffBuilder::new(bo, bigtiff)
                .add_ifd(described_ifd(640, "variant under test"))
                .build();
            let mut parser = TiffParser::new(TrackingSource::new(data, "variant.tif"));

            let header = parser.header().unwrap();
            assert_eq!(header.byte_order, bo);
            assert_eq!(header.is_bigtiff, bigtiff);

            let dir = parser.get_first_ifd().unwrap();
            assert_eq!(dir.is_big_tiff(), bigtiff);
            assert_eq!(dir.is_little_endian(), bo.is_little_endian());
            assert_eq!(dir.image_width().unwrap(), 640);
            assert_eq!(dir.image_length().unwrap(), 3);
            assert_eq!(dir.bits_per_sample().unwrap(), vec![8, 8, 8]);
            assert_eq!(dir.image_description().unwrap(), Some("variant under test"));
        }
    }
}

#[test]
fn test_bigtiff_long8_offsets() {
    let data = TiffBuilder::new(ByteOrder::BigEndian, true)
        .add_ifd(
            IfdBuilder::new()
                .long(Tag::ImageWidth, &[16])
                .long(Tag::ImageLength, &[16])
                .long8(Tag::StripOffsets, &[5_000_000_000])
                .long8(Tag::StripByteCounts, &[256]),
        )
        .build();
    let dir = TiffParser::new(TrackingSource::new(data, "big.tif"))
        .get_first_ifd()
        .unwrap();
    assert_eq!(dir.get(Tag::StripOffsets), Some(&TagValue::Long8(vec![5_000_000_000])));
    assert_eq!(dir.chunk_offsets().unwrap(), Some(vec![5_000_000_000]));
}

#[test]
fn test_rational_and_signed_values() {
    let bo = ByteOrder::BigEndian;
    let mut rational = Vec::new();
    rational.extend(bo.u32_bytes(300));
    rational.extend(bo.u32_bytes(4));
    let data = TiffBuilder::new(bo, false)
        .add_ifd(
            IfdBuilder::new()
                .long(Tag::ImageWidth, &[1])
                .raw(Tag::XResolution.into(), FieldType::Rational as u16, 1, &rational)
                .raw(40000, FieldType::SShort as u16, 2, &[0xFF, 0xFE, 0x00, 0x05]),
        )
        .build();
    let dir = TiffParser::new(TrackingSource::new(data, "values.tif"))
        .get_first_ifd()
        .unwrap();
    // Rationals are kept as stored, not reduced
    assert_eq!(dir.get(Tag::XResolution), Some(&TagValue::Rational(vec![Rational::new(300, 4)])));
    assert_eq!(dir.get(40000u16), Some(&TagValue::SShort(vec![-2, 5])));
}

#[test]
fn test_unknown_field_type_skipped() {
    let data = TiffBuilder::classic_le()
        .add_ifd(
            IfdBuilder::new()
                .long(Tag::ImageWidth, &[8])
                .raw(50000, 99, 1, &[1, 2, 3, 4]),
        )
        .build();
    let dir = TiffParser::new(TrackingSource::new(data, "odd.tif"))
        .get_first_ifd()
        .unwrap();
    assert_eq!(dir.image_width().unwrap(), 8);
    assert!(!dir.contains(50000u16));
}

// =============================================================================
// IFD Chains
// =============================================================================

#[test]
fn test_multi_ifd_chain() {
    let data = TiffBuilder::classic_le()
        .add_ifd(described_ifd(100, "level 0"))
        .add_ifd(described_ifd(50, "level 1"))
        .add_ifd(described_ifd(25, "level 2"))
        .build();
    let mut parser = TiffParser::new(TrackingSource::new(data, "chain.tif"));
    let offsets = parser.get_ifd_offsets().unwrap();
    assert_eq!(offsets.len(), 3);
    assert!(offsets.windows(2).all(|w| w[0] < w[1]));

    let widths: Vec<u32> = parser
        .get_ifds()
        .unwrap()
        .iter()
        .map(|d| d.image_width().unwrap())
        .collect();
    assert_eq!(widths, vec![100, 50, 25]);
}

#[test]
fn test_cyclic_chain_terminates() {
    let data = TiffBuilder::classic_le()
        .add_ifd(described_ifd(100, "a"))
        .add_ifd(described_ifd(50, "b"))
        .with_cycle()
        .build();
    let dirs = TiffParser::new(TrackingSource::new(data, "cycle.tif"))
        .get_ifds()
        .unwrap();
    assert_eq!(dirs.len(), 2);
}

#[test]
fn test_next_pointer_past_end_stops_chain() {
    let mut data = TiffBuilder::classic_le()
        .add_ifd(described_ifd(100, "only"))
        .build();
    // Patch the next-IFD pointer (last 4 bytes of the table) to point far away
    let first = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
    let count = u16::from_le_bytes([data[first], data[first + 1]]) as usize;
    let next = first + 2 + count * 12;
    data[next..next + 4].copy_from_slice(&1_000_000u32.to_le_bytes());

    let dirs = TiffParser::new(TrackingSource::new(data, "dangling.tif"))
        .get_ifds()
        .unwrap();
    assert_eq!(dirs.len(), 1);
}

#[test]
fn test_first_ifd_past_end_is_error() {
    let mut data = b"II*\0".to_vec();
    data.extend(4096u32.to_le_bytes());
    let mut parser = TiffParser::new(TrackingSource::new(data, "empty.tif"));
    assert!(parser.get_first_ifd().is_err());
}

// =============================================================================
// Single Entry Lookup and Caching
// =============================================================================

#[test]
fn test_get_first_ifd_entry() {
    let data = TiffBuilder::classic_le()
        .add_ifd(described_ifd(77, "a fairly long description string"))
        .add_ifd(described_ifd(10, "second"))
        .build();
    let source = TrackingSource::new(data, "entry.tif");
    let mut parser = TiffParser::new(source.clone());

    let value = parser.get_first_ifd_entry(Tag::ImageWidth.into()).unwrap();
    assert_eq!(value.as_u64(), Some(77));
    // Header sniff, header, IFD count, IFD body: the second IFD is never touched
    assert!(source.request_count() <= 4, "{:?}", source.requests());

    match parser.get_first_ifd_entry(Tag::Software.into()) {
        Err(TiffError::TagNotFound(name)) => assert_eq!(name, "Software"),
        other => panic!("expected TagNotFound, got {:?}", other),
    }
}

#[test]
fn test_get_first_ifd_entry_not_tiff() {
    let mut parser = TiffParser::new(TrackingSource::new(vec![0; 64], "zeros.bin"));
    assert!(matches!(
        parser.get_first_ifd_entry(Tag::ImageWidth.into()),
        Err(TiffError::NotTiff)
    ));
}

#[test]
fn test_block_cache_coalesces_reads() {
    let data = TiffBuilder::classic_le()
        .add_ifd(described_ifd(100, "level 0"))
        .add_ifd(described_ifd(50, "level 1"))
        .add_ifd(described_ifd(25, "level 2"))
        .build();
    assert!(data.len() < 4096);

    let source = TrackingSource::new(data, "cached.tif");
    let uncached = {
        let mut parser = TiffParser::new(source.clone());
        parser.get_ifds().unwrap();
        source.request_count()
    };
    source.reset_tracking();

    let mut parser = TiffParser::new(BlockCache::with_capacity(source.clone(), 4096, 4));
    let dirs = parser.get_ifds().unwrap();
    assert_eq!(dirs.len(), 3);
    assert_eq!(source.request_count(), 1);
    assert!(uncached > 1);
}
