//! Pixel reconstruction integration tests.
//!
//! Tests verify:
//! - Hand-built strip files decode to the stored samples
//! - Windowed reads equal the same window cut from a full read, for every
//!   strip/tile and chunky/planar combination
//! - Photometric mapping (WhiteIsZero, YCbCr) on decode
//! - Repair heuristics for missing byte counts and RowsPerStrip

use micro_tiff::{
    ByteOrder, ChunkLayout, Compression, ImageSpec, MemorySource, Photometric,
    PlanarConfiguration, Predictor, RasterReader, Region, Tag, TiffError,
};

use super::test_utils::{crop, encode_image, ramp, IfdBuilder, TiffBuilder, TrackingSource};

fn reader(data: Vec<u8>) -> RasterReader<MemorySource> {
    RasterReader::new(MemorySource::new(data)).unwrap()
}

/// Uncompressed 8-bit chunky strips, hand laid out.
fn stripped_file(
    width: u32,
    height: u32,
    spp: u16,
    rows_per_strip: Option<u32>,
    with_counts: bool,
    pixels: &[u8],
) -> Vec<u8> {
    let mut builder = TiffBuilder::classic_le();
    let strip_len = width as usize * spp as usize * rows_per_strip.unwrap_or(height) as usize;
    let mut offsets = Vec::new();
    let mut counts = Vec::new();
    for strip in pixels.chunks(strip_len) {
        offsets.push(builder.add_data(strip) as u32);
        counts.push(strip.len() as u32);
    }

    let mut ifd = IfdBuilder::new()
        .long(Tag::ImageWidth, &[width])
        .long(Tag::ImageLength, &[height])
        .short(Tag::BitsPerSample, &vec![8; spp as usize])
        .short(Tag::SamplesPerPixel, &[spp])
        .long(Tag::StripOffsets, &offsets);
    if let Some(rows) = rows_per_strip {
        ifd = ifd.long(Tag::RowsPerStrip, &[rows]);
    }
    if with_counts {
        ifd = ifd.long(Tag::StripByteCounts, &counts);
    }
    builder.add_ifd(ifd).build()
}

// =============================================================================
// Hand-built Files
// =============================================================================

#[test]
fn test_rgb_4x4_two_strips() {
    let pixels: Vec<u8> = (0..48).collect();
    let data = stripped_file(4, 4, 3, Some(2), true, &pixels);

    let mut r = reader(data);
    let layout = r.output_layout(0).unwrap();
    assert_eq!(layout.channels, 3);
    assert_eq!(layout.planes, 1);
    assert_eq!(layout.sample_bytes, 1);

    let samples = r.read_image(0).unwrap();
    assert_eq!(samples.len(), 48);
    assert_eq!(samples, pixels);

    let strips = r.strip_layout(0).unwrap();
    assert_eq!(strips.grid.chunk_count(), 2);
    assert!(strips.authoritative);

    // Bottom-right 2x2 pixels live entirely in the second strip
    let corner = r.read_region(0, Region::new(2, 2, 2, 2)).unwrap();
    assert_eq!(corner, vec![30, 31, 32, 33, 34, 35, 42, 43, 44, 45, 46, 47]);
}

#[test]
fn test_region_reads_only_needed_strips() {
    let pixels = ramp(64 * 64);
    let data = stripped_file(64, 64, 1, Some(8), true, &pixels);
    let source = TrackingSource::new(data, "strips.tif");
    let mut r = RasterReader::new(source.clone()).unwrap();
    source.reset_tracking();

    let window = r.read_region(0, Region::new(0, 17, 64, 4)).unwrap();
    assert_eq!(window, pixels[17 * 64..21 * 64]);
    // Rows 17..21 sit in strip 2 only
    assert_eq!(source.request_count(), 1);
    assert_eq!(source.requests()[0].1, 8 * 64);
}

#[test]
fn test_white_is_zero_mapping() {
    let mut builder = TiffBuilder::new(ByteOrder::BigEndian, false);
    let offset = builder.add_data(&[0, 255, 10, 200]) as u32;
    let data = builder
        .add_ifd(
            IfdBuilder::new()
                .long(Tag::ImageWidth, &[2])
                .long(Tag::ImageLength, &[2])
                .short(Tag::BitsPerSample, &[8])
                .short(Tag::PhotometricInterpretation, &[Photometric::WhiteIsZero.to_u16()])
                .long(Tag::StripOffsets, &[offset])
                .long(Tag::StripByteCounts, &[4])
                .long(Tag::RowsPerStrip, &[2]),
        )
        .build();
    assert_eq!(reader(data).read_image(0).unwrap(), vec![255, 0, 245, 55]);
}

#[test]
fn test_ycbcr_subsampled_to_rgb() {
    // Two 2x2 blocks: four luma samples then Cb, Cr
    let blocks = [10, 20, 30, 40, 128, 128, 50, 60, 70, 80, 128, 128];
    let mut builder = TiffBuilder::classic_le();
    let offset = builder.add_data(&blocks) as u32;
    let data = builder
        .add_ifd(
            IfdBuilder::new()
                .long(Tag::ImageWidth, &[4])
                .long(Tag::ImageLength, &[2])
                .short(Tag::BitsPerSample, &[8, 8, 8])
                .short(Tag::SamplesPerPixel, &[3])
                .short(Tag::PhotometricInterpretation, &[Photometric::YCbCr.to_u16()])
                .long(Tag::StripOffsets, &[offset])
                .long(Tag::StripByteCounts, &[12])
                .long(Tag::RowsPerStrip, &[2]),
        )
        .build();

    let rgb = reader(data).read_image(0).unwrap();
    let luma: Vec<u8> = rgb.chunks(3).map(|p| p[0]).collect();
    assert_eq!(luma, vec![10, 20, 50, 60, 30, 40, 70, 80]);
    assert!(rgb.chunks(3).all(|p| p[0] == p[1] && p[1] == p[2]));
}

#[test]
fn test_20bit_gray_three_byte_samples() {
    // Two 20-bit samples 0xABCDE and 0xF1234, packed MSB first
    let mut builder = TiffBuilder::new(ByteOrder::BigEndian, false);
    let offset = builder.add_data(&[0xAB, 0xCD, 0xEF, 0x12, 0x34]) as u32;
    let data = builder
        .add_ifd(
            IfdBuilder::new()
                .long(Tag::ImageWidth, &[2])
                .long(Tag::ImageLength, &[1])
                .short(Tag::BitsPerSample, &[20])
                .short(Tag::PhotometricInterpretation, &[Photometric::BlackIsZero.to_u16()])
                .long(Tag::StripOffsets, &[offset])
                .long(Tag::StripByteCounts, &[5])
                .long(Tag::RowsPerStrip, &[1]),
        )
        .build();

    let mut r = reader(data);
    assert_eq!(r.output_layout(0).unwrap().sample_bytes, 3);
    assert_eq!(r.read_image(0).unwrap(), vec![0x0A, 0xBC, 0xDE, 0x0F, 0x12, 0x34]);
}

#[test]
fn test_24bit_white_is_zero() {
    let mut builder = TiffBuilder::classic_le();
    let offset = builder.add_data(&[0x00, 0x00, 0x00, 0x01, 0x00, 0x00]) as u32;
    let data = builder
        .add_ifd(
            IfdBuilder::new()
                .long(Tag::ImageWidth, &[2])
                .long(Tag::ImageLength, &[1])
                .short(Tag::BitsPerSample, &[24])
                .short(Tag::PhotometricInterpretation, &[Photometric::WhiteIsZero.to_u16()])
                .long(Tag::StripOffsets, &[offset])
                .long(Tag::StripByteCounts, &[6])
                .long(Tag::RowsPerStrip, &[1]),
        )
        .build();

    assert_eq!(
        reader(data).read_image(0).unwrap(),
        vec![0xFF, 0xFF, 0xFF, 0xFE, 0xFF, 0xFF]
    );
}

// =============================================================================
// Heuristics
// =============================================================================

#[test]
fn test_missing_byte_counts_rebuilt() {
    let pixels = ramp(8 * 6);
    let data = stripped_file(8, 6, 1, Some(2), false, &pixels);
    let mut r = reader(data);
    assert_eq!(r.read_image(0).unwrap(), pixels);
    let strips = r.strip_layout(0).unwrap();
    assert!(!strips.authoritative);
    assert_eq!(strips.byte_counts, vec![16, 16, 16]);
}

#[test]
fn test_missing_rows_per_strip_inferred() {
    let pixels = ramp(10 * 9);
    // Written with 3 rows per strip, tag omitted
    let mut builder = TiffBuilder::classic_le();
    let mut offsets = Vec::new();
    for strip in pixels.chunks(30) {
        offsets.push(builder.add_data(strip) as u32);
    }
    let data = builder
        .add_ifd(
            IfdBuilder::new()
                .long(Tag::ImageWidth, &[10])
                .long(Tag::ImageLength, &[9])
                .short(Tag::BitsPerSample, &[8])
                .long(Tag::StripOffsets, &offsets)
                .long(Tag::StripByteCounts, &[30, 30, 30]),
        )
        .build();

    let mut r = reader(data);
    assert_eq!(r.strip_layout(0).unwrap().grid.chunk_height, 3);
    assert_eq!(r.read_image(0).unwrap(), pixels);
}

#[test]
fn test_single_strip_without_counts_or_rows() {
    let pixels = ramp(5 * 5);
    let data = stripped_file(5, 5, 1, None, false, &pixels);
    assert_eq!(reader(data).read_image(0).unwrap(), pixels);
}

#[test]
fn test_planar_strip_per_plane_without_rows() {
    let planes: [Vec<u8>; 3] = [vec![1; 8], vec![2; 8], vec![3; 8]];
    let mut builder = TiffBuilder::classic_le();
    let offsets: Vec<u32> = planes.iter().map(|p| builder.add_data(p) as u32).collect();
    let data = builder
        .add_ifd(
            IfdBuilder::new()
                .long(Tag::ImageWidth, &[4])
                .long(Tag::ImageLength, &[2])
                .short(Tag::BitsPerSample, &[8, 8, 8])
                .short(Tag::SamplesPerPixel, &[3])
                .short(Tag::PhotometricInterpretation, &[Photometric::Rgb.to_u16()])
                .short(Tag::PlanarConfiguration, &[2])
                .long(Tag::StripOffsets, &offsets)
                .long(Tag::StripByteCounts, &[8, 8, 8]),
        )
        .build();

    let mut r = reader(data);
    assert_eq!(r.output_layout(0).unwrap().planes, 3);
    assert_eq!(r.read_image(0).unwrap(), planes.concat());
    assert_eq!(r.strip_layout(0).unwrap().grid.chunk_height, 2);
}

#[test]
fn test_missing_offsets_rejected() {
    let data = TiffBuilder::classic_le()
        .add_ifd(
            IfdBuilder::new()
                .long(Tag::ImageWidth, &[4])
                .long(Tag::ImageLength, &[4])
                .short(Tag::BitsPerSample, &[8]),
        )
        .build();
    assert!(matches!(
        reader(data).read_image(0),
        Err(TiffError::InsufficientMetadata(_))
    ));
}

// =============================================================================
// Windowed Reads
// =============================================================================

fn check_windows(spec: &ImageSpec, byte_order: ByteOrder) {
    let mut samples = ramp(spec.sample_len().unwrap());
    if spec.bits_per_sample < 8 {
        let max = (1u8 << spec.bits_per_sample) - 1;
        samples.iter_mut().for_each(|s| *s &= max);
    }
    let data = encode_image(spec, &samples, byte_order, false);
    let mut r = reader(data);

    let full = r.read_image(0).unwrap();
    assert_eq!(full, samples);

    let layout = r.output_layout(0).unwrap();
    let windows = [
        Region::new(0, 0, 1, 1),
        Region::new(3, 5, 17, 9),
        Region::new(15, 15, 2, 2),
        Region::new(0, 20, spec.width, 7),
        Region::new(spec.width - 5, spec.height - 4, 5, 4),
        Region::full(spec.width, spec.height),
    ];
    for region in windows {
        let window = r.read_region(0, region).unwrap();
        let expected = crop(&full, spec.width, spec.height, layout.planes, layout.pixel_bytes(), region);
        assert_eq!(window, expected, "{:?} {:?} {:?}", spec.layout, spec.planar, region);
    }
}

#[test]
fn test_windowed_reads_every_layout() {
    let layouts = [
        ChunkLayout::Strips { rows_per_strip: 7 },
        ChunkLayout::Tiles {
            width: 16,
            height: 16,
        },
    ];
    for layout in layouts {
        for planar in [PlanarConfiguration::Chunky, PlanarConfiguration::Planar] {
            let mut spec = ImageSpec::new(40, 35, 8, 3);
            spec.layout = layout;
            spec.planar = planar;
            spec.compression = Compression::Lzw;
            check_windows(&spec, ByteOrder::LittleEndian);
        }
    }
}

#[test]
fn test_windowed_reads_wide_samples_with_predictor() {
    let mut spec = ImageSpec::new(33, 29, 16, 2);
    spec.layout = ChunkLayout::Tiles {
        width: 16,
        height: 32,
    };
    spec.compression = Compression::Deflate;
    spec.predictor = Predictor::Horizontal;
    check_windows(&spec, ByteOrder::BigEndian);
}

#[test]
fn test_windowed_reads_sub_byte_samples() {
    let mut spec = ImageSpec::new(37, 30, 4, 1);
    spec.layout = ChunkLayout::Strips { rows_per_strip: 4 };
    spec.compression = Compression::PackBits;
    check_windows(&spec, ByteOrder::LittleEndian);
}
