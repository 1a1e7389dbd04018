//! Writing and overwrite integration tests.
//!
//! Tests verify:
//! - Directories survive a write/parse round trip in every header variant
//! - Multi-page files written with the image writer read back page by page
//! - Single-tag overwrite on real files picks the expected strategy and
//!   leaves every other value intact

use std::path::Path;

use micro_tiff::format::tiff::{Rational, SRational};
use micro_tiff::{
    overwrite_ifd_value, ByteOrder, ByteSink, ByteSource, ChunkLayout, Compression, Directory,
    FileSource, ImageSpec, ImageWriter, OverwriteStrategy, Predictor, RasterReader, Tag, TagValue,
    TiffError, TiffParser, TiffWriter,
};

use super::test_utils::ramp;

/// A directory exercising every classic field type.
fn assorted_directory() -> Directory {
    let mut dir = Directory::new();
    dir.put(Tag::ImageWidth, TagValue::long(320));
    dir.put(Tag::ImageLength, TagValue::long(200));
    dir.put(Tag::BitsPerSample, TagValue::Short(vec![16, 16, 16]));
    dir.put(Tag::ImageDescription, TagValue::ascii("round trip"));
    dir.put(Tag::XResolution, TagValue::Rational(vec![Rational::new(72, 1)]));
    dir.put(Tag::YResolution, TagValue::Rational(vec![Rational::new(300, 4)]));
    dir.put(Tag::Xmp, TagValue::Byte(b"<x:xmpmeta/>".to_vec()));
    dir.put(40001u16, TagValue::SByte(vec![-1, 2, -3]));
    dir.put(40002u16, TagValue::Undefined(vec![0xde, 0xad, 0xbe, 0xef, 0x01]));
    dir.put(40003u16, TagValue::SShort(vec![-300, 300]));
    dir.put(40004u16, TagValue::SLong(vec![-70_000]));
    dir.put(40005u16, TagValue::SRational(vec![SRational::new(-1, 3), SRational::new(5, -7)]));
    dir.put(40006u16, TagValue::Float(vec![1.5, -0.25]));
    dir.put(40007u16, TagValue::Double(vec![std::f64::consts::PI]));
    dir.put(40008u16, TagValue::Ascii(vec!["one".to_string(), "two".to_string()]));
    dir
}

fn write_file(path: &Path, byte_order: ByteOrder, bigtiff: bool, dirs: &[Directory]) {
    let mut writer = TiffWriter::create(FileSource::create(path).unwrap(), byte_order, bigtiff).unwrap();
    for dir in dirs {
        writer.write_directory(dir).unwrap();
    }
    writer.finish().unwrap().flush().unwrap();
}

fn read_dirs(path: &Path) -> Vec<Directory> {
    TiffParser::new(FileSource::open(path).unwrap()).get_ifds().unwrap()
}

// =============================================================================
// Directory Round Trips
// =============================================================================

#[test]
fn test_directory_round_trip_every_variant() {
    let tmp = tempfile::tempdir().unwrap();
    for bigtiff in [false, true] {
        for bo in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
            let path = tmp.path().join(format!("rt-{}-{}.tif", bigtiff, bo.is_little_endian()));
            let mut bigger = assorted_directory();
            if bigtiff {
                bigger.put(40009u16, TagValue::Long8(vec![u64::MAX, 1 << 40]));
                bigger.put(40010u16, TagValue::SLong8(vec![i64::MIN]));
            }
            write_file(&path, bo, bigtiff, &[bigger.clone(), assorted_directory()]);

            let dirs = read_dirs(&path);
            assert_eq!(dirs.len(), 2);
            for (read, written) in dirs.iter().zip([&bigger, &assorted_directory()]) {
                let mut expected = written.clone();
                expected.set_stream_flags(bo, bigtiff);
                assert_eq!(read, &expected, "bigtiff={} {:?}", bigtiff, bo);
            }
        }
    }
}

#[test]
fn test_long8_refused_in_classic_file() {
    let tmp = tempfile::tempdir().unwrap();
    let mut dir = Directory::new();
    dir.put(40009u16, TagValue::Long8(vec![1]));
    let mut writer = TiffWriter::create(
        FileSource::create(tmp.path().join("classic.tif")).unwrap(),
        ByteOrder::LittleEndian,
        false,
    )
    .unwrap();
    assert!(matches!(
        writer.write_directory(&dir),
        Err(TiffError::InvalidTagValue { .. })
    ));
}

// =============================================================================
// Image Pages
// =============================================================================

#[test]
fn test_multi_page_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("pages.tif");

    let mut gray = ImageSpec::new(50, 40, 8, 1);
    gray.compression = Compression::Lzw;
    gray.predictor = Predictor::Horizontal;
    let gray_samples = ramp(gray.sample_len().unwrap());

    let mut rgb16 = ImageSpec::new(20, 18, 16, 3);
    rgb16.compression = Compression::Deflate;
    rgb16.layout = ChunkLayout::Tiles {
        width: 16,
        height: 16,
    };
    let rgb_samples = ramp(rgb16.sample_len().unwrap());

    let mut extra = Directory::new();
    extra.put(Tag::Software, TagValue::ascii("micro-tiff tests"));

    let mut writer =
        ImageWriter::create(FileSource::create(&path).unwrap(), ByteOrder::BigEndian, true).unwrap();
    writer.write_image(&gray, &gray_samples, &extra).unwrap();
    writer.write_image(&rgb16, &rgb_samples, &Directory::new()).unwrap();
    writer.finish().unwrap().flush().unwrap();

    let mut reader = RasterReader::new(FileSource::open(&path).unwrap()).unwrap();
    assert_eq!(reader.directories().len(), 2);
    assert!(reader.header().is_bigtiff);
    assert_eq!(
        reader.directory(0).unwrap().get_string(Tag::Software).unwrap(),
        Some("micro-tiff tests")
    );
    assert_eq!(reader.read_image(0).unwrap(), gray_samples);
    assert_eq!(reader.read_image(1).unwrap(), rgb_samples);
    assert!(matches!(
        reader.read_image(2),
        Err(TiffError::IfdIndexOutOfRange { index: 2, count: 2 })
    ));
}

// =============================================================================
// Overwrite on Disk
// =============================================================================

fn described(text: &str) -> Directory {
    let mut dir = Directory::new();
    dir.put(Tag::ImageWidth, TagValue::long(8));
    dir.put(Tag::ImageLength, TagValue::long(8));
    dir.put(Tag::ImageDescription, TagValue::ascii(text));
    dir.put(Tag::Software, TagValue::ascii("untouched"));
    dir
}

fn size_of(path: &Path) -> u64 {
    FileSource::open(path).unwrap().size()
}

#[test]
fn test_bigtiff_description_shrinks_in_place() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("big.tif");
    let original = "a description of twenty-nine b";
    write_file(&path, ByteOrder::LittleEndian, true, &[described(original)]);
    let before = size_of(&path);

    let mut file = FileSource::open_rw(&path).unwrap();
    let strategy = overwrite_ifd_value(
        &mut file,
        0,
        Tag::ImageDescription.into(),
        &TagValue::ascii("short"),
    )
    .unwrap();
    file.flush().unwrap();
    drop(file);

    // Six bytes fit the eight-byte BigTIFF slot
    assert_eq!(strategy, OverwriteStrategy::Inline);
    assert_eq!(size_of(&path), before);
    let dirs = read_dirs(&path);
    assert_eq!(dirs[0].image_description().unwrap(), Some("short"));
    assert_eq!(dirs[0].get_string(Tag::Software).unwrap(), Some("untouched"));
}

#[test]
fn test_overwrite_strategies_on_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("classic.tif");
    write_file(
        &path,
        ByteOrder::BigEndian,
        false,
        &[described("first page text"), described("second page text")],
    );

    let mut file = FileSource::open_rw(&path).unwrap();
    let shorter = overwrite_ifd_value(
        &mut file,
        0,
        Tag::ImageDescription.into(),
        &TagValue::ascii("page one"),
    )
    .unwrap();
    assert_eq!(shorter, OverwriteStrategy::InPlace);

    let size = file.size();
    let longer = overwrite_ifd_value(
        &mut file,
        0,
        Tag::ImageDescription.into(),
        &TagValue::ascii("a much longer description for page one"),
    )
    .unwrap();
    assert_eq!(longer, OverwriteStrategy::Append);
    assert!(file.size() > size);

    let width = overwrite_ifd_value(&mut file, 1, Tag::ImageWidth.into(), &TagValue::long(9)).unwrap();
    assert_eq!(width, OverwriteStrategy::Inline);
    file.flush().unwrap();
    drop(file);

    let dirs = read_dirs(&path);
    assert_eq!(
        dirs[0].image_description().unwrap(),
        Some("a much longer description for page one")
    );
    assert_eq!(dirs[1].image_description().unwrap(), Some("second page text"));
    assert_eq!(dirs[1].image_width().unwrap(), 9);
    for dir in &dirs {
        assert_eq!(dir.get_string(Tag::Software).unwrap(), Some("untouched"));
    }
}

#[test]
fn test_overwrite_read_only_file_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("ro.tif");
    write_file(&path, ByteOrder::LittleEndian, false, &[described("text")]);

    let mut file = FileSource::open(&path).unwrap();
    let result = overwrite_ifd_value(&mut file, 0, Tag::ImageWidth.into(), &TagValue::long(99));
    assert!(matches!(result, Err(TiffError::Io(_))));
    assert_eq!(read_dirs(&path)[0].image_width().unwrap(), 8);
}
