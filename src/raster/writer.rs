//! Whole-image encoding into strips or tiles.
//!
//! Samples go through the inverse of the read path: photometric inversion,
//! bit packing, horizontal differencing, then the codec. Chunk offsets and
//! byte counts are recorded as Long in classic files and Long8 in BigTIFF.

use tracing::debug;

use crate::codec::{codec_for, CodecOptions, DEFAULT_JPEG_QUALITY};
use crate::error::TiffError;
use crate::format::tiff::{
    ByteOrder, ChunkGrid, ChunkInfo, Compression, Directory, Photometric, PlanarConfiguration,
    Predictor, Tag, TagValue, TiffHeader, TiffWriter,
};
use crate::io::ByteSink;
use crate::pixel::{apply_photometric, difference, pack_samples, PackedShape, PredictorParams};

/// Target size of one strip when the caller does not pick RowsPerStrip.
const DEFAULT_STRIP_BYTES: usize = 8 * 1024;

/// How pixel data is cut into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkLayout {
    Strips { rows_per_strip: u32 },
    Tiles { width: u32, height: u32 },
}

/// Description of an image to encode.
///
/// Samples handed to [`ImageWriter::write_image`] are `ceil(bits / 8)`
/// bytes wide in the file's byte order, pixel-interleaved when chunky and
/// plane after plane when planar.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSpec {
    pub width: u32,
    pub height: u32,
    pub bits_per_sample: u16,
    pub samples_per_pixel: u16,
    pub planar: PlanarConfiguration,
    pub photometric: Photometric,
    pub compression: Compression,
    pub predictor: Predictor,
    pub layout: ChunkLayout,
    /// JPEG quality, 1-100
    pub quality: u8,
}

impl ImageSpec {
    /// Uncompressed chunky image in strips of roughly 8 KiB.
    pub fn new(width: u32, height: u32, bits_per_sample: u16, samples_per_pixel: u16) -> Self {
        let row_bytes = (width as usize * samples_per_pixel as usize * bits_per_sample as usize)
            .div_ceil(8)
            .max(1);
        let rows_per_strip = (DEFAULT_STRIP_BYTES / row_bytes).clamp(1, height.max(1) as usize);
        Self {
            width,
            height,
            bits_per_sample,
            samples_per_pixel,
            planar: PlanarConfiguration::Chunky,
            photometric: if samples_per_pixel >= 3 {
                Photometric::Rgb
            } else {
                Photometric::BlackIsZero
            },
            compression: Compression::None,
            predictor: Predictor::None,
            layout: ChunkLayout::Strips {
                rows_per_strip: rows_per_strip as u32,
            },
            quality: DEFAULT_JPEG_QUALITY,
        }
    }

    fn sample_bytes(&self) -> usize {
        (self.bits_per_sample as usize).div_ceil(8)
    }

    fn chunky_samples(&self) -> usize {
        match self.planar {
            PlanarConfiguration::Chunky => self.samples_per_pixel as usize,
            PlanarConfiguration::Planar => 1,
        }
    }

    fn planes(&self) -> usize {
        self.samples_per_pixel as usize / self.chunky_samples()
    }

    /// Bytes of sample data [`ImageWriter::write_image`] expects.
    pub fn sample_len(&self) -> Result<usize, TiffError> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|n| n.checked_mul(self.samples_per_pixel as usize))
            .and_then(|n| n.checked_mul(self.sample_bytes()))
            .ok_or(TiffError::TooLarge {
                what: "image size",
            })
    }

    fn validate(&self) -> Result<(), TiffError> {
        if self.width == 0 || self.height == 0 || self.samples_per_pixel == 0 {
            return Err(TiffError::invalid_tag(
                "ImageSpec",
                format!(
                    "{}x{} image with {} samples per pixel",
                    self.width, self.height, self.samples_per_pixel
                ),
            ));
        }
        if !(1..=64).contains(&self.bits_per_sample)
            || (self.bits_per_sample != 1 && self.bits_per_sample % 2 != 0)
        {
            return Err(TiffError::invalid_tag(
                Tag::BitsPerSample.name(),
                format!("{} bits per sample", self.bits_per_sample),
            ));
        }
        if matches!(self.photometric, Photometric::YCbCr | Photometric::CfaArray)
            || !self.photometric.is_supported()
        {
            return Err(TiffError::Unsupported(format!(
                "writing {} samples",
                self.photometric.name()
            )));
        }
        PredictorParams::check(self.predictor, self.bits_per_sample)?;
        match self.layout {
            ChunkLayout::Strips { rows_per_strip: 0 } => {
                Err(TiffError::invalid_tag(Tag::RowsPerStrip.name(), "zero rows per strip"))
            }
            ChunkLayout::Tiles { width, height }
                if width == 0 || height == 0 || width % 16 != 0 || height % 16 != 0 =>
            {
                Err(TiffError::invalid_tag(
                    "TileWidth/TileLength",
                    format!("{}x{} tiles are not positive multiples of 16", width, height),
                ))
            }
            _ => Ok(()),
        }
    }

    fn grid(&self) -> Result<ChunkGrid, TiffError> {
        let planes = self.planes() as u32;
        match self.layout {
            ChunkLayout::Strips { rows_per_strip } => ChunkGrid::strips(
                self.width,
                self.height,
                rows_per_strip.min(self.height),
                planes,
            ),
            ChunkLayout::Tiles { width, height } => {
                ChunkGrid::tiles(self.width, self.height, width, height, planes)
            }
        }
    }
}

/// Writes encoded images and their directories to a sink.
pub struct ImageWriter<S: ByteSink> {
    writer: TiffWriter<S>,
}

impl<S: ByteSink> ImageWriter<S> {
    /// Truncate `sink` and start a new file.
    pub fn create(sink: S, byte_order: ByteOrder, is_bigtiff: bool) -> Result<Self, TiffError> {
        Ok(Self {
            writer: TiffWriter::create(sink, byte_order, is_bigtiff)?,
        })
    }

    pub fn header(&self) -> &TiffHeader {
        self.writer.header()
    }

    /// Encode `samples` as described by `spec` and append the image's IFD.
    ///
    /// Tags in `extra` are written too; structural tags computed here win
    /// over any `extra` entry with the same number. Returns the IFD offset.
    pub fn write_image(
        &mut self,
        spec: &ImageSpec,
        samples: &[u8],
        extra: &Directory,
    ) -> Result<u64, TiffError> {
        spec.validate()?;
        let required = spec.sample_len()?;
        if samples.len() < required {
            return Err(TiffError::BufferTooSmall {
                required,
                actual: samples.len(),
            });
        }

        let header = *self.writer.header();
        let grid = spec.grid()?;
        let codec = codec_for(spec.compression)?;
        let mut offsets = Vec::with_capacity(grid.chunk_count());
        let mut counts = Vec::with_capacity(grid.chunk_count());

        for index in 0..grid.chunk_count() {
            let chunk = grid.chunk(index);
            let raw = extract_chunk(spec, &chunk, samples, header.byte_order);
            let mut packed = pack_samples(
                &raw,
                &PackedShape {
                    bits: spec.bits_per_sample,
                    samples_per_row: chunk.stored_width as usize * spec.chunky_samples(),
                    rows: chunk.stored_height as usize,
                    byte_order: header.byte_order,
                },
            );
            if spec.predictor == Predictor::Horizontal {
                let row_samples = chunk.stored_width as usize * spec.chunky_samples();
                let params = PredictorParams {
                    row_bytes: (row_samples * spec.bits_per_sample as usize).div_ceil(8),
                    stride: spec.chunky_samples(),
                    sample_bytes: spec.sample_bytes(),
                    byte_order: header.byte_order,
                };
                difference(&mut packed, &params);
            }

            let options = CodecOptions {
                interleaved: spec.planar == PlanarConfiguration::Chunky,
                little_endian: header.byte_order.is_little_endian(),
                quality: spec.quality,
                ..CodecOptions::new(
                    chunk.stored_width,
                    chunk.stored_height,
                    spec.bits_per_sample,
                    spec.chunky_samples() as u16,
                )
            };
            let encoded = codec.compress(
                &packed,
                chunk.stored_width,
                chunk.stored_height,
                None,
                &options,
            )?;
            offsets.push(self.writer.append_data(&encoded)?);
            counts.push(encoded.len() as u64);
        }

        let mut dir = extra.clone();
        for tag in [
            Tag::StripOffsets,
            Tag::StripByteCounts,
            Tag::RowsPerStrip,
            Tag::TileWidth,
            Tag::TileLength,
            Tag::TileOffsets,
            Tag::TileByteCounts,
        ] {
            dir.remove(tag);
        }
        dir.put(Tag::ImageWidth, TagValue::long(spec.width));
        dir.put(Tag::ImageLength, TagValue::long(spec.height));
        dir.put(
            Tag::BitsPerSample,
            TagValue::Short(vec![spec.bits_per_sample; spec.samples_per_pixel as usize]),
        );
        dir.put(Tag::SamplesPerPixel, TagValue::short(spec.samples_per_pixel));
        dir.put(Tag::Compression, TagValue::short(spec.compression.to_u16()));
        dir.put(
            Tag::PhotometricInterpretation,
            TagValue::short(spec.photometric.to_u16()),
        );
        dir.put(Tag::PlanarConfiguration, TagValue::short(spec.planar.to_u16()));
        if spec.predictor != Predictor::None {
            dir.put(Tag::Predictor, TagValue::short(spec.predictor.to_u16()));
        }

        let (offset_tag, count_tag) = match spec.layout {
            ChunkLayout::Strips { .. } => {
                dir.put(Tag::RowsPerStrip, TagValue::long(grid.chunk_height));
                (Tag::StripOffsets, Tag::StripByteCounts)
            }
            ChunkLayout::Tiles { width, height } => {
                dir.put(Tag::TileWidth, TagValue::long(width));
                dir.put(Tag::TileLength, TagValue::long(height));
                (Tag::TileOffsets, Tag::TileByteCounts)
            }
        };
        dir.put(offset_tag, offset_value(&offsets, header.is_bigtiff)?);
        dir.put(count_tag, offset_value(&counts, header.is_bigtiff)?);

        let ifd = self.writer.write_directory(&dir)?;
        debug!(
            ifd,
            chunks = offsets.len(),
            compression = %spec.compression.name(),
            "Wrote image"
        );
        Ok(ifd)
    }

    /// Append a directory with no pixel data of its own.
    pub fn write_directory(&mut self, dir: &Directory) -> Result<u64, TiffError> {
        self.writer.write_directory(dir)
    }

    /// Flush and hand back the sink.
    pub fn finish(self) -> Result<S, TiffError> {
        self.writer.finish()
    }
}

/// Long for classic files, Long8 for BigTIFF.
fn offset_value(values: &[u64], is_bigtiff: bool) -> Result<TagValue, TiffError> {
    if is_bigtiff {
        return Ok(TagValue::Long8(values.to_vec()));
    }
    values
        .iter()
        .map(|&v| u32::try_from(v))
        .collect::<Result<Vec<_>, _>>()
        .map(TagValue::Long)
        .map_err(|_| TiffError::TooLarge {
            what: "classic TIFF offset",
        })
}

/// Samples of one chunk at its stored size, photometric inversion applied.
///
/// Tile areas past the image edge are zero.
fn extract_chunk(spec: &ImageSpec, chunk: &ChunkInfo, samples: &[u8], byte_order: ByteOrder) -> Vec<u8> {
    let pixel_bytes = spec.chunky_samples() * spec.sample_bytes();
    let plane_len = spec.width as usize * spec.height as usize * pixel_bytes;
    let plane = &samples[chunk.plane * plane_len..(chunk.plane + 1) * plane_len];
    let stored_row = chunk.stored_width as usize * pixel_bytes;
    let run = chunk.region.width as usize * pixel_bytes;

    let mut out = vec![0u8; stored_row * chunk.stored_height as usize];
    for y in 0..chunk.region.height as usize {
        let src = ((chunk.region.y as usize + y) * spec.width as usize + chunk.region.x as usize)
            * pixel_bytes;
        out[y * stored_row..y * stored_row + run].copy_from_slice(&plane[src..src + run]);
    }
    apply_photometric(&mut out, spec.photometric, spec.bits_per_sample, byte_order);
    out
}
