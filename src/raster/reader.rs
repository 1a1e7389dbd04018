//! Region reads over strips and tiles.
//!
//! [`RasterReader`] parses the IFD chain once, then decodes the chunks that
//! overlap a requested region and copies the overlap into a caller buffer
//! laid out per [`OutputLayout`].

use tracing::{debug, warn};

use crate::codec::{codec_for, Codec, CodecOptions};
use crate::error::TiffError;
use crate::format::jpeg::prepare_jpeg;
use crate::format::tiff::{
    ChunkInfo, ColorModel, Compression, Directory, FillOrder, PlanarConfiguration, Predictor,
    Region, SampleGeometry, StripLayout, TiffHeader, TiffParser,
};
use crate::io::ByteSource;
use crate::pixel::bits::reverse_bits_in_place;
use crate::pixel::{
    apply_photometric, cfa_split, undifference, unpack_samples, ycbcr_to_rgb, OutputLayout,
    PackedShape, PredictorParams,
};

/// Everything needed to decode the chunks of one directory.
struct ImagePlan {
    geometry: SampleGeometry,
    layout: StripLayout,
    output: OutputLayout,
    codec: Box<dyn Codec>,
    jpeg_tables: Option<Vec<u8>>,
}

impl ImagePlan {
    fn new(dir: &Directory, file_size: u64) -> Result<Self, TiffError> {
        let geometry = SampleGeometry::from_directory(dir)?;
        PredictorParams::check(geometry.predictor, geometry.bits())?;
        if geometry.planar == PlanarConfiguration::Planar
            && matches!(geometry.color, ColorModel::YCbCr(_))
        {
            return Err(TiffError::Unsupported("planar YCbCr".to_string()));
        }
        let layout = StripLayout::from_directory(dir, &geometry, file_size)?;
        let codec = codec_for(geometry.compression)?;
        Ok(Self {
            output: OutputLayout::for_geometry(&geometry),
            jpeg_tables: dir.jpeg_tables().map(<[u8]>::to_vec),
            geometry,
            layout,
            codec,
        })
    }

    /// Planes one decoded chunk produces (three for CFA, otherwise one).
    fn chunk_planes(&self) -> usize {
        match self.geometry.color {
            ColorModel::Cfa(_) => self.output.planes,
            _ => 1,
        }
    }

    fn decoded_chunk_len(&self, chunk: &ChunkInfo) -> Result<usize, TiffError> {
        self.output
            .plane_len(chunk.stored_width, chunk.stored_height)?
            .checked_mul(self.chunk_planes())
            .ok_or(TiffError::TooLarge {
                what: "decoded chunk size",
            })
    }

    fn codec_options(&self, chunk: &ChunkInfo, expected: usize) -> CodecOptions {
        let geometry = &self.geometry;
        let channels = match geometry.color {
            ColorModel::Jpeg => self.output.channels,
            _ => geometry.chunky_samples(),
        };
        let interleaved = geometry.planar == PlanarConfiguration::Chunky
            || geometry.compression == Compression::Jpeg2000;
        CodecOptions {
            bits_per_sample: geometry.bits(),
            interleaved,
            little_endian: geometry.byte_order.is_little_endian(),
            max_bytes: Some(expected),
            ..CodecOptions::new(chunk.stored_width, chunk.stored_height, geometry.bits(), channels as u16)
        }
    }

    /// Turn compressed chunk bytes into output-layout samples covering the
    /// chunk's stored size.
    fn decode(&self, chunk: &ChunkInfo, mut data: Vec<u8>) -> Result<Vec<u8>, TiffError> {
        let geometry = &self.geometry;
        let (width, height) = (chunk.stored_width, chunk.stored_height);

        if geometry.fill_order == FillOrder::LsbFirst {
            reverse_bits_in_place(&mut data);
        }
        if geometry.compression.is_jpeg() {
            data = prepare_jpeg(self.jpeg_tables.as_deref(), &data).to_vec();
        }

        let expected = geometry.packed_chunk_bytes(width, height)?;
        let options = self.codec_options(chunk, expected);
        let mut decoded = self.codec.decompress(&data, Some(&options))?;
        if decoded.len() < expected {
            warn!(
                chunk = chunk.index,
                decoded = decoded.len(),
                expected,
                "Chunk decoded short; zero padding"
            );
            decoded.resize(expected, 0);
        }

        let predicted = geometry.predictor == Predictor::Horizontal;
        if predicted && !matches!(geometry.color, ColorModel::Jpeg) {
            let params = PredictorParams {
                row_bytes: geometry.packed_row_bytes(width)?,
                stride: geometry.chunky_samples(),
                sample_bytes: geometry.sample_bytes(),
                byte_order: geometry.byte_order,
            };
            undifference(&mut decoded, &params);
        }

        let shape = PackedShape {
            bits: geometry.bits(),
            samples_per_row: width as usize * geometry.chunky_samples(),
            rows: height as usize,
            byte_order: geometry.byte_order,
        };
        Ok(match &geometry.color {
            ColorModel::Jpeg => decoded,
            ColorModel::YCbCr(params) => {
                ycbcr_to_rgb(&decoded, width as usize, height as usize, params)
            }
            ColorModel::Cfa(pattern) => cfa_split(
                &unpack_samples(&decoded, &shape),
                width as usize,
                height as usize,
                geometry.sample_bytes(),
                (chunk.region.x as usize, chunk.region.y as usize),
                pattern,
            ),
            ColorModel::Direct => {
                let mut samples = unpack_samples(&decoded, &shape);
                apply_photometric(
                    &mut samples,
                    geometry.photometric,
                    geometry.bits(),
                    geometry.byte_order,
                );
                samples
            }
        })
    }
}

/// Reads pixel regions from the images of a TIFF file.
pub struct RasterReader<S> {
    parser: TiffParser<S>,
    header: TiffHeader,
    directories: Vec<Directory>,
}

impl<S: ByteSource> RasterReader<S> {
    /// Parse the header and every decodable directory of `source`.
    pub fn new(source: S) -> Result<Self, TiffError> {
        let mut parser = TiffParser::new(source);
        let header = parser.header()?;
        let directories = parser.get_ifds()?;
        debug!(
            source = parser.source_mut().identifier(),
            images = directories.len(),
            "Opened raster"
        );
        Ok(Self {
            parser,
            header,
            directories,
        })
    }

    pub fn header(&self) -> &TiffHeader {
        &self.header
    }

    pub fn directories(&self) -> &[Directory] {
        &self.directories
    }

    /// Directory `ifd`, or `IfdIndexOutOfRange`.
    pub fn directory(&self, ifd: usize) -> Result<&Directory, TiffError> {
        self.directories
            .get(ifd)
            .ok_or(TiffError::IfdIndexOutOfRange {
                index: ifd,
                count: self.directories.len(),
            })
    }

    /// How [`read_region`](Self::read_region) arranges samples for `ifd`.
    pub fn output_layout(&self, ifd: usize) -> Result<OutputLayout, TiffError> {
        let geometry = SampleGeometry::from_directory(self.directory(ifd)?)?;
        Ok(OutputLayout::for_geometry(&geometry))
    }

    /// Chunk layout of `ifd` after any heuristic repair.
    pub fn strip_layout(&mut self, ifd: usize) -> Result<StripLayout, TiffError> {
        let file_size = self.parser.source_mut().size();
        Ok(self.plan(ifd, file_size)?.layout)
    }

    fn plan(&self, ifd: usize, file_size: u64) -> Result<ImagePlan, TiffError> {
        ImagePlan::new(self.directory(ifd)?, file_size)
    }

    /// Decode the whole of image `ifd`.
    pub fn read_image(&mut self, ifd: usize) -> Result<Vec<u8>, TiffError> {
        let dir = self.directory(ifd)?;
        let region = Region::full(dir.image_width()?, dir.image_length()?);
        self.read_region(ifd, region)
    }

    /// Decode `region` of image `ifd` into a new buffer.
    pub fn read_region(&mut self, ifd: usize, region: Region) -> Result<Vec<u8>, TiffError> {
        let len = self.output_layout(ifd)?.buffer_len(region.width, region.height)?;
        let mut buf = vec![0u8; len];
        self.read_region_into(ifd, region, &mut buf)?;
        Ok(buf)
    }

    /// Decode `region` of image `ifd` into `buf`, returning the bytes
    /// written.
    ///
    /// A failing chunk is fatal when it is the first chunk of its plane;
    /// later failures leave that chunk's pixels zero.
    pub fn read_region_into(
        &mut self,
        ifd: usize,
        region: Region,
        buf: &mut [u8],
    ) -> Result<usize, TiffError> {
        let file_size = self.parser.source_mut().size();
        let plan = self.plan(ifd, file_size)?;
        let geometry = &plan.geometry;
        region.check_within(geometry.width, geometry.height)?;

        let plane_len = plan.output.plane_len(region.width, region.height)?;
        let required = plan.output.buffer_len(region.width, region.height)?;
        if buf.len() < required {
            return Err(TiffError::BufferTooSmall {
                required,
                actual: buf.len(),
            });
        }
        let buf = &mut buf[..required];
        buf.fill(0);
        if region.is_empty() {
            return Ok(0);
        }

        let grid = plan.layout.grid;
        for plane in 0..grid.planes as usize {
            for chunk in grid.chunks_in(&region, plane) {
                let decoded = match self.fetch_and_decode(&plan, &chunk, file_size) {
                    Ok(decoded) => decoded,
                    Err(e) if chunk.index_in_plane == 0 => return Err(e),
                    Err(e) => {
                        warn!(ifd, chunk = chunk.index, error = %e, "Chunk failed; filling with zeros");
                        continue;
                    }
                };
                copy_overlap(&plan, &chunk, &decoded, &region, plane_len, buf);
            }
        }
        Ok(required)
    }

    /// Decode chunk `index` of image `ifd` at its stored size.
    pub fn read_chunk(&mut self, ifd: usize, index: usize) -> Result<Vec<u8>, TiffError> {
        let file_size = self.parser.source_mut().size();
        let plan = self.plan(ifd, file_size)?;
        let count = plan.layout.grid.chunk_count();
        if index >= count {
            return Err(TiffError::invalid_tag(
                "chunk index",
                format!("{} out of {} chunks", index, count),
            ));
        }
        let chunk = plan.layout.grid.chunk(index);
        self.fetch_and_decode(&plan, &chunk, file_size)
    }

    fn fetch_and_decode(
        &mut self,
        plan: &ImagePlan,
        chunk: &ChunkInfo,
        file_size: u64,
    ) -> Result<Vec<u8>, TiffError> {
        let Some((offset, len)) = plan.layout.chunk_range(chunk.index, file_size)? else {
            debug!(chunk = chunk.index, "Sparse chunk decodes as zeros");
            return Ok(vec![0u8; plan.decoded_chunk_len(chunk)?]);
        };
        debug!(chunk = chunk.index, offset, len, codec = plan.codec.name(), "Fetching chunk");
        let data = self.parser.source_mut().read_exact_at(offset, len)?;
        plan.decode(chunk, data.to_vec())
    }

    pub fn into_inner(self) -> S {
        self.parser.into_inner()
    }
}

/// Copy the part of a decoded chunk that falls inside `region`.
fn copy_overlap(
    plan: &ImagePlan,
    chunk: &ChunkInfo,
    decoded: &[u8],
    region: &Region,
    plane_len: usize,
    buf: &mut [u8],
) {
    let Some(overlap) = chunk.region.intersect(region) else {
        return;
    };
    let pixel_bytes = plan.output.pixel_bytes();
    let chunk_plane_len = chunk.stored_width as usize * chunk.stored_height as usize * pixel_bytes;
    let run = overlap.width as usize * pixel_bytes;

    for chunk_plane in 0..plan.chunk_planes() {
        let target_plane = if plan.chunk_planes() > 1 {
            chunk_plane
        } else {
            chunk.plane
        };
        let src_base = chunk_plane * chunk_plane_len;
        let dst_base = target_plane * plane_len;
        for y in overlap.y..overlap.y + overlap.height {
            let src_row = (y - chunk.region.y) as usize * chunk.stored_width as usize;
            let src = src_base + (src_row + (overlap.x - chunk.region.x) as usize) * pixel_bytes;
            let dst_row = (y - region.y) as usize * region.width as usize;
            let dst = dst_base + (dst_row + (overlap.x - region.x) as usize) * pixel_bytes;
            if let Some(bytes) = decoded.get(src..src + run) {
                buf[dst..dst + run].copy_from_slice(bytes);
            }
        }
    }
}
