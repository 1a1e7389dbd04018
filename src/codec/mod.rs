//! Compression codecs and dispatch.
//!
//! A [`Codec`] turns one chunk's bytes into another. The reader and writer
//! only ever go through [`codec_for`], which maps a TIFF Compression value
//! to an implementation:
//!
//! | Compression | Codec |
//! |-------------|-------|
//! | 1 | [`Passthrough`] |
//! | 5 | [`LzwCodec`] (`weezl`) |
//! | 7, 33007 | [`JpegCodec`] (`image`) |
//! | 8, 32946 | [`DeflateCodec`] (`miniz_oxide`) |
//! | 32773 | [`PackBitsCodec`] |
//! | 33003 | [`Jpeg2000Codec`] (`jpeg2k`, decode only) |
//!
//! Everything else is recognized by name and refused.
//!
//! The row-array ("2-D") methods have no default bodies: each codec opts
//! into the concatenating behavior by calling
//! [`compress_by_concatenation`] or [`decompress_by_concatenation`].

mod deflate;
mod jpeg;
mod jpeg2000;
mod lzw;
mod packbits;
mod passthrough;

pub use deflate::DeflateCodec;
pub use jpeg::JpegCodec;
pub use jpeg2000::Jpeg2000Codec;
pub use lzw::LzwCodec;
pub use packbits::PackBitsCodec;
pub use passthrough::Passthrough;

use tracing::debug;

use crate::error::{CodecError, TiffError};
use crate::format::tiff::Compression;

/// Default JPEG quality (1-100) when compressing.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Parameters describing the buffer handed to a codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecOptions {
    pub width: u32,
    pub height: u32,
    pub bits_per_sample: u16,
    /// Samples per pixel in this buffer
    pub channels: u16,
    /// Whether channels are pixel-interleaved
    pub interleaved: bool,
    pub little_endian: bool,
    pub lossless: bool,
    /// Decoded output is cut to this many bytes
    pub max_bytes: Option<usize>,
    /// JPEG quality, 1-100
    pub quality: u8,
    /// JPEG-2000 code-block edge length
    pub code_block_size: Option<u32>,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            bits_per_sample: 8,
            channels: 1,
            interleaved: true,
            little_endian: true,
            lossless: true,
            max_bytes: None,
            quality: DEFAULT_JPEG_QUALITY,
            code_block_size: None,
        }
    }
}

impl CodecOptions {
    pub fn new(width: u32, height: u32, bits_per_sample: u16, channels: u16) -> Self {
        Self {
            width,
            height,
            bits_per_sample,
            channels,
            ..Self::default()
        }
    }

    /// Packed bytes of one row of this buffer.
    pub fn row_bytes(&self) -> Option<usize> {
        let samples = if self.interleaved { self.channels as usize } else { 1 };
        (self.width as usize)
            .checked_mul(samples)?
            .checked_mul(self.bits_per_sample as usize)
            .map(|bits| bits.div_ceil(8))
    }

    /// Packed bytes of the whole buffer.
    pub fn expected_len(&self) -> Option<usize> {
        self.row_bytes()?.checked_mul(self.height as usize)
    }

    /// Cut `data` to `max_bytes`, if set.
    pub(crate) fn limit(&self, mut data: Vec<u8>) -> Vec<u8> {
        if let Some(max) = self.max_bytes {
            data.truncate(max);
        }
        data
    }
}

/// A chunk compression scheme.
pub trait Codec: Send + Sync {
    /// Scheme name for logs and errors.
    fn name(&self) -> &'static str;

    /// Compress one buffer of `width` x `height` pixels. `dims` carries
    /// extra dimensions for codecs that use them.
    fn compress(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        dims: Option<&[u32]>,
        options: &CodecOptions,
    ) -> Result<Vec<u8>, CodecError>;

    /// Decompress one buffer.
    fn decompress(&self, data: &[u8], options: Option<&CodecOptions>) -> Result<Vec<u8>, CodecError>;

    /// Compress a buffer given as rows.
    fn compress_rows(
        &self,
        rows: &[&[u8]],
        width: u32,
        height: u32,
        dims: Option<&[u32]>,
        options: &CodecOptions,
    ) -> Result<Vec<u8>, CodecError>;

    /// Decompress a stream split into parts.
    fn decompress_rows(
        &self,
        parts: &[&[u8]],
        options: Option<&CodecOptions>,
    ) -> Result<Vec<u8>, CodecError>;
}

/// Row-array compression through the one-buffer path.
pub fn compress_by_concatenation<C: Codec + ?Sized>(
    codec: &C,
    rows: &[&[u8]],
    width: u32,
    height: u32,
    dims: Option<&[u32]>,
    options: &CodecOptions,
) -> Result<Vec<u8>, CodecError> {
    codec.compress(&rows.concat(), width, height, dims, options)
}

/// Split-stream decompression through the one-buffer path.
pub fn decompress_by_concatenation<C: Codec + ?Sized>(
    codec: &C,
    parts: &[&[u8]],
    options: Option<&CodecOptions>,
) -> Result<Vec<u8>, CodecError> {
    codec.decompress(&parts.concat(), options)
}

/// The codec for a Compression tag value.
pub fn codec_for(compression: Compression) -> Result<Box<dyn Codec>, TiffError> {
    let codec: Box<dyn Codec> = match compression {
        Compression::None => Box::new(Passthrough),
        Compression::Lzw => Box::new(LzwCodec),
        Compression::Jpeg | Compression::AlternateJpeg => Box::new(JpegCodec),
        Compression::AdobeDeflate | Compression::Deflate => Box::new(DeflateCodec::default()),
        Compression::PackBits => Box::new(PackBitsCodec),
        Compression::Jpeg2000 => Box::new(Jpeg2000Codec),
        other => return Err(TiffError::UnsupportedCompression(other.name())),
    };
    debug!(
        compression = compression.to_u16(),
        codec = codec.name(),
        "Selected codec"
    );
    Ok(codec)
}

/// Self-test: `data` must survive compress then decompress unchanged, and
/// compressing it row by row must give the same bytes as compressing it
/// whole.
///
/// `data` is split into `options.height` rows. Lossy and decode-only codecs
/// cannot pass.
pub fn verify_round_trip(
    codec: &dyn Codec,
    data: &[u8],
    options: &CodecOptions,
) -> Result<(), CodecError> {
    let mismatch = |message: String| CodecError::RoundTrip {
        codec: codec.name(),
        message,
    };

    let (width, height) = (options.width, options.height);
    let compressed = codec.compress(data, width, height, None, options)?;
    let restored = codec.decompress(&compressed, Some(options))?;
    if restored != data {
        let first_diff = restored
            .iter()
            .zip(data)
            .position(|(a, b)| a != b)
            .unwrap_or(restored.len().min(data.len()));
        return Err(mismatch(format!(
            "{} bytes in, {} bytes out, first difference at {}",
            data.len(),
            restored.len(),
            first_diff
        )));
    }

    let rows = height.max(1) as usize;
    let row_len = data.len().div_ceil(rows).max(1);
    let split: Vec<&[u8]> = data.chunks(row_len).collect();
    let by_rows = codec.compress_rows(&split, width, height, None, options)?;
    if by_rows != compressed {
        return Err(mismatch(format!(
            "row-wise output is {} bytes, whole-buffer output is {}",
            by_rows.len(),
            compressed.len()
        )));
    }
    Ok(())
}
