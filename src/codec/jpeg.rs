//! Compression 7 and 33007: baseline JPEG via the `image` crate.
//!
//! Decoded data is always 8-bit, gray or interleaved RGB. Streams that
//! need JPEGTables must be spliced with
//! [`prepare_jpeg`](crate::format::jpeg::prepare_jpeg) first.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageFormat, ImageReader};

use crate::error::CodecError;

use super::{compress_by_concatenation, decompress_by_concatenation, Codec, CodecOptions};

const NAME: &str = "JPEG";

#[derive(Debug, Clone, Copy, Default)]
pub struct JpegCodec;

impl Codec for JpegCodec {
    fn name(&self) -> &'static str {
        NAME
    }

    fn compress(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        _dims: Option<&[u32]>,
        options: &CodecOptions,
    ) -> Result<Vec<u8>, CodecError> {
        let invalid = |message: String| CodecError::InvalidOptions {
            codec: NAME,
            message,
        };
        if options.bits_per_sample != 8 {
            return Err(invalid(format!("{} bits per sample", options.bits_per_sample)));
        }
        let color = match options.channels {
            1 => ExtendedColorType::L8,
            3 => ExtendedColorType::Rgb8,
            n => return Err(invalid(format!("{} channels", n))),
        };
        let expected = width as usize * height as usize * options.channels as usize;
        if data.len() != expected {
            return Err(invalid(format!(
                "{} bytes for a {}x{} image of {} channels",
                data.len(),
                width,
                height,
                options.channels
            )));
        }

        let mut out = Vec::new();
        let quality = options.quality.clamp(1, 100);
        JpegEncoder::new_with_quality(&mut out, quality)
            .encode(data, width, height, color)
            .map_err(|e| CodecError::Encode {
                codec: NAME,
                message: e.to_string(),
            })?;
        Ok(out)
    }

    fn decompress(&self, data: &[u8], options: Option<&CodecOptions>) -> Result<Vec<u8>, CodecError> {
        let image = ImageReader::with_format(Cursor::new(data), ImageFormat::Jpeg)
            .decode()
            .map_err(|e| CodecError::Decode {
                codec: NAME,
                message: e.to_string(),
            })?;

        let gray = match options {
            Some(options) => options.channels == 1,
            None => image.color().channel_count() == 1,
        };
        let out = if gray {
            image.into_luma8().into_raw()
        } else {
            image.into_rgb8().into_raw()
        };
        Ok(match options {
            Some(options) => options.limit(out),
            None => out,
        })
    }

    fn compress_rows(
        &self,
        rows: &[&[u8]],
        width: u32,
        height: u32,
        dims: Option<&[u32]>,
        options: &CodecOptions,
    ) -> Result<Vec<u8>, CodecError> {
        compress_by_concatenation(self, rows, width, height, dims, options)
    }

    fn decompress_rows(
        &self,
        parts: &[&[u8]],
        options: Option<&CodecOptions>,
    ) -> Result<Vec<u8>, CodecError> {
        decompress_by_concatenation(self, parts, options)
    }
}
