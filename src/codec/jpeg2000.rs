//! Compression 33003: JPEG-2000 code streams via `jpeg2k` (OpenJPEG).
//!
//! Decode only. Components are written `ceil(precision / 8)` bytes wide in
//! the byte order given by the options, interleaved or as planes.

use crate::error::CodecError;

use super::{compress_by_concatenation, decompress_by_concatenation, Codec, CodecOptions};

const NAME: &str = "JPEG-2000";

#[derive(Debug, Clone, Copy, Default)]
pub struct Jpeg2000Codec;

/// Lay out component samples as bytes.
///
/// `components` holds one slice per component, all the same length.
fn arrange(
    components: &[&[i32]],
    sample_bytes: usize,
    interleaved: bool,
    little_endian: bool,
) -> Vec<u8> {
    let pixels = components.first().map_or(0, |c| c.len());
    let mut out = Vec::with_capacity(pixels * components.len() * sample_bytes);
    let mut push = |value: i32| {
        let value = value.max(0) as u64;
        for i in 0..sample_bytes {
            let shift = if little_endian { i } else { sample_bytes - 1 - i } * 8;
            out.push((value >> shift) as u8);
        }
    };
    if interleaved {
        for p in 0..pixels {
            components.iter().for_each(|c| push(c[p]));
        }
    } else {
        for c in components {
            c.iter().for_each(|&v| push(v));
        }
    }
    out
}

impl Codec for Jpeg2000Codec {
    fn name(&self) -> &'static str {
        NAME
    }

    fn compress(
        &self,
        _data: &[u8],
        _width: u32,
        _height: u32,
        _dims: Option<&[u32]>,
        _options: &CodecOptions,
    ) -> Result<Vec<u8>, CodecError> {
        Err(CodecError::Unsupported {
            codec: NAME,
            operation: "compression",
        })
    }

    fn decompress(&self, data: &[u8], options: Option<&CodecOptions>) -> Result<Vec<u8>, CodecError> {
        let image = jpeg2k::Image::from_bytes(data).map_err(|e| CodecError::Decode {
            codec: NAME,
            message: e.to_string(),
        })?;

        let components = image.components();
        let precision = components.first().map_or(8, |c| c.precision());
        if components.iter().any(|c| c.precision() != precision) {
            return Err(CodecError::Decode {
                codec: NAME,
                message: "components differ in precision".to_string(),
            });
        }
        let planes: Vec<&[i32]> = components.iter().map(|c| c.data()).collect();
        if planes.windows(2).any(|w| w[0].len() != w[1].len()) {
            return Err(CodecError::Decode {
                codec: NAME,
                message: "subsampled components are not supported".to_string(),
            });
        }

        let defaults = CodecOptions::default();
        let opts = options.unwrap_or(&defaults);
        let sample_bytes = (precision as usize).div_ceil(8).max(1);
        let out = arrange(&planes, sample_bytes, opts.interleaved, opts.little_endian);
        Ok(opts.limit(out))
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
