//! Compression 8 and 32946: zlib-wrapped Deflate via `miniz_oxide`.

use miniz_oxide::deflate::compress_to_vec_zlib;
use miniz_oxide::inflate::{
    decompress_to_vec_with_limit, decompress_to_vec_zlib_with_limit, TINFLStatus,
};
use tracing::debug;

use crate::error::CodecError;

use super::{compress_by_concatenation, decompress_by_concatenation, Codec, CodecOptions};

const NAME: &str = "Deflate";

/// Deflate codec with a fixed compression level (0-10).
#[derive(Debug, Clone, Copy)]
pub struct DeflateCodec {
    pub level: u8,
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl Codec for DeflateCodec {
    fn name(&self) -> &'static str {
        NAME
    }

    fn compress(
        &self,
        data: &[u8],
        _width: u32,
        _height: u32,
        _dims: Option<&[u32]>,
        _options: &CodecOptions,
    ) -> Result<Vec<u8>, CodecError> {
        Ok(compress_to_vec_zlib(data, self.level.min(10)))
    }

    fn decompress(&self, data: &[u8], options: Option<&CodecOptions>) -> Result<Vec<u8>, CodecError> {
        let limit = options.and_then(|o| o.max_bytes).unwrap_or(usize::MAX);
        match decompress_to_vec_zlib_with_limit(data, limit) {
            Ok(out) => Ok(out),
            // Output reached max_bytes
            Err(e) if e.status == TINFLStatus::HasMoreOutput => {
                let mut out = e.output;
                out.truncate(limit);
                Ok(out)
            }
            Err(zlib_error) => {
                // Some writers omit the zlib wrapper
                debug!(status = ?zlib_error.status, "zlib header rejected; trying raw deflate");
                decompress_to_vec_with_limit(data, limit).map_err(|_| CodecError::Decode {
                    codec: NAME,
                    message: format!("{:?}", zlib_error.status),
                })
            }
        }
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
