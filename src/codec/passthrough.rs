//! Compression 1: bytes are stored as is.

use crate::error::CodecError;

use super::{compress_by_concatenation, decompress_by_concatenation, Codec, CodecOptions};

#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Codec for Passthrough {
    fn name(&self) -> &'static str {
        "None"
    }

    fn compress(
        &self,
        data: &[u8],
        _width: u32,
        _height: u32,
        _dims: Option<&[u32]>,
        _options: &CodecOptions,
    ) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8], options: Option<&CodecOptions>) -> Result<Vec<u8>, CodecError> {
        let data = data.to_vec();
        Ok(match options {
            Some(options) => options.limit(data),
            None => data,
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
