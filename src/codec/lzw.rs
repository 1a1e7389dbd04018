//! Compression 5: TIFF-flavoured LZW via `weezl`.
//!
//! TIFF LZW is MSB-first with 8-bit symbols and switches code size one code
//! early. Streams written by pre-6.0 libtiff are LSB-first; they start with
//! bytes `00 01` and are decoded with plain LZW.

use tracing::warn;
use weezl::{decode, encode, BitOrder};

use crate::error::CodecError;

use super::{compress_by_concatenation, decompress_by_concatenation, Codec, CodecOptions};

const NAME: &str = "LZW";

#[derive(Debug, Clone, Copy, Default)]
pub struct LzwCodec;

fn is_old_style(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x00 && data[1] & 0x01 != 0
}

impl Codec for LzwCodec {
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
        encode::Encoder::with_tiff_size_switch(BitOrder::Msb, 8)
            .encode(data)
            .map_err(|e| CodecError::Encode {
                codec: NAME,
                message: e.to_string(),
            })
    }

    fn decompress(&self, data: &[u8], options: Option<&CodecOptions>) -> Result<Vec<u8>, CodecError> {
        let mut decoder = if is_old_style(data) {
            decode::Decoder::new(BitOrder::Lsb, 8)
        } else {
            decode::Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
        };

        let mut out = Vec::with_capacity(options.and_then(CodecOptions::expected_len).unwrap_or(0));
        let result = decoder.into_vec(&mut out).decode_all(data);
        if let Err(e) = result.status {
            // Trailing garbage after a complete chunk is common; keep what decoded
            let expected = options.and_then(CodecOptions::expected_len);
            match expected {
                Some(expected) if out.len() >= expected => {
                    warn!(error = %e, decoded = out.len(), "LZW stream corrupt after chunk end")
                }
                _ => {
                    return Err(CodecError::Decode {
                        codec: NAME,
                        message: e.to_string(),
                    })
                }
            }
        }

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
