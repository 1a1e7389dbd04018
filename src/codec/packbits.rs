//! Compression 32773: Macintosh PackBits run-length coding.
//!
//! Each packet starts with a signed header byte `n`:
//!
//! - `0..=127`: copy the next `n + 1` bytes literally
//! - `-127..=-1`: repeat the next byte `1 - n` times
//! - `-128`: no-op

use tracing::warn;

use crate::error::CodecError;

use super::{compress_by_concatenation, decompress_by_concatenation, Codec, CodecOptions};

const NAME: &str = "PackBits";
const MAX_PACKET: usize = 128;

#[derive(Debug, Clone, Copy, Default)]
pub struct PackBitsCodec;

/// Length of the run of equal bytes starting at `data[0]`, capped at 128.
fn run_length(data: &[u8]) -> usize {
    let first = data[0];
    data.iter()
        .take(MAX_PACKET)
        .take_while(|&&b| b == first)
        .count()
}

fn pack(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / MAX_PACKET + 1);
    let mut literal_start = 0;
    let mut pos = 0;

    let flush_literal = |out: &mut Vec<u8>, literal: &[u8]| {
        for packet in literal.chunks(MAX_PACKET) {
            out.push((packet.len() - 1) as u8);
            out.extend_from_slice(packet);
        }
    };

    while pos < data.len() {
        let run = run_length(&data[pos..]);
        // Two-byte runs only pay off at the start of a literal
        if run >= 3 || (run == 2 && pos == literal_start) {
            flush_literal(&mut out, &data[literal_start..pos]);
            out.push((1i16 - run as i16) as i8 as u8);
            out.push(data[pos]);
            pos += run;
            literal_start = pos;
        } else {
            pos += 1;
        }
    }
    flush_literal(&mut out, &data[literal_start..]);
    out
}

fn unpack(data: &[u8], limit: Option<usize>) -> Vec<u8> {
    let mut out = Vec::with_capacity(limit.unwrap_or(data.len() * 2));
    let full = |out: &Vec<u8>| limit.is_some_and(|max| out.len() >= max);
    let mut pos = 0;

    while pos < data.len() && !full(&out) {
        let n = data[pos] as i8;
        pos += 1;
        match n {
            0..=127 => {
                let len = n as usize + 1;
                let end = (pos + len).min(data.len());
                if end - pos < len {
                    warn!(missing = len - (end - pos), "PackBits literal truncated");
                }
                out.extend_from_slice(&data[pos..end]);
                pos = end;
            }
            -128 => {}
            _ => {
                let Some(&value) = data.get(pos) else {
                    warn!("PackBits run truncated");
                    break;
                };
                out.resize(out.len() + (1 - n as isize) as usize, value);
                pos += 1;
            }
        }
    }
    if let Some(max) = limit {
        out.truncate(max);
    }
    out
}

impl Codec for PackBitsCodec {
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
        Ok(pack(data))
    }

    fn decompress(&self, data: &[u8], options: Option<&CodecOptions>) -> Result<Vec<u8>, CodecError> {
        let limit = options.and_then(|o| o.max_bytes.or_else(|| o.expected_len()));
        Ok(unpack(data, limit))
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
