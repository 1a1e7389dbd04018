//! JPEG stream inspection and JPEGTables splicing.
//!
//! TIFF files with compression 7 often store "abbreviated" streams per
//! chunk: scan data without quantization or Huffman tables. The tables live
//! once in the JPEGTables tag (347) as a stream of their own, framed by SOI
//! and EOI. Decoding a chunk means splicing the two:
//!
//! ```text
//! tables: SOI DQT DHT ... EOI
//! chunk:  SOI SOF SOS <entropy data> EOI
//! merged: SOI DQT DHT ... SOF SOS <entropy data> EOI
//! ```

use bytes::{Bytes, BytesMut};

pub const SOI: [u8; 2] = [0xFF, 0xD8];
pub const EOI: [u8; 2] = [0xFF, 0xD9];
pub const SOS: [u8; 2] = [0xFF, 0xDA];
pub const DQT: [u8; 2] = [0xFF, 0xDB];
pub const DHT: [u8; 2] = [0xFF, 0xC4];

/// A marker segment header found while walking a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Second marker byte (e.g. 0xDB for DQT)
    pub marker: u8,
    /// Position of the 0xFF byte
    pub offset: usize,
    /// Payload length, excluding the two marker bytes
    pub length: usize,
}

/// Walk marker segments after SOI, stopping at SOS or EOI (both included).
///
/// Yields nothing when the stream does not start with SOI.
pub fn segments(data: &[u8]) -> impl Iterator<Item = Segment> + '_ {
    let mut pos = if data.starts_with(&SOI) { 2 } else { data.len() };
    std::iter::from_fn(move || {
        // Fill bytes (0xFF runs) may precede a marker
        while pos + 1 < data.len() && data[pos] == 0xFF && data[pos + 1] == 0xFF {
            pos += 1;
        }
        if pos + 1 >= data.len() || data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        let offset = pos;
        let standalone = matches!(marker, 0x01 | 0xD0..=0xD9);
        let length = if standalone || pos + 3 >= data.len() {
            0
        } else {
            u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize
        };
        pos = if marker == 0xDA || marker == 0xD9 {
            data.len()
        } else {
            pos + 2 + length
        };
        Some(Segment {
            marker,
            offset,
            length,
        })
    })
}

/// Whether the stream carries its own quantization or Huffman tables.
pub fn has_tables(data: &[u8]) -> bool {
    segments(data).any(|s| s.marker == DQT[1] || s.marker == DHT[1])
}

/// Whether the stream is abbreviated: SOI, then SOS with no DQT or DHT.
pub fn is_abbreviated_stream(data: &[u8]) -> bool {
    let mut saw_scan = false;
    for segment in segments(data) {
        match segment.marker {
            0xDB | 0xC4 => return false,
            0xDA => saw_scan = true,
            _ => {}
        }
    }
    saw_scan
}

/// Image size and component count from the first SOFn segment.
pub fn frame_info(data: &[u8]) -> Option<(u16, u16, u8)> {
    let sof = segments(data).find(|s| {
        matches!(s.marker, 0xC0..=0xCF) && !matches!(s.marker, 0xC4 | 0xC8 | 0xCC)
    })?;
    // length(2) precision(1) height(2) width(2) components(1)
    let body = data.get(sof.offset + 4..sof.offset + 10)?;
    let height = u16::from_be_bytes([body[1], body[2]]);
    let width = u16::from_be_bytes([body[3], body[4]]);
    Some((width, height, body[5]))
}

/// Splice JPEGTables into an abbreviated chunk stream.
///
/// The trailing EOI of `tables` and the leading SOI of `data` are dropped,
/// so the result has exactly one of each. Empty tables return `data`
/// unchanged.
pub fn merge_jpeg_tables(tables: &[u8], data: &[u8]) -> Bytes {
    if tables.is_empty() || data.is_empty() {
        return Bytes::copy_from_slice(data);
    }
    let tables = tables.strip_suffix(&EOI).unwrap_or(tables);
    let data = data.strip_prefix(&SOI).unwrap_or(data);

    let mut merged = BytesMut::with_capacity(tables.len() + data.len() + 2);
    if !tables.starts_with(&SOI) {
        merged.extend_from_slice(&SOI);
    }
    merged.extend_from_slice(tables);
    merged.extend_from_slice(data);
    merged.freeze()
}

/// Chunk bytes ready for a JPEG decoder.
///
/// Tables are spliced in only when the chunk lacks its own.
pub fn prepare_jpeg(tables: Option<&[u8]>, data: &[u8]) -> Bytes {
    match tables {
        Some(tables) if !has_tables(data) => merge_jpeg_tables(tables, data),
        _ => Bytes::copy_from_slice(data),
    }
}
