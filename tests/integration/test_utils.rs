//! Test utilities for integration tests.
//!
//! This module provides a byte source that records every read, and a
//! hand-rolled TIFF builder that lays out headers, directories and values
//! byte by byte without going through the crate's own writer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use micro_tiff::format::tiff::FieldType;
use micro_tiff::{ByteOrder, ByteSource, Directory, ImageSpec, ImageWriter, IoError, MemorySource};

// =============================================================================
// Byte Source with Request Tracking
// =============================================================================

/// An in-memory byte source that counts and records every read.
///
/// Clones share their counters, so a clone can be handed to a parser or a
/// cache while the test keeps the other to inspect the request pattern.
pub struct TrackingSource {
    data: Bytes,
    identifier: String,
    request_count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<(u64, usize)>>>,
}

impl TrackingSource {
    pub fn new(data: Vec<u8>, identifier: impl Into<String>) -> Self {
        Self {
            data: Bytes::from(data),
            identifier: identifier.into(),
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(u64, usize)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn reset_tracking(&self) {
        self.request_count.store(0, Ordering::SeqCst);
        self.requests.lock().unwrap().clear();
    }
}

impl Clone for TrackingSource {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            identifier: self.identifier.clone(),
            request_count: Arc::clone(&self.request_count),
            requests: Arc::clone(&self.requests),
        }
    }
}

impl ByteSource for TrackingSource {
    fn read_exact_at(&mut self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push((offset, len));

        let start = offset as usize;
        let end = start + len;
        if end > self.data.len() {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.data.len() as u64,
            });
        }
        Ok(self.data.slice(start..end))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

// =============================================================================
// TIFF File Builders
// =============================================================================

/// Builder for hand-laid-out TIFF files.
///
/// The file is laid out as: header, raw data blobs in the order they were
/// added, then each IFD followed by its out-of-line values.
pub struct TiffBuilder {
    byte_order: ByteOrder,
    is_bigtiff: bool,
    data: Vec<u8>,
    ifds: Vec<IfdBuilder>,
    cycle: bool,
}

impl TiffBuilder {
    pub fn new(byte_order: ByteOrder, is_bigtiff: bool) -> Self {
        Self {
            byte_order,
            is_bigtiff,
            data: Vec::new(),
            ifds: Vec::new(),
            cycle: false,
        }
    }

    pub fn classic_le() -> Self {
        Self::new(ByteOrder::LittleEndian, false)
    }

    fn header_size(&self) -> usize {
        if self.is_bigtiff {
            16
        } else {
            8
        }
    }

    /// Append a raw blob after the header and return its file offset.
    pub fn add_data(&mut self, bytes: &[u8]) -> u64 {
        let offset = (self.header_size() + self.data.len()) as u64;
        self.data.extend_from_slice(bytes);
        offset
    }

    pub fn add_ifd(mut self, ifd: IfdBuilder) -> Self {
        self.ifds.push(ifd);
        self
    }

    /// Make the last IFD point back at the first.
    pub fn with_cycle(mut self) -> Self {
        self.cycle = true;
        self
    }

    /// Build the TIFF file data.
    pub fn build(self) -> Vec<u8> {
        let bo = self.byte_order;
        let entry_size = if self.is_bigtiff { 20 } else { 12 };
        let word = if self.is_bigtiff { 8 } else { 4 };
        let count_size = if self.is_bigtiff { 8 } else { 2 };

        // Offsets of each IFD, with its external values right behind it
        let mut offsets = Vec::with_capacity(self.ifds.len());
        let mut cursor = align((self.header_size() + self.data.len()) as u64);
        for ifd in &self.ifds {
            offsets.push(cursor);
            let table = count_size + ifd.entries.len() * entry_size + word;
            let external: usize = ifd
                .entries
                .iter()
                .map(|e| e.encode(bo).len())
                .filter(|&len| len > word)
                .map(|len| align(len as u64) as usize)
                .sum();
            cursor = align(cursor + (table + external) as u64);
        }

        let mut out = Vec::new();
        out.extend_from_slice(&bo.marker());
        if self.is_bigtiff {
            out.extend(bo.u16_bytes(43));
            out.extend(bo.u16_bytes(8));
            out.extend(bo.u16_bytes(0));
            out.extend(bo.u64_bytes(offsets.first().copied().unwrap_or(0)));
        } else {
            out.extend(bo.u16_bytes(42));
            out.extend(bo.u32_bytes(offsets.first().copied().unwrap_or(0) as u32));
        }
        out.extend_from_slice(&self.data);

        for (idx, ifd) in self.ifds.iter().enumerate() {
            out.resize(offsets[idx] as usize, 0);
            let next = match offsets.get(idx + 1) {
                Some(&next) => next,
                None if self.cycle => offsets[0],
                None => 0,
            };
            ifd.write_to(&mut out, bo, self.is_bigtiff, offsets[idx], next);
        }
        out
    }
}

impl Default for TiffBuilder {
    fn default() -> Self {
        Self::classic_le()
    }
}

fn align(offset: u64) -> u64 {
    offset + (offset & 1)
}

enum Payload {
    Bytes(Vec<u8>),
    Shorts(Vec<u16>),
    Longs(Vec<u32>),
    Long8s(Vec<u64>),
}

struct EntryBuilder {
    tag: u16,
    field_type: u16,
    count: u64,
    payload: Payload,
}

impl EntryBuilder {
    fn encode(&self, bo: ByteOrder) -> Vec<u8> {
        match &self.payload {
            Payload::Bytes(v) => v.clone(),
            Payload::Shorts(v) => v.iter().flat_map(|&x| bo.u16_bytes(x)).collect(),
            Payload::Longs(v) => v.iter().flat_map(|&x| bo.u32_bytes(x)).collect(),
            Payload::Long8s(v) => v.iter().flat_map(|&x| bo.u64_bytes(x)).collect(),
        }
    }
}

/// Builder for the entries of one IFD.
#[derive(Default)]
pub struct IfdBuilder {
    entries: Vec<EntryBuilder>,
}

impl IfdBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn short(self, tag: impl Into<u16>, values: &[u16]) -> Self {
        self.push(tag.into(), FieldType::Short as u16, values.len() as u64, Payload::Shorts(values.to_vec()))
    }

    pub fn long(self, tag: impl Into<u16>, values: &[u32]) -> Self {
        self.push(tag.into(), FieldType::Long as u16, values.len() as u64, Payload::Longs(values.to_vec()))
    }

    pub fn long8(self, tag: impl Into<u16>, values: &[u64]) -> Self {
        self.push(tag.into(), FieldType::Long8 as u16, values.len() as u64, Payload::Long8s(values.to_vec()))
    }

    /// NUL-terminated ASCII.
    pub fn ascii(self, tag: impl Into<u16>, text: &str) -> Self {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        let count = bytes.len() as u64;
        self.push(tag.into(), FieldType::Ascii as u16, count, Payload::Bytes(bytes))
    }

    /// An entry with an arbitrary type code and pre-encoded value bytes.
    pub fn raw(self, tag: u16, field_type: u16, count: u64, bytes: &[u8]) -> Self {
        self.push(tag, field_type, count, Payload::Bytes(bytes.to_vec()))
    }

    fn push(mut self, tag: u16, field_type: u16, count: u64, payload: Payload) -> Self {
        self.entries.push(EntryBuilder {
            tag,
            field_type,
            count,
            payload,
        });
        self
    }

    fn write_to(&self, out: &mut Vec<u8>, bo: ByteOrder, is_bigtiff: bool, offset: u64, next: u64) {
        let word = if is_bigtiff { 8 } else { 4 };
        let entry_size = if is_bigtiff { 20 } else { 12 };
        let count_size = if is_bigtiff { 8 } else { 2 };

        let mut entries: Vec<&EntryBuilder> = self.entries.iter().collect();
        entries.sort_by_key(|e| e.tag);

        let mut external = align(offset + (count_size + entries.len() * entry_size + word) as u64);
        let mut table = Vec::new();
        let mut values = Vec::new();

        if is_bigtiff {
            table.extend(bo.u64_bytes(entries.len() as u64));
        } else {
            table.extend(bo.u16_bytes(entries.len() as u16));
        }
        for entry in entries {
            let bytes = entry.encode(bo);
            table.extend(bo.u16_bytes(entry.tag));
            table.extend(bo.u16_bytes(entry.field_type));
            if is_bigtiff {
                table.extend(bo.u64_bytes(entry.count));
            } else {
                table.extend(bo.u32_bytes(entry.count as u32));
            }
            if bytes.len() <= word {
                let mut slot = bytes;
                slot.resize(word, 0);
                table.extend(slot);
            } else {
                if is_bigtiff {
                    table.extend(bo.u64_bytes(external));
                } else {
                    table.extend(bo.u32_bytes(external as u32));
                }
                values.extend_from_slice(&bytes);
                if bytes.len() % 2 == 1 {
                    values.push(0);
                }
                external += align(bytes.len() as u64);
            }
        }
        if is_bigtiff {
            table.extend(bo.u64_bytes(next));
        } else {
            table.extend(bo.u32_bytes(next as u32));
        }

        out.extend(table);
        out.resize(align(out.len() as u64) as usize, 0);
        out.extend(values);
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Deterministic sample bytes.
pub fn ramp(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 253) as u8).collect()
}

/// Encode one image with the crate's writer.
pub fn encode_image(spec: &ImageSpec, samples: &[u8], byte_order: ByteOrder, bigtiff: bool) -> Vec<u8> {
    let mut writer = ImageWriter::create(MemorySource::new(Vec::new()), byte_order, bigtiff).unwrap();
    writer.write_image(spec, samples, &Directory::new()).unwrap();
    writer.finish().unwrap().into_inner()
}

/// Cut a `region` out of a full decoded image laid out as `planes` planes
/// of `width` x `height` pixels of `pixel_bytes` each.
pub fn crop(
    full: &[u8],
    width: u32,
    height: u32,
    planes: usize,
    pixel_bytes: usize,
    region: micro_tiff::Region,
) -> Vec<u8> {
    let plane_len = width as usize * height as usize * pixel_bytes;
    let row_len = width as usize * pixel_bytes;
    let mut out = Vec::new();
    for plane in 0..planes {
        let base = plane * plane_len;
        for y in region.y as usize..region.y as usize + region.height as usize {
            let start = base + y * row_len + region.x as usize * pixel_bytes;
            out.extend_from_slice(&full[start..start + region.width as usize * pixel_bytes]);
        }
    }
    out
}
