//! TIFF header and directory parsing.
//!
//! # TIFF Header Structure
//!
//! ## Classic TIFF (8 bytes)
//! ```text
//! Bytes 0-1: Byte order (0x4949 = little-endian "II", 0x4D4D = big-endian "MM")
//! Bytes 2-3: Version (42 = 0x002A)
//! Bytes 4-7: Offset to first IFD (4 bytes)
//! ```
//!
//! ## BigTIFF (16 bytes)
//! ```text
//! Bytes 0-1: Byte order
//! Bytes 2-3: Version (43 = 0x002B)
//! Bytes 4-5: Offset byte size (must be 8)
//! Bytes 6-7: Reserved (must be 0)
//! Bytes 8-15: Offset to first IFD (8 bytes)
//! ```
//!
//! # IFD Structure
//!
//! ```text
//! entry count        2 bytes (classic) / 8 bytes (BigTIFF)
//! entries            12 bytes each     / 20 bytes each
//!   tag              2
//!   field type       2
//!   count            4 / 8
//!   value or offset  4 / 8
//! next IFD offset    4 / 8
//! ```
//!
//! Directories form a singly-linked chain starting at the header's first
//! IFD offset. The walk is bounded by the number of directories the file
//! could possibly hold, so corrupt or cyclic chains always terminate.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::TiffError;
use crate::io::{
    read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le, ByteSource,
};

use super::directory::Directory;
use super::tags::{tag_name, FieldType};
use super::values::{TagValue, ValueReader};

// =============================================================================
// Constants
// =============================================================================

/// Marker bytes indicating little-endian byte order ("II" for Intel)
const BYTE_ORDER_LITTLE_ENDIAN: u16 = 0x4949;

/// Marker bytes indicating big-endian byte order ("MM" for Motorola)
const BYTE_ORDER_BIG_ENDIAN: u16 = 0x4D4D;

/// Version number for classic TIFF
pub const VERSION_TIFF: u16 = 42;

/// Version number for BigTIFF
pub const VERSION_BIGTIFF: u16 = 43;

/// Size of classic TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

/// Size of BigTIFF header in bytes
pub const BIGTIFF_HEADER_SIZE: usize = 16;

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order (endianness) of a TIFF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Little-endian ("II" = Intel)
    LittleEndian,
    /// Big-endian ("MM" = Motorola)
    BigEndian,
}

impl ByteOrder {
    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            ByteOrder::LittleEndian => read_u16_le(bytes),
            ByteOrder::BigEndian => read_u16_be(bytes),
        }
    }

    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            ByteOrder::LittleEndian => read_u32_le(bytes),
            ByteOrder::BigEndian => read_u32_be(bytes),
        }
    }

    #[inline]
    pub fn read_u64(self, bytes: &[u8]) -> u64 {
        match self {
            ByteOrder::LittleEndian => read_u64_le(bytes),
            ByteOrder::BigEndian => read_u64_be(bytes),
        }
    }

    #[inline]
    pub fn u16_bytes(self, value: u16) -> [u8; 2] {
        match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }

    #[inline]
    pub fn u32_bytes(self, value: u32) -> [u8; 4] {
        match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }

    #[inline]
    pub fn u64_bytes(self, value: u64) -> [u8; 8] {
        match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }

    /// Read an unsigned value `width` (1..=8) bytes wide.
    #[inline]
    pub fn read_uint(self, bytes: &[u8], width: usize) -> u64 {
        let bytes = &bytes[..width];
        match self {
            ByteOrder::LittleEndian => bytes.iter().rev().fold(0, |acc, &b| (acc << 8) | b as u64),
            ByteOrder::BigEndian => bytes.iter().fold(0, |acc, &b| (acc << 8) | b as u64),
        }
    }

    /// Write the low `width` (1..=8) bytes of `value` into `out`.
    #[inline]
    pub fn write_uint(self, out: &mut [u8], value: u64, width: usize) {
        let le = value.to_le_bytes();
        let out = &mut out[..width];
        match self {
            ByteOrder::LittleEndian => out.copy_from_slice(&le[..width]),
            ByteOrder::BigEndian => {
                for (dst, &b) in out.iter_mut().rev().zip(&le[..width]) {
                    *dst = b;
                }
            }
        }
    }

    #[inline]
    pub const fn is_little_endian(self) -> bool {
        matches!(self, ByteOrder::LittleEndian)
    }

    /// Two-byte order marker written at the start of a file.
    pub const fn marker(self) -> [u8; 2] {
        match self {
            ByteOrder::LittleEndian => *b"II",
            ByteOrder::BigEndian => *b"MM",
        }
    }
}

// =============================================================================
// Header Sniffing
// =============================================================================

/// Inspect the first 4 bytes of a stream.
///
/// Returns the byte order when the prefix is two identical order markers
/// (`II` or `MM`) followed by magic 42 or 43, and `None` otherwise. A `None`
/// is not an error: callers use this to sniff formats.
pub fn check_header(prefix: &[u8]) -> Option<ByteOrder> {
    if prefix.len() < 4 {
        return None;
    }
    let byte_order = match u16::from_le_bytes([prefix[0], prefix[1]]) {
        BYTE_ORDER_LITTLE_ENDIAN => ByteOrder::LittleEndian,
        BYTE_ORDER_BIG_ENDIAN => ByteOrder::BigEndian,
        _ => return None,
    };
    match byte_order.read_u16(&prefix[2..4]) {
        VERSION_TIFF | VERSION_BIGTIFF => Some(byte_order),
        _ => None,
    }
}

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed TIFF file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    /// Byte order for all multi-byte values in the file
    pub byte_order: ByteOrder,

    /// Whether this is a BigTIFF file (64-bit offsets)
    pub is_bigtiff: bool,

    /// Offset to the first IFD in the file (0 when the file holds none)
    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Parse a TIFF header from raw bytes.
    ///
    /// # Errors
    /// - `InvalidMagic` if byte order bytes are not II or MM
    /// - `InvalidVersion` if version is not 42 or 43
    /// - `InvalidBigTiffOffsetSize` if BigTIFF offset size is not 8
    /// - `FileTooSmall` if there aren't enough bytes for the header
    /// - `InvalidIfdOffset` if the first IFD offset is outside the file
    pub fn parse(bytes: &[u8], file_size: u64) -> Result<Self, TiffError> {
        if bytes.len() < TIFF_HEADER_SIZE {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        // Compared as fixed byte patterns, so read little-endian
        let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
        let byte_order = match magic {
            BYTE_ORDER_LITTLE_ENDIAN => ByteOrder::LittleEndian,
            BYTE_ORDER_BIG_ENDIAN => ByteOrder::BigEndian,
            _ => return Err(TiffError::InvalidMagic(magic)),
        };

        let version = byte_order.read_u16(&bytes[2..4]);
        let (is_bigtiff, first_ifd_offset) = match version {
            VERSION_TIFF => (false, byte_order.read_u32(&bytes[4..8]) as u64),
            VERSION_BIGTIFF => {
                if bytes.len() < BIGTIFF_HEADER_SIZE {
                    return Err(TiffError::FileTooSmall {
                        required: BIGTIFF_HEADER_SIZE as u64,
                        actual: bytes.len() as u64,
                    });
                }
                let offset_size = byte_order.read_u16(&bytes[4..6]);
                if offset_size != 8 {
                    return Err(TiffError::InvalidBigTiffOffsetSize(offset_size));
                }
                // Bytes 6-7 are reserved; not enforced
                (true, byte_order.read_u64(&bytes[8..16]))
            }
            _ => return Err(TiffError::InvalidVersion(version)),
        };

        if first_ifd_offset != 0 && first_ifd_offset >= file_size {
            return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
        }

        Ok(TiffHeader {
            byte_order,
            is_bigtiff,
            first_ifd_offset,
        })
    }

    /// Header size for this variant.
    #[inline]
    pub const fn header_size(&self) -> usize {
        if self.is_bigtiff {
            BIGTIFF_HEADER_SIZE
        } else {
            TIFF_HEADER_SIZE
        }
    }

    /// Byte position of the first-IFD pointer inside the header.
    #[inline]
    pub const fn first_ifd_pointer_position(&self) -> u64 {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }

    /// Size of an IFD entry in bytes: 12 classic, 20 BigTIFF.
    #[inline]
    pub const fn ifd_entry_size(&self) -> usize {
        if self.is_bigtiff {
            20
        } else {
            12
        }
    }

    /// Size of the entry count field: 2 classic, 8 BigTIFF.
    #[inline]
    pub const fn ifd_count_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            2
        }
    }

    /// Size of the next IFD offset field: 4 classic, 8 BigTIFF.
    #[inline]
    pub const fn ifd_next_offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }

    /// Size of the value/offset slot in an IFD entry, which is also the
    /// inline value threshold.
    #[inline]
    pub const fn value_offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }

    /// Total size of an IFD with `entry_count` entries (excluding extra data).
    pub fn ifd_size(&self, entry_count: u64) -> Option<u64> {
        (self.ifd_entry_size() as u64)
            .checked_mul(entry_count)?
            .checked_add((self.ifd_count_size() + self.ifd_next_offset_size()) as u64)
    }

    /// Upper bound on the number of non-empty IFDs a file of `file_size`
    /// bytes can contain. Bounds the chain walk.
    pub fn max_ifd_count(&self, file_size: u64) -> u64 {
        let smallest = self.ifd_size(1).unwrap_or(u64::MAX);
        (file_size / smallest).max(1)
    }

    /// Encode an offset into a pointer-sized field.
    pub fn offset_bytes(&self, offset: u64) -> Vec<u8> {
        if self.is_bigtiff {
            self.byte_order.u64_bytes(offset).to_vec()
        } else {
            self.byte_order.u32_bytes(offset as u32).to_vec()
        }
    }

    /// Encode the full header.
    pub fn encode(&self) -> Vec<u8> {
        let bo = self.byte_order;
        let mut out = Vec::with_capacity(self.header_size());
        out.extend(bo.marker());
        if self.is_bigtiff {
            out.extend(bo.u16_bytes(VERSION_BIGTIFF));
            out.extend(bo.u16_bytes(8));
            out.extend(bo.u16_bytes(0));
        } else {
            out.extend(bo.u16_bytes(VERSION_TIFF));
        }
        out.extend(self.offset_bytes(self.first_ifd_offset));
        out
    }
}

// =============================================================================
// IfdEntry / RawIfd
// =============================================================================

/// One undecoded IFD entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfdEntry {
    pub tag_id: u16,
    /// `None` when the type code is unknown
    pub field_type: Option<FieldType>,
    pub field_type_raw: u16,
    pub count: u64,
    /// The raw 4- or 8-byte value/offset slot
    pub value_offset_bytes: Vec<u8>,
    /// Whether the value is stored in the slot itself
    pub is_inline: bool,
    /// File position of this entry
    pub entry_offset: u64,
}

impl IfdEntry {
    /// Parse one entry from its raw bytes.
    pub fn parse(bytes: &[u8], header: &TiffHeader, entry_offset: u64) -> Self {
        let bo = header.byte_order;
        let tag_id = bo.read_u16(&bytes[0..2]);
        let field_type_raw = bo.read_u16(&bytes[2..4]);
        let field_type = FieldType::from_u16(field_type_raw);
        let (count, slot) = if header.is_bigtiff {
            (bo.read_u64(&bytes[4..12]), &bytes[12..20])
        } else {
            (bo.read_u32(&bytes[4..8]) as u64, &bytes[8..12])
        };
        let is_inline = field_type.is_some_and(|ft| ft.fits_inline(count, header.is_bigtiff));

        IfdEntry {
            tag_id,
            field_type,
            field_type_raw,
            count,
            value_offset_bytes: slot.to_vec(),
            is_inline,
            entry_offset,
        }
    }

    /// The slot read as an offset.
    #[inline]
    pub fn value_offset(&self, byte_order: ByteOrder) -> u64 {
        if self.value_offset_bytes.len() >= 8 {
            byte_order.read_u64(&self.value_offset_bytes)
        } else {
            byte_order.read_u32(&self.value_offset_bytes) as u64
        }
    }

    /// Byte length of the value, or `None` for unknown types or overflow.
    #[inline]
    pub fn value_byte_size(&self) -> Option<u64> {
        self.field_type.and_then(|ft| ft.byte_len(self.count))
    }

    /// File range occupied by an out-of-line value.
    pub fn out_of_line_range(&self, byte_order: ByteOrder) -> Option<(u64, u64)> {
        if self.is_inline {
            return None;
        }
        let start = self.value_offset(byte_order);
        let len = self.value_byte_size()?;
        Some((start, start.checked_add(len)?))
    }

    /// File position of the value/offset slot.
    #[inline]
    pub fn slot_position(&self, header: &TiffHeader) -> u64 {
        self.entry_offset + if header.is_bigtiff { 12 } else { 8 }
    }
}

/// An IFD whose entries have been located but not decoded.
#[derive(Debug, Clone)]
pub struct RawIfd {
    /// File offset of the IFD
    pub offset: u64,
    pub entries: Vec<IfdEntry>,
    /// Offset of the next IFD (0 terminates the chain)
    pub next_ifd_offset: u64,
}

impl RawIfd {
    pub fn entry(&self, tag: u16) -> Option<&IfdEntry> {
        self.entries.iter().find(|e| e.tag_id == tag)
    }
}

// =============================================================================
// TiffParser
// =============================================================================

/// Reads directories from a TIFF byte source.
pub struct TiffParser<S> {
    source: S,
    header: Option<TiffHeader>,
}

impl<S: ByteSource> TiffParser<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            header: None,
        }
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    /// Sniff the first 4 bytes. `Ok(None)` means "not a TIFF".
    pub fn check_header(&mut self) -> Result<Option<ByteOrder>, TiffError> {
        let len = self.source.size().min(4) as usize;
        let prefix = self.source.read_exact_at(0, len)?;
        Ok(check_header(&prefix))
    }

    /// Full header, parsed once and cached.
    pub fn header(&mut self) -> Result<TiffHeader, TiffError> {
        if let Some(header) = self.header {
            return Ok(header);
        }
        if self.check_header()?.is_none() {
            return Err(TiffError::NotTiff);
        }
        let size = self.source.size();
        let len = size.min(BIGTIFF_HEADER_SIZE as u64) as usize;
        let bytes = self.source.read_exact_at(0, len)?;
        let header = TiffHeader::parse(&bytes, size)?;
        debug!(
            source = self.source.identifier(),
            bigtiff = header.is_bigtiff,
            little_endian = header.byte_order.is_little_endian(),
            "Parsed TIFF header"
        );
        self.header = Some(header);
        Ok(header)
    }

    /// Locate the entries of the IFD at `offset` without decoding values.
    pub fn raw_ifd(&mut self, offset: u64) -> Result<RawIfd, TiffError> {
        let header = self.header()?;
        let size = self.source.size();
        let count_size = header.ifd_count_size();

        if offset.saturating_add(count_size as u64) > size {
            return Err(TiffError::InvalidIfdOffset(offset));
        }
        let count_bytes = self.source.read_exact_at(offset, count_size)?;
        let entry_count = if header.is_bigtiff {
            header.byte_order.read_u64(&count_bytes)
        } else {
            header.byte_order.read_u16(&count_bytes) as u64
        };

        let ifd_size = header
            .ifd_size(entry_count)
            .ok_or(TiffError::InvalidIfdOffset(offset))?;
        if offset.saturating_add(ifd_size) > size {
            return Err(TiffError::invalid_tag(
                "IFD",
                format!(
                    "{} entries at offset {} extend past end of file ({} bytes)",
                    entry_count, offset, size
                ),
            ));
        }

        let body_offset = offset + count_size as u64;
        let body = self
            .source
            .read_exact_at(body_offset, (ifd_size - count_size as u64) as usize)?;

        let entry_size = header.ifd_entry_size();
        let entries_len = entry_count as usize * entry_size;
        let entries = body[..entries_len]
            .chunks_exact(entry_size)
            .enumerate()
            .map(|(i, chunk)| {
                IfdEntry::parse(chunk, &header, body_offset + (i * entry_size) as u64)
            })
            .collect();

        let next_bytes = &body[entries_len..];
        let next_ifd_offset = if header.is_bigtiff {
            header.byte_order.read_u64(next_bytes)
        } else {
            header.byte_order.read_u32(next_bytes) as u64
        };

        Ok(RawIfd {
            offset,
            entries,
            next_ifd_offset,
        })
    }

    /// Decode every entry of a raw IFD into a Directory.
    ///
    /// Entries with unknown field types are skipped; any other decode
    /// failure fails the whole directory.
    pub fn decode_ifd(&mut self, raw: &RawIfd) -> Result<Directory, TiffError> {
        let header = self.header()?;
        let mut directory = Directory::for_header(&header);
        let mut reader = ValueReader::new(&mut self.source, &header);

        for entry in &raw.entries {
            if entry.field_type.is_none() {
                debug!(
                    tag = entry.tag_id,
                    field_type = entry.field_type_raw,
                    "Skipping entry with unknown field type"
                );
                continue;
            }
            let value = reader.read_value(entry)?;
            directory.put(entry.tag_id, value);
        }
        Ok(directory)
    }

    /// Parse the IFD at `offset`.
    pub fn get_ifd(&mut self, offset: u64) -> Result<Directory, TiffError> {
        let raw = self.raw_ifd(offset)?;
        self.decode_ifd(&raw)
    }

    /// Walk the IFD chain, returning every located (undecoded) directory.
    fn walk(&mut self) -> Result<Vec<RawIfd>, TiffError> {
        let header = self.header()?;
        let size = self.source.size();
        let limit = header.max_ifd_count(size);

        let mut offset = header.first_ifd_offset;
        let mut seen = HashSet::new();
        let mut raws = Vec::new();

        while offset != 0 {
            if raws.len() as u64 >= limit {
                warn!(limit, "IFD chain longer than the file can hold; stopping");
                break;
            }
            if offset >= size {
                warn!(offset, size, "Next IFD offset outside the file; stopping");
                break;
            }
            if !seen.insert(offset) {
                warn!(offset, "IFD chain revisits an offset; stopping");
                break;
            }
            let raw = match self.raw_ifd(offset) {
                Ok(raw) => raw,
                Err(e) if raws.is_empty() => return Err(e),
                Err(e) => {
                    warn!(offset, error = %e, "Unreadable IFD; stopping chain walk");
                    break;
                }
            };
            if raw.entries.is_empty() {
                break;
            }
            offset = raw.next_ifd_offset;
            raws.push(raw);
        }
        Ok(raws)
    }

    /// Offsets of every IFD in the chain.
    pub fn get_ifd_offsets(&mut self) -> Result<Vec<u64>, TiffError> {
        Ok(self.walk()?.into_iter().map(|raw| raw.offset).collect())
    }

    /// Every decodable IFD in the chain.
    ///
    /// A directory that fails to decode is logged and skipped; the walk
    /// continues with its next pointer.
    pub fn get_ifds(&mut self) -> Result<Vec<Directory>, TiffError> {
        let raws = self.walk()?;
        let mut directories = Vec::with_capacity(raws.len());
        for raw in &raws {
            match self.decode_ifd(raw) {
                Ok(dir) => directories.push(dir),
                Err(e) => warn!(offset = raw.offset, error = %e, "Skipping malformed IFD"),
            }
        }
        debug!(count = directories.len(), "Parsed IFD chain");
        Ok(directories)
    }

    /// The first IFD.
    pub fn get_first_ifd(&mut self) -> Result<Directory, TiffError> {
        let header = self.header()?;
        if header.first_ifd_offset == 0 {
            return Err(TiffError::InvalidIfdOffset(0));
        }
        self.get_ifd(header.first_ifd_offset)
    }

    /// A single tag from the first IFD, decoding nothing else.
    ///
    /// Fails with `NotTiff` for non-TIFF input and `TagNotFound` when the
    /// directory lacks the tag.
    pub fn get_first_ifd_entry(&mut self, tag: u16) -> Result<TagValue, TiffError> {
        let header = self.header()?;
        if header.first_ifd_offset == 0 {
            return Err(TiffError::TagNotFound(tag_name(tag)));
        }
        let raw = self.raw_ifd(header.first_ifd_offset)?;
        let entry = raw
            .entry(tag)
            .ok_or_else(|| TiffError::TagNotFound(tag_name(tag)))?;
        ValueReader::new(&mut self.source, &header).read_value(entry)
    }
}

// =============================================================================
// Tests
// =============================================================================
