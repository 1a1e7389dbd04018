//! Directory serialization and the IFD chain writer.
//!
//! [`encode_ifd`] lays out one IFD: the entry count, entries in ascending tag
//! order, the next-IFD pointer, then an extra-data area holding every value
//! too large for its entry slot. [`TiffWriter`] appends image data and
//! directories to a sink and links each new directory into the chain.

use tracing::debug;

use crate::error::TiffError;
use crate::io::ByteSink;

use super::directory::Directory;
use super::parser::{ByteOrder, TiffHeader};
use super::tags::tag_name;

/// Round `offset` up to the next word (2-byte) boundary.
#[inline]
pub const fn word_align(offset: u64) -> u64 {
    offset + (offset & 1)
}

/// Serialize `dir` as an IFD that will live at `ifd_offset`.
///
/// Synthetic tags are skipped. Values that fit the 4-byte (8-byte for
/// BigTIFF) slot are stored inline and zero-padded; the rest are placed
/// right after the IFD, each starting on a word boundary. Returns the IFD
/// bytes followed by the extra-data area.
pub fn encode_ifd(
    dir: &Directory,
    header: &TiffHeader,
    ifd_offset: u64,
    next_offset: u64,
) -> Result<Vec<u8>, TiffError> {
    let bo = header.byte_order;
    let entries: Vec<_> = dir.persisted().collect();
    let ifd_len = header
        .ifd_size(entries.len() as u64)
        .ok_or(TiffError::TooLarge { what: "IFD size" })?;
    let slot = header.value_offset_size();

    if !header.is_bigtiff {
        if entries.len() > u16::MAX as usize {
            return Err(TiffError::TooLarge {
                what: "IFD entry count",
            });
        }
        if ifd_offset > u32::MAX as u64 || next_offset > u32::MAX as u64 {
            return Err(TiffError::TooLarge {
                what: "classic TIFF offset",
            });
        }
    }

    let mut out = Vec::with_capacity(ifd_len as usize);
    let mut extra = Vec::new();
    let extra_start = ifd_offset + ifd_len;

    write_count(&mut out, entries.len() as u64, header);
    for (tag, value) in entries {
        let field_type = value.field_type();
        let count = value.count();
        if !header.is_bigtiff {
            if field_type.is_bigtiff_only() {
                return Err(TiffError::invalid_tag(
                    tag_name(tag),
                    format!("{:?} values need BigTIFF", field_type),
                ));
            }
            if count > u32::MAX as u64 {
                return Err(TiffError::TooLarge {
                    what: "classic TIFF value count",
                });
            }
        }

        let bytes = value.encode(bo);
        out.extend(bo.u16_bytes(tag));
        out.extend(bo.u16_bytes(field_type as u16));
        if header.is_bigtiff {
            out.extend(bo.u64_bytes(count));
        } else {
            out.extend(bo.u32_bytes(count as u32));
        }

        if bytes.len() <= slot {
            out.extend_from_slice(&bytes);
            out.resize(out.len() + slot - bytes.len(), 0);
        } else {
            let value_offset = extra_start + extra.len() as u64;
            if !header.is_bigtiff && value_offset + bytes.len() as u64 > u32::MAX as u64 {
                return Err(TiffError::TooLarge {
                    what: "classic TIFF offset",
                });
            }
            out.extend(header.offset_bytes(value_offset));
            extra.extend_from_slice(&bytes);
            if extra.len() % 2 == 1 {
                extra.push(0);
            }
        }
    }
    out.extend(header.offset_bytes(next_offset));
    out.extend_from_slice(&extra);
    Ok(out)
}

fn write_count(out: &mut Vec<u8>, count: u64, header: &TiffHeader) {
    if header.is_bigtiff {
        out.extend(header.byte_order.u64_bytes(count));
    } else {
        out.extend(header.byte_order.u16_bytes(count as u16));
    }
}

// =============================================================================
// TiffWriter
// =============================================================================

/// Writes a new TIFF file: header, image data, then chained directories.
///
/// ```no_run
/// # use micro_tiff::format::tiff::{ByteOrder, Directory, TiffWriter};
/// # use micro_tiff::io::FileSource;
/// # fn main() -> Result<(), micro_tiff::TiffError> {
/// let sink = FileSource::create("out.tif")?;
/// let mut writer = TiffWriter::create(sink, ByteOrder::LittleEndian, false)?;
/// let offset = writer.append_data(&[0u8; 16])?;
/// # let _ = offset;
/// writer.write_directory(&Directory::new())?;
/// writer.finish()?;
/// # Ok(())
/// # }
/// ```
pub struct TiffWriter<S: ByteSink> {
    sink: S,
    header: TiffHeader,
    /// Where the offset of the next directory is stored
    link_position: u64,
    end: u64,
}

impl<S: ByteSink> TiffWriter<S> {
    /// Truncate `sink` and write a header with an empty directory chain.
    pub fn create(mut sink: S, byte_order: ByteOrder, is_bigtiff: bool) -> Result<Self, TiffError> {
        let header = TiffHeader {
            byte_order,
            is_bigtiff,
            first_ifd_offset: 0,
        };
        let bytes = header.encode();
        sink.set_len(0)?;
        sink.write_all_at(0, &bytes)?;
        debug!(
            sink = sink.identifier(),
            bigtiff = is_bigtiff,
            little_endian = byte_order.is_little_endian(),
            "Created TIFF"
        );
        Ok(Self {
            sink,
            link_position: header.first_ifd_pointer_position(),
            end: bytes.len() as u64,
            header,
        })
    }

    pub fn header(&self) -> &TiffHeader {
        &self.header
    }

    /// Current end of the written data.
    pub fn position(&self) -> u64 {
        self.end
    }

    fn check_offset(&self, end: u64) -> Result<(), TiffError> {
        if !self.header.is_bigtiff && end > u32::MAX as u64 {
            return Err(TiffError::TooLarge {
                what: "classic TIFF file size",
            });
        }
        Ok(())
    }

    /// Append raw bytes on a word boundary, returning their offset.
    pub fn append_data(&mut self, data: &[u8]) -> Result<u64, TiffError> {
        let offset = word_align(self.end);
        let end = offset + data.len() as u64;
        self.check_offset(end)?;
        if offset > self.end {
            self.sink.write_all_at(self.end, &[0])?;
        }
        self.sink.write_all_at(offset, data)?;
        self.end = end;
        Ok(offset)
    }

    /// Append `dir` and link it after the last directory written.
    ///
    /// Returns the directory's offset.
    pub fn write_directory(&mut self, dir: &Directory) -> Result<u64, TiffError> {
        let offset = word_align(self.end);
        let bytes = encode_ifd(dir, &self.header, offset, 0)?;
        self.check_offset(offset + bytes.len() as u64)?;

        if offset > self.end {
            self.sink.write_all_at(self.end, &[0])?;
        }
        self.sink.write_all_at(offset, &bytes)?;
        self.sink
            .write_all_at(self.link_position, &self.header.offset_bytes(offset))?;
        if self.link_position == self.header.first_ifd_pointer_position() {
            self.header.first_ifd_offset = offset;
        }

        let entries = dir.persisted().count() as u64;
        let ifd_len = self
            .header
            .ifd_size(entries)
            .ok_or(TiffError::TooLarge { what: "IFD size" })?;
        self.link_position = offset + ifd_len - self.header.ifd_next_offset_size() as u64;
        self.end = offset + bytes.len() as u64;

        debug!(offset, entries, "Wrote IFD");
        Ok(offset)
    }

    /// Flush and hand back the sink.
    pub fn finish(mut self) -> Result<S, TiffError> {
        self.sink.flush()?;
        Ok(self.sink)
    }
}
