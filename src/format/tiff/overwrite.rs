//! Surgical overwrite of one tag in an existing file.
//!
//! Only the entry's 12 (or 20) bytes and, when needed, its out-of-line data
//! are touched. Every read, check and encode happens before the first write,
//! so an error leaves the file as it was.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::TiffError;
use crate::io::ByteSink;

use super::parser::{IfdEntry, TiffHeader, TiffParser};
use super::tags::{tag_name, Tag};
use super::values::TagValue;
use super::writer::word_align;

/// Where the new value was put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OverwriteStrategy {
    /// Stored in the entry's value slot
    Inline,
    /// Written over the old out-of-line data
    InPlace,
    /// Old data ended the file: truncated there and rewritten
    TruncateAndAppend,
    /// Written at the end of the file and the entry repointed
    Append,
}

impl fmt::Display for OverwriteStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OverwriteStrategy::Inline => "inline",
            OverwriteStrategy::InPlace => "in-place",
            OverwriteStrategy::TruncateAndAppend => "truncate-and-append",
            OverwriteStrategy::Append => "append",
        };
        f.write_str(name)
    }
}

/// Replace the value of `tag` in directory `ifd_index` (0-based, in chain
/// order).
///
/// The entry must already exist and synthetic tags are refused. The
/// strategy is the first that applies:
///
/// 1. [`Inline`](OverwriteStrategy::Inline) if the value fits the slot
/// 2. [`InPlace`](OverwriteStrategy::InPlace) if it fits the old data and
///    no other entry or directory overlaps that data
/// 3. [`TruncateAndAppend`](OverwriteStrategy::TruncateAndAppend) if the
///    unshared old data ends the file
/// 4. [`Append`](OverwriteStrategy::Append) otherwise
pub fn overwrite_ifd_value<S: ByteSink>(
    sink: &mut S,
    ifd_index: usize,
    tag: u16,
    value: &TagValue,
) -> Result<OverwriteStrategy, TiffError> {
    if Tag::from_u16(tag).is_some_and(Tag::is_synthetic) {
        return Err(TiffError::invalid_tag(
            tag_name(tag),
            "synthetic tags are not stored in the file",
        ));
    }

    let file_size = sink.size();
    let (header, entry, others) = {
        let mut parser = TiffParser::new(&mut *sink);
        let header = parser.header()?;
        let offsets = parser.get_ifd_offsets()?;
        let ifd_offset = *offsets
            .get(ifd_index)
            .ok_or(TiffError::IfdIndexOutOfRange {
                index: ifd_index,
                count: offsets.len(),
            })?;

        let raw = parser.raw_ifd(ifd_offset)?;
        let entry = raw
            .entry(tag)
            .cloned()
            .ok_or_else(|| TiffError::TagNotFound(tag_name(tag)))?;

        // Every region some other structure claims
        let mut others = Vec::new();
        for &offset in &offsets {
            let ifd = if offset == ifd_offset {
                raw.clone()
            } else {
                parser.raw_ifd(offset)?
            };
            if let Some(size) = header.ifd_size(ifd.entries.len() as u64) {
                others.push((offset, offset.saturating_add(size)));
            }
            others.extend(
                ifd.entries
                    .iter()
                    .filter(|e| e.entry_offset != entry.entry_offset)
                    .filter_map(|e| e.out_of_line_range(header.byte_order)),
            );
        }
        (header, entry, others)
    };

    let bytes = encode_checked(&header, tag, value)?;
    let slot = header.value_offset_size();
    let old = entry.out_of_line_range(header.byte_order);
    let shared = old.is_some_and(|(start, end)| {
        others
            .iter()
            .any(|&(s, e)| s < end && start < e)
    });

    let (strategy, data_offset) = match old {
        _ if bytes.len() <= slot => (OverwriteStrategy::Inline, None),
        Some((start, end)) if !shared && bytes.len() as u64 <= end - start => {
            (OverwriteStrategy::InPlace, Some(start))
        }
        Some((start, end)) if !shared && end == file_size => {
            (OverwriteStrategy::TruncateAndAppend, Some(start))
        }
        _ => (OverwriteStrategy::Append, Some(word_align(file_size))),
    };

    if let Some(offset) = data_offset {
        let end = offset + bytes.len() as u64;
        if !header.is_bigtiff && end > u32::MAX as u64 {
            return Err(TiffError::TooLarge {
                what: "classic TIFF file size",
            });
        }
    }
    let entry_bytes = encode_entry(&header, &entry, value, &bytes, data_offset);
    debug!(
        tag = %tag_name(tag),
        old = ?old,
        shared,
        new_len = bytes.len(),
        "Planned tag overwrite"
    );

    // Writes start here
    match (strategy, data_offset, old) {
        (OverwriteStrategy::InPlace, Some(offset), Some((start, end))) => {
            let mut padded = bytes.clone();
            padded.resize((end - start) as usize, 0);
            sink.write_all_at(offset, &padded)?;
        }
        (OverwriteStrategy::TruncateAndAppend, Some(offset), _) => {
            sink.set_len(offset)?;
            sink.write_all_at(offset, &bytes)?;
        }
        (OverwriteStrategy::Append, Some(offset), _) => {
            if offset > file_size {
                sink.write_all_at(file_size, &[0])?;
            }
            sink.write_all_at(offset, &bytes)?;
        }
        _ => {}
    }
    sink.write_all_at(entry.entry_offset, &entry_bytes)?;
    sink.flush()?;

    info!(
        tag = %tag_name(tag),
        ifd = ifd_index,
        strategy = %strategy,
        "Overwrote tag value"
    );
    Ok(strategy)
}

/// Encode `value`, refusing what the file variant cannot hold.
fn encode_checked(header: &TiffHeader, tag: u16, value: &TagValue) -> Result<Vec<u8>, TiffError> {
    if !header.is_bigtiff {
        if value.field_type().is_bigtiff_only() {
            return Err(TiffError::invalid_tag(
                tag_name(tag),
                format!("{:?} values need BigTIFF", value.field_type()),
            ));
        }
        if value.count() > u32::MAX as u64 {
            return Err(TiffError::TooLarge {
                what: "classic TIFF value count",
            });
        }
    }
    Ok(value.encode(header.byte_order))
}

/// The full entry: tag, type, count, then the inline value or an offset.
fn encode_entry(
    header: &TiffHeader,
    entry: &IfdEntry,
    value: &TagValue,
    bytes: &[u8],
    data_offset: Option<u64>,
) -> Vec<u8> {
    let bo = header.byte_order;
    let mut out = Vec::with_capacity(header.ifd_entry_size());
    out.extend(bo.u16_bytes(entry.tag_id));
    out.extend(bo.u16_bytes(value.field_type() as u16));
    if header.is_bigtiff {
        out.extend(bo.u64_bytes(value.count()));
    } else {
        out.extend(bo.u32_bytes(value.count() as u32));
    }
    match data_offset {
        Some(offset) => out.extend(header.offset_bytes(offset)),
        None => {
            out.extend_from_slice(bytes);
            out.resize(header.ifd_entry_size(), 0);
        }
    }
    out
}
