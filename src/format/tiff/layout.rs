//! Strip and tile layout.
//!
//! A [`StripLayout`] locates the compressed chunks of one image: strips or
//! tiles, repeated once per plane for planar data. Strips are modelled as
//! tiles as wide as the image, so region lookup is the same for both.
//!
//! When StripByteCounts or RowsPerStrip are missing or contradictory, the
//! layout is reconstructed by a fixed chain of heuristics for known encoder
//! bugs. Each step logs a warning and marks the layout as not
//! authoritative; inputs outside those shapes fail with
//! [`TiffError::InsufficientMetadata`].

use tracing::{debug, warn};

use crate::error::{IoError, TiffError};

use super::directory::Directory;
use super::geometry::SampleGeometry;
use super::tags::Tag;

// =============================================================================
// Region
// =============================================================================

/// A rectangle of pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The whole `width` x `height` image.
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    #[inline]
    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    #[inline]
    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Overlap of two regions, if any.
    pub fn intersect(&self, other: &Region) -> Option<Region> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= x as u64 || bottom <= y as u64 {
            return None;
        }
        Some(Region::new(x, y, (right - x as u64) as u32, (bottom - y as u64) as u32))
    }

    /// Fail unless the region lies inside a `width` x `height` image.
    pub fn check_within(&self, width: u32, height: u32) -> Result<(), TiffError> {
        if self.right() > width as u64 || self.bottom() > height as u64 {
            return Err(TiffError::RegionOutOfBounds {
                x: self.x,
                y: self.y,
                width: self.width,
                height: self.height,
                image_width: width,
                image_height: height,
            });
        }
        Ok(())
    }
}

// =============================================================================
// ChunkGrid
// =============================================================================

/// Arrangement of chunks over the image, repeated per plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkGrid {
    pub image_width: u32,
    pub image_height: u32,
    /// Stored chunk width (tile width, or the image width for strips)
    pub chunk_width: u32,
    /// Stored chunk height (tile height, or rows per strip)
    pub chunk_height: u32,
    pub chunks_across: u32,
    pub chunks_down: u32,
    pub planes: u32,
    pub tiled: bool,
}

/// Position of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    pub index: usize,
    pub plane: usize,
    /// Index within the plane; 0 is the first chunk of the plane
    pub index_in_plane: usize,
    /// Image pixels covered by the chunk, clipped to the image
    pub region: Region,
    /// Width of the decoded chunk data
    pub stored_width: u32,
    /// Height of the decoded chunk data
    pub stored_height: u32,
}

impl ChunkGrid {
    pub fn tiles(
        image_width: u32,
        image_height: u32,
        tile_width: u32,
        tile_height: u32,
        planes: u32,
    ) -> Result<Self, TiffError> {
        if tile_width == 0 || tile_height == 0 {
            return Err(TiffError::invalid_tag(
                "TileWidth/TileLength",
                format!("tile size {}x{}", tile_width, tile_height),
            ));
        }
        let grid = Self {
            image_width,
            image_height,
            chunk_width: tile_width,
            chunk_height: tile_height,
            chunks_across: image_width.div_ceil(tile_width),
            chunks_down: image_height.div_ceil(tile_height),
            planes,
            tiled: true,
        };
        grid.checked_count()?;
        Ok(grid)
    }

    pub fn strips(
        image_width: u32,
        image_height: u32,
        rows_per_strip: u32,
        planes: u32,
    ) -> Result<Self, TiffError> {
        let rows = rows_per_strip.clamp(1, image_height.max(1));
        let grid = Self {
            image_width,
            image_height,
            chunk_width: image_width,
            chunk_height: rows,
            chunks_across: 1,
            chunks_down: image_height.div_ceil(rows),
            planes,
            tiled: false,
        };
        grid.checked_count()?;
        Ok(grid)
    }

    fn checked_count(&self) -> Result<usize, TiffError> {
        (self.chunks_across as usize)
            .checked_mul(self.chunks_down as usize)
            .and_then(|n| n.checked_mul(self.planes as usize))
            .ok_or(TiffError::TooLarge {
                what: "chunk count",
            })
    }

    #[inline]
    pub fn chunks_per_plane(&self) -> usize {
        self.chunks_across as usize * self.chunks_down as usize
    }

    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunks_per_plane() * self.planes as usize
    }

    /// Describe chunk `index`. The plane is `index / chunks_per_plane`.
    pub fn chunk(&self, index: usize) -> ChunkInfo {
        let per_plane = self.chunks_per_plane().max(1);
        let plane = index / per_plane;
        let index_in_plane = index % per_plane;
        let col = (index_in_plane % self.chunks_across.max(1) as usize) as u32;
        let row = (index_in_plane / self.chunks_across.max(1) as usize) as u32;

        let x = col * self.chunk_width;
        let y = row * self.chunk_height;
        let width = self.chunk_width.min(self.image_width - x);
        let height = self.chunk_height.min(self.image_height - y);

        ChunkInfo {
            index,
            plane,
            index_in_plane,
            region: Region::new(x, y, width, height),
            // Tiles are always stored whole; the last strip may be short
            stored_width: self.chunk_width,
            stored_height: if self.tiled { self.chunk_height } else { height },
        }
    }

    /// Chunks of `plane` overlapping `region`, in storage order.
    pub fn chunks_in(&self, region: &Region, plane: usize) -> Vec<ChunkInfo> {
        if region.is_empty() {
            return Vec::new();
        }
        let first_col = region.x / self.chunk_width;
        let last_col = ((region.right() - 1) / self.chunk_width as u64) as u32;
        let first_row = region.y / self.chunk_height;
        let last_row = ((region.bottom() - 1) / self.chunk_height as u64) as u32;

        let base = plane * self.chunks_per_plane();
        let mut chunks = Vec::new();
        for row in first_row..=last_row.min(self.chunks_down.saturating_sub(1)) {
            for col in first_col..=last_col.min(self.chunks_across.saturating_sub(1)) {
                let index = base + (row * self.chunks_across + col) as usize;
                chunks.push(self.chunk(index));
            }
        }
        chunks
    }
}

// =============================================================================
// StripLayout
// =============================================================================

/// File locations of every compressed chunk of one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripLayout {
    pub offsets: Vec<u64>,
    pub byte_counts: Vec<u64>,
    pub grid: ChunkGrid,
    /// False when any heuristic was applied
    pub authoritative: bool,
}

impl StripLayout {
    /// Derive the layout of `dir` for a file of `file_size` bytes.
    pub fn from_directory(
        dir: &Directory,
        geometry: &SampleGeometry,
        file_size: u64,
    ) -> Result<Self, TiffError> {
        let (width, height) = (geometry.width, geometry.height);
        if width == 0 || height == 0 {
            return Err(TiffError::InsufficientMetadata(format!(
                "image dimensions are {}x{}",
                width, height
            )));
        }

        let tiled = dir.is_tiled();
        let mut offsets = dir
            .chunk_offsets()?
            .filter(|o| !o.is_empty())
            .ok_or_else(|| {
                TiffError::InsufficientMetadata("no strip or tile offsets".to_string())
            })?;
        let mut byte_counts = dir.chunk_byte_counts()?;
        let mut authoritative = true;

        if offsets.len() > 1 && offsets[offsets.len() - 1] == offsets[offsets.len() - 2] {
            warn!(
                offset = offsets[offsets.len() - 1],
                "Dropping duplicate final chunk offset"
            );
            offsets.pop();
            if let Some(counts) = byte_counts.as_mut() {
                counts.truncate(offsets.len());
            }
            authoritative = false;
        }

        let planes = geometry.planes() as u32;
        let grid = if tiled {
            let tile_width = dir.tile_width()?.ok_or(TiffError::MissingTag("TileWidth"))?;
            let tile_height = dir.tile_length()?.ok_or(TiffError::MissingTag("TileLength"))?;
            let grid = ChunkGrid::tiles(width, height, tile_width, tile_height, planes)?;
            let full = full_chunk_bytes(geometry, &grid)?;
            let counts = match byte_counts {
                Some(counts) if counts.len() >= offsets.len() => counts,
                _ => {
                    authoritative = false;
                    rebuild_byte_counts(&offsets, Some(full), full, file_size)
                }
            };
            byte_counts = Some(counts);
            grid
        } else {
            let declared = dir.rows_per_strip()?;
            let rows = match &declared {
                Some(rows) => Some(uniform_rows_per_strip(rows, height)?),
                None => None,
            };
            let strips_per_plane = (offsets.len() / planes as usize).max(1);
            let full = match rows {
                Some(rps) => Some(geometry.packed_row_bytes(width)? as u64 * rps as u64),
                None if strips_per_plane == 1 => Some(geometry.image_bytes()?),
                None => None,
            };

            let mut counts = match byte_counts {
                Some(counts) if counts.len() >= offsets.len() => counts,
                _ => {
                    authoritative = false;
                    rebuild_byte_counts(&offsets, full, geometry.image_bytes()?, file_size)
                }
            };

            let rows = match rows {
                Some(rows) => rows,
                None => {
                    authoritative = false;
                    infer_rows_per_strip(geometry, strips_per_plane, &offsets, &mut counts, file_size)?
                }
            };
            byte_counts = Some(counts);
            ChunkGrid::strips(width, height, rows, planes)?
        };

        let mut byte_counts = byte_counts.unwrap_or_default();
        let expected = grid.chunk_count();
        if offsets.len() < expected {
            return Err(TiffError::InsufficientMetadata(format!(
                "{} chunk offsets for {} chunks",
                offsets.len(),
                expected
            )));
        }
        if offsets.len() > expected {
            debug!(
                declared = offsets.len(),
                expected, "Ignoring chunk offsets beyond the grid"
            );
            offsets.truncate(expected);
        }
        byte_counts.truncate(expected);

        Ok(Self {
            offsets,
            byte_counts,
            grid,
            authoritative,
        })
    }

    /// File range of chunk `index`, checked against the file size.
    ///
    /// `None` marks a sparse chunk (zero bytes), which decodes as zeros.
    pub fn chunk_range(&self, index: usize, file_size: u64) -> Result<Option<(u64, usize)>, TiffError> {
        let offset = self.offsets[index];
        let count = self.byte_counts[index];
        if count == 0 {
            return Ok(None);
        }
        let len = usize::try_from(count).map_err(|_| TiffError::TooLarge {
            what: "chunk byte count",
        })?;
        if offset.checked_add(count).map_or(true, |end| end > file_size) {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: count,
                size: file_size,
            }
            .into());
        }
        Ok(Some((offset, len)))
    }
}

/// Uncompressed size of one full tile or strip.
fn full_chunk_bytes(geometry: &SampleGeometry, grid: &ChunkGrid) -> Result<u64, TiffError> {
    geometry
        .packed_chunk_bytes(grid.chunk_width, grid.chunk_height)
        .map(|n| n as u64)
}

/// All declared RowsPerStrip entries, clamped to the image height, must agree.
fn uniform_rows_per_strip(rows: &[u64], height: u32) -> Result<u32, TiffError> {
    let clamped: Vec<u32> = rows.iter().map(|&r| r.min(height as u64) as u32).collect();
    let first = clamped.first().copied().unwrap_or(height);
    if clamped.iter().any(|&r| r != first) {
        return Err(TiffError::Unsupported(format!(
            "non-uniform RowsPerStrip {:?}",
            rows
        )));
    }
    if first == 0 {
        return Err(TiffError::invalid_tag(Tag::RowsPerStrip.name(), "zero rows per strip"));
    }
    Ok(first)
}

/// Rebuild byte counts from the gaps between consecutive offsets.
///
/// The last chunk gets `full_chunk` (or the previous gap) capped at the end
/// of the file; a lone chunk gets `single`.
fn rebuild_byte_counts(
    offsets: &[u64],
    full_chunk: Option<u64>,
    single: u64,
    file_size: u64,
) -> Vec<u64> {
    warn!(
        chunks = offsets.len(),
        "Byte counts missing; reconstructing from offsets"
    );
    if offsets.len() == 1 {
        return vec![single];
    }
    let mut counts: Vec<u64> = offsets
        .windows(2)
        .map(|w| w[1].saturating_sub(w[0]))
        .collect();
    let last = offsets[offsets.len() - 1];
    let estimate = full_chunk.unwrap_or(counts[counts.len() - 1]);
    counts.push(estimate.min(file_size.saturating_sub(last)));
    counts
}

/// Repair a whole-plane strip whose byte count runs past the end of the file.
fn repair_single_strip_count(offset: u64, count: &mut u64, file_size: u64) {
    let available = file_size.saturating_sub(offset);
    if *count <= available {
        return;
    }
    let swapped = (*count as u32).swap_bytes() as u64;
    if *count <= u32::MAX as u64 && swapped > 0 && swapped <= available {
        warn!(
            declared = *count,
            swapped, "Strip byte count runs past end of file; using byte-swapped value"
        );
        *count = swapped;
    } else {
        warn!(
            declared = *count,
            available, "Strip byte count runs past end of file; clamping"
        );
        *count = available;
    }
}

/// RowsPerStrip recovery when the tag is absent.
///
/// `strips` counts the strips of one plane; planar images repeat that many
/// offsets per sample.
fn infer_rows_per_strip(
    geometry: &SampleGeometry,
    strips: usize,
    offsets: &[u64],
    counts: &mut [u64],
    file_size: u64,
) -> Result<u32, TiffError> {
    let height = geometry.height;

    if strips == 1 {
        warn!(rows = height, "RowsPerStrip missing; single strip covers the image");
        for (&offset, count) in offsets.iter().zip(counts.iter_mut()) {
            repair_single_strip_count(offset, count, file_size);
        }
        return Ok(height);
    }
    let strips = strips as u64;

    let bits_per_row = (geometry.width as u64)
        .checked_mul(geometry.bits() as u64)
        .and_then(|n| n.checked_mul(geometry.chunky_samples() as u64))
        .filter(|&n| n > 0)
        .ok_or_else(|| {
            TiffError::InsufficientMetadata("cannot infer RowsPerStrip from row size".to_string())
        })?;

    let mut rows = counts[0].saturating_mul(8) / bits_per_row;
    if geometry.compression != super::tags::Compression::None {
        rows = rows.max(1);
        while (height as u64).div_ceil(rows) > strips {
            rows *= 2;
        }
    }
    let mut rows = rows.clamp(1, height as u64);

    if (height as u64).div_ceil(rows) != strips {
        let fallback = (height as u64).div_ceil(strips).max(1);
        warn!(
            estimate = rows,
            fallback, "RowsPerStrip estimate disagrees with strip count"
        );
        rows = fallback;
    }
    if (height as u64).div_ceil(rows) != strips {
        return Err(TiffError::InsufficientMetadata(format!(
            "{} strips cannot cover {} rows evenly",
            strips, height
        )));
    }

    warn!(rows, strips, "RowsPerStrip missing; inferred from strip byte counts");
    Ok(rows as u32)
}
