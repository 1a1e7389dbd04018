//! Decoded-sample expansion and the caller-facing output layout.

use crate::error::TiffError;
use crate::format::tiff::{ByteOrder, ColorModel, PlanarConfiguration, Photometric, SampleGeometry};

use super::bits::BitReader;

// =============================================================================
// OutputLayout
// =============================================================================

/// How decoded samples are arranged in a caller's buffer.
///
/// A buffer holds `planes` consecutive planes. Each plane is row-major with
/// `channels` interleaved samples per pixel, each sample `sample_bytes`
/// wide in `byte_order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLayout {
    pub sample_bytes: usize,
    pub channels: usize,
    pub planes: usize,
    pub byte_order: ByteOrder,
}

impl OutputLayout {
    pub fn for_geometry(geometry: &SampleGeometry) -> Self {
        let spp = geometry.samples_per_pixel as usize;
        let planar = geometry.planar == PlanarConfiguration::Planar;
        let (sample_bytes, channels, planes) = match &geometry.color {
            ColorModel::Jpeg if planar => (1, 1, spp),
            ColorModel::Jpeg => (1, if spp >= 3 { 3 } else { 1 }, 1),
            ColorModel::YCbCr(_) => (1, 3, 1),
            ColorModel::Cfa(_) => (geometry.sample_bytes(), 1, 3),
            ColorModel::Direct if planar => (geometry.sample_bytes(), 1, spp),
            ColorModel::Direct => (geometry.sample_bytes(), spp, 1),
        };
        Self {
            sample_bytes,
            channels,
            planes,
            byte_order: geometry.byte_order,
        }
    }

    #[inline]
    pub fn pixel_bytes(&self) -> usize {
        self.sample_bytes * self.channels
    }

    /// Bytes of one plane covering `width` x `height` pixels.
    pub fn plane_len(&self, width: u32, height: u32) -> Result<usize, TiffError> {
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(self.pixel_bytes()))
            .ok_or(TiffError::TooLarge {
                what: "output plane size",
            })
    }

    /// Bytes needed for a `width` x `height` region.
    pub fn buffer_len(&self, width: u32, height: u32) -> Result<usize, TiffError> {
        self.plane_len(width, height)?
            .checked_mul(self.planes)
            .ok_or(TiffError::TooLarge {
                what: "output buffer size",
            })
    }
}

// =============================================================================
// Unpacking
// =============================================================================

/// Shape of a packed block of samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedShape {
    pub bits: u16,
    /// Samples per row (pixels times interleaved channels)
    pub samples_per_row: usize,
    pub rows: usize,
    pub byte_order: ByteOrder,
}

impl PackedShape {
    #[inline]
    pub fn sample_bytes(&self) -> usize {
        (self.bits as usize).div_ceil(8)
    }

    /// Bytes of one packed row; sub-byte rows end on a byte boundary.
    #[inline]
    pub fn packed_row_bytes(&self) -> usize {
        (self.samples_per_row * self.bits as usize).div_ceil(8)
    }

    #[inline]
    pub fn unpacked_len(&self) -> usize {
        self.samples_per_row * self.rows * self.sample_bytes()
    }
}

/// Expand packed rows into samples `ceil(bits / 8)` bytes wide.
///
/// Byte-multiple depths are already in output form and are copied.
/// Other depths go through a bit cursor that realigns to a byte boundary at
/// the end of every row. Short input leaves trailing samples zero.
pub fn unpack_samples(data: &[u8], shape: &PackedShape) -> Vec<u8> {
    let len = shape.unpacked_len();
    if shape.bits % 8 == 0 {
        let mut out = data[..data.len().min(len)].to_vec();
        out.resize(len, 0);
        return out;
    }

    let sample_bytes = shape.sample_bytes();
    let mut out = vec![0u8; len];
    let mut reader = BitReader::new(data);
    let mut pos = 0;
    for _ in 0..shape.rows {
        for _ in 0..shape.samples_per_row {
            let value = reader.read(shape.bits as u32);
            shape
                .byte_order
                .write_uint(&mut out[pos..], value, sample_bytes);
            pos += sample_bytes;
        }
        reader.align_to_byte();
    }
    out
}

/// Apply the value inversions required by `photometric` in place.
///
/// WhiteIsZero maps `v` to `2^bits - 1 - v`. CMYK maps `v` to
/// `i32::MAX - v`, truncated to the sample width. Other interpretations
/// are left untouched.
pub fn apply_photometric(
    samples: &mut [u8],
    photometric: Photometric,
    bits: u16,
    byte_order: ByteOrder,
) {
    let sample_bytes = (bits as usize).div_ceil(8);
    let mask = if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    };
    let invert: fn(u64, u64) -> u64 = match photometric {
        Photometric::WhiteIsZero => |v, mask| mask - (v & mask),
        Photometric::Cmyk => |v, mask| (i32::MAX as u64).wrapping_sub(v) & mask,
        _ => return,
    };
    for sample in samples.chunks_exact_mut(sample_bytes) {
        let v = byte_order.read_uint(sample, sample_bytes);
        byte_order.write_uint(sample, invert(v, mask), sample_bytes);
    }
}
