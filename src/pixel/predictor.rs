//! Horizontal differencing (Predictor 2).
//!
//! Each sample is replaced by its difference from the sample `stride`
//! positions earlier in the same row; the first pixel of every row is
//! left as is. Arithmetic wraps at the sample width, so the transform is
//! exactly reversible: `write_uint` keeps only the low
//! `sample_bytes` bytes of each result.

use crate::error::TiffError;
use crate::format::tiff::{ByteOrder, Predictor};

/// Parameters shared by [`difference`] and [`undifference`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictorParams {
    /// Bytes in one row of the buffer
    pub row_bytes: usize,
    /// Interleaved samples per pixel (1 for planar data)
    pub stride: usize,
    /// Bytes per sample: 1, 2, 4 or 8
    pub sample_bytes: usize,
    pub byte_order: ByteOrder,
}

impl PredictorParams {
    /// Check that `predictor` can be applied to samples of `bits` bits.
    pub fn check(predictor: Predictor, bits: u16) -> Result<(), TiffError> {
        match predictor {
            Predictor::None => Ok(()),
            Predictor::Horizontal if matches!(bits, 8 | 16 | 32 | 64) => Ok(()),
            Predictor::Horizontal => Err(TiffError::Unsupported(format!(
                "horizontal predictor with {}-bit samples",
                bits
            ))),
        }
    }
}

/// Undo horizontal differencing in place.
pub fn undifference(data: &mut [u8], params: &PredictorParams) {
    for_each_row(data, params, |row, p| {
        let step = p.stride * p.sample_bytes;
        let mut pos = step;
        while pos + p.sample_bytes <= row.len() {
            let prev = p.byte_order.read_uint(&row[pos - step..], p.sample_bytes);
            let cur = p.byte_order.read_uint(&row[pos..], p.sample_bytes);
            p.byte_order
                .write_uint(&mut row[pos..], cur.wrapping_add(prev), p.sample_bytes);
            pos += p.sample_bytes;
        }
    });
}

/// Apply horizontal differencing in place.
pub fn difference(data: &mut [u8], params: &PredictorParams) {
    for_each_row(data, params, |row, p| {
        let step = p.stride * p.sample_bytes;
        if row.len() < step + p.sample_bytes {
            return;
        }
        // Walk backwards so each sample still sees its original predecessor
        let mut pos = (row.len() / p.sample_bytes - 1) * p.sample_bytes;
        while pos >= step {
            let prev = p.byte_order.read_uint(&row[pos - step..], p.sample_bytes);
            let cur = p.byte_order.read_uint(&row[pos..], p.sample_bytes);
            p.byte_order
                .write_uint(&mut row[pos..], cur.wrapping_sub(prev), p.sample_bytes);
            pos -= p.sample_bytes;
        }
    });
}

fn for_each_row(
    data: &mut [u8],
    params: &PredictorParams,
    mut f: impl FnMut(&mut [u8], &PredictorParams),
) {
    if params.row_bytes == 0 || params.stride == 0 || params.sample_bytes == 0 {
        return;
    }
    for row in data.chunks_mut(params.row_bytes) {
        f(row, params);
    }
}
