//! Inverse of [`unpack_samples`](super::unpack::unpack_samples) for the
//! write path.

use super::bits::BitWriter;
use super::unpack::PackedShape;

/// Pack samples `ceil(bits / 8)` bytes wide into TIFF rows.
///
/// Byte-multiple depths are copied as is. Other depths are bit-packed MSB
/// first, each row padded to a byte boundary; bits above `bits` in each
/// sample are dropped.
pub fn pack_samples(samples: &[u8], shape: &PackedShape) -> Vec<u8> {
    if shape.bits % 8 == 0 {
        let len = shape.unpacked_len();
        let mut out = samples[..samples.len().min(len)].to_vec();
        out.resize(len, 0);
        return out;
    }

    let sample_bytes = shape.sample_bytes();
    let mask = (1u64 << shape.bits) - 1;
    let mut writer = BitWriter::with_capacity(shape.packed_row_bytes() * shape.rows);
    let mut values = samples.chunks_exact(sample_bytes);
    for _ in 0..shape.rows {
        for _ in 0..shape.samples_per_row {
            let value = values
                .next()
                .map_or(0, |s| shape.byte_order.read_uint(s, sample_bytes));
            writer.write(value & mask, shape.bits as u32);
        }
        writer.align_to_byte();
    }
    writer.into_inner()
}
