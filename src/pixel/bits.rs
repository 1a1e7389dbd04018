//! Bit-level cursors for sample depths that are not a multiple of 8.
//!
//! TIFF packs sub-byte samples most-significant bit first, with each row
//! starting on a byte boundary.

/// Reads fixed-width values from a byte slice, MSB first.
pub struct BitReader<'a> {
    data: &'a [u8],
    /// Absolute bit position
    position: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Read `bits` (1..=64) bits. Bits past the end of the data read as zero.
    pub fn read(&mut self, bits: u32) -> u64 {
        let mut value = 0u64;
        let mut remaining = bits;
        while remaining > 0 {
            let byte_index = self.position / 8;
            let bit_offset = (self.position % 8) as u32;
            let available = 8 - bit_offset;
            let take = available.min(remaining);

            let byte = self.data.get(byte_index).copied().unwrap_or(0) as u64;
            let shifted = (byte >> (available - take)) & ((1 << take) - 1);
            value = (value << take) | shifted;

            remaining -= take;
            self.position += take as usize;
        }
        value
    }

    /// Skip to the start of the next byte, if not already there.
    pub fn align_to_byte(&mut self) {
        self.position = self.position.div_ceil(8) * 8;
    }
}

/// Writes fixed-width values into a growing buffer, MSB first.
#[derive(Default)]
pub struct BitWriter {
    data: Vec<u8>,
    /// Bits used in the last byte (0 means the last byte is full or absent)
    used: u32,
}

impl BitWriter {
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            data: Vec::with_capacity(bytes),
            used: 0,
        }
    }

    /// Append the low `bits` (1..=64) bits of `value`.
    pub fn write(&mut self, value: u64, bits: u32) {
        let mut remaining = bits;
        while remaining > 0 {
            if self.used == 0 {
                self.data.push(0);
            }
            let free = 8 - self.used;
            let take = free.min(remaining);
            let chunk = (value >> (remaining - take)) & ((1 << take) - 1);
            if let Some(last) = self.data.last_mut() {
                *last |= (chunk << (free - take)) as u8;
            }
            self.used = (self.used + take) % 8;
            remaining -= take;
        }
    }

    /// Pad the current byte with zero bits.
    pub fn align_to_byte(&mut self) {
        self.used = 0;
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

/// Reverse the bit order of every byte (FillOrder 2).
pub fn reverse_bits_in_place(data: &mut [u8]) {
    for byte in data {
        *byte = byte.reverse_bits();
    }
}
