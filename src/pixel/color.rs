//! Color-space conversions that change the channel layout: YCbCr to RGB,
//! and color filter array (Bayer) splitting.

use crate::error::TiffError;
use crate::format::tiff::{
    ByteOrder, Directory, DEFAULT_REFERENCE_BLACK_WHITE, DEFAULT_YCBCR_COEFFICIENTS,
    DEFAULT_YCBCR_SUBSAMPLING,
};

// =============================================================================
// YCbCr
// =============================================================================

/// Parameters for YCbCr to RGB conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YCbCrParams {
    /// Luma coefficients for red, green and blue
    pub coefficients: [f64; 3],
    /// Chroma subsampling: horizontal, vertical
    pub subsampling: [u16; 2],
    /// Black and white reference levels for Y, Cb and Cr
    pub reference: [f64; 6],
}

impl Default for YCbCrParams {
    fn default() -> Self {
        Self {
            coefficients: DEFAULT_YCBCR_COEFFICIENTS,
            subsampling: DEFAULT_YCBCR_SUBSAMPLING,
            reference: DEFAULT_REFERENCE_BLACK_WHITE,
        }
    }
}

impl YCbCrParams {
    pub fn from_directory(dir: &Directory) -> Result<Self, TiffError> {
        let coefficients = dir.ycbcr_coefficients()?;
        if coefficients[1] == 0.0 {
            return Err(TiffError::invalid_tag(
                "YCbCrCoefficients",
                "green coefficient is zero",
            ));
        }
        Ok(Self {
            coefficients,
            subsampling: dir.ycbcr_subsampling()?,
            reference: dir.reference_black_white()?,
        })
    }

    /// Bytes of subsampled data covering a `width` x `height` chunk.
    pub fn encoded_len(&self, width: usize, height: usize) -> usize {
        let (sub_x, sub_y) = (self.subsampling[0] as usize, self.subsampling[1] as usize);
        width.div_ceil(sub_x) * height.div_ceil(sub_y) * (sub_x * sub_y + 2)
    }

    fn to_rgb(&self, y: f64, cb: f64, cr: f64) -> [u8; 3] {
        let [lr, lg, lb] = self.coefficients;
        let r = &self.reference;
        let y = (y - r[0]) * 255.0 / (r[1] - r[0]);
        let cb = (cb - r[2]) * 127.0 / (r[3] - r[2]);
        let cr = (cr - r[4]) * 127.0 / (r[5] - r[4]);

        let red = cr * (2.0 - 2.0 * lr) + y;
        let blue = cb * (2.0 - 2.0 * lb) + y;
        let green = (y - lb * blue - lr * red) / lg;
        [clamp_u8(red), clamp_u8(green), clamp_u8(blue)]
    }
}

fn clamp_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Convert one chunk of subsampled 8-bit YCbCr to interleaved RGB.
///
/// Blocks run left to right, top to bottom. Each block holds
/// `sub_x * sub_y` luma samples in row order followed by one Cb and one
/// Cr sample. Missing trailing data decodes as zero.
pub fn ycbcr_to_rgb(data: &[u8], width: usize, height: usize, params: &YCbCrParams) -> Vec<u8> {
    let (sub_x, sub_y) = (
        params.subsampling[0] as usize,
        params.subsampling[1] as usize,
    );
    let block_len = sub_x * sub_y + 2;
    let blocks_across = width.div_ceil(sub_x);
    let blocks_down = height.div_ceil(sub_y);
    let sample = |i: usize| data.get(i).copied().unwrap_or(0) as f64;

    let mut out = vec![0u8; width * height * 3];
    for block_row in 0..blocks_down {
        for block_col in 0..blocks_across {
            let base = (block_row * blocks_across + block_col) * block_len;
            let cb = sample(base + sub_x * sub_y);
            let cr = sample(base + sub_x * sub_y + 1);
            for dy in 0..sub_y {
                let y = block_row * sub_y + dy;
                if y >= height {
                    break;
                }
                for dx in 0..sub_x {
                    let x = block_col * sub_x + dx;
                    if x >= width {
                        break;
                    }
                    let luma = sample(base + dy * sub_x + dx);
                    let pos = (y * width + x) * 3;
                    out[pos..pos + 3].copy_from_slice(&params.to_rgb(luma, cb, cr));
                }
            }
        }
    }
    out
}

// =============================================================================
// CFA
// =============================================================================

/// A repeating color filter array pattern.
///
/// Colors are indices 0 (red), 1 (green) and 2 (blue), row-major over a
/// `rows` x `cols` cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfaPattern {
    pub rows: usize,
    pub cols: usize,
    pub colors: Vec<u8>,
}

impl CfaPattern {
    /// 2x2 pattern used when the file declares none: RGGB for
    /// little-endian files, BGGR for big-endian ones.
    pub fn default_for(byte_order: ByteOrder) -> Self {
        let colors = match byte_order {
            ByteOrder::LittleEndian => vec![0, 1, 1, 2],
            ByteOrder::BigEndian => vec![2, 1, 1, 0],
        };
        Self {
            rows: 2,
            cols: 2,
            colors,
        }
    }

    pub fn from_directory(dir: &Directory) -> Result<Self, TiffError> {
        let Some(colors) = dir.cfa_pattern() else {
            return Ok(Self::default_for(dir.byte_order()));
        };
        let (rows, cols) = match dir.cfa_repeat_dim()? {
            Some([rows, cols]) => (rows as usize, cols as usize),
            None if colors.len() == 4 => (2, 2),
            None => {
                return Err(TiffError::MissingTag("CfaRepeatPatternDim"));
            }
        };
        if colors.len() != rows * cols {
            return Err(TiffError::invalid_tag(
                "CfaPattern",
                format!("{} colors for a {}x{} cell", colors.len(), rows, cols),
            ));
        }
        if let Some(&bad) = colors.iter().find(|&&c| c > 2) {
            return Err(TiffError::Unsupported(format!("CFA color index {}", bad)));
        }
        Ok(Self {
            rows,
            cols,
            colors: colors.to_vec(),
        })
    }

    #[inline]
    pub fn color_at(&self, x: usize, y: usize) -> usize {
        self.colors[(y % self.rows) * self.cols + x % self.cols] as usize
    }
}

/// Spread single-channel CFA samples into three color planes.
///
/// `origin` is the chunk's position in the image, so the pattern phase
/// stays tied to absolute pixel coordinates. Positions where a plane's
/// color was not sampled are zero.
pub fn cfa_split(
    samples: &[u8],
    width: usize,
    height: usize,
    sample_bytes: usize,
    origin: (usize, usize),
    pattern: &CfaPattern,
) -> Vec<u8> {
    let plane = width * height * sample_bytes;
    let mut out = vec![0u8; plane * 3];
    for y in 0..height {
        for x in 0..width {
            let src = (y * width + x) * sample_bytes;
            let Some(value) = samples.get(src..src + sample_bytes) else {
                continue;
            };
            let color = pattern.color_at(origin.0 + x, origin.1 + y);
            let dst = color * plane + src;
            out[dst..dst + sample_bytes].copy_from_slice(value);
        }
    }
    out
}
