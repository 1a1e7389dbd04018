//! Per-directory sample parameters.

use tracing::debug;

use crate::error::TiffError;
use crate::pixel::{CfaPattern, YCbCrParams};

use super::directory::Directory;
use super::parser::ByteOrder;
use super::tags::{
    Compression, FillOrder, Photometric, PlanarConfiguration, Predictor, SampleFormat,
};
use super::validation::{normalize_bits_per_sample, validate_directory};

/// How decoded samples map to output channels.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorModel {
    /// Samples are passed through, after any photometric inversion
    Direct,
    /// The JPEG codec yields 8-bit gray or RGB
    Jpeg,
    /// Subsampled YCbCr converted to interleaved RGB
    YCbCr(YCbCrParams),
    /// Bayer samples spread over three color planes
    Cfa(CfaPattern),
}

/// Validated sample parameters of one directory.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleGeometry {
    pub width: u32,
    pub height: u32,
    /// One entry per sample
    pub bits_per_sample: Vec<u16>,
    pub samples_per_pixel: u16,
    pub compression: Compression,
    pub photometric: Photometric,
    pub planar: PlanarConfiguration,
    pub predictor: Predictor,
    pub sample_format: SampleFormat,
    pub fill_order: FillOrder,
    pub byte_order: ByteOrder,
    pub color_map: Option<Vec<u16>>,
    pub color: ColorModel,
}

impl SampleGeometry {
    pub fn from_directory(dir: &Directory) -> Result<Self, TiffError> {
        validate_directory(dir).into_result()?;

        let samples_per_pixel = dir.samples_per_pixel()?;
        let bits_per_sample = normalize_bits_per_sample(&dir.bits_per_sample()?, samples_per_pixel)?;
        let compression = dir.compression()?;

        let mut photometric = match dir.photometric()? {
            Some(p) => p,
            None if samples_per_pixel >= 3 => Photometric::Rgb,
            None => Photometric::BlackIsZero,
        };

        let color = if compression.is_jpeg() {
            if samples_per_pixel >= 3 && photometric != Photometric::Rgb {
                debug!(photometric = %photometric.name(), "JPEG data decodes to RGB");
                photometric = Photometric::Rgb;
            }
            ColorModel::Jpeg
        } else {
            match photometric {
                Photometric::YCbCr => ColorModel::YCbCr(YCbCrParams::from_directory(dir)?),
                Photometric::CfaArray => ColorModel::Cfa(CfaPattern::from_directory(dir)?),
                _ => ColorModel::Direct,
            }
        };

        Ok(Self {
            width: dir.image_width()?,
            height: dir.image_length()?,
            bits_per_sample,
            samples_per_pixel,
            compression,
            photometric,
            planar: dir.planar_configuration()?,
            predictor: dir.predictor()?,
            sample_format: dir.sample_format()?,
            fill_order: dir.fill_order()?,
            byte_order: dir.byte_order(),
            color_map: dir.color_map()?,
            color,
        })
    }

    /// Bits of every sample.
    #[inline]
    pub fn bits(&self) -> u16 {
        self.bits_per_sample[0]
    }

    /// Output bytes per sample: `ceil(bits / 8)`.
    #[inline]
    pub fn sample_bytes(&self) -> usize {
        (self.bits() as usize).div_ceil(8)
    }

    /// Samples interleaved in each chunk: all of them when chunky, one when
    /// planar.
    #[inline]
    pub fn chunky_samples(&self) -> usize {
        match self.planar {
            PlanarConfiguration::Chunky => self.samples_per_pixel as usize,
            PlanarConfiguration::Planar => 1,
        }
    }

    /// Number of separately stored sample planes.
    #[inline]
    pub fn planes(&self) -> usize {
        match self.planar {
            PlanarConfiguration::Chunky => 1,
            PlanarConfiguration::Planar => self.samples_per_pixel as usize,
        }
    }

    /// Row layout law: `ceil(bits / 8)`, times samples per pixel when chunky.
    #[inline]
    pub fn bytes_per_pixel(&self) -> usize {
        self.sample_bytes() * self.chunky_samples()
    }

    /// Bytes of one packed chunk row `width` pixels wide.
    pub fn packed_row_bytes(&self, width: u32) -> Result<usize, TiffError> {
        (width as usize)
            .checked_mul(self.chunky_samples())
            .and_then(|n| n.checked_mul(self.bits() as usize))
            .map(|bits| bits.div_ceil(8))
            .ok_or(TiffError::TooLarge {
                what: "row size",
            })
    }

    /// Decoded byte size of a `width` x `height` chunk before unpacking.
    pub fn packed_chunk_bytes(&self, width: u32, height: u32) -> Result<usize, TiffError> {
        match &self.color {
            ColorModel::YCbCr(params) => {
                Ok(params.encoded_len(width as usize, height as usize))
            }
            ColorModel::Jpeg => (width as usize)
                .checked_mul(height as usize)
                .and_then(|n| n.checked_mul(self.chunky_samples()))
                .ok_or(TiffError::TooLarge {
                    what: "chunk size",
                }),
            _ => self
                .packed_row_bytes(width)?
                .checked_mul(height as usize)
                .ok_or(TiffError::TooLarge {
                    what: "chunk size",
                }),
        }
    }

    /// Uncompressed size of one full image plane per the row layout law.
    pub fn image_bytes(&self) -> Result<u64, TiffError> {
        (self.width as u64)
            .checked_mul(self.height as u64)
            .and_then(|n| n.checked_mul(self.bytes_per_pixel() as u64))
            .ok_or(TiffError::TooLarge {
                what: "image size",
            })
    }
}
