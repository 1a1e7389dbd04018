//! Directory validation for pixel decoding.
//!
//! Checks that a directory describes an image this crate can decode before
//! any strip or tile is fetched. All problems are collected so that tools
//! like `micro-tiff info` can report them together; decoding stops at the
//! first.
//!
//! # Supported Subset
//!
//! - **BitsPerSample**: one value (applied to every sample) or at least one
//!   per sample, every entry 1 or even, all entries equal
//! - **Compression**: none, LZW, JPEG, Deflate, PackBits, JPEG-2000
//! - **Photometric**: anything but transparency masks and the Lab family
//! - **Predictor**: none, or horizontal on byte-multiple depths
//! - **YCbCr** without JPEG: 8-bit chunky only

use crate::error::TiffError;

use super::directory::Directory;
use super::tags::{Compression, Photometric, PlanarConfiguration, Predictor, Tag};

// =============================================================================
// Validation Result
// =============================================================================

/// Result of validating a directory for decoding.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the directory can be decoded
    pub is_valid: bool,

    /// List of validation errors (empty if valid)
    pub errors: Vec<ValidationError>,

    /// List of validation warnings (non-fatal issues)
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        ValidationResult {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Record a failed directory lookup as an error, yielding the value on
    /// success.
    fn check<T>(&mut self, result: Result<T, TiffError>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.add_error(ValidationError::Directory(e));
                None
            }
        }
    }

    /// The first error as a TiffError, or `Ok(())` if valid.
    pub fn into_result(self) -> Result<(), TiffError> {
        match self.errors.into_iter().next() {
            None => Ok(()),
            Some(error) => Err(error.into()),
        }
    }
}

/// A specific validation error.
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// A tag could not be read, or a required tag is missing
    Directory(TiffError),

    /// ImageWidth or ImageLength is zero
    EmptyImage { width: u32, height: u32 },

    /// Compression scheme has no codec
    UnsupportedCompression(Compression),

    /// Photometric interpretation is recognized but never decoded
    UnsupportedPhotometric(Photometric),

    /// BitsPerSample does not fit SamplesPerPixel or has odd entries
    InvalidBitsPerSample {
        bits_per_sample: Vec<u16>,
        samples_per_pixel: u16,
        message: String,
    },

    /// A combination of otherwise valid parameters that is not decoded
    UnsupportedLayout(String),
}

impl From<ValidationError> for TiffError {
    fn from(error: ValidationError) -> Self {
        match error {
            ValidationError::Directory(e) => e,
            ValidationError::EmptyImage { width, height } => TiffError::InsufficientMetadata(
                format!("image dimensions are {}x{}", width, height),
            ),
            ValidationError::UnsupportedCompression(compression) => {
                TiffError::UnsupportedCompression(compression.name())
            }
            ValidationError::UnsupportedPhotometric(photometric) => TiffError::Unsupported(
                format!("photometric interpretation {}", photometric.name()),
            ),
            ValidationError::InvalidBitsPerSample { message, .. } => {
                TiffError::invalid_tag(Tag::BitsPerSample.name(), message)
            }
            ValidationError::UnsupportedLayout(message) => TiffError::Unsupported(message),
        }
    }
}

// =============================================================================
// Directory Validation
// =============================================================================

/// Expand BitsPerSample to one entry per sample.
///
/// A single value applies to every sample; longer lists are truncated to
/// `samples_per_pixel`. Shorter lists and entries that are neither 1 nor
/// even are rejected.
pub fn normalize_bits_per_sample(
    bits: &[u16],
    samples_per_pixel: u16,
) -> Result<Vec<u16>, ValidationError> {
    let spp = samples_per_pixel as usize;
    let invalid = |message: String| ValidationError::InvalidBitsPerSample {
        bits_per_sample: bits.to_vec(),
        samples_per_pixel,
        message,
    };

    let expanded = match bits.len() {
        0 => return Err(invalid("no entries".to_string())),
        1 => vec![bits[0]; spp],
        n if n < spp => {
            return Err(invalid(format!(
                "{} entries for {} samples per pixel",
                n, spp
            )))
        }
        _ => bits[..spp].to_vec(),
    };

    if let Some(&bad) = expanded
        .iter()
        .find(|&&b| b == 0 || b > 64 || (b != 1 && b % 2 != 0))
    {
        return Err(invalid(format!("{} bits per sample", bad)));
    }
    Ok(expanded)
}

/// Validate a directory for decoding.
pub fn validate_directory(dir: &Directory) -> ValidationResult {
    let mut result = ValidationResult::ok();

    let width = result.check(dir.image_width());
    let height = result.check(dir.image_length());
    if let (Some(width), Some(height)) = (width, height) {
        if width == 0 || height == 0 {
            result.add_error(ValidationError::EmptyImage { width, height });
        }
    }

    let spp = result.check(dir.samples_per_pixel());
    if spp == Some(0) {
        result.add_error(ValidationError::Directory(TiffError::invalid_tag(
            Tag::SamplesPerPixel.name(),
            "must be at least 1",
        )));
    }

    let bits = match (result.check(dir.bits_per_sample()), spp) {
        (Some(bits), Some(spp)) if spp > 0 => match normalize_bits_per_sample(&bits, spp) {
            Ok(bits) => Some(bits),
            Err(e) => {
                result.add_error(e);
                None
            }
        },
        _ => None,
    };
    if let Some(bits) = &bits {
        if bits.windows(2).any(|w| w[0] != w[1]) {
            result.add_error(ValidationError::UnsupportedLayout(format!(
                "mixed bits per sample {:?}",
                bits
            )));
        }
    }

    let compression = result.check(dir.compression());
    if let Some(compression) = compression {
        if !compression.is_supported() {
            result.add_error(ValidationError::UnsupportedCompression(compression));
        }
    }

    let photometric = result.check(dir.photometric());
    match photometric {
        Some(Some(p)) if !p.is_supported() => {
            result.add_error(ValidationError::UnsupportedPhotometric(p));
        }
        Some(None) => result.add_warning("PhotometricInterpretation missing; inferred"),
        _ => {}
    }

    let planar = result.check(dir.planar_configuration());
    let predictor = result.check(dir.predictor());
    if let (Some(Predictor::Horizontal), Some(bits)) = (predictor, &bits) {
        if bits[0] % 8 != 0 {
            result.add_error(ValidationError::UnsupportedLayout(format!(
                "horizontal predictor with {}-bit samples",
                bits[0]
            )));
        }
    }

    let is_jpeg = compression.is_some_and(Compression::is_jpeg);
    if photometric == Some(Some(Photometric::YCbCr)) && !is_jpeg {
        if planar == Some(PlanarConfiguration::Planar) {
            result.add_error(ValidationError::UnsupportedLayout(
                "planar YCbCr".to_string(),
            ));
        }
        if let Some(bits) = &bits {
            if bits[0] != 8 {
                result.add_error(ValidationError::UnsupportedLayout(format!(
                    "{}-bit YCbCr",
                    bits[0]
                )));
            }
        }
        if spp.is_some_and(|spp| spp != 3) {
            result.add_error(ValidationError::UnsupportedLayout(
                "YCbCr without exactly 3 samples per pixel".to_string(),
            ));
        }
    }
    if is_jpeg {
        if let Some(bits) = &bits {
            if bits[0] != 8 {
                result.add_error(ValidationError::UnsupportedLayout(format!(
                    "{}-bit JPEG",
                    bits[0]
                )));
            }
        }
    }

    if photometric == Some(Some(Photometric::Palette)) && !dir.contains(Tag::ColorMap) {
        result.add_warning("palette image without ColorMap; indices returned as is");
    }

    result
}
