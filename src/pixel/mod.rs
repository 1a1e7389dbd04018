//! Sample-level transforms between codec output and caller buffers.
//!
//! - [`bits`]: MSB-first bit cursors for sub-byte depths
//! - [`predictor`]: horizontal differencing
//! - [`unpack`] / [`pack`]: packed rows to byte-aligned samples and back
//! - [`color`]: YCbCr to RGB and CFA plane splitting

pub mod bits;
pub mod color;
pub mod pack;
pub mod predictor;
pub mod unpack;

pub use color::{cfa_split, ycbcr_to_rgb, CfaPattern, YCbCrParams};
pub use pack::pack_samples;
pub use predictor::{difference, undifference, PredictorParams};
pub use unpack::{apply_photometric, unpack_samples, OutputLayout, PackedShape};
