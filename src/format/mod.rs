//! File format support.
//!
//! - [`tiff`]: classic TIFF and BigTIFF reading, writing and editing
//! - [`jpeg`]: JPEG stream helpers for compression 7 chunks

pub mod jpeg;
pub mod tiff;
