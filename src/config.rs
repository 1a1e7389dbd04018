//! Command-line configuration for the `micro-tiff` binary.
//!
//! Subcommands:
//!
//! - `info` - dump the header and every IFD, as text or JSON
//! - `extract` - write the raw decoded samples of a region to a file
//! - `set-tag` - overwrite one tag value in place
//!
//! # Environment Variables
//!
//! - `MICROTIFF_BLOCK_SIZE` - read cache block size in bytes (default: 64 KiB)
//! - `MICROTIFF_CACHE_BLOCKS` - number of cached blocks (default: 64)
//! - `RUST_LOG` - overrides the log filter

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::format::tiff::{parse_tag, Region, Tag};
use crate::io::{DEFAULT_BLOCK_CACHE_CAPACITY, DEFAULT_BLOCK_SIZE};

/// Smallest accepted cache block.
pub const MIN_BLOCK_SIZE: usize = 512;

/// Largest accepted cache block (16 MiB).
pub const MAX_BLOCK_SIZE: usize = 16 * 1024 * 1024;

// =============================================================================
// CLI Arguments
// =============================================================================

/// micro-tiff - inspect, extract from and patch TIFF / BigTIFF files.
#[derive(Parser, Debug, Clone)]
#[command(name = "micro-tiff")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub cache: CacheConfig,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the header and every IFD
    Info(InfoConfig),

    /// Decode a region of one image to a raw sample file
    Extract(ExtractConfig),

    /// Overwrite one tag of one IFD in place
    SetTag(SetTagConfig),
}

impl Cli {
    /// Validate the shared options and the chosen subcommand.
    pub fn validate(&self) -> Result<(), String> {
        self.cache.validate()?;
        match &self.command {
            Command::Info(config) => config.validate(),
            Command::Extract(config) => config.validate(),
            Command::SetTag(config) => config.validate(),
        }
    }
}

// =============================================================================
// Read cache
// =============================================================================

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Block size in bytes for the read cache.
    #[arg(long, global = true, default_value_t = DEFAULT_BLOCK_SIZE, env = "MICROTIFF_BLOCK_SIZE")]
    pub block_size: usize,

    /// Number of blocks kept in the read cache.
    #[arg(long, global = true, default_value_t = DEFAULT_BLOCK_CACHE_CAPACITY, env = "MICROTIFF_CACHE_BLOCKS")]
    pub cache_blocks: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            cache_blocks: DEFAULT_BLOCK_CACHE_CAPACITY,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&self.block_size) {
            return Err(format!(
                "block_size must be between {} and {} bytes",
                MIN_BLOCK_SIZE, MAX_BLOCK_SIZE
            ));
        }
        if self.cache_blocks == 0 {
            return Err("cache_blocks must be greater than 0".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// info
// =============================================================================

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct InfoConfig {
    /// TIFF file to inspect.
    pub file: PathBuf,

    /// Print JSON instead of text.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl InfoConfig {
    pub fn validate(&self) -> Result<(), String> {
        check_path(&self.file, "file")
    }
}

// =============================================================================
// extract
// =============================================================================

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ExtractConfig {
    /// TIFF file to read.
    pub file: PathBuf,

    /// Index of the image in the IFD chain.
    #[arg(long, default_value_t = 0)]
    pub ifd: usize,

    /// Left edge of the region.
    #[arg(long, default_value_t = 0)]
    pub x: u32,

    /// Top edge of the region.
    #[arg(long, default_value_t = 0)]
    pub y: u32,

    /// Region width (default: to the right edge of the image).
    #[arg(long)]
    pub width: Option<u32>,

    /// Region height (default: to the bottom of the image).
    #[arg(long)]
    pub height: Option<u32>,

    /// Where to write the raw samples.
    #[arg(short, long)]
    pub output: PathBuf,
}

impl ExtractConfig {
    pub fn validate(&self) -> Result<(), String> {
        check_path(&self.file, "file")?;
        check_path(&self.output, "output")?;
        if self.width == Some(0) || self.height == Some(0) {
            return Err("region width and height must be greater than 0".to_string());
        }
        Ok(())
    }

    /// The requested region within an image of the given size.
    pub fn region(&self, image_width: u32, image_height: u32) -> Region {
        Region::new(
            self.x,
            self.y,
            self.width
                .unwrap_or_else(|| image_width.saturating_sub(self.x)),
            self.height
                .unwrap_or_else(|| image_height.saturating_sub(self.y)),
        )
    }
}

// =============================================================================
// set-tag
// =============================================================================

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct SetTagConfig {
    /// TIFF file to modify.
    pub file: PathBuf,

    /// Index of the IFD holding the tag.
    #[arg(long, default_value_t = 0)]
    pub ifd: usize,

    /// Tag name (`ImageDescription`) or number (`270`).
    #[arg(long)]
    pub tag: String,

    /// New value: text for ASCII tags, comma-separated numbers otherwise.
    #[arg(long)]
    pub value: String,
}

impl SetTagConfig {
    pub fn validate(&self) -> Result<(), String> {
        check_path(&self.file, "file")?;
        self.tag_number().map(|_| ())
    }

    /// Resolve `tag` to its number, refusing the reader-only tags.
    pub fn tag_number(&self) -> Result<u16, String> {
        let number = parse_tag(&self.tag).ok_or_else(|| format!("unknown tag {:?}", self.tag))?;
        if Tag::from_u16(number).is_some_and(Tag::is_synthetic) {
            return Err(format!("{} is not stored in the file", self.tag));
        }
        Ok(number)
    }
}

fn check_path(path: &std::path::Path, what: &str) -> Result<(), String> {
    if path.as_os_str().is_empty() {
        return Err(format!("{} path must not be empty", what));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
