//! micro-tiff - inspect, extract from and patch TIFF / BigTIFF files.

use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use micro_tiff::{
    config::{CacheConfig, Cli, Command, ExtractConfig, InfoConfig, SetTagConfig},
    format::tiff::{overwrite_ifd_value, tag_name, Directory, SampleGeometry, TiffParser},
    io::{BlockCache, ByteSink, FileSource},
    raster::RasterReader,
    TiffError,
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = cli.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let result = match &cli.command {
        Command::Info(config) => run_info(config, &cli.cache),
        Command::Extract(config) => run_extract(config, &cli.cache),
        Command::SetTag(config) => run_set_tag(config),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing/logging subsystem. `RUST_LOG` wins when set.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "micro_tiff=debug"
    } else {
        "micro_tiff=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_cached(path: &std::path::Path, cache: &CacheConfig) -> Result<BlockCache<FileSource>, TiffError> {
    let source = FileSource::open(path)?;
    Ok(BlockCache::with_capacity(
        source,
        cache.block_size,
        cache.cache_blocks,
    ))
}

// =============================================================================
// info
// =============================================================================

#[derive(Serialize)]
struct InfoReport {
    file: String,
    byte_order: &'static str,
    bigtiff: bool,
    first_ifd_offset: u64,
    ifds: Vec<IfdReport>,
}

#[derive(Serialize)]
struct IfdReport {
    index: usize,
    offset: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<Directory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn summarize(dir: &Directory) -> Option<String> {
    let geometry = SampleGeometry::from_directory(dir).ok()?;
    Some(format!(
        "{}x{}, {} x {}-bit, {}, {}{}",
        geometry.width,
        geometry.height,
        geometry.samples_per_pixel,
        geometry.bits(),
        geometry.photometric.name(),
        geometry.compression.name(),
        if dir.is_tiled() { ", tiled" } else { "" }
    ))
}

fn run_info(config: &InfoConfig, cache: &CacheConfig) -> Result<(), TiffError> {
    let mut parser = TiffParser::new(open_cached(&config.file, cache)?);
    let header = parser.header()?;

    let mut ifds = Vec::new();
    for (index, offset) in parser.get_ifd_offsets()?.into_iter().enumerate() {
        let report = match parser.get_ifd(offset) {
            Ok(dir) => IfdReport {
                index,
                offset,
                summary: summarize(&dir),
                tags: Some(dir),
                error: None,
            },
            Err(e) => IfdReport {
                index,
                offset,
                summary: None,
                tags: None,
                error: Some(e.to_string()),
            },
        };
        ifds.push(report);
    }

    let report = InfoReport {
        file: config.file.display().to_string(),
        byte_order: if header.byte_order.is_little_endian() {
            "little-endian"
        } else {
            "big-endian"
        },
        bigtiff: header.is_bigtiff,
        first_ifd_offset: header.first_ifd_offset,
        ifds,
    };

    if config.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| TiffError::Unsupported(format!("JSON output: {}", e)))?;
        println!("{}", json);
        return Ok(());
    }

    println!("{}", report.file);
    println!(
        "  {} {}, first IFD at {}",
        if report.bigtiff { "BigTIFF" } else { "TIFF" },
        report.byte_order,
        report.first_ifd_offset
    );
    for ifd in &report.ifds {
        println!();
        println!("IFD {} @ {}", ifd.index, ifd.offset);
        if let Some(summary) = &ifd.summary {
            println!("  {}", summary);
        }
        if let Some(error) = &ifd.error {
            println!("  error: {}", error);
        }
        if let Some(tags) = &ifd.tags {
            for (tag, value) in tags.persisted() {
                println!("  {:>5} {:<28} {}", tag, tag_name(tag), value);
            }
        }
    }
    Ok(())
}

// =============================================================================
// extract
// =============================================================================

fn run_extract(config: &ExtractConfig, cache: &CacheConfig) -> Result<(), TiffError> {
    let mut reader = RasterReader::new(open_cached(&config.file, cache)?)?;
    let dir = reader.directory(config.ifd)?;
    let region = config.region(dir.image_width()?, dir.image_length()?);
    let layout = reader.output_layout(config.ifd)?;
    debug!(?region, ?layout, "Extracting region");

    let samples = reader.read_region(config.ifd, region)?;
    let mut output = FileSource::create(&config.output)?;
    output.write_all_at(0, &samples)?;
    output.flush()?;

    info!(
        bytes = samples.len(),
        planes = layout.planes,
        channels = layout.channels,
        sample_bytes = layout.sample_bytes,
        little_endian = layout.byte_order.is_little_endian(),
        "Wrote {}",
        config.output.display()
    );
    Ok(())
}

// =============================================================================
// set-tag
// =============================================================================

fn run_set_tag(config: &SetTagConfig) -> Result<(), TiffError> {
    let tag = config.tag_number().map_err(TiffError::Unsupported)?;
    let mut file = FileSource::open_rw(&config.file)?;

    let current = {
        let mut parser = TiffParser::new(&mut file);
        let offsets = parser.get_ifd_offsets()?;
        let offset = *offsets.get(config.ifd).ok_or(TiffError::IfdIndexOutOfRange {
            index: config.ifd,
            count: offsets.len(),
        })?;
        parser
            .get_ifd(offset)?
            .get(tag)
            .cloned()
            .ok_or_else(|| TiffError::TagNotFound(tag_name(tag)))?
    };
    let value = current.parse_like(&config.value)?;

    let strategy = overwrite_ifd_value(&mut file, config.ifd, tag, &value)?;
    println!("{} = {} ({})", tag_name(tag), value, strategy);
    Ok(())
}
