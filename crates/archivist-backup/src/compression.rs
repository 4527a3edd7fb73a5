//! Compression of the finished archive.
//!
//! Compression always happens in place: `<archive>` is replaced by
//! `<archive>.gz` at the highest compression level.

use crate::error::{Error, Result};
use archivist_core::{CompressionConfig, CompressionMethod, ToolCommand};
use camino::{Utf8Path, Utf8PathBuf};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::process::{Command, ExitStatus, Stdio};

/// Extension appended to the compressed artifact.
pub const COMPRESSED_EXTENSION: &str = "gz";

/// Result of a compression step.
///
/// An external compressor's exit status is recorded here and nowhere else;
/// callers do not treat a failed status as an error.
#[derive(Debug, Clone)]
pub struct CompressionOutcome {
    /// Where the compressed file is expected to be
    pub artifact: Utf8PathBuf,

    /// Exit status of an external compressor; `None` for in-process compression
    pub status: Option<ExitStatus>,

    /// Sizes before and after, when known
    pub stats: Option<CompressionStats>,
}

impl CompressionOutcome {
    /// False only when an external compressor reported failure.
    pub fn succeeded(&self) -> bool {
        self.status.map_or(true, |s| s.success())
    }
}

/// Statistics about a compression operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionStats {
    /// Original uncompressed size in bytes
    pub original_size: u64,

    /// Compressed size in bytes
    pub compressed_size: u64,

    /// Compression ratio (compressed / original)
    pub compression_ratio: f64,
}

impl CompressionStats {
    /// Creates new compression statistics.
    pub fn new(original_size: u64, compressed_size: u64) -> Self {
        let compression_ratio = if original_size > 0 {
            compressed_size as f64 / original_size as f64
        } else {
            0.0
        };

        Self {
            original_size,
            compressed_size,
            compression_ratio,
        }
    }

    /// Returns compression percentage saved.
    pub fn compression_percentage(&self) -> u8 {
        ((1.0 - self.compression_ratio) * 100.0) as u8
    }
}

/// Compresses an archive file in place.
pub trait Compressor {
    fn compress(&self, archive: &Utf8Path) -> Result<CompressionOutcome>;
}

/// Builds the compressor selected in configuration.
pub fn from_config(config: &CompressionConfig) -> Box<dyn Compressor> {
    match config.method {
        CompressionMethod::Gzip => Box::new(GzipTool::new(config.command.clone())),
        CompressionMethod::Builtin => Box::new(GzipBuiltin::new()),
    }
}

/// Path of the compressed artifact for `archive`.
pub fn compressed_path(archive: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{}.{}", archive, COMPRESSED_EXTENSION))
}

/// Runs an external gzip-style compressor with the archive as last argument.
#[derive(Debug, Clone)]
pub struct GzipTool {
    command: ToolCommand,
}

impl GzipTool {
    pub fn new(command: ToolCommand) -> Self {
        Self { command }
    }
}

impl Compressor for GzipTool {
    fn compress(&self, archive: &Utf8Path) -> Result<CompressionOutcome> {
        tracing::debug!("Running {} {}", self.command, archive);

        let output = Command::new(self.command.program())
            .args(self.command.args())
            .arg(archive)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::spawn(self.command.program(), e))?;

        if !output.status.success() {
            tracing::debug!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(CompressionOutcome {
            artifact: compressed_path(archive),
            status: Some(output.status),
            stats: None,
        })
    }
}

/// Gzip compression in-process, removing the original like gzip does.
#[derive(Debug, Clone, Copy)]
pub struct GzipBuiltin {
    level: Compression,
}

impl GzipBuiltin {
    pub fn new() -> Self {
        Self {
            level: Compression::best(),
        }
    }
}

impl Default for GzipBuiltin {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for GzipBuiltin {
    fn compress(&self, archive: &Utf8Path) -> Result<CompressionOutcome> {
        let dest = compressed_path(archive);

        let source_file = File::open(archive)?;
        let original_size = source_file.metadata()?.len();

        let dest_file = File::create(&dest)?;
        let mut encoder = GzEncoder::new(dest_file, self.level);
        io::copy(&mut BufReader::new(source_file), &mut encoder)?;
        encoder.finish()?.flush()?;

        fs::remove_file(archive)?;

        let stats = CompressionStats::new(original_size, fs::metadata(&dest)?.len());
        tracing::debug!(
            "Compressed {} -> {} ({}% saved)",
            archive,
            dest,
            stats.compression_percentage()
        );

        Ok(CompressionOutcome {
            artifact: dest,
            status: None,
            stats: Some(stats),
        })
    }
}
