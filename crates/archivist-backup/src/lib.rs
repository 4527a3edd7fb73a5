//! Archivist Backup Pipeline
//!
//! This crate turns a backup configuration into one compressed archive.
//! Configured roots are enumerated, filtered through regular-expression
//! exclusions, deduplicated and sorted into a manifest, streamed into an
//! archiver with relative member names, and finally compressed in place.
//!
//! # Features
//!
//! - **Deterministic manifests**: byte-ordered, deduplicated path lists
//! - **Relocatable archives**: leading `/` stripped from every member
//! - **Best-effort archiving**: archiver diagnostics are captured, not fatal
//! - **Pluggable backends**: external `find`/`cpio`/`gzip` or in-process
//!   walkdir/tar/flate2
//!
//! # Examples
//!
//! ```no_run
//! use archivist_backup::{BackupPipeline, RunOptions};
//! use archivist_core::{BackupConfig, TracingSink};
//! use camino::Utf8Path;
//! use std::sync::Arc;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = BackupConfig::load(Utf8Path::new("/etc/archivist.yaml"))?;
//!     let pipeline = BackupPipeline::from_config(&config, Arc::new(TracingSink::new()))?;
//!
//!     let report = pipeline.run(&RunOptions {
//!         outfile: "/backups/www.cpio".into(),
//!         report_diagnostics: true,
//!     });
//!
//!     println!("Backup finished in stage {}", report.stage);
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod compression;
pub mod enumerate;
pub mod error;
pub mod filters;
pub mod manifest;
pub mod pipeline;

// Re-export commonly used types
pub use archive::{
    normalize_path, ArchiveJob, ArchiveOutcome, ArchiveWriter, CpioWriter, DiagnosticLog,
    TarWriter,
};
pub use compression::{
    CompressionOutcome, CompressionStats, Compressor, GzipBuiltin, GzipTool, COMPRESSED_EXTENSION,
};
pub use enumerate::{DirectoryEnumerator, FindEnumerator, Listing, WalkEnumerator};
pub use error::{Error, Result};
pub use filters::PatternFilter;
pub use manifest::{Manifest, ManifestBuilder};
pub use pipeline::{BackupPipeline, RunOptions, RunReport, Stage, STRICT_FAILURE_EXIT_CODE};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
