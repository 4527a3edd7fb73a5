//! # archivist-core
//!
//! Core library for the archivist backup utility providing:
//! - Backup configuration parsing (YAML)
//! - Core error types
//! - The log sink interface the pipeline reports through

pub mod config;
pub mod error;
pub mod sink;

pub use config::{
    ArchiveConfig, ArchiveMethod, BackupConfig, CompressionConfig, CompressionMethod,
    EnumerationConfig, EnumerationMethod, ToolCommand,
};
pub use error::{Error, Result};
pub use sink::{LogLevel, LogSink, TracingSink};

#[cfg(any(test, feature = "test-util"))]
pub use sink::{MemorySink, SinkRecord};
