//! The backup run: manifest, archive, compression.
//!
//! A run moves through `Start → LoadConfig → BuildManifest → WriteArchive →
//! Compress → Done`, dropping to `Failed` from whichever stage errors.
//! Failures are reported to the log sink and recorded in the [`RunReport`];
//! they never escape [`BackupPipeline::run`] as errors.

use crate::archive::{self, ArchiveJob, ArchiveWriter, DiagnosticLog};
use crate::compression::{self, CompressionOutcome, Compressor};
use crate::enumerate::{self, DirectoryEnumerator};
use crate::error::{Error, Result};
use crate::filters::PatternFilter;
use crate::manifest::{Manifest, ManifestBuilder};
use archivist_core::{BackupConfig, LogSink};
use camino::Utf8PathBuf;
use std::fmt;
use std::sync::Arc;

/// Exit code for runs that failed on filesystem access in strict mode.
pub const STRICT_FAILURE_EXIT_CODE: u8 = 2;

/// Stages of a backup run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    LoadConfig,
    BuildManifest,
    WriteArchive,
    Compress,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::LoadConfig => "load-config",
            Stage::BuildManifest => "build-manifest",
            Stage::WriteArchive => "write-archive",
            Stage::Compress => "compress",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Per-invocation settings
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Archive file to write; compression turns it into `<outfile>.gz`
    pub outfile: Utf8PathBuf,

    /// Forward the archiver's diagnostics to the log sink
    pub report_diagnostics: bool,
}

/// What happened during one run.
#[derive(Debug)]
pub struct RunReport {
    /// `Done` or `Failed` once the run is over
    pub stage: Stage,

    /// Stage that was executing when the run failed
    pub failed_at: Option<Stage>,

    /// Number of manifest entries handed to the archiver
    pub manifest_entries: usize,

    /// Entries below a root that could not be read and were left out
    pub skipped: Vec<String>,

    /// Archiver diagnostics, once the archive stage ran
    pub diagnostics: Option<DiagnosticLog>,

    /// Compression result, once the compression stage ran
    pub compression: Option<CompressionOutcome>,

    /// The error that ended the run
    pub error: Option<Error>,
}

impl RunReport {
    fn new() -> Self {
        Self {
            stage: Stage::Start,
            failed_at: None,
            manifest_entries: 0,
            skipped: Vec::new(),
            diagnostics: None,
            compression: None,
            error: None,
        }
    }

    fn enter(&mut self, stage: Stage) {
        tracing::debug!("Backup stage {} -> {}", self.stage, stage);
        self.stage = stage;
    }

    pub fn completed(&self) -> bool {
        self.stage == Stage::Done
    }

    /// Process exit code for this run.
    ///
    /// Without `strict`, a failed run still exits 0; the failure is only
    /// visible in the log. With `strict`, it exits [`STRICT_FAILURE_EXIT_CODE`].
    pub fn exit_code(&self, strict: bool) -> u8 {
        if strict && !self.completed() {
            STRICT_FAILURE_EXIT_CODE
        } else {
            0
        }
    }
}

/// Runs one backup from configured roots to a compressed archive.
pub struct BackupPipeline {
    roots: Vec<Utf8PathBuf>,
    filter: PatternFilter,
    enumerator: Box<dyn DirectoryEnumerator>,
    writer: Box<dyn ArchiveWriter>,
    compressor: Box<dyn Compressor>,
    sink: Arc<dyn LogSink>,
}

impl BackupPipeline {
    /// Assembles a pipeline from explicit parts.
    pub fn new(
        roots: Vec<Utf8PathBuf>,
        filter: PatternFilter,
        enumerator: Box<dyn DirectoryEnumerator>,
        writer: Box<dyn ArchiveWriter>,
        compressor: Box<dyn Compressor>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            roots,
            filter,
            enumerator,
            writer,
            compressor,
            sink,
        }
    }

    /// Assembles the pipeline described by `config`.
    ///
    /// Exclusion patterns are compiled here, so a bad pattern fails before
    /// any filesystem work happens.
    pub fn from_config(config: &BackupConfig, sink: Arc<dyn LogSink>) -> Result<Self> {
        let filter = PatternFilter::new(config.patterns())?;
        Ok(Self::new(
            config.roots(),
            filter,
            enumerate::from_config(&config.enumeration),
            archive::from_config(&config.archive),
            compression::from_config(&config.compression),
            sink,
        ))
    }

    pub fn roots(&self) -> &[Utf8PathBuf] {
        &self.roots
    }

    /// Builds the manifest without writing anything.
    pub fn build_manifest(&self) -> Result<Manifest> {
        ManifestBuilder::new(self.enumerator.as_ref(), &self.filter).build(&self.roots)
    }

    /// Runs every stage. Errors are logged to the sink and kept in the report.
    pub fn run(&self, options: &RunOptions) -> RunReport {
        let mut report = RunReport::new();

        match self.execute(options, &mut report) {
            Ok(()) => report.enter(Stage::Done),
            Err(e) => {
                self.sink.info(&format!("error creating backup: {}", e));
                report.failed_at = Some(report.stage);
                report.enter(Stage::Failed);
                report.error = Some(e);
            }
        }

        report
    }

    fn execute(&self, options: &RunOptions, report: &mut RunReport) -> Result<()> {
        report.enter(Stage::BuildManifest);
        let manifest = self.build_manifest()?;
        report.manifest_entries = manifest.len();
        report.skipped = manifest.skipped().to_vec();

        if options.report_diagnostics && !report.skipped.is_empty() {
            self.sink.info(&format!(
                "entries skipped during enumeration: {}",
                report.skipped.join("\n")
            ));
        }

        report.enter(Stage::WriteArchive);
        let outcome = self.writer.write(&ArchiveJob {
            manifest: &manifest,
            output: &options.outfile,
        })?;

        if options.report_diagnostics {
            self.sink.info(&format!(
                "error output during execution: {}",
                outcome.diagnostics.joined()
            ));
        }
        report.diagnostics = Some(outcome.diagnostics);

        report.enter(Stage::Compress);
        let compression = self.compressor.compress(&options.outfile)?;
        if !compression.succeeded() {
            tracing::debug!("Compression of {} did not succeed", options.outfile);
        }
        report.compression = Some(compression);

        Ok(())
    }
}
