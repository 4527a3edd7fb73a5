//! Archive creation.
//!
//! Manifest entries are absolute paths. Before they reach the archive the
//! leading separator is stripped, so the result can be unpacked under any
//! directory without touching the original locations. Members go in in
//! manifest order.
//!
//! Writing is best effort: whatever the archiver complains about is
//! collected into a [`DiagnosticLog`] and the run carries on.

use crate::error::{Error, Result};
use crate::manifest::Manifest;
use archivist_core::{ArchiveConfig, ArchiveMethod, ToolCommand};
use camino::Utf8Path;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use tar::Builder as TarBuilder;

/// Directory the archiver runs in; normalized member names are relative to it.
pub const ARCHIVE_ROOT: &str = "/";

/// A manifest bound to the file it is written to.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveJob<'a> {
    pub manifest: &'a Manifest,
    pub output: &'a Utf8Path,
}

/// Lines the archiver wrote to its error stream.
///
/// Split on `\n` exactly as received, so output ending in a newline leaves
/// an empty last element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticLog {
    lines: Vec<String>,
}

impl DiagnosticLog {
    /// Decodes raw stderr bytes (lossily) and splits them into lines.
    pub fn from_stderr(stderr: &[u8]) -> Self {
        Self {
            lines: String::from_utf8_lossy(stderr)
                .split('\n')
                .map(String::from)
                .collect(),
        }
    }

    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// True when there is no non-empty line.
    pub fn is_blank(&self) -> bool {
        self.lines.iter().all(|l| l.is_empty())
    }

    /// The lines joined back with `\n`.
    pub fn joined(&self) -> String {
        self.lines.join("\n")
    }
}

/// What the archiver left behind.
#[derive(Debug, Clone)]
pub struct ArchiveOutcome {
    pub diagnostics: DiagnosticLog,
    /// Exit status of an external archiver; `None` for in-process writers
    pub status: Option<ExitStatus>,
}

/// Writes a manifest into a single archive file.
pub trait ArchiveWriter {
    fn write(&self, job: &ArchiveJob<'_>) -> Result<ArchiveOutcome>;
}

/// Builds the writer selected in configuration.
pub fn from_config(config: &ArchiveConfig) -> Box<dyn ArchiveWriter> {
    match config.method {
        ArchiveMethod::Cpio => Box::new(CpioWriter::new(config.command.clone())),
        ArchiveMethod::Tar => Box::new(TarWriter::new()),
    }
}

/// Makes an absolute manifest path relative by dropping leading separators.
///
/// The filesystem root itself becomes `.`.
pub fn normalize_path<P: AsRef<OsStr> + ?Sized>(path: &P) -> &OsStr {
    let bytes = path.as_ref().as_bytes();
    let start = bytes.iter().position(|b| *b != b'/').unwrap_or(bytes.len());
    match &bytes[start..] {
        [] if !bytes.is_empty() => OsStr::new("."),
        relative => OsStr::from_bytes(relative),
    }
}

/// Runs an external cpio-style archiver.
///
/// The normalized paths are fed newline-separated on stdin, the archive is
/// taken from stdout straight into the output file, stderr is captured.
#[derive(Debug, Clone)]
pub struct CpioWriter {
    command: ToolCommand,
}

impl CpioWriter {
    pub fn new(command: ToolCommand) -> Self {
        Self { command }
    }

    fn stdin_payload(manifest: &Manifest) -> Vec<u8> {
        manifest
            .iter()
            .map(|p| normalize_path(p).as_bytes())
            .collect::<Vec<_>>()
            .join(&b'\n')
    }
}

impl ArchiveWriter for CpioWriter {
    fn write(&self, job: &ArchiveJob<'_>) -> Result<ArchiveOutcome> {
        let output_file = File::create(job.output)?;

        tracing::debug!(
            "Running {} in {} for {} entries -> {}",
            self.command,
            ARCHIVE_ROOT,
            job.manifest.len(),
            job.output
        );

        let mut child = Command::new(self.command.program())
            .args(self.command.args())
            .current_dir(ARCHIVE_ROOT)
            .stdin(Stdio::piped())
            .stdout(Stdio::from(output_file))
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::spawn(self.command.program(), e))?;

        // stdin is fed from its own thread while stderr is drained here
        let payload = Self::stdin_payload(job.manifest);
        let feeder = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || -> io::Result<()> {
                stdin.write_all(&payload)?;
                stdin.flush()
            })
        });

        let output = child
            .wait_with_output()
            .map_err(|e| Error::spawn(self.command.program(), e))?;

        if let Some(feeder) = feeder {
            match feeder.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!("{} stopped reading its input: {}", self.command, e),
                Err(_) => tracing::debug!("stdin feeder for {} panicked", self.command),
            }
        }

        if !output.status.success() {
            tracing::debug!("{} exited with {}", self.command, output.status);
        }

        Ok(ArchiveOutcome {
            diagnostics: DiagnosticLog::from_stderr(&output.stderr),
            status: Some(output.status),
        })
    }
}

/// Writes a tar archive in-process.
///
/// Entries that cannot be added (vanished, unreadable) are reported as
/// diagnostic lines instead of failing the archive.
#[derive(Debug, Default, Clone, Copy)]
pub struct TarWriter;

impl TarWriter {
    pub fn new() -> Self {
        Self
    }
}

impl ArchiveWriter for TarWriter {
    fn write(&self, job: &ArchiveJob<'_>) -> Result<ArchiveOutcome> {
        let file = File::create(job.output)?;
        let mut tar = TarBuilder::new(BufWriter::new(file));
        tar.follow_symlinks(false);

        let mut diagnostics = Vec::new();
        for path in job.manifest {
            let name = normalize_path(path);
            if let Err(e) = tar.append_path_with_name(path, name) {
                diagnostics.push(format!("{}: {}", Path::new(name).display(), e));
            }
        }

        let mut writer = tar.into_inner()?;
        writer.flush()?;

        tracing::debug!(
            "Wrote {} entries to {} ({} skipped)",
            job.manifest.len() - diagnostics.len(),
            job.output,
            diagnostics.len()
        );

        Ok(ArchiveOutcome {
            diagnostics: DiagnosticLog::from_lines(diagnostics),
            status: None,
        })
    }
}
