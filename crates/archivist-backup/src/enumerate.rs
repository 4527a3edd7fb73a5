//! Directory enumeration.
//!
//! An enumerator turns one root directory into the flat list of every path
//! beneath it, the root itself included. Nothing is filtered here and the
//! order is whatever the traversal produces.
//!
//! Paths are raw OS strings; names that are not valid UTF-8 are archived
//! like any other.

use crate::error::{Error, Result};
use archivist_core::{EnumerationConfig, EnumerationMethod, ToolCommand};
use camino::Utf8Path;
use std::ffi::OsString;
use std::fs;
use std::os::unix::ffi::OsStringExt;
use std::process::{Command, Stdio};
use walkdir::WalkDir;

/// Everything found under one root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Every path reached, the root included
    pub paths: Vec<OsString>,

    /// Entries below the root that could not be read
    pub skipped: Vec<String>,
}

/// Lists every path under a root.
///
/// A root that is missing or unreadable must produce an error, never an
/// empty list. Failures below the root are recorded in
/// [`Listing::skipped`] and the walk goes on.
pub trait DirectoryEnumerator {
    fn enumerate(&self, root: &Utf8Path) -> Result<Listing>;
}

/// Builds the enumerator selected in configuration.
pub fn from_config(config: &EnumerationConfig) -> Box<dyn DirectoryEnumerator> {
    match config.method {
        EnumerationMethod::Walk => Box::new(WalkEnumerator::new()),
        EnumerationMethod::Find => Box::new(FindEnumerator::new(config.command.clone())),
    }
}

/// In-process traversal; symlinks are listed, not followed.
#[derive(Debug, Default, Clone, Copy)]
pub struct WalkEnumerator;

impl WalkEnumerator {
    pub fn new() -> Self {
        Self
    }
}

impl DirectoryEnumerator for WalkEnumerator {
    fn enumerate(&self, root: &Utf8Path) -> Result<Listing> {
        let mut listing = Listing::default();

        for entry in WalkDir::new(root).follow_links(false) {
            match entry {
                Ok(entry) => listing.paths.push(entry.into_path().into_os_string()),
                Err(e) if e.depth() == 0 => return Err(Error::enumeration(root, e)),
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry under {}: {}", root, e);
                    listing.skipped.push(e.to_string());
                }
            }
        }

        tracing::debug!(
            "Enumerated {} paths under {} ({} skipped)",
            listing.paths.len(),
            root,
            listing.skipped.len()
        );
        Ok(listing)
    }
}

/// Runs an external `find <root>` and reads one path per stdout line.
///
/// The root is checked up front. Once it is readable, a non-zero exit from
/// the tool only means some descendants were unreadable; its stderr lines
/// become skipped entries and whatever it listed is kept.
#[derive(Debug, Clone)]
pub struct FindEnumerator {
    command: ToolCommand,
}

impl FindEnumerator {
    pub fn new(command: ToolCommand) -> Self {
        Self { command }
    }
}

/// Fails unless `root` exists and, for a directory, can be listed.
fn check_root(root: &Utf8Path) -> Result<()> {
    let metadata = fs::metadata(root).map_err(|e| Error::root_access(root, e))?;
    if metadata.is_dir() {
        fs::read_dir(root).map_err(|e| Error::root_access(root, e))?;
    }
    Ok(())
}

impl DirectoryEnumerator for FindEnumerator {
    fn enumerate(&self, root: &Utf8Path) -> Result<Listing> {
        check_root(root)?;
        tracing::debug!("Running {} {}", self.command, root);

        let output = Command::new(self.command.program())
            .args(self.command.args())
            .arg(root)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::spawn(self.command.program(), e))?;

        let mut listing = Listing {
            paths: parse_listing(&output.stdout),
            skipped: Vec::new(),
        };

        if !output.status.success() {
            listing.skipped = String::from_utf8_lossy(&output.stderr)
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(String::from)
                .collect();
            tracing::warn!(
                "{} exited with {} for {}; {} entries reported unreadable",
                self.command,
                output.status,
                root,
                listing.skipped.len()
            );
        }

        Ok(listing)
    }
}

/// Splits tool output into paths. Empty lines (the final newline) are dropped.
fn parse_listing(stdout: &[u8]) -> Vec<OsString> {
    stdout
        .split(|b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .map(|line| OsString::from_vec(line.to_vec()))
        .collect()
}
