//! Error types for archivist-backup

use camino::Utf8PathBuf;
use thiserror::Error;

/// Result type alias using archivist-backup's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building a manifest or writing an archive
#[derive(Error, Debug)]
pub enum Error {
    /// An exclusion pattern failed to compile
    #[error("Invalid exclusion pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A root could not be walked
    #[error("Failed to enumerate {root}: {source}")]
    Enumeration {
        root: Utf8PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// A root is missing or unreadable
    #[error("Cannot read root {root}: {source}")]
    RootAccess {
        root: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An external tool could not be started or waited on
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an invalid pattern error
    pub fn invalid_pattern(pattern: impl Into<String>, source: regex::Error) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            source,
        }
    }

    /// Create an enumeration error for a root
    pub fn enumeration(root: impl Into<Utf8PathBuf>, source: walkdir::Error) -> Self {
        Self::Enumeration {
            root: root.into(),
            source,
        }
    }

    /// Create an access error for a root
    pub fn root_access(root: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::RootAccess {
            root: root.into(),
            source,
        }
    }

    /// Create a spawn error for an external program
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    /// True for failures of the filesystem-access kind: missing or unreadable
    /// roots, unusable output paths, tools that cannot be started.
    ///
    /// Anything else is a configuration problem.
    pub fn is_filesystem_access(&self) -> bool {
        !matches!(self, Error::InvalidPattern { .. })
    }
}
