//! Path filtering for backup manifests.
//!
//! Exclusion patterns are regular expressions searched anywhere in the full
//! path string. A path is dropped as soon as one of them matches.
//!
//! Matching runs over the raw bytes of the path, so names that are not valid
//! UTF-8 are filtered like any other.

use crate::error::{Error, Result};
use regex::bytes::Regex;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;

/// Compiled set of exclusion patterns.
#[derive(Debug, Clone, Default)]
pub struct PatternFilter {
    patterns: Vec<Regex>,
}

impl PatternFilter {
    /// Compiles every pattern up front; the first malformed one fails construction.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(pattern).map_err(|e| Error::invalid_pattern(pattern, e))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    /// Returns true if no pattern matches anywhere in `path`.
    pub fn keeps<P: AsRef<OsStr> + ?Sized>(&self, path: &P) -> bool {
        let path = path.as_ref().as_bytes();
        !self.patterns.iter().any(|re| re.is_match(path))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
