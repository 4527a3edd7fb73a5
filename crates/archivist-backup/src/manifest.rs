//! Backup manifest construction.
//!
//! The manifest is the exact, ordered list of paths that goes into the
//! archive. It is rebuilt from the filesystem on every run.

use crate::enumerate::DirectoryEnumerator;
use crate::error::Result;
use crate::filters::PatternFilter;
use camino::Utf8PathBuf;
use std::collections::BTreeSet;
use std::ffi::OsString;

/// Deduplicated paths in ascending byte order.
///
/// Two builds over an unchanged filesystem and configuration produce
/// identical manifests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<OsString>,
    skipped: Vec<String>,
}

impl Manifest {
    /// Sorts and deduplicates arbitrary paths into a manifest.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<OsString>,
    {
        // OsString orders by its raw bytes on unix
        let unique: BTreeSet<OsString> = paths.into_iter().map(Into::into).collect();
        Self {
            entries: unique.into_iter().collect(),
            skipped: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[OsString] {
        &self.entries
    }

    /// Entries below a root that enumeration could not read
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OsString> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a OsString;
    type IntoIter = std::slice::Iter<'a, OsString>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Enumerates configured roots and reduces the result to a [`Manifest`].
pub struct ManifestBuilder<'a> {
    enumerator: &'a dyn DirectoryEnumerator,
    filter: &'a PatternFilter,
}

impl<'a> ManifestBuilder<'a> {
    pub fn new(enumerator: &'a dyn DirectoryEnumerator, filter: &'a PatternFilter) -> Self {
        Self { enumerator, filter }
    }

    /// Builds the manifest for `roots`.
    ///
    /// The first root that fails to enumerate aborts the whole build.
    /// Unreadable entries below a root are carried in [`Manifest::skipped`].
    pub fn build(&self, roots: &[Utf8PathBuf]) -> Result<Manifest> {
        let mut collected = Vec::new();
        let mut skipped = Vec::new();
        for root in roots {
            let listing = self.enumerator.enumerate(root)?;
            collected.extend(listing.paths);
            skipped.extend(listing.skipped);
        }

        let total = collected.len();
        let mut manifest = Manifest::from_paths(
            collected
                .into_iter()
                .filter(|path| self.filter.keeps(path)),
        );
        manifest.skipped = skipped;

        tracing::debug!(
            "Manifest has {} entries ({} enumerated across {} roots, {} skipped)",
            manifest.len(),
            total,
            roots.len(),
            manifest.skipped.len()
        );
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerate::{Listing, WalkEnumerator};
    use crate::error::Error;
    use camino::Utf8Path;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    /// Serves fixed listings; unknown roots behave like missing directories.
    struct FixedEnumerator {
        listings: HashMap<Utf8PathBuf, Listing>,
    }

    impl FixedEnumerator {
        fn new(listings: &[(&str, &[&str])]) -> Self {
            Self {
                listings: listings
                    .iter()
                    .map(|(root, paths)| {
                        (
                            Utf8PathBuf::from(*root),
                            Listing {
                                paths: paths.iter().map(OsString::from).collect(),
                                skipped: Vec::new(),
                            },
                        )
                    })
                    .collect(),
            }
        }
    }

    impl DirectoryEnumerator for FixedEnumerator {
        fn enumerate(&self, root: &Utf8Path) -> Result<Listing> {
            self.listings.get(root).cloned().ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} not found", root),
                ))
            })
        }
    }

    fn roots(paths: &[&str]) -> Vec<Utf8PathBuf> {
        paths.iter().map(Utf8PathBuf::from).collect()
    }

    fn names(manifest: &Manifest) -> Vec<String> {
        manifest
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_manifest_sorts_and_dedupes() {
        let manifest = Manifest::from_paths(["/b", "/a/z", "/a", "/b", "/a/z"]);
        assert_eq!(names(&manifest), ["/a", "/a/z", "/b"]);
        assert_eq!(manifest.len(), 3);
    }

    #[test]
    fn test_manifest_orders_by_bytes() {
        // '-' (0x2d) sorts before '/' (0x2f), unlike component-wise path ordering
        let manifest = Manifest::from_paths(["/data/a/x", "/data/a-b", "/data/a"]);
        assert_eq!(names(&manifest), ["/data/a", "/data/a-b", "/data/a/x"]);
    }

    #[test]
    fn test_build_filters_and_sorts() {
        let enumerator = FixedEnumerator::new(&[
            ("/data/b", &["/data/b", "/data/b/x"]),
            ("/data/a", &["/data/a", "/data/a/x.tmp", "/data/a/x"]),
        ]);
        let filter = PatternFilter::new([r"\.tmp$"]).unwrap();

        let manifest = ManifestBuilder::new(&enumerator, &filter)
            .build(&roots(&["/data/a", "/data/b"]))
            .unwrap();

        assert_eq!(
            names(&manifest),
            ["/data/a", "/data/a/x", "/data/b", "/data/b/x"]
        );
        assert!(manifest.skipped().is_empty());
    }

    #[test]
    fn test_build_overlapping_roots_dedupes() {
        let enumerator = FixedEnumerator::new(&[
            ("/srv", &["/srv", "/srv/www", "/srv/www/index.html"]),
            ("/srv/www", &["/srv/www", "/srv/www/index.html"]),
        ]);
        let filter = PatternFilter::default();

        let manifest = ManifestBuilder::new(&enumerator, &filter)
            .build(&roots(&["/srv/www", "/srv"]))
            .unwrap();

        assert_eq!(names(&manifest), ["/srv", "/srv/www", "/srv/www/index.html"]);
    }

    #[test]
    fn test_build_no_roots_is_empty() {
        let enumerator = FixedEnumerator::new(&[]);
        let filter = PatternFilter::default();

        let manifest = ManifestBuilder::new(&enumerator, &filter)
            .build(&[])
            .unwrap();
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_build_everything_filtered_is_empty() {
        let enumerator = FixedEnumerator::new(&[("/data", &["/data", "/data/x"])]);
        let filter = PatternFilter::new(["^/data"]).unwrap();

        let manifest = ManifestBuilder::new(&enumerator, &filter)
            .build(&roots(&["/data"]))
            .unwrap();
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_build_aborts_on_failed_root() {
        let enumerator = FixedEnumerator::new(&[("/data/a", &["/data/a"])]);
        let filter = PatternFilter::default();

        let result = ManifestBuilder::new(&enumerator, &filter)
            .build(&roots(&["/data/a", "/data/missing"]));
        assert!(result.is_err());
    }

    #[test]
    fn test_build_carries_skipped_entries() {
        let mut enumerator = FixedEnumerator::new(&[("/data", &["/data", "/data/x"])]);
        if let Some(listing) = enumerator.listings.get_mut(Utf8Path::new("/data")) {
            listing.skipped.push("/data/locked: Permission denied".to_string());
        }
        let filter = PatternFilter::default();

        let manifest = ManifestBuilder::new(&enumerator, &filter)
            .build(&roots(&["/data"]))
            .unwrap();

        assert_eq!(names(&manifest), ["/data", "/data/x"]);
        assert_eq!(manifest.skipped(), ["/data/locked: Permission denied"]);
    }

    #[test]
    fn test_build_is_deterministic_on_disk() {
        let temp_dir = TempDir::new().unwrap();
        let base = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        for name in ["zeta", "alpha", "mid/deep", "mid/a.tmp"] {
            let path = base.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, name).unwrap();
        }

        let enumerator = WalkEnumerator::new();
        let filter = PatternFilter::new([r"\.tmp$"]).unwrap();
        let builder = ManifestBuilder::new(&enumerator, &filter);

        let first = builder.build(&[base.clone(), base.join("mid")]).unwrap();
        let second = builder.build(&[base.clone(), base.join("mid")]).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
        assert!(names(&first).iter().all(|p| !p.ends_with(".tmp")));
        assert!(first.entries().windows(2).all(|w| w[0] < w[1]));
    }
}
