//! Directory filtering for the initial recursive walk.
//!
//! A [`DirFilter`] decides, per directory, whether the walk registers a watch
//! for it and descends into it. Rejecting a directory skips its whole
//! subtree, including any directories inside it the filter would accept.
//!
//! Filters are consulted only by explicit
//! [`add_recursive`](crate::RecursiveWatcher::add_recursive) calls.
//! Directories created later are discovered by the dispatch loop and are
//! always watched.
//!
//! # Examples
//!
//! ```
//! use rw_watcher::{DirFilter, NameFilter};
//! use camino::Utf8Path;
//!
//! let filter = NameFilter::new().exclude("node_modules");
//! let meta = std::fs::metadata(".").unwrap();
//!
//! assert!(filter.include(Utf8Path::new("src"), &meta));
//! assert!(!filter.include(Utf8Path::new("web/node_modules"), &meta));
//! ```

use std::fs::Metadata;

use camino::Utf8Path;
use rustc_hash::FxHashSet;

use rw_core::WatchConfig;

/// A predicate selecting which directories an initial walk watches.
///
/// # Thread Safety
///
/// Filters must be [`Send`], [`Sync`] and `'static` because the walk runs on
/// tokio's blocking pool.
///
/// Any closure `Fn(&Utf8Path, &Metadata) -> bool` is a filter:
///
/// ```
/// use rw_watcher::DirFilter;
/// use camino::Utf8Path;
///
/// fn takes_filter<F: DirFilter>(_filter: F) {}
///
/// takes_filter(|path: &Utf8Path, _meta: &std::fs::Metadata| path.file_name() != Some(".git"));
/// ```
pub trait DirFilter: Send + Sync + 'static {
    /// Returns `true` to watch `path` and descend into it, `false` to skip
    /// it and everything beneath it.
    fn include(&self, path: &Utf8Path, metadata: &Metadata) -> bool;
}

impl<F> DirFilter for F
where
    F: Fn(&Utf8Path, &Metadata) -> bool + Send + Sync + 'static,
{
    #[inline]
    fn include(&self, path: &Utf8Path, metadata: &Metadata) -> bool {
        self(path, metadata)
    }
}

/// A filter that accepts every directory.
///
/// Use this for an unfiltered recursive add.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllDirs;

impl DirFilter for AcceptAllDirs {
    #[inline]
    fn include(&self, _path: &Utf8Path, _metadata: &Metadata) -> bool {
        true
    }
}

/// A filter that rejects directories by name.
///
/// Only the final path component is compared, so excluding `target` skips
/// every directory called `target` anywhere in the tree. A walk root given as
/// `.` has no final component and is never rejected.
///
/// # Examples
///
/// ```
/// use rw_watcher::{DirFilter, NameFilter};
/// use camino::Utf8Path;
///
/// let filter = NameFilter::new().exclude(".git").include_hidden(false);
/// let meta = std::fs::metadata(".").unwrap();
///
/// assert!(!filter.include(Utf8Path::new("repo/.git"), &meta));
/// assert!(!filter.include(Utf8Path::new("repo/.cache"), &meta));
/// assert!(filter.include(Utf8Path::new("repo/src"), &meta));
/// assert!(filter.include(Utf8Path::new("."), &meta));
/// ```
#[derive(Debug, Clone)]
pub struct NameFilter {
    excluded: FxHashSet<String>,
    include_hidden: bool,
}

impl NameFilter {
    /// Creates a filter that accepts everything until configured.
    #[must_use]
    pub fn new() -> Self {
        Self {
            excluded: FxHashSet::default(),
            include_hidden: true,
        }
    }

    /// Builds the filter described by a [`WatchConfig`].
    #[must_use]
    pub fn from_config(config: &WatchConfig) -> Self {
        config
            .exclude_dirs
            .iter()
            .fold(Self::new(), |filter, name| filter.exclude(name.as_str()))
            .include_hidden(config.include_hidden)
    }

    /// Adds a directory name to reject.
    #[must_use]
    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.excluded.insert(name.into());
        self
    }

    /// Configures whether hidden directories (leading `.`) are accepted.
    #[must_use]
    pub const fn include_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Returns `true` if no names are excluded and hidden directories pass.
    #[must_use]
    pub fn is_permissive(&self) -> bool {
        self.excluded.is_empty() && self.include_hidden
    }
}

impl Default for NameFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl DirFilter for NameFilter {
    fn include(&self, path: &Utf8Path, _metadata: &Metadata) -> bool {
        let Some(name) = path.file_name() else {
            return true;
        };

        if self.excluded.contains(name) {
            return false;
        }

        self.include_hidden || !name.starts_with('.')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> Metadata {
        std::fs::metadata(env!("CARGO_MANIFEST_DIR")).expect("Failed to read metadata")
    }

    #[test]
    fn test_accept_all_dirs() {
        let meta = meta();
        assert!(AcceptAllDirs.include(Utf8Path::new("."), &meta));
        assert!(AcceptAllDirs.include(Utf8Path::new(".git"), &meta));
    }

    #[test]
    fn test_closure_filter() {
        let meta = meta();
        let filter = |path: &Utf8Path, meta: &Metadata| meta.is_dir() && path != ".git";
        assert!(filter.include(Utf8Path::new("src"), &meta));
        assert!(!filter.include(Utf8Path::new(".git"), &meta));
    }

    #[test]
    fn test_name_filter_excludes_by_component() {
        let meta = meta();
        let filter = NameFilter::new().exclude("target");
        assert!(!filter.include(Utf8Path::new("target"), &meta));
        assert!(!filter.include(Utf8Path::new("crates/a/target"), &meta));
        assert!(filter.include(Utf8Path::new("crates/targets"), &meta));
    }

    #[test]
    fn test_name_filter_hidden() {
        let meta = meta();
        let filter = NameFilter::new().include_hidden(false);
        assert!(!filter.include(Utf8Path::new("a/.cache"), &meta));
        assert!(filter.include(Utf8Path::new("a/cache"), &meta));
        assert!(filter.include(Utf8Path::new("."), &meta));
    }

    #[test]
    fn test_name_filter_from_config() {
        let meta = meta();
        let config = WatchConfig {
            exclude_dirs: vec!["node_modules".to_owned(), ".git".to_owned()],
            include_hidden: true,
            ..WatchConfig::default()
        };
        let filter = NameFilter::from_config(&config);
        assert!(!filter.include(Utf8Path::new("web/node_modules"), &meta));
        assert!(!filter.include(Utf8Path::new("./.git"), &meta));
        assert!(filter.include(Utf8Path::new("./.github"), &meta));
        assert!(!filter.is_permissive());
    }

    #[test]
    fn test_name_filter_default_is_permissive() {
        assert!(NameFilter::default().is_permissive());
    }
}
