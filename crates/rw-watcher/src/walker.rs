//! Directory-tree traversal for recursive watch registration.
//!
//! [`DirWalker`] lazily yields every directory under a root, depth-first and
//! pre-order, with the root first. Non-directory entries are skipped and
//! symbolic links are not followed (a symlinked root is). A fresh walker is
//! built for every recursive add or remove, so each request sees the tree as
//! it exists at that moment.
//!
//! # Examples
//!
//! ```no_run
//! use rw_watcher::{DirWalker, NameFilter};
//! use camino::Utf8Path;
//!
//! # fn example() -> Result<(), rw_watcher::WatchError> {
//! let filter = NameFilter::new().exclude(".git");
//! for dir in DirWalker::new(Utf8Path::new(".")).with_filter(&filter) {
//!     println!("would watch {}", dir?);
//! }
//! # Ok(())
//! # }
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use walkdir::WalkDir;

use crate::error::WatchError;
use crate::filter::DirFilter;

/// A lazy, pre-order iterator over the directories of a tree.
///
/// Yields `Err` and keeps going if an entry cannot be read; callers that want
/// the "fail on first error" behavior stop at the first `Err`, which is what
/// `collect::<Result<Vec<_>, _>>()` and `?` do.
pub struct DirWalker<'f> {
    root: Utf8PathBuf,
    iter: walkdir::IntoIter,
    filter: Option<&'f dyn DirFilter>,
}

impl std::fmt::Debug for DirWalker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirWalker")
            .field("root", &self.root)
            .field("filtered", &self.filter.is_some())
            .finish_non_exhaustive()
    }
}

impl<'f> DirWalker<'f> {
    /// Creates an unfiltered walker rooted at `root`.
    ///
    /// No I/O happens until the first call to [`Iterator::next`].
    #[must_use]
    pub fn new(root: &Utf8Path) -> Self {
        Self {
            root: root.to_owned(),
            iter: WalkDir::new(root).follow_links(false).into_iter(),
            filter: None,
        }
    }

    /// Applies `filter` to every directory, the root included.
    ///
    /// A rejected directory is not yielded and is never descended into.
    #[must_use]
    pub fn with_filter(mut self, filter: &'f dyn DirFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Returns the root directory being walked.
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }
}

impl Iterator for DirWalker<'_> {
    type Item = Result<Utf8PathBuf, WatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.iter.next()? {
                Ok(entry) => entry,
                Err(err) => return Some(Err(err.into())),
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            let Some(path) = Utf8Path::from_path(entry.path()) else {
                return Some(Err(WatchError::non_utf8_path(entry.path())));
            };

            if let Some(filter) = self.filter {
                let metadata = match entry.metadata() {
                    Ok(metadata) => metadata,
                    Err(err) => return Some(Err(err.into())),
                };
                if !filter.include(path, &metadata) {
                    tracing::trace!(path = %path, "Directory excluded by filter");
                    self.iter.skip_current_dir();
                    continue;
                }
            }

            return Some(Ok(path.to_owned()));
        }
    }
}
