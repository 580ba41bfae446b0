//! In-memory [`WatchBackend`] and tree fixtures for unit tests.

use std::collections::{BTreeSet, HashSet};
use std::io;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::backend::{FeedSenders, RawFeeds, WatchBackend};
use crate::error::WatchError;

#[derive(Debug, Default)]
struct FakeState {
    watches: BTreeSet<Utf8PathBuf>,
    removed: Vec<Utf8PathBuf>,
    fail_add: HashSet<Utf8PathBuf>,
    fail_remove: HashSet<Utf8PathBuf>,
    closed: bool,
    close_calls: usize,
}

/// A backend that records its watch set instead of touching the OS.
///
/// Clones share state, so a test can keep a handle while the watcher owns
/// another.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Creates a backend plus the feeds a watcher would receive from it.
    pub(crate) fn with_feeds() -> (Self, FeedSenders, RawFeeds) {
        let (senders, feeds) = RawFeeds::channel();
        (Self::new(), senders, feeds)
    }

    pub(crate) fn fail_add_on(&self, path: impl Into<Utf8PathBuf>) {
        self.state.lock().fail_add.insert(path.into());
    }

    pub(crate) fn fail_remove_on(&self, path: impl Into<Utf8PathBuf>) {
        self.state.lock().fail_remove.insert(path.into());
    }

    pub(crate) fn watched(&self) -> Vec<Utf8PathBuf> {
        self.state.lock().watches.iter().cloned().collect()
    }

    /// The watch set relative to `root`, sorted; the root itself is `""`.
    pub(crate) fn watched_relative(&self, root: &Utf8Path) -> Vec<String> {
        self.state
            .lock()
            .watches
            .iter()
            .filter_map(|p| p.strip_prefix(root).ok())
            .map(ToString::to_string)
            .collect()
    }

    pub(crate) fn is_watched(&self, path: &Utf8Path) -> bool {
        self.state.lock().watches.contains(path)
    }

    /// Every path `remove_watch` was called with, in call order.
    pub(crate) fn removed(&self) -> Vec<String> {
        self.state
            .lock()
            .removed
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.state.lock().close_calls
    }
}

impl WatchBackend for FakeBackend {
    fn add_watch(&self, path: &Utf8Path) -> Result<(), WatchError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(WatchError::Closed);
        }
        if state.fail_add.contains(path) {
            return Err(io::Error::other(format!("injected add failure for {path}")).into());
        }
        state.watches.insert(path.to_owned());
        Ok(())
    }

    fn remove_watch(&self, path: &Utf8Path) -> Result<(), WatchError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(WatchError::Closed);
        }
        state.removed.push(path.to_owned());
        if state.fail_remove.contains(path) {
            return Err(io::Error::other(format!("injected remove failure for {path}")).into());
        }
        if state.watches.remove(path) {
            Ok(())
        } else {
            Err(WatchError::watch_not_found(path))
        }
    }

    fn close(&self) -> Result<(), WatchError> {
        let mut state = self.state.lock();
        state.closed = true;
        state.close_calls += 1;
        state.watches.clear();
        Ok(())
    }
}

/// Creates a temporary directory containing `dirs` (relative, `/`-separated).
///
/// Returns the guard and the root as a UTF-8 path.
pub(crate) fn tree(dirs: &[&str]) -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let root =
        Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf()).expect("UTF-8 temp dir path");
    for dir in dirs {
        std::fs::create_dir_all(root.join(dir)).expect("Failed to create directory");
    }
    (temp_dir, root)
}
