//! The single-directory watch primitive the recursive watcher is built on.
//!
//! [`WatchBackend`] is the capability the dispatch loop depends on: register
//! or drop a non-recursive watch for one path, and shut down. Change events
//! and errors arrive on the two unbounded [`RawFeeds`] handed out when the
//! backend is created.
//!
//! [`NotifyBackend`] is the production implementation over
//! [`notify::RecommendedWatcher`] in [`RecursiveMode::NonRecursive`].
//!
//! # Feed Design
//!
//! The feeds are unbounded. notify's event thread must never block on a full
//! channel while the dispatch task sits inside `add_watch` waiting for that
//! same thread to acknowledge the watch.

use std::io;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tokio::sync::mpsc;

use crate::error::WatchError;
use crate::events::{Event, Op};

/// A non-recursive, single-path watch facility.
///
/// Implementations synchronize internally: the dispatch task and the
/// caller's own `add*`/`remove*` calls may invoke these methods concurrently.
pub trait WatchBackend: Send + Sync + 'static {
    /// Starts watching `path` (non-recursively).
    fn add_watch(&self, path: &Utf8Path) -> Result<(), WatchError>;

    /// Stops watching `path`.
    ///
    /// Must return [`WatchError::WatchNotFound`] when no watch exists for
    /// `path`, so callers can tell that benign race apart from real failures.
    fn remove_watch(&self, path: &Utf8Path) -> Result<(), WatchError>;

    /// Releases all watches. Later calls to any method fail with
    /// [`WatchError::Closed`]; closing twice is not an error.
    fn close(&self) -> Result<(), WatchError>;
}

/// The receiving ends of a backend's event and error feeds.
#[derive(Debug)]
pub struct RawFeeds {
    /// Translated change events, in delivery order.
    pub events: mpsc::UnboundedReceiver<Event>,
    /// Errors reported by the primitive itself.
    pub errors: mpsc::UnboundedReceiver<WatchError>,
}

impl RawFeeds {
    /// Creates a connected pair of feed senders and [`RawFeeds`].
    #[must_use]
    pub fn channel() -> (FeedSenders, Self) {
        let (event_tx, events) = mpsc::unbounded_channel();
        let (error_tx, errors) = mpsc::unbounded_channel();
        (
            FeedSenders {
                events: event_tx,
                errors: error_tx,
            },
            Self { events, errors },
        )
    }
}

/// The sending ends of a backend's feeds.
#[derive(Debug, Clone)]
pub struct FeedSenders {
    /// Sender for change events.
    pub events: mpsc::UnboundedSender<Event>,
    /// Sender for primitive errors.
    pub errors: mpsc::UnboundedSender<WatchError>,
}

impl FeedSenders {
    /// Translates and publishes one notify callback result.
    ///
    /// On Linux, the second report of a watched path's deletion is dropped
    /// (see [`WatchedPaths`]). Send failures mean the dispatch loop has
    /// already gone away and are ignored.
    fn publish(&self, result: notify::Result<notify::Event>, watched: &WatchedPaths) {
        match result {
            Ok(event) => {
                for item in Event::from_notify(event) {
                    match item {
                        Ok(event) => {
                            if cfg!(target_os = "linux")
                                && event.op == Op::REMOVE
                                && watched.is_repeated_removal(&event.path)
                            {
                                tracing::trace!(path = %event.path, "Dropping repeated removal");
                                continue;
                            }
                            let _ = self.events.send(event);
                        }
                        Err(err) => {
                            let _ = self.errors.send(err);
                        }
                    }
                }
            }
            Err(err) => {
                let _ = self.errors.send(WatchError::Notify(err));
            }
        }
    }
}

/// Paths currently registered with the OS watcher.
///
/// inotify reports the deletion of a watched path twice when its parent is
/// watched too: `IN_DELETE` on the parent's watch and `IN_DELETE_SELF` on the
/// path's own. notify forwards both with the same kind, so the first one is
/// published and the second is recognized by the path alone.
#[derive(Debug, Default)]
struct WatchedPaths {
    inner: Mutex<WatchedPathsInner>,
}

#[derive(Debug, Default)]
struct WatchedPathsInner {
    watched: FxHashSet<Utf8PathBuf>,
    /// Deleted paths whose second report is still to come.
    pending: FxHashSet<Utf8PathBuf>,
}

impl WatchedPaths {
    fn insert(&self, path: &Utf8Path) {
        self.inner.lock().watched.insert(path.to_owned());
    }

    fn remove(&self, path: &Utf8Path) {
        self.inner.lock().watched.remove(path);
    }

    fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.watched.clear();
        inner.pending.clear();
    }

    /// Records a removal of `path`, returning `true` if it repeats one
    /// already published.
    fn is_repeated_removal(&self, path: &Utf8Path) -> bool {
        let mut inner = self.inner.lock();
        if inner.pending.remove(path) {
            return true;
        }

        let parent_watched = path.parent().is_some_and(|p| inner.watched.contains(p));
        if inner.watched.remove(path) && parent_watched {
            inner.pending.insert(path.to_owned());
        }
        false
    }
}

/// [`WatchBackend`] over the platform's recommended notify watcher.
///
/// The watcher lives behind a mutex because notify's `watch`/`unwatch` take
/// `&mut self`. Closing drops it, which stops notify's event thread and ends
/// both feeds.
pub struct NotifyBackend {
    watcher: Mutex<Option<RecommendedWatcher>>,
    watched: Arc<WatchedPaths>,
}

impl std::fmt::Debug for NotifyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyBackend")
            .field("open", &self.watcher.lock().is_some())
            .finish()
    }
}

impl NotifyBackend {
    /// Creates the OS watcher and its feeds.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::PrimitiveInit`] if the OS watcher cannot be
    /// created (for example when inotify instances are exhausted).
    pub fn new() -> Result<(Self, RawFeeds), WatchError> {
        let (senders, feeds) = RawFeeds::channel();
        let watched = Arc::new(WatchedPaths::default());

        let callback_watched = Arc::clone(&watched);
        let watcher =
            notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
                senders.publish(result, &callback_watched);
            })
            .map_err(WatchError::PrimitiveInit)?;

        tracing::debug!("Watch primitive created");

        Ok((
            Self {
                watcher: Mutex::new(Some(watcher)),
                watched,
            },
            feeds,
        ))
    }
}

impl WatchBackend for NotifyBackend {
    fn add_watch(&self, path: &Utf8Path) -> Result<(), WatchError> {
        let mut guard = self.watcher.lock();
        let watcher = guard.as_mut().ok_or(WatchError::Closed)?;
        watcher
            .watch(path.as_std_path(), RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::from_notify(e, path))?;
        self.watched.insert(path);
        Ok(())
    }

    fn remove_watch(&self, path: &Utf8Path) -> Result<(), WatchError> {
        let mut guard = self.watcher.lock();
        let watcher = guard.as_mut().ok_or(WatchError::Closed)?;
        self.watched.remove(path);
        watcher.unwatch(path.as_std_path()).map_err(|e| match e.kind {
            // Linux: inotify_rm_watch returns EINVAL once the kernel has
            // already dropped the watch of a deleted directory.
            notify::ErrorKind::Io(ref source)
                if cfg!(target_os = "linux") && source.kind() == io::ErrorKind::InvalidInput =>
            {
                WatchError::watch_not_found(path)
            }
            _ => WatchError::from_notify(e, path),
        })
    }

    fn close(&self) -> Result<(), WatchError> {
        // Release the lock before shutting notify down.
        let watcher = self.watcher.lock().take();
        drop(watcher);
        self.watched.clear();
        Ok(())
    }
}
