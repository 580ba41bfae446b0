//! Watch-set maintenance and the dispatch loop.
//!
//! The free functions here apply a whole-tree change to a backend's watch
//! set. [`Dispatcher`] is the background task that drains the raw feeds,
//! keeps the watch set in step with directories appearing and disappearing,
//! and forwards everything to the public channels.
//!
//! # Ordering
//!
//! For each raw event the watch set is updated *before* the event is
//! forwarded, so a consumer that sees a `CREATE` for a new directory can rely
//! on the directory (and everything already inside it) being watched.
//!
//! Between a directory appearing and its watch being registered there is a
//! window in which entries created inside it produce no events. Those entries
//! are still picked up by the walk if they exist by then, but their own
//! `CREATE` events are not synthesized.

use std::ops::ControlFlow;
use std::sync::Arc;

use camino::Utf8Path;
use smallvec::{SmallVec, smallvec};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::backend::{RawFeeds, WatchBackend};
use crate::error::WatchError;
use crate::events::{Event, Op};
use crate::filter::DirFilter;
use crate::walker::DirWalker;

/// Registers a watch for every directory under `root` that `filter` accepts.
///
/// Stops at the first walk or registration failure. Watches added before the
/// failure are left in place.
pub(crate) fn watch_tree<B: WatchBackend + ?Sized>(
    backend: &B,
    root: &Utf8Path,
    filter: Option<&dyn DirFilter>,
) -> Result<usize, WatchError> {
    let walker = match filter {
        Some(filter) => DirWalker::new(root).with_filter(filter),
        None => DirWalker::new(root),
    };

    let mut count = 0;
    for dir in walker {
        let dir = dir?;
        backend.add_watch(&dir)?;
        trace!(path = %dir, "Watch added");
        count += 1;
    }

    debug!(root = %root, count, "Directory tree watched");
    Ok(count)
}

/// Drops the watch of every directory currently under `root`.
///
/// Directories are enumerated by walking the tree as it exists now, so
/// directories that are already gone are not visited. Stops at the first
/// failure, including "no such watch".
pub(crate) fn unwatch_tree<B: WatchBackend + ?Sized>(
    backend: &B,
    root: &Utf8Path,
) -> Result<usize, WatchError> {
    let mut count = 0;
    for dir in DirWalker::new(root) {
        let dir = dir?;
        backend.remove_watch(&dir)?;
        trace!(path = %dir, "Watch removed");
        count += 1;
    }

    debug!(root = %root, count, "Directory tree unwatched");
    Ok(count)
}

/// Applies one event's effect on the watch set.
///
/// Returns the failures the consumer should hear about. Benign races (a new
/// directory that vanished before it could be walked, a removed path that was
/// never watched) are absorbed.
fn sync_watch_set<B: WatchBackend + ?Sized>(
    backend: &B,
    event: &Event,
) -> SmallVec<[WatchError; 2]> {
    let mut failures = SmallVec::new();

    if event.has(Op::CREATE) && event.path.is_dir() {
        match watch_tree(backend, &event.path, None) {
            Ok(count) => debug!(path = %event.path, count, "Watching new directory"),
            Err(err) if err.is_path_missing() => {
                trace!(path = %event.path, "New directory vanished before it was watched");
            }
            Err(err) => {
                warn!(path = %event.path, error = %err, "Failed to watch new directory");
                failures.push(err);
            }
        }
    }

    if event.has(Op::REMOVE) {
        match backend.remove_watch(&event.path) {
            Ok(()) => debug!(path = %event.path, "Dropped watch of removed directory"),
            Err(err) if err.is_watch_not_found() => {
                trace!(path = %event.path, "Removed path was not watched");
            }
            Err(err) => {
                warn!(path = %event.path, error = %err, "Failed to drop watch");
                failures.push(err);
            }
        }
    }

    failures
}

/// The output side of the dispatch loop.
///
/// Kept apart from [`RawFeeds`] so the loop can await on the feeds and hand
/// a shared borrow of this half to the event handlers.
struct Relay<B: WatchBackend> {
    backend: Arc<B>,
    event_tx: mpsc::Sender<Event>,
    error_tx: mpsc::Sender<WatchError>,
    done: CancellationToken,
}

impl<B: WatchBackend> Relay<B> {
    async fn handle_event(&self, event: Event) -> ControlFlow<()> {
        trace!(event = %event, "Raw event");

        if event.has(Op::CREATE | Op::REMOVE) {
            let backend = Arc::clone(&self.backend);
            let raw = event.clone();
            let failures =
                match tokio::task::spawn_blocking(move || sync_watch_set(&*backend, &raw)).await {
                    Ok(failures) => failures,
                    Err(err) => smallvec![WatchError::Join(err)],
                };

            for failure in failures {
                if self.forward(&self.error_tx, failure).await.is_break() {
                    return ControlFlow::Break(());
                }
            }
        }

        self.forward(&self.event_tx, event).await
    }

    async fn handle_error(&self, error: WatchError) -> ControlFlow<()> {
        debug!(error = %error, "Raw error");
        self.forward(&self.error_tx, error).await
    }

    /// Sends `item` unless the watcher is closed first.
    ///
    /// A full channel blocks here; cancellation wins over a pending send.
    async fn forward<T: Send>(&self, tx: &mpsc::Sender<T>, item: T) -> ControlFlow<()> {
        tokio::select! {
            result = tx.send(item) => {
                if result.is_err() {
                    debug!("Receiver dropped, stopping dispatch");
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }
            () = self.done.cancelled() => ControlFlow::Break(()),
        }
    }
}

/// The background task behind a [`RecursiveWatcher`](crate::RecursiveWatcher).
///
/// Runs until the watcher is closed, a raw feed ends, or both public
/// receivers are gone. On exit it closes the backend and drops the public
/// senders, which ends both streams.
pub(crate) struct Dispatcher<B: WatchBackend> {
    feeds: RawFeeds,
    relay: Relay<B>,
}

impl<B: WatchBackend> Dispatcher<B> {
    pub(crate) fn new(
        backend: Arc<B>,
        feeds: RawFeeds,
        event_tx: mpsc::Sender<Event>,
        error_tx: mpsc::Sender<WatchError>,
        done: CancellationToken,
    ) -> Self {
        Self {
            feeds,
            relay: Relay {
                backend,
                event_tx,
                error_tx,
                done,
            },
        }
    }

    pub(crate) async fn run(mut self) {
        debug!("Dispatch loop started");

        loop {
            let flow = tokio::select! {
                event = self.feeds.events.recv() => match event {
                    Some(event) => self.relay.handle_event(event).await,
                    None => {
                        debug!("Raw event feed ended");
                        ControlFlow::Break(())
                    }
                },
                error = self.feeds.errors.recv() => match error {
                    Some(error) => self.relay.handle_error(error).await,
                    None => {
                        debug!("Raw error feed ended");
                        ControlFlow::Break(())
                    }
                },
                () = self.relay.done.cancelled() => ControlFlow::Break(()),
            };

            if flow.is_break() {
                break;
            }
        }

        self.teardown();
    }

    fn teardown(self) {
        self.relay.done.cancel();
        if let Err(err) = self.relay.backend.close() {
            warn!(error = %err, "Failed to close watch primitive");
        }
        info!("Recursive watcher stopped");
    }
}
