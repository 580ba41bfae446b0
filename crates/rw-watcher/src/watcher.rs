//! Recursive directory watching with async event streaming.
//!
//! This module provides the [`RecursiveWatcher`] type, which turns a
//! single-directory watch primitive into a watcher for whole directory trees.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    notify thread                                │
//! │  ┌──────────────────┐    ┌────────────────┐                     │
//! │  │ RecommendedWatcher│ -> │ FeedSenders    │ -> raw feeds        │
//! │  │ (non-recursive)  │    │ (translation)  │    (unbounded)      │
//! │  └──────────────────┘    └────────────────┘                     │
//! └──────────────────────────────────────────────┬──────────────────┘
//!                                                │
//!                                                ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Async Runtime (tokio)                        │
//! │  ┌──────────────────┐    ┌────────────────┐                     │
//! │  │ Dispatcher task  │ -> │ mpsc::Receiver │ -> consumer         │
//! │  │ (watch-set sync) │    │ (events/errors)│                     │
//! │  └──────────────────┘    └────────────────┘                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use rw_watcher::{NameFilter, RecursiveWatcher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut watcher = RecursiveWatcher::with_capacity(64).await?;
//!     watcher
//!         .add_recursive("./project", NameFilter::new().exclude(".git"))
//!         .await?;
//!
//!     loop {
//!         let (events, errors) = watcher.streams();
//!         tokio::select! {
//!             Some(event) = events.recv() => println!("{event}"),
//!             Some(err) = errors.recv() => eprintln!("error: {err}"),
//!             else => break,
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use rw_core::WatchConfig;

use crate::backend::{NotifyBackend, RawFeeds, WatchBackend};
use crate::error::WatchError;
use crate::events::Event;
use crate::filter::DirFilter;
use crate::manager::{Dispatcher, unwatch_tree, watch_tree};

/// Channel capacity used for an "unbuffered" watcher.
///
/// tokio channels cannot have zero capacity; with one slot the dispatch loop
/// runs at most one event ahead of the consumer.
pub const UNBUFFERED_CAPACITY: usize = 1;

/// A watcher for whole directory trees.
///
/// `RecursiveWatcher` owns a non-recursive watch primitive (a
/// [`WatchBackend`]) and a background dispatch task. Every directory added
/// with [`add_recursive`](Self::add_recursive) gets its own watch; the task
/// then watches directories as they are created and drops watches for paths
/// that are removed.
///
/// # Lifecycle
///
/// 1. **Creation**: a constructor creates the primitive and spawns the
///    dispatch task. Nothing is watched yet.
///
/// 2. **Registration**: [`add`](Self::add), [`add_recursive`](Self::add_recursive),
///    [`remove`](Self::remove) and [`remove_recursive`](Self::remove_recursive)
///    change the watch set. Their errors are returned directly.
///
/// 3. **Reception**: events and asynchronous errors arrive on two separate
///    streams. Consumers must drain both; a full stream stalls the other.
///
/// 4. **Shutdown**: [`close`](Self::close) signals the task, which closes the
///    primitive and ends both streams. [`shutdown`](Self::shutdown) also
///    waits for it. Dropping the watcher closes it.
///
/// # Known Limitation
///
/// Entries created inside a new directory before its watch is registered do
/// not produce their own `CREATE` events. Subdirectories among them are still
/// watched.
///
/// # Examples
///
/// ```no_run
/// use rw_watcher::{AcceptAllDirs, RecursiveWatcher};
///
/// # async fn example() -> Result<(), rw_watcher::WatchError> {
/// let mut watcher = RecursiveWatcher::new().await?;
/// watcher.add_recursive("./src", AcceptAllDirs).await?;
///
/// while let Some(event) = watcher.recv_event().await {
///     println!("{event}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct RecursiveWatcher<B: WatchBackend = NotifyBackend> {
    /// The watch primitive, shared with the dispatch task.
    backend: Arc<B>,

    /// Cancelled once the watcher is closed.
    ///
    /// The dispatch task also cancels it when it stops on its own, so
    /// [`is_closed`](Self::is_closed) reflects both.
    done: CancellationToken,

    /// Handle to the dispatch task.
    ///
    /// Used to await completion during shutdown.
    task_handle: Option<JoinHandle<()>>,

    event_rx: mpsc::Receiver<Event>,
    error_rx: mpsc::Receiver<WatchError>,
}

impl<B: WatchBackend> std::fmt::Debug for RecursiveWatcher<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecursiveWatcher")
            .field("is_closed", &self.is_closed())
            .field("capacity", &self.event_rx.max_capacity())
            .finish_non_exhaustive()
    }
}

impl RecursiveWatcher<NotifyBackend> {
    /// Creates an unbuffered watcher over the platform's notify backend.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::PrimitiveInit`] if the OS watcher cannot be
    /// created.
    pub async fn new() -> Result<Self, WatchError> {
        Self::with_capacity(UNBUFFERED_CAPACITY).await
    }

    /// Creates a watcher whose streams buffer up to `capacity` items each.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::InvalidCapacity`] if `capacity` is zero, or
    /// [`WatchError::PrimitiveInit`] if the OS watcher cannot be created.
    pub async fn with_capacity(capacity: usize) -> Result<Self, WatchError> {
        if capacity == 0 {
            return Err(WatchError::InvalidCapacity(capacity));
        }

        let (backend, feeds) = NotifyBackend::new()?;
        Self::with_backend(backend, feeds, capacity).await
    }

    /// Creates a watcher sized by a [`WatchConfig`].
    ///
    /// An `event_buffer` of zero gives an unbuffered watcher. The config's
    /// directory filter is not applied here; pass
    /// [`NameFilter::from_config`](crate::NameFilter::from_config) to
    /// [`add_recursive`](Self::add_recursive).
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::PrimitiveInit`] if the OS watcher cannot be
    /// created.
    pub async fn from_config(config: &WatchConfig) -> Result<Self, WatchError> {
        let capacity = if config.is_buffered() {
            config.event_buffer
        } else {
            UNBUFFERED_CAPACITY
        };
        Self::with_capacity(capacity).await
    }
}

impl<B: WatchBackend> RecursiveWatcher<B> {
    /// Creates a watcher over any [`WatchBackend`].
    ///
    /// `feeds` must be the feeds produced alongside `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::InvalidCapacity`] if `capacity` is zero.
    #[allow(clippy::unused_async)] // Async for API consistency with shutdown()
    pub async fn with_backend(
        backend: B,
        feeds: RawFeeds,
        capacity: usize,
    ) -> Result<Self, WatchError> {
        if capacity == 0 {
            return Err(WatchError::InvalidCapacity(capacity));
        }

        let backend = Arc::new(backend);
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let (error_tx, error_rx) = mpsc::channel(capacity);
        let done = CancellationToken::new();

        let dispatcher = Dispatcher::new(
            Arc::clone(&backend),
            feeds,
            event_tx,
            error_tx,
            done.clone(),
        );
        let task_handle = tokio::spawn(dispatcher.run());

        tracing::info!(capacity, "Recursive watcher started");

        Ok(Self {
            backend,
            done,
            task_handle: Some(task_handle),
            event_rx,
            error_rx,
        })
    }

    /// Watches a single directory, non-recursively.
    ///
    /// Directories created inside it later are still picked up by the
    /// dispatch loop.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Closed`] after [`close`](Self::close), or the
    /// primitive's error.
    pub fn add(&self, path: impl AsRef<Utf8Path>) -> Result<(), WatchError> {
        self.ensure_open()?;
        let path = path.as_ref();
        self.backend.add_watch(path)?;
        tracing::debug!(path = %path, "Watch added");
        Ok(())
    }

    /// Watches `root` and every directory beneath it that `filter` accepts.
    ///
    /// The filter also applies to `root` itself. A rejected directory is not
    /// watched and nothing beneath it is visited. Returns the number of
    /// watches added.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Closed`] after [`close`](Self::close). Otherwise
    /// stops at the first walk or primitive failure and returns it; watches
    /// added before the failure stay in place.
    pub async fn add_recursive<F: DirFilter>(
        &self,
        root: impl AsRef<Utf8Path>,
        filter: F,
    ) -> Result<usize, WatchError> {
        self.ensure_open()?;
        let root = root.as_ref().to_owned();
        let backend = Arc::clone(&self.backend);

        tokio::task::spawn_blocking(move || {
            let filter: &dyn DirFilter = &filter;
            watch_tree(&*backend, &root, Some(filter))
        })
        .await?
    }

    /// Stops watching a single path.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Closed`] after [`close`](Self::close),
    /// [`WatchError::WatchNotFound`] if the path is not watched, or the
    /// primitive's error.
    pub fn remove(&self, path: impl AsRef<Utf8Path>) -> Result<(), WatchError> {
        self.ensure_open()?;
        let path = path.as_ref();
        self.backend.remove_watch(path)?;
        tracing::debug!(path = %path, "Watch removed");
        Ok(())
    }

    /// Stops watching `root` and every directory currently beneath it.
    ///
    /// Returns the number of watches removed.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Closed`] after [`close`](Self::close). Otherwise
    /// stops at the first failure, including [`WatchError::WatchNotFound`]
    /// for a directory that was never watched (for example one an earlier
    /// filter rejected); watches removed before the failure stay removed.
    pub async fn remove_recursive(&self, root: impl AsRef<Utf8Path>) -> Result<usize, WatchError> {
        self.ensure_open()?;
        let root: Utf8PathBuf = root.as_ref().to_owned();
        let backend = Arc::clone(&self.backend);

        tokio::task::spawn_blocking(move || unwatch_tree(&*backend, &root)).await?
    }

    /// Signals the watcher to stop.
    ///
    /// Returns immediately; the dispatch task closes the primitive and ends
    /// both streams shortly after. Calling it again does nothing.
    pub fn close(&self) {
        if self.done.is_cancelled() {
            return;
        }
        self.done.cancel();
        tracing::info!("Recursive watcher closing");
    }

    /// Returns `true` once the watcher is closed or its dispatch task has
    /// stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Closes the watcher and waits for the dispatch task to finish.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Join`] if the dispatch task panicked.
    pub async fn shutdown(mut self) -> Result<(), WatchError> {
        self.close();

        if let Some(handle) = self.task_handle.take() {
            handle.await?;
        }

        Ok(())
    }

    /// Receives the next change event.
    ///
    /// Returns `None` once the watcher is closed and buffered events are
    /// drained.
    pub async fn recv_event(&mut self) -> Option<Event> {
        self.event_rx.recv().await
    }

    /// Receives the next asynchronous error.
    ///
    /// Returns `None` once the watcher is closed and buffered errors are
    /// drained.
    pub async fn recv_error(&mut self) -> Option<WatchError> {
        self.error_rx.recv().await
    }

    /// Tries to receive a change event without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`TryRecvError::Empty`](mpsc::error::TryRecvError::Empty) if no
    /// event is ready, or
    /// [`TryRecvError::Disconnected`](mpsc::error::TryRecvError::Disconnected)
    /// once the stream has ended.
    pub fn try_recv_event(&mut self) -> Result<Event, mpsc::error::TryRecvError> {
        self.event_rx.try_recv()
    }

    /// Tries to receive an asynchronous error without waiting.
    ///
    /// # Errors
    ///
    /// Same as [`try_recv_event`](Self::try_recv_event).
    pub fn try_recv_error(&mut self) -> Result<WatchError, mpsc::error::TryRecvError> {
        self.error_rx.try_recv()
    }

    /// Returns both receivers, for use with `tokio::select!`.
    pub fn streams(&mut self) -> (&mut mpsc::Receiver<Event>, &mut mpsc::Receiver<WatchError>) {
        (&mut self.event_rx, &mut self.error_rx)
    }

    fn ensure_open(&self) -> Result<(), WatchError> {
        if self.is_closed() {
            Err(WatchError::Closed)
        } else {
            Ok(())
        }
    }
}

impl<B: WatchBackend> Drop for RecursiveWatcher<B> {
    fn drop(&mut self) {
        // The task notices the cancellation and tears down on its own.
        self.done.cancel();
    }
}
