//! Recursive directory watching on top of a non-recursive watch primitive.
//!
//! This crate watches whole directory trees using only single-directory
//! watches from the `notify` crate, bridged to an async tokio context.
//!
//! # Overview
//!
//! The rw-watcher crate is designed to:
//!
//! - Register one non-recursive watch per directory of a tree, optionally
//!   skipping subtrees via a [`DirFilter`]
//! - Watch directories as they are created, before their `CREATE` event is
//!   delivered
//! - Drop the watch of a directory when it is removed
//! - Stream change events and asynchronous errors on two separate channels
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    notify thread                                │
//! │  ┌──────────────────┐    ┌────────────────┐                     │
//! │  │ RecommendedWatcher│ -> │ FeedSenders    │ -> RawFeeds         │
//! │  │ (non-recursive)  │    │ (Event::from_  │    (unbounded)      │
//! │  │                  │    │  notify)       │                     │
//! │  └──────────────────┘    └────────────────┘                     │
//! └──────────────────────────────────────────────┬──────────────────┘
//!                                                │
//!                                                ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Async Runtime (tokio)                        │
//! │  ┌──────────────────┐    ┌────────────────┐                     │
//! │  │ dispatch task    │ -> │ mpsc::Receiver │ -> consumer         │
//! │  │ (watch-set sync, │    │ (events and    │                     │
//! │  │  spawn_blocking) │    │  errors)       │                     │
//! │  └──────────────────┘    └────────────────┘                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Crate Dependencies
//!
//! ```text
//! rw-cli ──► rw-watcher ──► rw-core
//! ```
//!
//! # Usage
//!
//! ## Watching a Tree
//!
//! ```no_run
//! use rw_watcher::{NameFilter, RecursiveWatcher};
//! use rw_core::WatchConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WatchConfig::default();
//!     let mut watcher = RecursiveWatcher::from_config(&config).await?;
//!
//!     // Skips `.git` and everything beneath it
//!     watcher
//!         .add_recursive("./project", NameFilter::from_config(&config))
//!         .await?;
//!
//!     while let Some(event) = watcher.recv_event().await {
//!         println!("{event}");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Draining Both Streams
//!
//! The dispatch task blocks while either stream is full, so consumers that
//! care about errors should read both:
//!
//! ```no_run
//! use rw_watcher::{AcceptAllDirs, Op, RecursiveWatcher};
//!
//! # async fn example() -> Result<(), rw_watcher::WatchError> {
//! let mut watcher = RecursiveWatcher::with_capacity(64).await?;
//! watcher.add_recursive("./src", AcceptAllDirs).await?;
//!
//! loop {
//!     let (events, errors) = watcher.streams();
//!     tokio::select! {
//!         Some(event) = events.recv() => {
//!             if event.has(Op::CREATE | Op::WRITE) {
//!                 println!("changed: {}", event.path);
//!             }
//!         }
//!         Some(err) = errors.recv() => eprintln!("watch error: {err}"),
//!         else => break,
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Filtering
//!
//! ```
//! use rw_watcher::DirFilter;
//! use camino::Utf8Path;
//! use std::fs::Metadata;
//!
//! // Skip build output and read-only directories
//! struct SourceDirs;
//!
//! impl DirFilter for SourceDirs {
//!     fn include(&self, path: &Utf8Path, metadata: &Metadata) -> bool {
//!         path.file_name() != Some("target") && !metadata.permissions().readonly()
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! The crate uses [`WatchError`] for all error cases:
//!
//! ```
//! use rw_watcher::WatchError;
//!
//! fn handle_watch_error(err: WatchError) {
//!     if err.is_fatal() {
//!         eprintln!("Fatal watcher error: {}", err);
//!     } else {
//!         eprintln!("Warning: {}", err);
//!     }
//! }
//! ```
//!
//! # Known Limitation
//!
//! A directory's watch is registered only after its `CREATE` event arrives.
//! Files created inside it during that window produce no events of their own;
//! subdirectories created in the window are still found by the walk.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod events;
pub mod filter;
mod manager;
#[cfg(test)]
mod testing;
pub mod walker;
pub mod watcher;

// Re-export error types
pub use error::WatchError;

// Re-export event types
pub use events::{Event, Op};

// Re-export filter types
pub use filter::{AcceptAllDirs, DirFilter, NameFilter};

// Re-export primitive types
pub use backend::{FeedSenders, NotifyBackend, RawFeeds, WatchBackend};

// Re-export watcher types
pub use walker::DirWalker;
pub use watcher::{RecursiveWatcher, UNBUFFERED_CAPACITY};
