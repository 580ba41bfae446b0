//! Error types for the rw-watcher crate.
//!
//! This module provides the [`WatchError`] type for errors that can occur
//! while constructing a watcher, walking directory trees, and registering or
//! removing watches.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};

/// Errors that can occur during recursive watching.
///
/// Errors from calls the caller made directly (`add`, `add_recursive`,
/// `remove`, `remove_recursive`) are returned synchronously. Failures that
/// happen inside the dispatch loop are delivered on the watcher's error stream.
///
/// # Error Recovery Strategy
///
/// - **Primitive init** ([`WatchError::PrimitiveInit`]): Fatal - no watcher is produced
/// - **Closed** ([`WatchError::Closed`]): Recoverable - the caller simply stops
/// - **Walk** ([`WatchError::Walk`]): Recoverable - partial effects stay in place
/// - **Watch not found** ([`WatchError::WatchNotFound`]): Recoverable - absorbed during
///   remove-event handling, surfaced from explicit `remove`
/// - **Non-UTF-8 path** ([`WatchError::NonUtf8Path`]): Recoverable - the event is skipped
/// - **Everything else**: Fatal - propagate immediately
///
/// # Examples
///
/// ```
/// use rw_watcher::WatchError;
///
/// fn handle_error(err: WatchError) {
///     match err {
///         WatchError::Closed => eprintln!("watcher closed"),
///         WatchError::WatchNotFound(p) => eprintln!("not watched: {p}"),
///         other if other.is_fatal() => eprintln!("fatal: {other}"),
///         other => eprintln!("warning: {other}"),
///     }
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The underlying watch primitive could not be created.
    ///
    /// Typically caused by exhausting OS watch handles.
    #[error("failed to initialize watch primitive: {0}")]
    PrimitiveInit(#[source] notify::Error),

    /// The operation was attempted after the watcher was closed.
    #[error("watcher already closed")]
    Closed,

    /// Traversing a directory tree failed partway.
    ///
    /// Watches registered or removed before the failure are not rolled back.
    #[error("failed to walk directory tree: {0}")]
    Walk(#[from] walkdir::Error),

    /// No watch is registered for the path.
    #[error("no watch registered for {0}")]
    WatchNotFound(Utf8PathBuf),

    /// An error reported by the watch primitive.
    #[error("watch primitive error: {0}")]
    Notify(#[from] notify::Error),

    /// A path is not valid UTF-8.
    #[error("path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(std::path::PathBuf),

    /// The requested event channel capacity is zero.
    #[error("event buffer capacity must be positive, got {0}")]
    InvalidCapacity(usize),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A background task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl WatchError {
    /// Creates a new [`WatchError::WatchNotFound`] error.
    #[inline]
    pub fn watch_not_found(path: impl Into<Utf8PathBuf>) -> Self {
        Self::WatchNotFound(path.into())
    }

    /// Creates a new [`WatchError::NonUtf8Path`] error.
    #[inline]
    pub fn non_utf8_path(path: impl Into<std::path::PathBuf>) -> Self {
        Self::NonUtf8Path(path.into())
    }

    /// Converts a primitive error for `path`, tagging "watch does not exist".
    pub(crate) fn from_notify(err: notify::Error, path: &Utf8Path) -> Self {
        match err.kind {
            notify::ErrorKind::WatchNotFound => Self::watch_not_found(path),
            _ => Self::Notify(err),
        }
    }

    /// Returns `true` if this is the "no such watch" condition.
    #[inline]
    #[must_use]
    pub const fn is_watch_not_found(&self) -> bool {
        matches!(self, Self::WatchNotFound(_))
    }

    /// Returns `true` if the error means the path vanished from the filesystem.
    ///
    /// A directory deleted right after it was created fails its recursive
    /// add this way.
    #[must_use]
    pub fn is_path_missing(&self) -> bool {
        match self {
            Self::Walk(err) => err
                .io_error()
                .is_some_and(|e| e.kind() == io::ErrorKind::NotFound),
            Self::Io(err) => err.kind() == io::ErrorKind::NotFound,
            Self::Notify(err) => match &err.kind {
                notify::ErrorKind::PathNotFound => true,
                notify::ErrorKind::Io(e) => e.kind() == io::ErrorKind::NotFound,
                _ => false,
            },
            _ => false,
        }
    }

    /// Returns `true` if this error is recoverable (watching can continue).
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Closed | Self::Walk(_) | Self::WatchNotFound(_) | Self::NonUtf8Path(_)
        )
    }

    /// Returns `true` if this error is fatal (watching should stop).
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Returns the path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8Path> {
        match self {
            Self::WatchNotFound(path) => Some(path),
            Self::Walk(err) => err.path().and_then(Utf8Path::from_path),
            Self::PrimitiveInit(_)
            | Self::Closed
            | Self::Notify(_)
            | Self::NonUtf8Path(_)
            | Self::InvalidCapacity(_)
            | Self::Io(_)
            | Self::Join(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_watch_not_found() {
        let err = WatchError::watch_not_found("src/gone");
        assert!(err.is_watch_not_found());
        assert!(err.is_recoverable());
        assert_eq!(err.path().map(Utf8Path::as_str), Some("src/gone"));
        assert_eq!(err.to_string(), "no watch registered for src/gone");
    }

    #[test]
    fn test_from_notify_tags_watch_not_found() {
        let err = WatchError::from_notify(notify::Error::watch_not_found(), Utf8Path::new("a/b"));
        assert!(matches!(err, WatchError::WatchNotFound(ref p) if p == "a/b"));
    }

    #[test]
    fn test_from_notify_keeps_other_kinds() {
        let err = WatchError::from_notify(
            notify::Error::generic("inotify limit reached"),
            Utf8Path::new("a"),
        );
        assert!(matches!(err, WatchError::Notify(_)));
        assert!(err.is_fatal());
        assert!(err.path().is_none());
    }

    #[test]
    fn test_closed() {
        let err = WatchError::Closed;
        assert!(err.is_recoverable());
        assert!(!err.is_watch_not_found());
        assert_eq!(err.to_string(), "watcher already closed");
    }

    #[test]
    fn test_non_utf8() {
        let err = WatchError::non_utf8_path(PathBuf::from("test"));
        assert!(err.is_recoverable());
        assert!(err.path().is_none());
        assert!(err.to_string().contains("not valid UTF-8"));
    }

    #[test]
    fn test_io_is_fatal() {
        let err = WatchError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert!(err.is_fatal());
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_is_path_missing() {
        assert!(WatchError::Io(io::Error::from(io::ErrorKind::NotFound)).is_path_missing());
        assert!(WatchError::Notify(notify::Error::path_not_found()).is_path_missing());
        assert!(
            WatchError::Notify(notify::Error::io(io::Error::from(io::ErrorKind::NotFound)))
                .is_path_missing()
        );
        assert!(!WatchError::Notify(notify::Error::generic("boom")).is_path_missing());
        assert!(!WatchError::watch_not_found("a").is_path_missing());
    }

    #[test]
    fn test_walk_error_of_missing_root() {
        let missing = std::env::temp_dir().join("rw-watcher-definitely-missing-root");
        let err = walkdir::WalkDir::new(&missing)
            .into_iter()
            .find_map(Result::err)
            .map(WatchError::from)
            .expect("walking a missing root must fail");
        assert!(err.is_path_missing());
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_invalid_capacity_display() {
        let err = WatchError::InvalidCapacity(0);
        assert_eq!(err.to_string(), "event buffer capacity must be positive, got 0");
        assert!(err.is_fatal());
    }
}
