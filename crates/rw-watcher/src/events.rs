//! Event types for filesystem change notifications.
//!
//! Raw notifications from the watch primitive are translated into [`Event`]s,
//! one per affected path, each carrying an [`Op`] bitmask. The dispatch loop
//! forwards them to the consumer unchanged.
//!
//! # Event Flow
//!
//! ```text
//! notify::Event (kind + paths)
//!        │
//!        ▼
//!  Event::from_notify  ──► one Event per path (or a NonUtf8Path error)
//!        │
//!        ▼
//!  dispatch loop (watch-set maintenance)
//!        │
//!        ▼
//!  public event channel
//! ```

use std::fmt;

use bitflags::bitflags;
use camino::Utf8PathBuf;
use notify::EventKind;
use notify::event::{ModifyKind, RenameMode};
use serde::{Serialize, Serializer};
use smallvec::SmallVec;

use crate::error::WatchError;

bitflags! {
    /// The set of operations an [`Event`] describes.
    ///
    /// # Examples
    ///
    /// ```
    /// use rw_watcher::Op;
    ///
    /// let op = Op::CREATE | Op::WRITE;
    /// assert!(op.contains(Op::CREATE));
    /// assert_eq!(op.to_string(), "CREATE|WRITE");
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Op: u8 {
        /// A new path was created (or moved into a watched directory).
        const CREATE = 1;
        /// File contents were written.
        const WRITE = 1 << 1;
        /// The path was removed.
        const REMOVE = 1 << 2;
        /// The path was renamed away.
        const RENAME = 1 << 3;
        /// Permissions or other metadata changed.
        const CHMOD = 1 << 4;
    }
}

impl Op {
    /// Maps a notify event kind to the operation it reports.
    ///
    /// Returns `None` for kinds that are not forwarded (access events,
    /// unclassified events, and the combined half of a rename pair).
    #[must_use]
    pub fn from_kind(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                Some(Self::CREATE)
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => None,
            EventKind::Modify(ModifyKind::Name(_)) => Some(Self::RENAME),
            EventKind::Modify(ModifyKind::Metadata(_)) => Some(Self::CHMOD),
            EventKind::Modify(_) => Some(Self::WRITE),
            EventKind::Remove(_) => Some(Self::REMOVE),
            EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, _)) in self.iter_names().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            f.write_str(name)?;
        }
        Ok(())
    }
}

impl Serialize for Op {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A change to a single path, as reported by the watch primitive.
///
/// # Examples
///
/// ```
/// use rw_watcher::{Event, Op};
/// use camino::Utf8PathBuf;
///
/// let event = Event::new(Utf8PathBuf::from("src/main.rs"), Op::WRITE);
/// assert!(event.has(Op::WRITE));
/// assert_eq!(event.to_string(), r#""src/main.rs": WRITE"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Event {
    /// The path that changed.
    ///
    /// Formed by joining the watched directory with the entry name, so it is
    /// absolute or relative exactly as the watch was registered.
    pub path: Utf8PathBuf,

    /// What happened to the path.
    pub op: Op,
}

impl Event {
    /// Creates a new event.
    #[inline]
    #[must_use]
    pub const fn new(path: Utf8PathBuf, op: Op) -> Self {
        Self { path, op }
    }

    /// Returns `true` if the event's bitmask includes any of `op`.
    #[inline]
    #[must_use]
    pub const fn has(&self, op: Op) -> bool {
        self.op.intersects(op)
    }

    /// Translates a notify event into one [`Event`] per path.
    ///
    /// Paths that are not valid UTF-8 produce [`WatchError::NonUtf8Path`]
    /// entries instead. Kinds that [`Op::from_kind`] drops produce nothing.
    #[must_use]
    pub fn from_notify(event: notify::Event) -> SmallVec<[Result<Self, WatchError>; 2]> {
        let Some(op) = Op::from_kind(&event.kind) else {
            tracing::trace!(kind = ?event.kind, "Dropping unforwarded event kind");
            return SmallVec::new();
        };

        event
            .paths
            .into_iter()
            .map(|path| {
                Utf8PathBuf::try_from(path)
                    .map(|path| Self::new(path, op))
                    .map_err(|e| WatchError::non_utf8_path(e.into_path_buf()))
            })
            .collect()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.path.as_str(), self.op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind};
    use std::path::PathBuf;

    fn notify_event(kind: EventKind, paths: &[&str]) -> notify::Event {
        paths
            .iter()
            .fold(notify::Event::new(kind), |ev, p| ev.add_path(PathBuf::from(p)))
    }

    #[test]
    fn test_op_from_kind() {
        assert_eq!(Op::from_kind(&EventKind::Create(CreateKind::Folder)), Some(Op::CREATE));
        assert_eq!(
            Op::from_kind(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(Op::WRITE)
        );
        assert_eq!(
            Op::from_kind(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions))),
            Some(Op::CHMOD)
        );
        assert_eq!(
            Op::from_kind(&EventKind::Modify(ModifyKind::Name(RenameMode::From))),
            Some(Op::RENAME)
        );
        assert_eq!(
            Op::from_kind(&EventKind::Modify(ModifyKind::Name(RenameMode::To))),
            Some(Op::CREATE)
        );
        assert_eq!(Op::from_kind(&EventKind::Remove(RemoveKind::File)), Some(Op::REMOVE));
    }

    #[test]
    fn test_op_from_kind_dropped() {
        assert_eq!(
            Op::from_kind(&EventKind::Modify(ModifyKind::Name(RenameMode::Both))),
            None
        );
        assert_eq!(Op::from_kind(&EventKind::Access(AccessKind::Any)), None);
        assert_eq!(Op::from_kind(&EventKind::Any), None);
        assert_eq!(Op::from_kind(&EventKind::Other), None);
    }

    #[test]
    fn test_op_display() {
        assert_eq!(Op::CREATE.to_string(), "CREATE");
        assert_eq!((Op::REMOVE | Op::CREATE).to_string(), "CREATE|REMOVE");
        assert_eq!(Op::empty().to_string(), "");
    }

    #[test]
    fn test_event_has() {
        let event = Event::new(Utf8PathBuf::from("a"), Op::CREATE | Op::WRITE);
        assert!(event.has(Op::CREATE));
        assert!(event.has(Op::WRITE | Op::REMOVE));
        assert!(!event.has(Op::REMOVE));
    }

    #[test]
    fn test_event_display() {
        let event = Event::new(Utf8PathBuf::from("./test/temp.txt"), Op::REMOVE);
        assert_eq!(event.to_string(), r#""./test/temp.txt": REMOVE"#);
    }

    #[test]
    fn test_event_serialize() {
        let event = Event::new(Utf8PathBuf::from("dir/file"), Op::CREATE | Op::CHMOD);
        insta::assert_json_snapshot!(event, @r#"
        {
          "path": "dir/file",
          "op": "CREATE|CHMOD"
        }
        "#);
    }

    #[test]
    fn test_from_notify_one_event_per_path() {
        let raw = notify_event(EventKind::Remove(RemoveKind::Any), &["a/one", "a/two"]);
        let events: Vec<Event> = Event::from_notify(raw)
            .into_iter()
            .map(|r| r.expect("UTF-8 path"))
            .collect();
        assert_eq!(
            events,
            vec![
                Event::new(Utf8PathBuf::from("a/one"), Op::REMOVE),
                Event::new(Utf8PathBuf::from("a/two"), Op::REMOVE),
            ]
        );
    }

    #[test]
    fn test_from_notify_drops_access() {
        let raw = notify_event(EventKind::Access(AccessKind::Any), &["a/file"]);
        assert!(Event::from_notify(raw).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_from_notify_non_utf8_path() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let bad = PathBuf::from(OsStr::from_bytes(b"dir/\xff\xfe"));
        let raw = notify::Event::new(EventKind::Create(CreateKind::File)).add_path(bad);
        let results = Event::from_notify(raw);
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(WatchError::NonUtf8Path(_))));
    }
}
