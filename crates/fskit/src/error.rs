//! Error types for fskit
//!
//! Every primitive on [`Filesystem`](crate::Filesystem) returns [`Result`].
//! Errors keep the operation name and the path(s) involved so a caller can
//! print an actionable message without re-deriving context.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Result type alias using fskit's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Recoverable filesystem failure.
#[derive(Error, Debug)]
pub enum Error {
    /// A native operation on a single path failed.
    #[error("{op} '{}': {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A native operation involving a source and a destination failed.
    #[error("{op} '{}' -> '{}': {source}", from.display(), to.display())]
    Io2 {
        op: &'static str,
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A native call that is not tied to a path failed.
    #[error("{op}: {source}")]
    Native {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    /// A recursive removal could not delete everything.
    ///
    /// `failure_point` is the first path that failed; the walk keeps going
    /// past it so as much as possible is removed.
    #[error("remove_all failed at '{}': {source}", failure_point.display())]
    RemoveAll {
        failure_point: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// Bounded lock acquisition ran out of time.
    #[error("timed out after {timeout:?} waiting for lock on '{}'", path.display())]
    LockTimeout { path: PathBuf, timeout: Duration },

    /// A byte sequence or native path was not valid UTF-8.
    #[error("path is not valid UTF-8: {lossy}")]
    InvalidUtf8 { lossy: String },
}

impl Error {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn io2(
        op: &'static str,
        from: impl Into<PathBuf>,
        to: impl Into<PathBuf>,
        source: io::Error,
    ) -> Self {
        Self::Io2 {
            op,
            from: from.into(),
            to: to.into(),
            source,
        }
    }

    /// Shorthand for a `NotFound` failure on `path`.
    pub(crate) fn not_found(op: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::io(op, path, io::Error::from(io::ErrorKind::NotFound))
    }

    /// The portable error kind.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            Error::Io { source, .. }
            | Error::Io2 { source, .. }
            | Error::Native { source, .. } => source.kind(),
            Error::RemoveAll { source, .. } => source.kind(),
            Error::LockTimeout { .. } => io::ErrorKind::TimedOut,
            Error::InvalidUtf8 { .. } => io::ErrorKind::InvalidData,
        }
    }

    /// The platform error code (`errno` / `GetLastError`), if there is one.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::Io { source, .. }
            | Error::Io2 { source, .. }
            | Error::Native { source, .. } => source.raw_os_error(),
            Error::RemoveAll { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }

    /// The first path a recursive removal failed on.
    pub fn failure_point(&self) -> Option<&Path> {
        match self {
            Error::RemoveAll { failure_point, .. } => Some(failure_point),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == io::ErrorKind::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display_includes_op_and_path() {
        let err = Error::not_found("read_contents", "/tmp/missing.txt");
        let msg = err.to_string();
        assert!(msg.contains("read_contents"));
        assert!(msg.contains("/tmp/missing.txt"));
        assert!(err.is_not_found());
    }

    #[test]
    fn remove_all_exposes_failure_point_and_inner_kind() {
        let inner = Error::io(
            "remove",
            "/a/b",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        let err = Error::RemoveAll {
            failure_point: PathBuf::from("/a/b"),
            source: Box::new(inner),
        };
        assert_eq!(err.failure_point(), Some(Path::new("/a/b")));
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn lock_timeout_is_timed_out() {
        let err = Error::LockTimeout {
            path: PathBuf::from("/tmp/.lock"),
            timeout: Duration::from_millis(1500),
        };
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert_eq!(err.raw_os_error(), None);
        assert!(err.failure_point().is_none());
    }

    #[test]
    fn raw_os_error_is_preserved() {
        let err = Error::io("open", "/x", io::Error::from_raw_os_error(2));
        assert_eq!(err.raw_os_error(), Some(2));
    }
}
