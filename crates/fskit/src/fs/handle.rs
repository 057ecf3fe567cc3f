//! Opaque native handle returned by lock acquisition.

use std::fmt;

/// Native handle type: a file descriptor on Unix, a `HANDLE` on Windows.
#[cfg(windows)]
pub type RawSystemHandle = isize;
/// Native handle type: a file descriptor on Unix, a `HANDLE` on Windows.
#[cfg(not(windows))]
pub type RawSystemHandle = i32;

const INVALID: RawSystemHandle = -1;

/// Cross-platform wrapper around a native lock handle.
///
/// A handle is valid from a successful acquisition until it is passed back to
/// [`Filesystem::unlock_file_lock`](crate::Filesystem::unlock_file_lock).
/// Neither `Clone` nor `Copy`; the acquirer owns it.
#[must_use = "an unreleased lock handle leaks the lock until process exit"]
#[derive(PartialEq, Eq)]
pub struct SystemHandle {
    raw: RawSystemHandle,
}

impl SystemHandle {
    /// The invalid handle.
    pub const fn invalid() -> Self {
        Self { raw: INVALID }
    }

    pub(crate) const fn from_raw(raw: RawSystemHandle) -> Self {
        Self { raw }
    }

    /// Give up ownership of the native value, leaving this handle invalid.
    pub(crate) fn take_raw(&mut self) -> RawSystemHandle {
        std::mem::replace(&mut self.raw, INVALID)
    }

    pub fn raw(&self) -> RawSystemHandle {
        self.raw
    }

    pub fn is_valid(&self) -> bool {
        self.raw != INVALID
    }
}

impl Default for SystemHandle {
    fn default() -> Self {
        Self::invalid()
    }
}

impl fmt::Debug for SystemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "SystemHandle({})", self.raw)
        } else {
            f.write_str("SystemHandle(invalid)")
        }
    }
}
