//! Native exclusive file locks.
//!
//! Locks go through [`fs2::FileExt`] (`flock(2)` on Unix, `LockFileEx` on
//! Windows). Both lock the whole file and are released by unlocking and
//! closing the handle. The lock file is owned by a [`File`] until
//! acquisition succeeds, so every error path closes it.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use super::handle::{RawSystemHandle, SystemHandle};

/// Open (creating if needed) the file a lock is taken on.
pub(crate) fn open_lock_file(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
}

/// Retry `attempt` until it reports success or `timeout` elapses.
///
/// `attempt` runs at least once, and once more at the deadline, so a lock
/// released during the final sleep is still picked up.
pub(crate) fn poll_until(
    timeout: Duration,
    interval: Duration,
    mut attempt: impl FnMut() -> io::Result<bool>,
) -> io::Result<bool> {
    let deadline = Instant::now() + timeout;
    loop {
        if attempt()? {
            return Ok(true);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(false);
        }
        let nap = interval.min(deadline - now).max(Duration::from_millis(1));
        tracing::trace!(remaining_ms = (deadline - now).as_millis() as u64, "lock busy, retrying");
        thread::sleep(nap);
    }
}

/// Block until the exclusive lock on `file` is held.
pub(crate) fn lock_exclusive(file: &File) -> io::Result<()> {
    FileExt::lock_exclusive(file)
}

/// One non-blocking attempt. `Ok(false)` means another holder has the lock.
pub(crate) fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    match FileExt::try_lock_exclusive(file) {
        Ok(()) => Ok(true),
        Err(e) if is_contended(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

fn is_contended(error: &io::Error) -> bool {
    let contended = fs2::lock_contended_error();
    error.raw_os_error() == contended.raw_os_error() || error.kind() == io::ErrorKind::WouldBlock
}

/// Unlock and close the file behind `handle`, leaving it invalid.
pub(crate) fn release(handle: &mut SystemHandle) -> io::Result<()> {
    let file = from_handle(handle.take_raw());
    FileExt::unlock(&file)
}

/// Hand ownership of a locked file to a [`SystemHandle`].
#[cfg(unix)]
pub(crate) fn into_handle(file: File) -> SystemHandle {
    use std::os::fd::IntoRawFd;
    SystemHandle::from_raw(file.into_raw_fd())
}

#[cfg(unix)]
fn from_handle(raw: RawSystemHandle) -> File {
    use std::os::fd::FromRawFd;
    // SAFETY: raw came from into_handle and take_raw hands it out exactly once.
    unsafe { File::from_raw_fd(raw) }
}

#[cfg(windows)]
pub(crate) fn into_handle(file: File) -> SystemHandle {
    use std::os::windows::io::IntoRawHandle;
    SystemHandle::from_raw(file.into_raw_handle() as RawSystemHandle)
}

#[cfg(windows)]
fn from_handle(raw: RawSystemHandle) -> File {
    use std::os::windows::io::{FromRawHandle, RawHandle};
    // SAFETY: raw came from into_handle and take_raw hands it out exactly once.
    unsafe { File::from_raw_handle(raw as RawHandle) }
}
