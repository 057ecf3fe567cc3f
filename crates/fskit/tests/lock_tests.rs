//! Exclusive file lock tests against the native provider
//!
//! Native locks belong to the open file, so two acquisitions from the same
//! process contend just like two processes would.

use fskit::{
    DEFAULT_LOCK_TIMEOUT, Filesystem, FilesystemExt, FsConfig, RealFs, SystemHandle,
    real_filesystem,
};
use std::io::ErrorKind;
use std::thread;
use std::time::{Duration, Instant};

fn short_timeout() -> RealFs {
    RealFs::with_config(FsConfig::new().lock_timeout(Duration::from_millis(150)))
}

#[test]
fn lock_file_is_created_when_absent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fresh.lock");
    let fs = RealFs::new();

    let handle = fs.take_exclusive_file_lock(&path).unwrap();
    assert!(handle.is_valid());
    assert!(fs.is_regular_file(&path).unwrap());
    fs.unlock_file_lock(handle).unwrap();
}

#[test]
fn bounded_acquisition_times_out_within_budget() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".lock");
    let fs = real_filesystem();
    let held = fs.take_exclusive_file_lock(&path).unwrap();

    let start = Instant::now();
    let err = fs.try_take_exclusive_file_lock(&path).unwrap_err();
    let elapsed = start.elapsed();

    assert_eq!(err.kind(), ErrorKind::TimedOut);
    assert!(matches!(err, fskit::Error::LockTimeout { .. }));
    assert!(elapsed >= DEFAULT_LOCK_TIMEOUT - Duration::from_millis(60));
    assert!(elapsed <= DEFAULT_LOCK_TIMEOUT + Duration::from_millis(1000));

    fs.unlock_file_lock(held).unwrap();
}

#[test]
fn released_lock_can_be_retaken() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".lock");
    let fs = short_timeout();

    let first = fs.try_take_exclusive_file_lock(&path).unwrap();
    fs.unlock_file_lock(first).unwrap();
    let second = fs.try_take_exclusive_file_lock(&path).unwrap();
    assert!(second.is_valid());
    fs.unlock_file_lock(second).unwrap();
}

#[test]
fn bounded_acquisition_picks_up_release_during_wait() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".lock");
    let fs = RealFs::new();
    let held = fs.take_exclusive_file_lock(&path).unwrap();

    thread::scope(|s| {
        let waiter = s.spawn(|| fs.try_take_exclusive_file_lock(&path));
        thread::sleep(Duration::from_millis(200));
        fs.unlock_file_lock(held).unwrap();
        let handle = waiter.join().unwrap().unwrap();
        assert!(handle.is_valid());
        fs.unlock_file_lock(handle).unwrap();
    });
}

#[test]
fn ignore_policy_turns_timeout_into_invalid_handle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".lock");
    let fs = short_timeout();
    let held = fs.take_exclusive_file_lock(&path).unwrap();

    let handle = fs.ignoring().try_take_exclusive_file_lock(&path);
    assert!(!handle.is_valid());
    // Unlocking the invalid handle is a no-op, not an error.
    fs.ignoring().unlock_file_lock(handle);

    fs.unlock_file_lock(held).unwrap();
}

#[test]
fn unlocking_invalid_handle_is_noop() {
    let fs = RealFs::new();
    fs.unlock_file_lock(SystemHandle::invalid()).unwrap();
    fs.unlock_file_lock(SystemHandle::default()).unwrap();
}

#[test]
fn guard_releases_on_drop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".lock");
    let fs = short_timeout();

    {
        let guard = fs.lock_exclusive(&path).unwrap();
        assert!(guard.handle().is_valid());
        assert!(fs.try_lock_exclusive(&path).is_err());
    }

    let guard = fs.try_lock_exclusive(&path).unwrap();
    guard.unlock().unwrap();
    let again = fs.try_lock_exclusive(&path).unwrap();
    drop(again);
}

#[test]
fn guard_releases_when_scope_exits_early() {
    fn hold_then_fail(fs: &RealFs, path: &std::path::Path) -> fskit::Result<()> {
        let _guard = fs.lock_exclusive(path)?;
        fs.read_contents(&path.with_extension("missing"))?;
        Ok(())
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".lock");
    let fs = short_timeout();

    assert!(hold_then_fail(&fs, &path).is_err());
    let handle = fs.try_take_exclusive_file_lock(&path).unwrap();
    fs.unlock_file_lock(handle).unwrap();
}

#[test]
fn lock_on_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no/such/dir/.lock");
    let err = RealFs::new().try_take_exclusive_file_lock(&path).unwrap_err();
    assert!(err.is_not_found());
}
