//! Error-policy wrappers
//!
//! Every [`Filesystem`] primitive returns [`Result`]. A policy decides what a
//! caller sees instead:
//!
//! | Policy          | On success | On failure                                   |
//! |-----------------|------------|----------------------------------------------|
//! | [`Propagate`]   | `Ok(v)`    | `Err(e)`                                     |
//! | [`IgnoreErrors`]| `v`        | `T::default()`, logged at `debug`            |
//! | [`LineInfo`]    | `v`        | diagnostic on stderr, process exits with 1   |
//!
//! [`FilesystemExt`] hands out [`PolicyView`]s whose methods mirror the
//! primitives one-for-one.
//!
//! ```rust
//! use fskit::{FilesystemExt, InMemoryFs};
//! use std::path::Path;
//!
//! let fs = InMemoryFs::new();
//! // Missing file: the ignore policy yields an empty string.
//! assert_eq!(fs.ignoring().read_contents(Path::new("/nope")), "");
//!
//! fs.fatal(fskit::line_info!()).write_contents(Path::new("/tmp/a"), "x");
//! assert!(fs.ignoring().exists(Path::new("/tmp/a")));
//! ```

use std::fmt;
use std::mem;
use std::panic::Location;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::fs::{CopyOptions, FileStatus, Filesystem, SystemHandle};
use crate::logging::path_for_log;

/// Maps a primitive's `Result` to what the caller receives.
pub trait ErrorPolicy: Copy {
    type Output<T>;

    fn handle<T: Default>(self, op: &'static str, result: Result<T>) -> Self::Output<T>;
}

/// Return the `Result` unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Propagate;

impl ErrorPolicy for Propagate {
    type Output<T> = Result<T>;

    fn handle<T: Default>(self, _op: &'static str, result: Result<T>) -> Result<T> {
        result
    }
}

/// Swallow failures and return the type's default value.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreErrors;

impl ErrorPolicy for IgnoreErrors {
    type Output<T> = T;

    fn handle<T: Default>(self, op: &'static str, result: Result<T>) -> T {
        result.unwrap_or_else(|e| {
            tracing::debug!(op, error = %e, "ignoring filesystem error");
            T::default()
        })
    }
}

/// Call site of a fatal operation. Acts as the fatal policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineInfo {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl LineInfo {
    /// Location of whoever called the enclosing `#[track_caller]` function.
    #[track_caller]
    pub fn caller() -> Self {
        let loc = Location::caller();
        Self {
            file: loc.file(),
            line: loc.line(),
            column: loc.column(),
        }
    }

    /// The line printed to stderr before exiting.
    pub fn fatal_message(&self, op: &str, error: &Error) -> String {
        format!("{self}: error: {op}: {error}")
    }
}

impl fmt::Display for LineInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

impl ErrorPolicy for LineInfo {
    type Output<T> = T;

    fn handle<T: Default>(self, op: &'static str, result: Result<T>) -> T {
        match result {
            Ok(value) => value,
            Err(e) => {
                let message = self.fatal_message(op, &e);
                tracing::error!(location = %self, op, error = %e, "fatal filesystem error");
                eprintln!("{message}");
                std::process::exit(1)
            }
        }
    }
}

/// Capture the current source location as a [`LineInfo`].
#[macro_export]
macro_rules! line_info {
    () => {
        $crate::LineInfo {
            file: file!(),
            line: line!(),
            column: column!(),
        }
    };
}

/// A filesystem seen through an error policy.
pub struct PolicyView<'a, F: Filesystem + ?Sized, P: ErrorPolicy> {
    fs: &'a F,
    policy: P,
}

impl<F: Filesystem + ?Sized, P: ErrorPolicy> PolicyView<'_, F, P> {
    pub fn read_contents(&self, path: &Path) -> P::Output<String> {
        self.policy.handle("read_contents", self.fs.read_contents(path))
    }

    pub fn read_lines(&self, path: &Path) -> P::Output<Vec<String>> {
        self.policy.handle("read_lines", self.fs.read_lines(path))
    }

    pub fn write_contents(&self, path: &Path, data: &str) -> P::Output<()> {
        self.policy.handle("write_contents", self.fs.write_contents(path, data))
    }

    pub fn write_lines(&self, path: &Path, lines: &[String]) -> P::Output<()> {
        self.policy.handle("write_lines", self.fs.write_lines(path, lines))
    }

    pub fn find_file_recursively_up(
        &self,
        starting_dir: &Path,
        filename: &Path,
    ) -> P::Output<Option<PathBuf>> {
        self.policy.handle(
            "find_file_recursively_up",
            self.fs.find_file_recursively_up(starting_dir, filename),
        )
    }

    pub fn get_files_recursive(&self, dir: &Path) -> P::Output<Vec<PathBuf>> {
        self.policy.handle("get_files_recursive", self.fs.get_files_recursive(dir))
    }

    pub fn get_files_non_recursive(&self, dir: &Path) -> P::Output<Vec<PathBuf>> {
        self.policy
            .handle("get_files_non_recursive", self.fs.get_files_non_recursive(dir))
    }

    pub fn rename(&self, old_path: &Path, new_path: &Path) -> P::Output<()> {
        self.policy.handle("rename", self.fs.rename(old_path, new_path))
    }

    pub fn rename_or_copy(&self, old_path: &Path, new_path: &Path, temp_suffix: &str) -> P::Output<()> {
        self.policy.handle(
            "rename_or_copy",
            self.fs.rename_or_copy(old_path, new_path, temp_suffix),
        )
    }

    pub fn remove(&self, path: &Path) -> P::Output<bool> {
        self.policy.handle("remove", self.fs.remove(path))
    }

    pub fn remove_all(&self, path: &Path) -> P::Output<()> {
        self.policy.handle("remove_all", self.fs.remove_all(path))
    }

    pub fn remove_all_inside(&self, path: &Path) -> P::Output<()> {
        self.policy.handle("remove_all_inside", self.fs.remove_all_inside(path))
    }

    pub fn is_empty(&self, path: &Path) -> P::Output<bool> {
        self.policy.handle("is_empty", self.fs.is_empty(path))
    }

    pub fn create_directory(&self, path: &Path) -> P::Output<bool> {
        self.policy.handle("create_directory", self.fs.create_directory(path))
    }

    pub fn create_directories(&self, path: &Path) -> P::Output<bool> {
        self.policy.handle("create_directories", self.fs.create_directories(path))
    }

    pub fn copy(&self, old_path: &Path, new_path: &Path, options: CopyOptions) -> P::Output<()> {
        self.policy.handle("copy", self.fs.copy(old_path, new_path, options))
    }

    pub fn copy_file(&self, old_path: &Path, new_path: &Path, options: CopyOptions) -> P::Output<bool> {
        self.policy.handle("copy_file", self.fs.copy_file(old_path, new_path, options))
    }

    pub fn copy_symlink(&self, old_path: &Path, new_path: &Path) -> P::Output<()> {
        self.policy.handle("copy_symlink", self.fs.copy_symlink(old_path, new_path))
    }

    pub fn status(&self, path: &Path) -> P::Output<FileStatus> {
        self.policy.handle("status", self.fs.status(path))
    }

    pub fn symlink_status(&self, path: &Path) -> P::Output<FileStatus> {
        self.policy.handle("symlink_status", self.fs.symlink_status(path))
    }

    pub fn absolute(&self, path: &Path) -> P::Output<PathBuf> {
        self.policy.handle("absolute", self.fs.absolute(path))
    }

    pub fn canonical(&self, path: &Path) -> P::Output<PathBuf> {
        self.policy.handle("canonical", self.fs.canonical(path))
    }

    pub fn current_path(&self) -> P::Output<PathBuf> {
        self.policy.handle("current_path", self.fs.current_path())
    }

    pub fn set_current_path(&self, path: &Path) -> P::Output<()> {
        self.policy.handle("set_current_path", self.fs.set_current_path(path))
    }

    pub fn take_exclusive_file_lock(&self, path: &Path) -> P::Output<SystemHandle> {
        self.policy.handle(
            "take_exclusive_file_lock",
            self.fs.take_exclusive_file_lock(path),
        )
    }

    /// Under [`IgnoreErrors`] a timeout yields an invalid handle.
    pub fn try_take_exclusive_file_lock(&self, path: &Path) -> P::Output<SystemHandle> {
        self.policy.handle(
            "try_take_exclusive_file_lock",
            self.fs.try_take_exclusive_file_lock(path),
        )
    }

    pub fn unlock_file_lock(&self, handle: SystemHandle) -> P::Output<()> {
        self.policy.handle("unlock_file_lock", self.fs.unlock_file_lock(handle))
    }

    pub fn find_from_path(&self, name: &str) -> Vec<PathBuf> {
        self.fs.find_from_path(name)
    }

    pub fn exists(&self, path: &Path) -> P::Output<bool> {
        self.policy.handle("exists", self.fs.exists(path))
    }

    pub fn is_directory(&self, path: &Path) -> P::Output<bool> {
        self.policy.handle("is_directory", self.fs.is_directory(path))
    }

    pub fn is_regular_file(&self, path: &Path) -> P::Output<bool> {
        self.policy.handle("is_regular_file", self.fs.is_regular_file(path))
    }

    pub fn is_symlink(&self, path: &Path) -> P::Output<bool> {
        self.policy.handle("is_symlink", self.fs.is_symlink(path))
    }
}

/// Policy views and lock guards for every [`Filesystem`].
pub trait FilesystemExt: Filesystem {
    fn with_policy<P: ErrorPolicy>(&self, policy: P) -> PolicyView<'_, Self, P> {
        PolicyView { fs: self, policy }
    }

    /// Exit the process on failure, reporting `line`.
    fn fatal(&self, line: LineInfo) -> PolicyView<'_, Self, LineInfo> {
        self.with_policy(line)
    }

    fn ignoring(&self) -> PolicyView<'_, Self, IgnoreErrors> {
        self.with_policy(IgnoreErrors)
    }

    /// Block until the lock is held; released when the guard drops.
    fn lock_exclusive(&self, path: &Path) -> Result<FileLockGuard<'_, Self>> {
        let handle = self.take_exclusive_file_lock(path)?;
        Ok(FileLockGuard::new(self, handle, path))
    }

    /// Bounded variant of [`lock_exclusive`](Self::lock_exclusive).
    fn try_lock_exclusive(&self, path: &Path) -> Result<FileLockGuard<'_, Self>> {
        let handle = self.try_take_exclusive_file_lock(path)?;
        Ok(FileLockGuard::new(self, handle, path))
    }
}

impl<F: Filesystem + ?Sized> FilesystemExt for F {}

/// Holds an exclusive file lock until dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct FileLockGuard<'a, F: Filesystem + ?Sized> {
    fs: &'a F,
    handle: SystemHandle,
    path: PathBuf,
}

impl<'a, F: Filesystem + ?Sized> FileLockGuard<'a, F> {
    fn new(fs: &'a F, handle: SystemHandle, path: &Path) -> Self {
        Self {
            fs,
            handle,
            path: path.to_path_buf(),
        }
    }

    pub fn handle(&self) -> &SystemHandle {
        &self.handle
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release now and observe the result.
    pub fn unlock(mut self) -> Result<()> {
        let handle = mem::take(&mut self.handle);
        self.fs.unlock_file_lock(handle)
    }
}

impl<F: Filesystem + ?Sized> Drop for FileLockGuard<'_, F> {
    fn drop(&mut self) {
        let handle = mem::take(&mut self.handle);
        if let Err(e) = self.fs.unlock_file_lock(handle) {
            tracing::warn!(path = %path_for_log(&self.path), error = %e, "failed to release lock");
        }
    }
}

impl<F: Filesystem + ?Sized> fmt::Debug for FileLockGuard<'_, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileLockGuard")
            .field("path", &self.path)
            .field("handle", &self.handle)
            .finish()
    }
}
