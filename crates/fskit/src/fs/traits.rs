//! Filesystem trait definitions

use bitflags::bitflags;
use std::path::{Path, PathBuf};

use super::derived;
use super::handle::SystemHandle;
use super::status::FileStatus;
use crate::error::Result;

bitflags! {
    /// Options for [`Filesystem::copy`] and [`Filesystem::copy_file`].
    ///
    /// At most one of `SKIP_EXISTING`, `OVERWRITE_EXISTING`, `UPDATE_EXISTING`
    /// is meaningful; if several are set the first in that order wins.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CopyOptions: u32 {
        /// Leave an existing destination alone and report "not copied".
        const SKIP_EXISTING = 1 << 0;
        /// Replace an existing destination.
        const OVERWRITE_EXISTING = 1 << 1;
        /// Replace an existing destination only if it is older than the source.
        const UPDATE_EXISTING = 1 << 2;
        /// Descend into subdirectories.
        const RECURSIVE = 1 << 3;
        /// Copy symlinks as links instead of following them.
        const COPY_SYMLINKS = 1 << 4;
    }
}

/// Filesystem contract.
///
/// Each method is the one authoritative primitive for its concern. Primitives
/// return [`Result`] and never panic; the fatal and ignore forms are derived
/// from them by [`FilesystemExt`](crate::FilesystemExt).
///
/// Implementations must be safe to share across threads: no method mutates
/// instance state that affects the result of another call, apart from the
/// process-wide current directory and the locks themselves.
pub trait Filesystem: Send + Sync {
    /// Read a whole file as UTF-8.
    fn read_contents(&self, path: &Path) -> Result<String>;

    /// Read text lines.
    ///
    /// Lines are split on `\n` and have at most one trailing `\r` removed.
    fn read_lines(&self, path: &Path) -> Result<Vec<String>>;

    /// Overwrite a file, creating it if needed. Parents are not created.
    fn write_contents(&self, path: &Path, data: &str) -> Result<()>;

    /// Overwrite a file with `lines`, each terminated by `\n`.
    fn write_lines(&self, path: &Path, lines: &[String]) -> Result<()>;

    /// Nearest ancestor of `starting_dir` (inclusive) that contains `filename`.
    fn find_file_recursively_up(
        &self,
        starting_dir: &Path,
        filename: &Path,
    ) -> Result<Option<PathBuf>>;

    /// Every entry below `dir`, files and directories alike. Symlinked
    /// directories are listed but not descended into. Order is unspecified.
    fn get_files_recursive(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    /// Immediate children of `dir`. Order is unspecified.
    fn get_files_non_recursive(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    /// Native rename. Fails if the destination's parent is missing.
    fn rename(&self, old_path: &Path, new_path: &Path) -> Result<()>;

    /// Rename, falling back to copy-then-delete when the two paths are on
    /// different devices. The copy goes to `new_path + temp_suffix` first and
    /// is renamed into place once complete.
    fn rename_or_copy(&self, old_path: &Path, new_path: &Path, temp_suffix: &str) -> Result<()> {
        derived::rename_or_copy(self, old_path, new_path, temp_suffix)
    }

    /// Remove a file, symlink or empty directory.
    ///
    /// Returns `false` if nothing was there; that is not an error.
    fn remove(&self, path: &Path) -> Result<bool>;

    /// Remove `path` and everything below it. A missing path is not an error.
    ///
    /// On failure the error is [`Error::RemoveAll`](crate::Error::RemoveAll)
    /// carrying the first path that could not be removed.
    fn remove_all(&self, path: &Path) -> Result<()> {
        derived::remove_all(self, path, true)
    }

    /// Like [`remove_all`](Self::remove_all) but keeps `path` itself.
    fn remove_all_inside(&self, path: &Path) -> Result<()> {
        derived::remove_all(self, path, false)
    }

    /// True for an empty directory or a zero-length file.
    fn is_empty(&self, path: &Path) -> Result<bool>;

    /// Returns `false` if the directory already existed.
    fn create_directory(&self, path: &Path) -> Result<bool>;

    /// Create `path` and any missing parents.
    /// Returns `false` if the directory already existed.
    fn create_directories(&self, path: &Path) -> Result<bool>;

    /// Copy a file, symlink or directory tree according to `options`.
    fn copy(&self, old_path: &Path, new_path: &Path, options: CopyOptions) -> Result<()> {
        derived::copy(self, old_path, new_path, options)
    }

    /// Copy a regular file. Returns `false` when the copy was skipped.
    fn copy_file(&self, old_path: &Path, new_path: &Path, options: CopyOptions) -> Result<bool>;

    /// Create `new_path` as a symlink with the same target as `old_path`.
    fn copy_symlink(&self, old_path: &Path, new_path: &Path) -> Result<()>;

    /// Status of the final target, following symlinks.
    ///
    /// A missing path is `Ok` with [`FileType::NotFound`](crate::FileType::NotFound).
    fn status(&self, path: &Path) -> Result<FileStatus>;

    /// Status of the entry itself, without following symlinks.
    fn symlink_status(&self, path: &Path) -> Result<FileStatus>;

    /// `path` made absolute against the current directory, without touching disk.
    fn absolute(&self, path: &Path) -> Result<PathBuf>;

    /// Absolute path with every symlink resolved. The path must exist.
    fn canonical(&self, path: &Path) -> Result<PathBuf>;

    fn current_path(&self) -> Result<PathBuf>;

    /// Change the process-wide current directory.
    fn set_current_path(&self, path: &Path) -> Result<()>;

    /// Wait indefinitely for an exclusive lock on `path`.
    fn take_exclusive_file_lock(&self, path: &Path) -> Result<SystemHandle>;

    /// Wait at most the configured lock timeout (1.5s by default).
    ///
    /// Returns [`Error::LockTimeout`](crate::Error::LockTimeout) when the
    /// budget runs out.
    fn try_take_exclusive_file_lock(&self, path: &Path) -> Result<SystemHandle>;

    /// Release a lock. Invalid handles are a no-op.
    fn unlock_file_lock(&self, handle: SystemHandle) -> Result<()>;

    /// Every executable named `name` in search-path order.
    fn find_from_path(&self, name: &str) -> Vec<PathBuf>;

    /// True unless the entry's own status is `NotFound` or `None`.
    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.symlink_status(path)?.exists())
    }

    fn is_directory(&self, path: &Path) -> Result<bool> {
        Ok(self.status(path)?.is_directory())
    }

    fn is_regular_file(&self, path: &Path) -> Result<bool> {
        Ok(self.status(path)?.is_regular_file())
    }

    /// True for symlinks and junctions.
    fn is_symlink(&self, path: &Path) -> Result<bool> {
        Ok(self.symlink_status(path)?.is_symlink())
    }
}

/// Split file contents into lines, dropping at most one `\r` per line.
pub(crate) fn split_lines(contents: &str) -> Vec<String> {
    let mut lines: Vec<String> = contents
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_owned())
        .collect();
    if contents.is_empty() || contents.ends_with('\n') {
        lines.pop();
    }
    lines
}

/// Join lines, terminating each with `\n`.
pub(crate) fn join_lines(lines: &[String]) -> String {
    let mut out = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// How an existing destination is handled by a file copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExistingPolicy {
    Fail,
    Skip,
    Overwrite,
    Update,
}

impl From<CopyOptions> for ExistingPolicy {
    fn from(options: CopyOptions) -> Self {
        if options.contains(CopyOptions::SKIP_EXISTING) {
            ExistingPolicy::Skip
        } else if options.contains(CopyOptions::OVERWRITE_EXISTING) {
            ExistingPolicy::Overwrite
        } else if options.contains(CopyOptions::UPDATE_EXISTING) {
            ExistingPolicy::Update
        } else {
            ExistingPolicy::Fail
        }
    }
}
