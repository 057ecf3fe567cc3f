//! Native filesystem provider.
//!
//! [`RealFs`] satisfies [`Filesystem`] with `std::fs` plus the lock
//! primitives in [`super::lock`]. It holds nothing but its [`FsConfig`], so
//! one instance can be shared freely across threads.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::handle::SystemHandle;
use super::lock;
use super::status::FileStatus;
use super::traits::{CopyOptions, ExistingPolicy, Filesystem, join_lines, split_lines};
use crate::config::FsConfig;
use crate::error::{Error, Result};
use crate::logging::path_for_log;

static REAL_FILESYSTEM: RealFs = RealFs::new();

/// The process-wide native filesystem with default configuration.
pub fn real_filesystem() -> &'static RealFs {
    &REAL_FILESYSTEM
}

/// Filesystem backed by the host operating system.
#[derive(Debug, Clone, Default)]
pub struct RealFs {
    config: FsConfig,
}

impl RealFs {
    /// Create a native filesystem with default configuration.
    pub const fn new() -> Self {
        Self {
            config: FsConfig::new(),
        }
    }

    /// Create a native filesystem with custom configuration.
    pub fn with_config(config: FsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }
}

/// A directory that is not reached through a symlink or junction.
fn is_real_directory(meta: &fs::Metadata) -> bool {
    meta.is_dir() && !meta.file_type().is_symlink()
}

fn status_from(result: io::Result<fs::Metadata>, op: &'static str, path: &Path) -> Result<FileStatus> {
    match result {
        Ok(meta) => Ok(FileStatus::from_metadata(&meta)),
        Err(e)
            if matches!(
                e.kind(),
                io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
            ) =>
        {
            Ok(FileStatus::not_found())
        }
        Err(e) => Err(Error::io(op, path, e)),
    }
}

impl Filesystem for RealFs {
    fn read_contents(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| Error::io("read_contents", path, e))
    }

    fn read_lines(&self, path: &Path) -> Result<Vec<String>> {
        let contents =
            fs::read_to_string(path).map_err(|e| Error::io("read_lines", path, e))?;
        Ok(split_lines(&contents))
    }

    fn write_contents(&self, path: &Path, data: &str) -> Result<()> {
        tracing::debug!(path = %path_for_log(path), bytes = data.len(), "write_contents");
        fs::write(path, data).map_err(|e| Error::io("write_contents", path, e))
    }

    fn write_lines(&self, path: &Path, lines: &[String]) -> Result<()> {
        tracing::debug!(path = %path_for_log(path), lines = lines.len(), "write_lines");
        fs::write(path, join_lines(lines)).map_err(|e| Error::io("write_lines", path, e))
    }

    fn find_file_recursively_up(
        &self,
        starting_dir: &Path,
        filename: &Path,
    ) -> Result<Option<PathBuf>> {
        let mut current = Some(starting_dir);
        while let Some(dir) = current {
            let candidate = dir.join(filename);
            match fs::symlink_metadata(&candidate) {
                Ok(_) => return Ok(Some(dir.to_path_buf())),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
                    ) => {}
                Err(e) => return Err(Error::io("find_file_recursively_up", candidate, e)),
            }
            current = dir.parent().filter(|p| !p.as_os_str().is_empty());
        }
        Ok(None)
    }

    fn get_files_recursive(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        WalkDir::new(dir)
            .min_depth(1)
            .into_iter()
            .map(|entry| {
                entry.map(walkdir::DirEntry::into_path).map_err(|e| {
                    let at = e.path().unwrap_or(dir).to_path_buf();
                    Error::io("get_files_recursive", at, io::Error::from(e))
                })
            })
            .collect()
    }

    fn get_files_non_recursive(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let entries =
            fs::read_dir(dir).map_err(|e| Error::io("get_files_non_recursive", dir, e))?;
        entries
            .map(|entry| {
                entry
                    .map(|e| e.path())
                    .map_err(|e| Error::io("get_files_non_recursive", dir, e))
            })
            .collect()
    }

    fn rename(&self, old_path: &Path, new_path: &Path) -> Result<()> {
        tracing::debug!(from = %path_for_log(old_path), to = %path_for_log(new_path), "rename");
        fs::rename(old_path, new_path).map_err(|e| Error::io2("rename", old_path, new_path, e))
    }

    fn remove(&self, path: &Path) -> Result<bool> {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(Error::io("remove", path, e)),
        };

        // Windows refuses to delete read-only entries.
        #[cfg(windows)]
        {
            if meta.permissions().readonly() {
                let mut perms = meta.permissions();
                perms.set_readonly(false);
                if let Err(e) = fs::set_permissions(path, perms) {
                    tracing::warn!(path = %path_for_log(path), error = %e, "could not clear read-only flag");
                }
            }
        }

        tracing::debug!(path = %path_for_log(path), "remove");
        let result = if removes_as_directory(&meta) {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        };
        match result {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io("remove", path, e)),
        }
    }

    fn is_empty(&self, path: &Path) -> Result<bool> {
        let meta = fs::metadata(path).map_err(|e| Error::io("is_empty", path, e))?;
        if meta.is_dir() {
            let mut entries = fs::read_dir(path).map_err(|e| Error::io("is_empty", path, e))?;
            Ok(entries.next().is_none())
        } else {
            Ok(meta.len() == 0)
        }
    }

    fn create_directory(&self, path: &Path) -> Result<bool> {
        match fs::create_dir(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(false),
            Err(e) => Err(Error::io("create_directory", path, e)),
        }
    }

    fn create_directories(&self, path: &Path) -> Result<bool> {
        if fs::metadata(path).is_ok_and(|m| m.is_dir()) {
            return Ok(false);
        }
        fs::create_dir_all(path)
            .map(|()| true)
            .map_err(|e| Error::io("create_directories", path, e))
    }

    fn copy_file(&self, old_path: &Path, new_path: &Path, options: CopyOptions) -> Result<bool> {
        match fs::metadata(new_path) {
            Ok(_) if is_same_file(old_path, new_path) => {
                return Err(Error::io2(
                    "copy_file",
                    old_path,
                    new_path,
                    io::Error::new(io::ErrorKind::InvalidInput, "source and destination are the same file"),
                ));
            }
            Ok(dest) => match ExistingPolicy::from(options) {
                ExistingPolicy::Fail => {
                    return Err(Error::io2(
                        "copy_file",
                        old_path,
                        new_path,
                        io::Error::from(io::ErrorKind::AlreadyExists),
                    ));
                }
                ExistingPolicy::Skip => return Ok(false),
                ExistingPolicy::Update => {
                    let src = fs::metadata(old_path)
                        .map_err(|e| Error::io("copy_file", old_path, e))?;
                    let newer = match (src.modified(), dest.modified()) {
                        (Ok(src), Ok(dest)) => src > dest,
                        _ => true,
                    };
                    if !newer {
                        return Ok(false);
                    }
                }
                ExistingPolicy::Overwrite => {}
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io("copy_file", new_path, e)),
        }

        tracing::debug!(from = %path_for_log(old_path), to = %path_for_log(new_path), "copy_file");
        fs::copy(old_path, new_path)
            .map(|_| true)
            .map_err(|e| Error::io2("copy_file", old_path, new_path, e))
    }

    fn copy_symlink(&self, old_path: &Path, new_path: &Path) -> Result<()> {
        let target = fs::read_link(old_path).map_err(|e| Error::io("copy_symlink", old_path, e))?;
        make_symlink(old_path, &target, new_path)
            .map_err(|e| Error::io2("copy_symlink", old_path, new_path, e))
    }

    fn status(&self, path: &Path) -> Result<FileStatus> {
        status_from(fs::metadata(path), "status", path)
    }

    fn symlink_status(&self, path: &Path) -> Result<FileStatus> {
        status_from(fs::symlink_metadata(path), "symlink_status", path)
    }

    fn absolute(&self, path: &Path) -> Result<PathBuf> {
        std::path::absolute(path).map_err(|e| Error::io("absolute", path, e))
    }

    fn canonical(&self, path: &Path) -> Result<PathBuf> {
        dunce::canonicalize(path).map_err(|e| Error::io("canonical", path, e))
    }

    fn current_path(&self) -> Result<PathBuf> {
        std::env::current_dir().map_err(|source| Error::Native {
            op: "current_path",
            source,
        })
    }

    fn set_current_path(&self, path: &Path) -> Result<()> {
        tracing::debug!(path = %path_for_log(path), "set_current_path");
        std::env::set_current_dir(path).map_err(|e| Error::io("set_current_path", path, e))
    }

    fn take_exclusive_file_lock(&self, path: &Path) -> Result<SystemHandle> {
        let op = "take_exclusive_file_lock";
        let file = lock::open_lock_file(path).map_err(|e| Error::io(op, path, e))?;
        lock::lock_exclusive(&file).map_err(|e| Error::io(op, path, e))?;
        tracing::debug!(path = %path_for_log(path), "lock acquired");
        Ok(lock::into_handle(file))
    }

    fn try_take_exclusive_file_lock(&self, path: &Path) -> Result<SystemHandle> {
        let op = "try_take_exclusive_file_lock";
        let file = lock::open_lock_file(path).map_err(|e| Error::io(op, path, e))?;
        let acquired = lock::poll_until(
            self.config.lock_timeout,
            self.config.lock_poll_interval,
            || lock::try_lock_exclusive(&file),
        )
        .map_err(|e| Error::io(op, path, e))?;

        if acquired {
            tracing::debug!(path = %path_for_log(path), "lock acquired");
            Ok(lock::into_handle(file))
        } else {
            Err(Error::LockTimeout {
                path: path.to_path_buf(),
                timeout: self.config.lock_timeout,
            })
        }
    }

    fn unlock_file_lock(&self, mut handle: SystemHandle) -> Result<()> {
        if !handle.is_valid() {
            return Ok(());
        }
        lock::release(&mut handle).map_err(|source| Error::Native {
            op: "unlock_file_lock",
            source,
        })
    }

    fn find_from_path(&self, name: &str) -> Vec<PathBuf> {
        let Some(search_path) = self.config.effective_search_path() else {
            return Vec::new();
        };
        let cwd = std::env::current_dir().unwrap_or_default();
        match which::which_in_all(name, Some(search_path), cwd) {
            Ok(found) => found.collect(),
            Err(e) => {
                tracing::debug!(name, error = %e, "find_from_path: no candidates");
                Vec::new()
            }
        }
    }
}

/// Both paths resolve to one entry on disk.
fn is_same_file(a: &Path, b: &Path) -> bool {
    match (dunce::canonicalize(a), dunce::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn removes_as_directory(meta: &fs::Metadata) -> bool {
    #[cfg(windows)]
    {
        use std::os::windows::fs::FileTypeExt;
        if meta.file_type().is_symlink_dir() {
            return true;
        }
    }
    is_real_directory(meta)
}

#[cfg(unix)]
fn make_symlink(_old_path: &Path, target: &Path, new_path: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, new_path)
}

#[cfg(windows)]
fn make_symlink(old_path: &Path, target: &Path, new_path: &Path) -> io::Result<()> {
    use std::os::windows::fs::FileTypeExt;
    let is_dir_link = fs::symlink_metadata(old_path)?.file_type().is_symlink_dir();
    if is_dir_link {
        std::os::windows::fs::symlink_dir(target, new_path)
    } else {
        std::os::windows::fs::symlink_file(target, new_path)
    }
}
