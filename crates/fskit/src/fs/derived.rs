//! Recursive algorithms expressed over the single-entry primitives.
//!
//! [`Filesystem`]'s default `copy`, `remove_all`, `remove_all_inside` and
//! `rename_or_copy` call into here, so every implementation walks trees the
//! same way.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use super::status::FileType;
use super::traits::{CopyOptions, Filesystem};
use crate::error::{Error, Result};
use crate::logging::path_for_log;

/// Remove `path`'s subtree, and `path` itself when `include_self` is set.
///
/// Keeps going after a failure and reports the first one as
/// [`Error::RemoveAll`].
pub(crate) fn remove_all<F: Filesystem + ?Sized>(
    fs: &F,
    path: &Path,
    include_self: bool,
) -> Result<()> {
    let mut first = None;
    remove_tree(fs, path, include_self, &mut first);
    match first {
        None => Ok(()),
        Some((failure_point, source)) => {
            tracing::warn!(
                root = %path_for_log(path),
                failure_point = %path_for_log(&failure_point),
                error = %source,
                "recursive removal incomplete"
            );
            Err(Error::RemoveAll {
                failure_point,
                source: Box::new(source),
            })
        }
    }
}

fn remove_tree<F: Filesystem + ?Sized>(
    fs: &F,
    path: &Path,
    include_self: bool,
    first: &mut Option<(PathBuf, Error)>,
) {
    // The root of a `remove_all_inside` is emptied through a link; below the
    // root, symlinks and junctions are removed as entries, never descended into.
    let status = if include_self {
        fs.symlink_status(path)
    } else {
        fs.status(path)
    };
    let status = match status {
        Ok(status) => status,
        Err(e) => return record_failure(first, path, e),
    };
    if !status.exists() {
        return;
    }

    if status.is_directory() {
        match fs.get_files_non_recursive(path) {
            Ok(children) => {
                for child in children {
                    remove_tree(fs, &child, true, first);
                }
            }
            Err(e) => return record_failure(first, path, e),
        }
    }

    if include_self {
        if let Err(e) = fs.remove(path) {
            record_failure(first, path, e);
        }
    }
}

fn record_failure(first: &mut Option<(PathBuf, Error)>, path: &Path, error: Error) {
    tracing::debug!(path = %path_for_log(path), error = %error, "remove_all: entry failed");
    if first.is_none() {
        *first = Some((path.to_path_buf(), error));
    }
}

/// Copy a file, symlink or directory according to `options`.
///
/// Directories are created at the destination and their immediate entries
/// copied; subdirectories are only descended into with `RECURSIVE`.
pub(crate) fn copy<F: Filesystem + ?Sized>(
    fs: &F,
    old_path: &Path,
    new_path: &Path,
    options: CopyOptions,
) -> Result<()> {
    let status = if options.contains(CopyOptions::COPY_SYMLINKS) {
        fs.symlink_status(old_path)?
    } else {
        fs.status(old_path)?
    };

    match status.file_type {
        FileType::NotFound | FileType::None => Err(Error::not_found("copy", old_path)),
        FileType::Symlink | FileType::Junction => fs.copy_symlink(old_path, new_path),
        FileType::Regular => fs.copy_file(old_path, new_path, options).map(drop),
        FileType::Directory => {
            fs.create_directory(new_path)?;
            for child in fs.get_files_non_recursive(old_path)? {
                let Some(name) = child.file_name() else {
                    continue;
                };
                if !options.contains(CopyOptions::RECURSIVE)
                    && fs.symlink_status(&child)?.is_directory()
                {
                    continue;
                }
                copy(fs, &child, &new_path.join(name), options)?;
            }
            Ok(())
        }
        other => Err(Error::io2(
            "copy",
            old_path,
            new_path,
            io::Error::new(
                io::ErrorKind::Unsupported,
                format!("cannot copy {other} entries"),
            ),
        )),
    }
}

/// Rename, or copy to `new_path + temp_suffix`, move that into place and
/// delete the original when the rename crosses devices.
pub(crate) fn rename_or_copy<F: Filesystem + ?Sized>(
    fs: &F,
    old_path: &Path,
    new_path: &Path,
    temp_suffix: &str,
) -> Result<()> {
    match fs.rename(old_path, new_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::warn!(
                from = %path_for_log(old_path),
                to = %path_for_log(new_path),
                "rename crosses devices, copying instead"
            );
            let mut temp = OsString::from(new_path.as_os_str());
            temp.push(temp_suffix);
            let temp = PathBuf::from(temp);

            let options = CopyOptions::RECURSIVE
                | CopyOptions::OVERWRITE_EXISTING
                | CopyOptions::COPY_SYMLINKS;
            if let Err(e) = copy(fs, old_path, &temp, options) {
                discard_temp(fs, &temp);
                return Err(e);
            }
            if let Err(e) = fs.rename(&temp, new_path) {
                discard_temp(fs, &temp);
                return Err(e);
            }
            fs.remove_all(old_path)
        }
        Err(e) => Err(e),
    }
}

fn discard_temp<F: Filesystem + ?Sized>(fs: &F, temp: &Path) {
    if let Err(e) = remove_all(fs, temp, true) {
        tracing::warn!(path = %path_for_log(temp), error = %e, "failed to clean up partial copy");
    }
}
