//! In-memory filesystem implementation
//!
//! [`InMemoryFs`] satisfies the same [`Filesystem`] contract as
//! [`RealFs`](crate::RealFs) without touching the host. It models symlinks,
//! junctions, permission bits, mount boundaries (so cross-device renames can
//! be exercised) and entries that refuse removal.

use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, PoisonError, RwLock};

use super::handle::{RawSystemHandle, SystemHandle};
use super::lock;
use super::status::{FileStatus, FileType, Perms};
use super::traits::{CopyOptions, ExistingPolicy, Filesystem, join_lines, split_lines};
use crate::config::FsConfig;
use crate::error::{Error, Result};

/// Symlink chains longer than this are treated as loops.
const MAX_SYMLINK_HOPS: usize = 40;

/// In-memory filesystem.
///
/// Stores all entries in a HashMap keyed by normalized absolute path.
pub struct InMemoryFs {
    entries: RwLock<HashMap<PathBuf, FsEntry>>,
    cwd: RwLock<PathBuf>,
    locks: Mutex<LockTable>,
    lock_released: Condvar,
    undeletable: RwLock<HashSet<PathBuf>>,
    mounts: RwLock<Vec<PathBuf>>,
    clock: AtomicU64,
    config: FsConfig,
}

#[derive(Debug, Clone)]
enum FsEntry {
    File {
        content: Vec<u8>,
        perms: Perms,
        modified: u64,
    },
    Directory {
        perms: Perms,
    },
    Symlink {
        target: PathBuf,
    },
    Junction {
        target: PathBuf,
    },
}

impl FsEntry {
    fn status(&self) -> FileStatus {
        match self {
            FsEntry::File { perms, .. } => FileStatus::new(FileType::Regular, *perms),
            FsEntry::Directory { perms } => FileStatus::new(FileType::Directory, *perms),
            FsEntry::Symlink { .. } => FileStatus::new(FileType::Symlink, Perms::ALL),
            FsEntry::Junction { .. } => FileStatus::new(FileType::Junction, Perms::ALL),
        }
    }

    fn link_target(&self) -> Option<&Path> {
        match self {
            FsEntry::Symlink { target } | FsEntry::Junction { target } => Some(target),
            _ => None,
        }
    }
}

#[derive(Default)]
struct LockTable {
    held: HashMap<PathBuf, RawSystemHandle>,
    next: RawSystemHandle,
}

impl LockTable {
    fn try_acquire(&mut self, path: &Path) -> Option<SystemHandle> {
        if self.held.contains_key(path) {
            return None;
        }
        self.next += 1;
        self.held.insert(path.to_path_buf(), self.next);
        Some(SystemHandle::from_raw(self.next))
    }

    fn release(&mut self, raw: RawSystemHandle) -> bool {
        let before = self.held.len();
        self.held.retain(|_, held| *held != raw);
        self.held.len() != before
    }
}

impl Default for InMemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryFs {
    /// Create a new in-memory filesystem containing `/` and `/tmp`.
    pub fn new() -> Self {
        Self::with_config(FsConfig::default())
    }

    /// Create a new in-memory filesystem with custom configuration.
    ///
    /// `config.search_path` is the only search path consulted; the host's
    /// `PATH` is never read.
    pub fn with_config(config: FsConfig) -> Self {
        let mut entries = HashMap::new();
        for dir in ["/", "/tmp"] {
            entries.insert(
                PathBuf::from(dir),
                FsEntry::Directory { perms: Perms::from_mode(0o755) },
            );
        }
        Self {
            entries: RwLock::new(entries),
            cwd: RwLock::new(PathBuf::from("/")),
            locks: Mutex::new(LockTable::default()),
            lock_released: Condvar::new(),
            undeletable: RwLock::new(HashSet::new()),
            mounts: RwLock::new(Vec::new()),
            clock: AtomicU64::new(0),
            config,
        }
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    /// Create a symlink at `link` pointing to `target`.
    pub fn symlink(&self, target: impl Into<PathBuf>, link: &Path) -> Result<()> {
        self.insert_new("symlink", link, FsEntry::Symlink { target: target.into() })
    }

    /// Create a junction (directory reparse point) at `link` pointing to `target`.
    pub fn junction(&self, target: impl Into<PathBuf>, link: &Path) -> Result<()> {
        self.insert_new("junction", link, FsEntry::Junction { target: target.into() })
    }

    /// Replace the permission bits of a file or directory.
    pub fn set_permissions(&self, path: &Path, new_perms: Perms) -> Result<()> {
        let key = self.resolve(path, true).map_err(|e| Error::io("set_permissions", path, e))?;
        let mut entries = self.write_entries();
        match entries.get_mut(&key) {
            Some(FsEntry::File { perms, .. }) | Some(FsEntry::Directory { perms }) => {
                *perms = new_perms;
                Ok(())
            }
            _ => Err(Error::not_found("set_permissions", path)),
        }
    }

    /// Make `remove` fail with `PermissionDenied` for `path`.
    pub fn deny_removal(&self, path: &Path) {
        let key = self.lexical(path);
        self.undeletable
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key);
    }

    /// Treat `path` as the root of a separate device: renames across it fail
    /// with `CrossesDevices`.
    pub fn add_mount(&self, path: &Path) {
        let key = self.lexical(path);
        self.mounts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(key);
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<PathBuf, FsEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<PathBuf, FsEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn normalize_path(path: &Path) -> PathBuf {
        let mut result = PathBuf::from("/");

        for component in path.components() {
            match component {
                Component::Normal(name) => result.push(name),
                Component::ParentDir => {
                    result.pop();
                }
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            }
        }

        result
    }

    /// `path` joined onto the current directory and normalized, links untouched.
    fn lexical(&self, path: &Path) -> PathBuf {
        if path.has_root() {
            Self::normalize_path(path)
        } else {
            let cwd = self.cwd.read().unwrap_or_else(PoisonError::into_inner);
            Self::normalize_path(&cwd.join(path))
        }
    }

    /// Resolve every symlink in `path`, and the final component too when
    /// `follow_final` is set. Missing components are left as-is.
    fn resolve(&self, path: &Path, follow_final: bool) -> io::Result<PathBuf> {
        let entries = self.read_entries();
        Self::resolve_in(&entries, &self.lexical(path), follow_final)
    }

    fn resolve_in(
        entries: &HashMap<PathBuf, FsEntry>,
        path: &Path,
        follow_final: bool,
    ) -> io::Result<PathBuf> {
        let mut pending: Vec<OsString> = normal_components(path);
        pending.reverse();
        let mut current = PathBuf::from("/");
        let mut hops = 0;

        while let Some(name) = pending.pop() {
            let next = current.join(&name);
            let is_last = pending.is_empty();
            match entries.get(&next).and_then(FsEntry::link_target) {
                Some(target) if !is_last || follow_final => {
                    hops += 1;
                    if hops > MAX_SYMLINK_HOPS {
                        return Err(io::Error::other("too many levels of symbolic links"));
                    }
                    let target = Self::normalize_path(&current.join(target));
                    pending.extend(normal_components(&target).into_iter().rev());
                    current = PathBuf::from("/");
                }
                _ => current = next,
            }
        }

        Ok(current)
    }

    fn lookup(&self, op: &'static str, path: &Path, follow: bool) -> Result<(PathBuf, FsEntry)> {
        let key = self.resolve(path, follow).map_err(|e| Error::io(op, path, e))?;
        let entries = self.read_entries();
        match entries.get(&key) {
            Some(entry) => Ok((key, entry.clone())),
            None => Err(Error::not_found(op, path)),
        }
    }

    fn check_parent_is_dir(
        entries: &HashMap<PathBuf, FsEntry>,
        op: &'static str,
        key: &Path,
        path: &Path,
    ) -> Result<()> {
        match key.parent().and_then(|parent| entries.get(parent)) {
            Some(FsEntry::Directory { .. }) => Ok(()),
            Some(_) => Err(Error::io(op, path, io::Error::from(ErrorKind::NotADirectory))),
            None => Err(Error::not_found(op, path)),
        }
    }

    fn insert_new(&self, op: &'static str, path: &Path, entry: FsEntry) -> Result<()> {
        let key = self.resolve(path, false).map_err(|e| Error::io(op, path, e))?;
        let mut entries = self.write_entries();
        Self::check_parent_is_dir(&entries, op, &key, path)?;
        if entries.contains_key(&key) {
            return Err(Error::io(op, path, io::Error::from(ErrorKind::AlreadyExists)));
        }
        entries.insert(key, entry);
        Ok(())
    }

    fn write_file(&self, op: &'static str, path: &Path, content: Vec<u8>) -> Result<()> {
        let key = self.resolve(path, true).map_err(|e| Error::io(op, path, e))?;
        let modified = self.tick();
        let mut entries = self.write_entries();
        Self::check_parent_is_dir(&entries, op, &key, path)?;
        let perms = match entries.get(&key) {
            Some(FsEntry::Directory { .. }) => {
                return Err(Error::io(op, path, io::Error::from(ErrorKind::IsADirectory)));
            }
            Some(FsEntry::File { perms, .. }) => *perms,
            _ => Perms::from_mode(0o644),
        };
        entries.insert(
            key,
            FsEntry::File {
                content,
                perms,
                modified,
            },
        );
        Ok(())
    }

    fn read_file(&self, op: &'static str, path: &Path) -> Result<String> {
        match self.lookup(op, path, true)?.1 {
            FsEntry::File { content, .. } => String::from_utf8(content)
                .map_err(|e| Error::io(op, path, io::Error::new(ErrorKind::InvalidData, e))),
            _ => Err(Error::io(op, path, io::Error::from(ErrorKind::IsADirectory))),
        }
    }

    fn list_children(&self, op: &'static str, dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
        let (key, entry) = self.lookup(op, dir, true)?;
        if !matches!(entry, FsEntry::Directory { .. }) {
            return Err(Error::io(op, dir, io::Error::from(ErrorKind::NotADirectory)));
        }
        let entries = self.read_entries();
        Ok(entries
            .keys()
            .filter(|candidate| *candidate != &key)
            .filter_map(|candidate| candidate.strip_prefix(&key).ok())
            .filter(|rel| recursive || rel.components().count() == 1)
            .map(|rel| dir.join(rel))
            .collect())
    }

    fn mount_of(&self, key: &Path) -> Option<PathBuf> {
        let mounts = self.mounts.read().unwrap_or_else(PoisonError::into_inner);
        mounts
            .iter()
            .filter(|mount| key.starts_with(mount))
            .max_by_key(|mount| mount.components().count())
            .cloned()
    }

    fn acquire_lock_target(&self, op: &'static str, path: &Path) -> Result<PathBuf> {
        let key = self.resolve(path, true).map_err(|e| Error::io(op, path, e))?;
        let needs_file = !self.read_entries().contains_key(&key);
        if needs_file {
            self.write_file(op, path, Vec::new())?;
        }
        Ok(key)
    }
}

fn normal_components(path: &Path) -> Vec<OsString> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_os_string()),
            _ => None,
        })
        .collect()
}

impl Filesystem for InMemoryFs {
    fn read_contents(&self, path: &Path) -> Result<String> {
        self.read_file("read_contents", path)
    }

    fn read_lines(&self, path: &Path) -> Result<Vec<String>> {
        Ok(split_lines(&self.read_file("read_lines", path)?))
    }

    fn write_contents(&self, path: &Path, data: &str) -> Result<()> {
        self.write_file("write_contents", path, data.as_bytes().to_vec())
    }

    fn write_lines(&self, path: &Path, lines: &[String]) -> Result<()> {
        self.write_file("write_lines", path, join_lines(lines).into_bytes())
    }

    fn find_file_recursively_up(
        &self,
        starting_dir: &Path,
        filename: &Path,
    ) -> Result<Option<PathBuf>> {
        let start = self.lexical(starting_dir);
        let mut current = Some(start.as_path());
        while let Some(dir) = current {
            if self.symlink_status(&dir.join(filename))?.exists() {
                return Ok(Some(dir.to_path_buf()));
            }
            current = dir.parent();
        }
        Ok(None)
    }

    fn get_files_recursive(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        self.list_children("get_files_recursive", dir, true)
    }

    fn get_files_non_recursive(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        self.list_children("get_files_non_recursive", dir, false)
    }

    fn rename(&self, old_path: &Path, new_path: &Path) -> Result<()> {
        let op = "rename";
        let io2 = |kind: ErrorKind| Error::io2(op, old_path, new_path, io::Error::from(kind));
        let from = self.resolve(old_path, false).map_err(|e| Error::io(op, old_path, e))?;
        let to = self.resolve(new_path, false).map_err(|e| Error::io(op, new_path, e))?;
        if from == to {
            return Ok(());
        }
        if to.starts_with(&from) {
            return Err(io2(ErrorKind::InvalidInput));
        }
        if self.mount_of(&from) != self.mount_of(&to) {
            return Err(io2(ErrorKind::CrossesDevices));
        }

        let mut entries = self.write_entries();
        let Some(moving) = entries.get(&from).cloned() else {
            return Err(Error::not_found(op, old_path));
        };
        Self::check_parent_is_dir(&entries, op, &to, new_path)?;
        match (&moving, entries.get(&to)) {
            (_, None) => {}
            (FsEntry::Directory { .. }, Some(FsEntry::Directory { .. })) => {
                if entries.keys().any(|k| k != &to && k.starts_with(&to)) {
                    return Err(io2(ErrorKind::DirectoryNotEmpty));
                }
            }
            (FsEntry::Directory { .. }, Some(_)) => return Err(io2(ErrorKind::NotADirectory)),
            (_, Some(FsEntry::Directory { .. })) => return Err(io2(ErrorKind::IsADirectory)),
            (_, Some(_)) => {}
        }

        let moved: Vec<PathBuf> = entries
            .keys()
            .filter(|k| k.starts_with(&from))
            .cloned()
            .collect();
        for old_key in moved {
            if let Some(entry) = entries.remove(&old_key) {
                let suffix = old_key.strip_prefix(&from).unwrap_or(Path::new(""));
                let new_key = if suffix.as_os_str().is_empty() {
                    to.clone()
                } else {
                    to.join(suffix)
                };
                entries.insert(new_key, entry);
            }
        }
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<bool> {
        let op = "remove";
        let key = self.resolve(path, false).map_err(|e| Error::io(op, path, e))?;
        if self
            .undeletable
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key)
        {
            return Err(Error::io(op, path, io::Error::from(ErrorKind::PermissionDenied)));
        }

        let mut entries = self.write_entries();
        match entries.get(&key) {
            None => Ok(false),
            Some(FsEntry::Directory { .. }) => {
                if entries.keys().any(|k| k != &key && k.starts_with(&key)) {
                    return Err(Error::io(op, path, io::Error::from(ErrorKind::DirectoryNotEmpty)));
                }
                entries.remove(&key);
                Ok(true)
            }
            Some(_) => {
                entries.remove(&key);
                Ok(true)
            }
        }
    }

    fn is_empty(&self, path: &Path) -> Result<bool> {
        match self.lookup("is_empty", path, true)? {
            (_, FsEntry::File { content, .. }) => Ok(content.is_empty()),
            (key, _) => {
                let entries = self.read_entries();
                Ok(!entries.keys().any(|k| k != &key && k.starts_with(&key)))
            }
        }
    }

    fn create_directory(&self, path: &Path) -> Result<bool> {
        let op = "create_directory";
        if self.status(path)?.is_directory() {
            return Ok(false);
        }
        self.insert_new(op, path, FsEntry::Directory { perms: Perms::from_mode(0o755) })
            .map(|()| true)
    }

    fn create_directories(&self, path: &Path) -> Result<bool> {
        if self.status(path)?.is_directory() {
            return Ok(false);
        }
        let target = self.lexical(path);
        let mut current = PathBuf::from("/");
        for name in normal_components(&target) {
            current.push(name);
            self.create_directory(&current)?;
        }
        Ok(true)
    }

    fn copy_file(&self, old_path: &Path, new_path: &Path, options: CopyOptions) -> Result<bool> {
        let op = "copy_file";
        let (content, src_modified) = match self.lookup(op, old_path, true)?.1 {
            FsEntry::File {
                content, modified, ..
            } => (content, modified),
            _ => return Err(Error::io(op, old_path, io::Error::from(ErrorKind::IsADirectory))),
        };

        let dest = self.status(new_path)?;
        if dest.exists() {
            let from = self.resolve(old_path, true).map_err(|e| Error::io(op, old_path, e))?;
            let to = self.resolve(new_path, true).map_err(|e| Error::io(op, new_path, e))?;
            if from == to {
                return Err(Error::io2(
                    op,
                    old_path,
                    new_path,
                    io::Error::new(ErrorKind::InvalidInput, "source and destination are the same file"),
                ));
            }
            if dest.is_directory() {
                return Err(Error::io2(op, old_path, new_path, io::Error::from(ErrorKind::IsADirectory)));
            }
            match ExistingPolicy::from(options) {
                ExistingPolicy::Fail => {
                    return Err(Error::io2(
                        op,
                        old_path,
                        new_path,
                        io::Error::from(ErrorKind::AlreadyExists),
                    ));
                }
                ExistingPolicy::Skip => return Ok(false),
                ExistingPolicy::Update => {
                    let dest_modified = match self.lookup(op, new_path, true)?.1 {
                        FsEntry::File { modified, .. } => modified,
                        _ => 0,
                    };
                    if src_modified <= dest_modified {
                        return Ok(false);
                    }
                }
                ExistingPolicy::Overwrite => {}
            }
        }

        self.write_file(op, new_path, content).map(|()| true)
    }

    fn copy_symlink(&self, old_path: &Path, new_path: &Path) -> Result<()> {
        match self.lookup("copy_symlink", old_path, false)?.1 {
            entry @ (FsEntry::Symlink { .. } | FsEntry::Junction { .. }) => {
                self.insert_new("copy_symlink", new_path, entry)
            }
            _ => Err(Error::io(
                "copy_symlink",
                old_path,
                io::Error::from(ErrorKind::InvalidInput),
            )),
        }
    }

    fn status(&self, path: &Path) -> Result<FileStatus> {
        match self.lookup("status", path, true) {
            Ok((_, entry)) => Ok(entry.status()),
            Err(e) if e.is_not_found() => Ok(FileStatus::not_found()),
            Err(e) => Err(e),
        }
    }

    fn symlink_status(&self, path: &Path) -> Result<FileStatus> {
        match self.lookup("symlink_status", path, false) {
            Ok((_, entry)) => Ok(entry.status()),
            Err(e) if e.is_not_found() => Ok(FileStatus::not_found()),
            Err(e) => Err(e),
        }
    }

    fn absolute(&self, path: &Path) -> Result<PathBuf> {
        if path.as_os_str().is_empty() {
            return Err(Error::io("absolute", path, io::Error::from(ErrorKind::InvalidInput)));
        }
        if path.has_root() {
            return Ok(path.to_path_buf());
        }
        Ok(self.current_path()?.join(path))
    }

    fn canonical(&self, path: &Path) -> Result<PathBuf> {
        let (key, _) = self.lookup("canonical", path, true)?;
        Ok(key)
    }

    fn current_path(&self) -> Result<PathBuf> {
        Ok(self.cwd.read().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn set_current_path(&self, path: &Path) -> Result<()> {
        let (key, entry) = self.lookup("set_current_path", path, true)?;
        if !matches!(entry, FsEntry::Directory { .. }) {
            return Err(Error::io(
                "set_current_path",
                path,
                io::Error::from(ErrorKind::NotADirectory),
            ));
        }
        *self.cwd.write().unwrap_or_else(PoisonError::into_inner) = key;
        Ok(())
    }

    fn take_exclusive_file_lock(&self, path: &Path) -> Result<SystemHandle> {
        let key = self.acquire_lock_target("take_exclusive_file_lock", path)?;
        let mut table = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(handle) = table.try_acquire(&key) {
                return Ok(handle);
            }
            table = self
                .lock_released
                .wait(table)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn try_take_exclusive_file_lock(&self, path: &Path) -> Result<SystemHandle> {
        let key = self.acquire_lock_target("try_take_exclusive_file_lock", path)?;
        let mut acquired = None;
        lock::poll_until(self.config.lock_timeout, self.config.lock_poll_interval, || {
            let mut table = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            acquired = table.try_acquire(&key);
            Ok(acquired.is_some())
        })
        .map_err(|e| Error::io("try_take_exclusive_file_lock", path, e))?;

        acquired.ok_or_else(|| Error::LockTimeout {
            path: path.to_path_buf(),
            timeout: self.config.lock_timeout,
        })
    }

    fn unlock_file_lock(&self, mut handle: SystemHandle) -> Result<()> {
        if !handle.is_valid() {
            return Ok(());
        }
        let raw = handle.take_raw();
        let released = self
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .release(raw);
        self.lock_released.notify_all();
        if released {
            Ok(())
        } else {
            Err(Error::Native {
                op: "unlock_file_lock",
                source: io::Error::new(ErrorKind::InvalidInput, "unknown lock handle"),
            })
        }
    }

    fn find_from_path(&self, name: &str) -> Vec<PathBuf> {
        let Some(search_path) = &self.config.search_path else {
            return Vec::new();
        };
        std::env::split_paths(search_path)
            .map(|dir| dir.join(name))
            .filter(|candidate| {
                matches!(
                    self.status(candidate),
                    Ok(status) if status.is_regular_file() && status.permissions.bits() & 0o111 != 0
                )
            })
            .collect()
    }
}
