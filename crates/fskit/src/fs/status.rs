//! Unified file-status model.
//!
//! [`FileType`] is the superset of entry kinds across hosts. Windows directory
//! symlinks and junctions get their own [`FileType::Junction`] value but are
//! classified as symlinks by [`FileStatus::is_symlink`].
//!
//! Predicates only accept a [`FileStatus`]; there is no way to ask a bare
//! path for its status without going through a [`Filesystem`](crate::Filesystem):
//!
//! ```compile_fail
//! use std::path::Path;
//! let _ = fskit::is_symlink(Path::new("link"));
//! ```
//!
//! ```compile_fail
//! use std::path::Path;
//! let _ = fskit::status(Path::new("file"));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    /// Status has not been determined.
    #[default]
    None,
    /// The path does not exist.
    NotFound,
    Regular,
    Directory,
    Symlink,
    Block,
    Character,
    Fifo,
    Socket,
    /// Exists, but the host reported a kind we do not model.
    Unknown,
    /// Windows directory symlink; also stands for a junction.
    Junction,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileType::None => "none",
            FileType::NotFound => "not_found",
            FileType::Regular => "regular",
            FileType::Directory => "directory",
            FileType::Symlink => "symlink",
            FileType::Block => "block",
            FileType::Character => "character",
            FileType::Fifo => "fifo",
            FileType::Socket => "socket",
            FileType::Unknown => "unknown",
            FileType::Junction => "junction",
        };
        f.write_str(name)
    }
}

/// Permission bits, POSIX mode layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Perms(u32);

impl Perms {
    pub const NONE: Perms = Perms(0);
    pub const OWNER_ALL: Perms = Perms(0o700);
    pub const GROUP_ALL: Perms = Perms(0o070);
    pub const OTHERS_ALL: Perms = Perms(0o007);
    pub const ALL: Perms = Perms(0o777);
    pub const MASK: Perms = Perms(0o7777);
    /// The host could not report permissions.
    pub const UNKNOWN: Perms = Perms(0xFFFF);

    /// Keep only the bits inside [`Perms::MASK`].
    pub const fn from_mode(mode: u32) -> Self {
        Perms(mode & Self::MASK.0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_unknown(self) -> bool {
        self.0 == Self::UNKNOWN.0
    }

    pub const fn contains(self, other: Perms) -> bool {
        self.0 & other.0 == other.0
    }

    /// Permissions derived from host metadata.
    pub(crate) fn from_metadata(meta: &std::fs::Metadata) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            Perms::from_mode(meta.permissions().mode())
        }
        #[cfg(windows)]
        {
            if meta.permissions().readonly() {
                Perms(0o555)
            } else {
                Perms::ALL
            }
        }
        #[cfg(not(any(unix, windows)))]
        {
            let _ = meta;
            Perms::UNKNOWN
        }
    }
}

impl Default for Perms {
    fn default() -> Self {
        Perms::UNKNOWN
    }
}

impl fmt::Display for Perms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            f.write_str("unknown")
        } else {
            write!(f, "{:04o}", self.0)
        }
    }
}

/// A `{type, permissions}` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileStatus {
    pub file_type: FileType,
    pub permissions: Perms,
}

impl FileStatus {
    pub const fn new(file_type: FileType, permissions: Perms) -> Self {
        Self {
            file_type,
            permissions,
        }
    }

    /// Status of a path that does not exist.
    pub const fn not_found() -> Self {
        Self::new(FileType::NotFound, Perms::UNKNOWN)
    }

    /// True for genuine symlinks and for junctions / directory symlinks.
    pub fn is_symlink(&self) -> bool {
        matches!(self.file_type, FileType::Symlink | FileType::Junction)
    }

    pub fn is_regular_file(&self) -> bool {
        self.file_type == FileType::Regular
    }

    pub fn is_directory(&self) -> bool {
        self.file_type == FileType::Directory
    }

    /// True unless the type is `NotFound` or `None`.
    pub fn exists(&self) -> bool {
        !matches!(self.file_type, FileType::NotFound | FileType::None)
    }

    /// Build a status from host metadata, without following links.
    pub(crate) fn from_metadata(meta: &std::fs::Metadata) -> Self {
        Self::new(classify(meta.file_type()), Perms::from_metadata(meta))
    }
}

/// True for genuine symlinks and for junctions / directory symlinks.
pub fn is_symlink(status: FileStatus) -> bool {
    status.is_symlink()
}

pub fn is_regular_file(status: FileStatus) -> bool {
    status.is_regular_file()
}

pub fn is_directory(status: FileStatus) -> bool {
    status.is_directory()
}

/// True unless the type is `NotFound` or `None`.
pub fn exists(status: FileStatus) -> bool {
    status.exists()
}

fn classify(ft: std::fs::FileType) -> FileType {
    #[cfg(windows)]
    {
        use std::os::windows::fs::FileTypeExt;
        if ft.is_symlink_dir() {
            return FileType::Junction;
        }
    }
    if ft.is_symlink() {
        return FileType::Symlink;
    }
    if ft.is_dir() {
        return FileType::Directory;
    }
    if ft.is_file() {
        return FileType::Regular;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        if ft.is_block_device() {
            return FileType::Block;
        }
        if ft.is_char_device() {
            return FileType::Character;
        }
        if ft.is_fifo() {
            return FileType::Fifo;
        }
        if ft.is_socket() {
            return FileType::Socket;
        }
    }
    FileType::Unknown
}
