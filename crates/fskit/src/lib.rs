//! fskit - Portable filesystem abstraction with explicit error policies
//!
//! One [`Filesystem`] trait with one fallible primitive per concern, a native
//! provider ([`RealFs`]) and an in-memory fake ([`InMemoryFs`]). Callers pick
//! how failures surface through [`FilesystemExt`]: propagate, ignore, or exit
//! the process with a `file:line` diagnostic.
//!
//! # Example
//!
//! ```rust
//! use fskit::{CopyOptions, Filesystem, FilesystemExt, RealFs};
//!
//! fn main() -> fskit::Result<()> {
//!     let dir = tempfile::tempdir().expect("tempdir");
//!     let fs = RealFs::new();
//!
//!     let src = dir.path().join("notes.txt");
//!     fs.write_lines(&src, &["one".into(), "two".into()])?;
//!     assert_eq!(fs.read_lines(&src)?, vec!["one", "two"]);
//!
//!     let dst = dir.path().join("copy.txt");
//!     assert!(fs.copy_file(&src, &dst, CopyOptions::empty())?);
//!     assert!(!fs.copy_file(&src, &dst, CopyOptions::SKIP_EXISTING)?);
//!
//!     // Ignored failures come back as defaults.
//!     assert!(!fs.ignoring().remove(&dir.path().join("absent")));
//!
//!     let _guard = fs.try_lock_exclusive(&dir.path().join(".lock"))?;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod fs;
mod logging;
mod path;
mod policy;

pub use config::{DEFAULT_LOCK_POLL_INTERVAL, DEFAULT_LOCK_TIMEOUT, FsConfig};
pub use error::{Error, Result};
pub use fs::{
    CopyOptions, FileStatus, FileType, Filesystem, InMemoryFs, Perms, RawSystemHandle, RealFs,
    SystemHandle, exists, is_directory, is_regular_file, is_symlink, real_filesystem,
};
pub use logging::{MAX_LOGGED_PATH_LENGTH, sanitize_for_log};
#[cfg(windows)]
pub use path::win32_fix_path_case;
pub use path::{
    FILESYSTEM_INVALID_CHARACTERS, PREFERRED_SEPARATOR, add_filename, combine, format_paths,
    generic_u8string, has_invalid_chars_for_filesystem, print_paths, u8path, u8path_bytes,
    u8string,
};
pub use policy::{
    ErrorPolicy, FileLockGuard, FilesystemExt, IgnoreErrors, LineInfo, PolicyView, Propagate,
};
