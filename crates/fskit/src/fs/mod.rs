//! Filesystem abstraction
//!
//! Provides the synchronous [`Filesystem`] trait and implementations:
//! - `RealFs`: the host operating system
//! - `InMemoryFs`: an in-memory fake with the same contract

mod derived;
mod handle;
mod lock;
mod memory;
mod real;
mod status;
mod traits;

pub use handle::{RawSystemHandle, SystemHandle};
pub use memory::InMemoryFs;
pub use real::{RealFs, real_filesystem};
pub use status::{FileStatus, FileType, Perms, exists, is_directory, is_regular_file, is_symlink};
pub use traits::{CopyOptions, Filesystem};
