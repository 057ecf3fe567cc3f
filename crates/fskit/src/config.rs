//! Filesystem configuration.
//!
//! Controls the bounded lock budget and where executables are searched for.
//! Applied to both [`RealFs`](crate::RealFs) and [`InMemoryFs`](crate::InMemoryFs).

use std::ffi::OsString;
use std::time::Duration;

/// Default budget for [`Filesystem::try_take_exclusive_file_lock`](crate::Filesystem::try_take_exclusive_file_lock): 1.5s
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(1500);

/// Default delay between non-blocking lock attempts: 50ms
pub const DEFAULT_LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Filesystem configuration.
///
/// # Example
///
/// ```rust
/// use fskit::{FsConfig, RealFs};
/// use std::time::Duration;
///
/// let config = FsConfig::new()
///     .lock_timeout(Duration::from_millis(200))
///     .search_path("/opt/tools/bin");
///
/// let fs = RealFs::with_config(config);
/// assert_eq!(fs.config().lock_timeout, Duration::from_millis(200));
/// ```
///
/// # Defaults
///
/// | Setting | Default |
/// |---------|---------|
/// | `lock_timeout` | 1.5s |
/// | `lock_poll_interval` | 50ms |
/// | `search_path` | `PATH` read at call time |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsConfig {
    /// Budget for bounded lock acquisition.
    pub lock_timeout: Duration,

    /// Delay between attempts inside the bounded budget.
    /// Never longer than what is left of the budget.
    pub lock_poll_interval: Duration,

    /// Search path used by `find_from_path`, in the host's `PATH` syntax.
    /// `None` reads the `PATH` environment variable on each call.
    pub search_path: Option<OsString>,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl FsConfig {
    /// Create a configuration with defaults.
    pub const fn new() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            lock_poll_interval: DEFAULT_LOCK_POLL_INTERVAL,
            search_path: None,
        }
    }

    /// Set the bounded lock budget.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Set the delay between bounded lock attempts.
    pub fn lock_poll_interval(mut self, interval: Duration) -> Self {
        self.lock_poll_interval = interval;
        self
    }

    /// Override the executable search path.
    pub fn search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    /// The search path in effect right now.
    pub(crate) fn effective_search_path(&self) -> Option<OsString> {
        self.search_path
            .clone()
            .or_else(|| std::env::var_os("PATH"))
    }
}
