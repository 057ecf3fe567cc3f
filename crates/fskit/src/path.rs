//! UTF-8 path codec and path composition helpers.
//!
//! Paths are stored natively ([`PathBuf`]) but crossed into and out of the
//! API as UTF-8. Conversion never goes through a lossy step: a native path
//! that is not valid UTF-8 is reported as [`Error::InvalidUtf8`].

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Characters that may not appear in a file name on at least one supported host.
pub const FILESYSTEM_INVALID_CHARACTERS: &str = r#"\/:*?"<>|"#;

/// The host's preferred path separator.
#[cfg(windows)]
pub const PREFERRED_SEPARATOR: char = '\\';
/// The host's preferred path separator.
#[cfg(not(windows))]
pub const PREFERRED_SEPARATOR: char = '/';

/// Build a native path from UTF-8 text.
pub fn u8path(s: &str) -> PathBuf {
    PathBuf::from(s)
}

/// Build a native path from raw bytes, which must be valid UTF-8.
pub fn u8path_bytes(bytes: &[u8]) -> Result<PathBuf> {
    std::str::from_utf8(bytes)
        .map(u8path)
        .map_err(|_| Error::InvalidUtf8 {
            lossy: String::from_utf8_lossy(bytes).into_owned(),
        })
}

/// Render a native path as UTF-8, keeping native separators.
pub fn u8string(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_owned)
        .ok_or_else(|| Error::InvalidUtf8 {
            lossy: path.to_string_lossy().into_owned(),
        })
}

/// Render a native path as UTF-8 with `/` as the separator on every host.
pub fn generic_u8string(path: &Path) -> Result<String> {
    let s = u8string(path)?;
    if cfg!(windows) {
        Ok(s.replace('\\', "/"))
    } else {
        Ok(s)
    }
}

/// True if `s` contains any of [`FILESYSTEM_INVALID_CHARACTERS`].
pub fn has_invalid_chars_for_filesystem(s: &str) -> bool {
    s.contains(|c| FILESYSTEM_INVALID_CHARACTERS.contains(c))
}

/// `lhs / rhs` with C++17 `path::operator/` semantics.
///
/// An absolute `rhs` (or one carrying a different root name) replaces `lhs`;
/// otherwise exactly one separator joins them, so `combine("a", "b")` and
/// `combine("a/", "b")` are both `a/b`.
pub fn combine(lhs: impl AsRef<Path>, rhs: impl AsRef<Path>) -> PathBuf {
    let (lhs, rhs) = (lhs.as_ref(), rhs.as_ref());
    if lhs.as_os_str().is_empty() {
        return rhs.to_path_buf();
    }
    // PathBuf::push already implements the replace-on-absolute rule and only
    // inserts a separator when lhs does not end in one.
    lhs.join(rhs)
}

/// Append `file` to `base` as a new path element, adding a separator only if
/// `base` does not already end in one.
pub fn add_filename(base: &str, file: &str) -> String {
    let mut result = String::with_capacity(base.len() + file.len() + 1);
    result.push_str(base);
    if !base.is_empty() && !ends_with_separator(base) {
        result.push(PREFERRED_SEPARATOR);
    }
    result.push_str(file);
    result
}

fn ends_with_separator(s: &str) -> bool {
    s.ends_with('/') || (cfg!(windows) && s.ends_with('\\'))
}

/// Format paths one per line, as printed by [`print_paths`].
pub fn format_paths(paths: &[PathBuf]) -> String {
    let mut out = String::from("\n");
    for path in paths {
        out.push_str("    ");
        out.push_str(&path.display().to_string());
        out.push('\n');
    }
    out.push('\n');
    out
}

/// Print a list of paths to stdout, indented and framed by blank lines.
pub fn print_paths(paths: &[PathBuf]) {
    print!("{}", format_paths(paths));
}

/// Rewrite `source` so every existing component matches the case stored on disk.
///
/// Components that do not exist are kept as given.
#[cfg(windows)]
pub fn win32_fix_path_case(source: &Path) -> PathBuf {
    use std::path::Component;

    let mut result = PathBuf::new();
    for component in source.components() {
        match component {
            Component::Prefix(prefix) => {
                result.push(prefix.as_os_str().to_ascii_uppercase());
            }
            Component::RootDir | Component::CurDir | Component::ParentDir => {
                result.push(component.as_os_str());
            }
            Component::Normal(name) => {
                let on_disk = std::fs::read_dir(if result.as_os_str().is_empty() {
                    Path::new(".")
                } else {
                    result.as_path()
                })
                .ok()
                .and_then(|entries| {
                    entries.filter_map(|e| e.ok()).map(|e| e.file_name()).find(|n| {
                        n.to_string_lossy()
                            .eq_ignore_ascii_case(&name.to_string_lossy())
                    })
                });
                result.push(on_disk.as_deref().unwrap_or(name));
            }
        }
    }
    result
}
