//! Helpers for putting paths into log events.
//!
//! # Log Levels
//!
//! - **ERROR**: fatal-policy failures, right before the process exits
//! - **WARN**: fallback paths (copy instead of rename, partial recursive removal)
//! - **DEBUG**: every mutating primitive, ignored errors
//! - **TRACE**: lock polling
//!
//! Paths come from callers and may contain control characters; they are
//! escaped so one event stays on one line.

use std::borrow::Cow;
use std::path::Path;

/// Longest path rendered into a log event before truncation.
pub const MAX_LOGGED_PATH_LENGTH: usize = 200;

/// Escape control characters so a value cannot break log lines.
pub fn sanitize_for_log(input: &str) -> Cow<'_, str> {
    if !input.chars().any(char::is_control) {
        return Cow::Borrowed(input);
    }
    let mut out = String::with_capacity(input.len() + 8);
    for c in input.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:x}}}", c as u32)),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Render a path for a log event: lossy UTF-8, escaped, truncated.
pub fn path_for_log(path: &Path) -> String {
    let lossy = path.to_string_lossy();
    let sanitized = sanitize_for_log(&lossy);
    truncate(&sanitized, MAX_LOGGED_PATH_LENGTH)
}

/// Handles UTF-8 char boundaries so multi-byte names never panic.
fn truncate(value: &str, max: usize) -> String {
    if value.len() <= max {
        return value.to_owned();
    }
    let mut end = max;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...[truncated {} bytes]", &value[..end], value.len() - end)
}
