//! Helpers for cutting text down to size without splitting characters.

use std::borrow::Cow;

/// The longest prefix of `s` that fits in `max_bytes` and ends on a char
/// boundary.
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// `s` cut to at most `max_bytes`, with `...` appended when anything was cut.
/// Used for log lines and tool output echoed to the terminal.
pub fn preview(s: &str, max_bytes: usize) -> Cow<'_, str> {
    let kept = truncate_str(s, max_bytes);
    if kept.len() == s.len() {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(format!("{kept}..."))
    }
}
