//! Turning display strings into single path segments.

const UNKNOWN: &str = "Unknown";

/// Formats a display string so it can be used as one path segment.
///
/// Path separators and colons become `-`; quotes, question marks, backticks
/// and NUL are dropped. Surrounding whitespace is trimmed and an empty
/// result becomes `"Unknown"`.
pub fn format_name(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '/' | ':' => out.push('-'),
            '?' | '"' | '`' | '\0' => {}
            other => out.push(other),
        }
    }
    let trimmed = out.trim();
    if trimmed.is_empty() {
        UNKNOWN.to_string()
    } else if trimmed.len() == out.len() {
        out
    } else {
        trimmed.to_string()
    }
}

/// Case-insensitive lookup key for a display string.
pub fn name_key(value: &str) -> String {
    format_name(value).to_lowercase()
}
