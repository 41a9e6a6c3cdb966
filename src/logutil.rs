//! Helpers for putting persisted record text into log lines.
//! Legacy family files may carry stray control characters or very long
//! inventory blobs; these are escaped and capped so each warning stays on one line.

/// Longest preview emitted for a single record.
pub const MAX_PREVIEW: usize = 120;

/// Escape a raw record for single-line logging and cap it at [`MAX_PREVIEW`] chars.
///
/// Backslashes, `\n`, `\r` and `\t` are written as escapes; other control
/// characters become `\xNN`.
pub fn preview_line(raw: &str) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(raw.len().min(MAX_PREVIEW) + 4);
    for (count, ch) in raw.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}
