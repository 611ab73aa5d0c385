//! Text conversion for programs that talk in ASCII codes.
//!
//! Interactive programs read commands one line at a time, terminated by a
//! newline code, and print their replies one character per output. A few
//! also report a final numeric answer that falls outside the ASCII range.

use std::fmt::Write;

const NEWLINE: i64 = b'\n' as i64;

/// Encode one line of text as input codes, appending the newline terminator.
pub fn encode_line(line: &str) -> Vec<i64> {
    line.bytes().map(i64::from).chain([NEWLINE]).collect()
}

/// The character for an output value, if it is plain ASCII.
pub fn to_char(value: i64) -> Option<char> {
    u8::try_from(value).ok().filter(u8::is_ascii).map(char::from)
}

/// Render an output stream as text. Values outside the ASCII range appear
/// as `[value]` on a line of their own.
pub fn render(values: &[i64]) -> String {
    let mut out = String::with_capacity(values.len());
    for &value in values {
        match to_char(value) {
            Some(c) => out.push(c),
            None => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                let _ = writeln!(out, "[{value}]");
            }
        }
    }
    out
}
