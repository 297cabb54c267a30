//! Text cleaning for captured terminal output.
//!
//! Session logs are raw pane output: colour codes, cursor movement, window
//! title updates and carriage returns are all mixed into the text. Lines are
//! cleaned here before anything tries to match against them.

use std::borrow::Cow;

/// Strip ANSI escape sequences from text.
///
/// Removes CSI sequences (`ESC [ ... final`), OSC sequences terminated by
/// BEL or `ESC \`, character set designations and two-byte escapes.
#[must_use]
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    // Quick check: if no escape character, return as-is
    if !text.contains('\x1b') {
        return Cow::Borrowed(text);
    }

    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\x1b' {
            result.push(c);
            continue;
        }

        let Some(&next) = chars.peek() else {
            break;
        };
        match next {
            '[' => {
                // CSI: parameter and intermediate bytes, then a final byte in @..~
                chars.next();
                for param in chars.by_ref() {
                    if ('@'..='~').contains(&param) {
                        break;
                    }
                }
            }
            ']' => {
                // OSC: terminated by BEL or ST (ESC \)
                chars.next();
                while let Some(osc_char) = chars.next() {
                    if osc_char == '\x07' {
                        break;
                    }
                    if osc_char == '\x1b' {
                        if chars.peek() == Some(&'\\') {
                            chars.next();
                        }
                        break;
                    }
                }
            }
            '(' | ')' | '*' | '+' => {
                // Designate character set: ESC ( X
                chars.next();
                chars.next();
            }
            _ if ('@'..='~').contains(&next) || next == '=' || next == '>' => {
                // Simple escape sequence: ESC X
                chars.next();
            }
            _ => {}
        }
    }

    Cow::Owned(result)
}

/// Clean one line of terminal output.
///
/// Escape sequences are stripped first; any C0 control characters left
/// behind (bare carriage returns, BEL, backspace) are then dropped. Tabs
/// are kept.
#[must_use]
pub fn clean_line(text: &str) -> String {
    let stripped = strip_ansi(text);
    if !stripped.chars().any(is_droppable_control) {
        return stripped.into_owned();
    }
    stripped
        .chars()
        .filter(|c| !is_droppable_control(*c))
        .collect()
}

/// Decode the bytes of one complete line (without its `\n`) and clean it.
///
/// Invalid UTF-8 is replaced rather than rejected; terminal output is not
/// guaranteed to be well formed.
#[must_use]
pub fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    clean_line(&String::from_utf8_lossy(bytes))
}

const fn is_droppable_control(c: char) -> bool {
    c.is_ascii_control() && c != '\t'
}
