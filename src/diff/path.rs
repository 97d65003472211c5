//! Path quoting as git prints it.
//!
//! Paths with unusual bytes are written inside double quotes with C-style
//! escapes and octal escapes for anything outside printable ASCII.

use std::fmt::Write;

const DEV_NULL: &str = "/dev/null";

/// Byte length of the quoted string at the start of `text`, closing quote
/// included. `None` if `text` does not start with a terminated quote.
pub(crate) fn quoted_len(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.first() != Some(&b'"') {
        return None;
    }

    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

/// Decode the body of a quoted path (without the surrounding quotes).
pub(crate) fn unescape(body: &str) -> String {
    let bytes = body.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'\\' || i + 1 >= bytes.len() {
            out.push(bytes[i]);
            i += 1;
            continue;
        }

        let escaped = bytes[i + 1];
        i += 2;
        let byte = match escaped {
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0c,
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'v' => 0x0b,
            b'0'..=b'7' => {
                let mut value = u32::from(escaped - b'0');
                let mut digits = 1;
                while digits < 3 && i < bytes.len() && (b'0'..=b'7').contains(&bytes[i]) {
                    value = value * 8 + u32::from(bytes[i] - b'0');
                    i += 1;
                    digits += 1;
                }
                (value & 0xff) as u8
            }
            other => other,
        };
        out.push(byte);
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Turn the raw text of a path token into its value: unquote, map
/// `/dev/null` to the empty string and drop `prefix` when present.
pub(crate) fn path_value(raw: &str, prefix: &str) -> String {
    let unquoted = match quoted_len(raw) {
        Some(len) => unescape(&raw[1..len - 1]),
        None => raw.split('\t').next().unwrap_or_default().to_string(),
    };

    if unquoted == DEV_NULL {
        return String::new();
    }

    match unquoted.strip_prefix(prefix) {
        Some(stripped) if !prefix.is_empty() => stripped.to_string(),
        _ => unquoted,
    }
}

/// Render `prefix` + `path` for a `---`/`+++` line, quoting when git would.
pub(crate) fn quote_path(prefix: &str, path: &str) -> String {
    let full = format!("{prefix}{path}");
    let needs_quotes = full
        .bytes()
        .any(|b| b == b'"' || b == b'\\' || b < 0x20 || b >= 0x7f);
    if !needs_quotes {
        return full;
    }

    let mut quoted = String::with_capacity(full.len() + 2);
    quoted.push('"');
    for byte in full.bytes() {
        match byte {
            b'"' => quoted.push_str("\\\""),
            b'\\' => quoted.push_str("\\\\"),
            b'\n' => quoted.push_str("\\n"),
            b'\t' => quoted.push_str("\\t"),
            0x20..=0x7e => quoted.push(char::from(byte)),
            _ => {
                let _ = write!(quoted, "\\{byte:03o}");
            }
        }
    }
    quoted.push('"');
    quoted
}
