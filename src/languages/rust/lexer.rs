//! Lexical helpers for Rust source text
//!
//! Everything here works on a *masked* copy of the source: comments and the
//! contents of string and char literals are overwritten with spaces, so byte
//! offsets and line breaks line up with the original while braces or keywords
//! inside literals can no longer be mistaken for code.

/// Blank out comments and literal contents, keeping quotes and newlines.
pub fn mask(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = bytes.to_vec();
    let len = bytes.len();
    let mut i = 0;

    while i < len {
        match bytes[i] {
            b'/' if i + 1 < len && bytes[i + 1] == b'/' => {
                let end = line_end(bytes, i);
                blank(&mut out, i, end);
                i = end;
            }
            b'/' if i + 1 < len && bytes[i + 1] == b'*' => {
                let end = block_comment_end(bytes, i);
                blank(&mut out, i, end);
                i = end;
            }
            b'r' | b'b' if !prev_is_ident(bytes, i) => match raw_string_end(bytes, i) {
                Some((open, close, next)) => {
                    blank(&mut out, open, close);
                    i = next;
                }
                None => i += 1,
            },
            b'"' => {
                let close = string_end(bytes, i + 1);
                // an unterminated string runs to the end of text
                let interior_end = if close > i + 1 && bytes[close - 1] == b'"' { close - 1 } else { close };
                blank(&mut out, i + 1, interior_end);
                i = close;
            }
            b'\'' => match char_literal_end(source, i) {
                Some(close) => {
                    blank(&mut out, i + 1, close - 1);
                    i = close;
                }
                // Lifetime or label
                None => i += 1,
            },
            _ => i += 1,
        }
    }

    String::from_utf8(out).unwrap_or_else(|_| source.to_string())
}

fn blank(out: &mut [u8], start: usize, end: usize) {
    let len = out.len();
    for byte in &mut out[start.min(len)..end.min(len)] {
        if *byte != b'\n' {
            *byte = b' ';
        }
    }
}

fn line_end(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|p| from + p)
        .unwrap_or(bytes.len())
}

fn block_comment_end(bytes: &[u8], from: usize) -> usize {
    let mut depth = 0usize;
    let mut i = from;
    while i + 1 < bytes.len() {
        if bytes[i] == b'/' && bytes[i + 1] == b'*' {
            depth += 1;
            i += 2;
        } else if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            depth -= 1;
            i += 2;
            if depth == 0 {
                return i;
            }
        } else {
            i += 1;
        }
    }
    bytes.len()
}

/// Returns the index just past the closing quote of a normal string.
fn string_end(bytes: &[u8], from: usize) -> usize {
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Detects `r"…"`, `r#"…"#`, `br"…"` and returns the interior range plus
/// the index just past the closing delimiter.
fn raw_string_end(bytes: &[u8], from: usize) -> Option<(usize, usize, usize)> {
    let mut i = from;
    if bytes[i] == b'b' {
        i += 1;
    }
    if i >= bytes.len() || bytes[i] != b'r' {
        return None;
    }
    i += 1;
    let mut hashes = 0;
    while i < bytes.len() && bytes[i] == b'#' {
        hashes += 1;
        i += 1;
    }
    if i >= bytes.len() || bytes[i] != b'"' {
        return None;
    }
    let open = i + 1;
    let mut j = open;
    while j < bytes.len() {
        if bytes[j] == b'"' && bytes[j + 1..].iter().take(hashes).filter(|&&b| b == b'#').count() == hashes {
            return Some((open, j, (j + 1 + hashes).min(bytes.len())));
        }
        j += 1;
    }
    Some((open, bytes.len(), bytes.len()))
}

/// Returns the index just past a char literal starting at `from`, or `None`
/// when the quote starts a lifetime.
fn char_literal_end(source: &str, from: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let next = *bytes.get(from + 1)?;
    if next == b'\\' {
        let limit = (from + 12).min(bytes.len());
        return (from + 3..limit).find(|&k| bytes[k] == b'\'').map(|k| k + 1);
    }
    let ch = source.get(from + 1..)?.chars().next()?;
    let close = from + 1 + ch.len_utf8();
    (bytes.get(close) == Some(&b'\'')).then_some(close + 1)
}

pub fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn prev_is_ident(bytes: &[u8], i: usize) -> bool {
    i > 0 && is_ident_byte(bytes[i - 1])
}

/// Brace depth before each byte of the masked text (one extra slot for EOF).
pub fn brace_depths(masked: &str) -> Vec<u32> {
    let mut depths = Vec::with_capacity(masked.len() + 1);
    let mut depth = 0u32;
    for &b in masked.as_bytes() {
        depths.push(depth);
        match b {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depths.push(depth);
    depths
}

/// Index of the `}` matching the `{` at `open`, or the end of text when unbalanced.
pub fn matching_brace(masked: &str, open: usize) -> usize {
    let bytes = masked.as_bytes();
    let mut depth = 0u32;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
    }
    bytes.len()
}

/// First `{` or `;` outside parentheses and brackets, starting at `from`.
pub fn header_end(masked: &str, from: usize) -> Option<(usize, u8)> {
    let mut depth = 0i32;
    for (i, &b) in masked.as_bytes().iter().enumerate().skip(from) {
        match b {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth -= 1,
            b'{' | b';' if depth <= 0 => return Some((i, b)),
            _ => {}
        }
    }
    None
}

/// First `;` outside any bracket kind, starting at `from`.
pub fn statement_end(masked: &str, from: usize) -> usize {
    let mut depth = 0i32;
    for (i, &b) in masked.as_bytes().iter().enumerate().skip(from) {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b';' if depth <= 0 => return i,
            _ => {}
        }
        if depth < 0 {
            return i;
        }
    }
    masked.len()
}

/// Index just past the `>` closing the `<` at `open`; `->` arrows are skipped.
pub fn matching_angle(text: &str, open: usize) -> usize {
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'<' => depth += 1,
            b'>' if i > 0 && bytes[i - 1] == b'-' => {}
            b'>' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
    }
    bytes.len()
}

/// Split on `sep` where it is not nested inside `<>`, `()`, `[]` or `{}`.
pub fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut prev = '\0';
    for (i, c) in text.char_indices() {
        match c {
            '<' | '(' | '[' | '{' => depth += 1,
            '>' if prev == '-' => {}
            '>' | ')' | ']' | '}' => depth -= 1,
            _ if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
        prev = c;
    }
    parts.push(&text[start..]);
    parts
}
