//! Lexical helpers for Python source text
//!
//! As with the Rust scanner, extraction runs over a masked copy of the file:
//! `#` comments and string interiors become spaces while quotes, newlines and
//! byte offsets stay where they were.

/// Columns a tab advances the indentation by.
const TAB_WIDTH: usize = 4;

/// Blank out comments and string contents, keeping quotes and newlines.
pub fn mask(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = bytes.to_vec();
    let len = bytes.len();
    let mut i = 0;

    while i < len {
        match bytes[i] {
            b'#' => {
                let end = bytes[i..].iter().position(|&b| b == b'\n').map(|p| i + p).unwrap_or(len);
                blank(&mut out, i, end);
                i = end;
            }
            quote @ (b'"' | b'\'') => {
                if bytes.get(i + 1) == Some(&quote) && bytes.get(i + 2) == Some(&quote) {
                    let close = triple_quote_end(bytes, i + 3, quote);
                    blank(&mut out, i + 3, close);
                    i = (close + 3).min(len);
                } else {
                    let close = single_quote_end(bytes, i + 1, quote);
                    blank(&mut out, i + 1, close);
                    i = if bytes.get(close) == Some(&quote) { close + 1 } else { close };
                }
            }
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

/// Offset of the closing `"""`/`'''`, or the end of text.
fn triple_quote_end(bytes: &[u8], from: usize, quote: u8) -> usize {
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
        } else if bytes[i] == quote && bytes.get(i + 1) == Some(&quote) && bytes.get(i + 2) == Some(&quote) {
            return i;
        } else {
            i += 1;
        }
    }
    bytes.len()
}

/// Offset of the closing quote; an unterminated literal stops at the newline.
fn single_quote_end(bytes: &[u8], from: usize, quote: u8) -> usize {
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i,
            b if b == quote => return i,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Layout facts about one line of masked text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineInfo {
    pub start: usize,
    pub end: usize,
    pub indent: usize,
    /// Only whitespace once comments are masked
    pub blank: bool,
    /// Starts inside an open bracket or a triple-quoted string
    pub continuation: bool,
}

pub fn indent_width(text: &str) -> usize {
    let mut width = 0;
    for b in text.bytes() {
        match b {
            b' ' => width += 1,
            b'\t' => width += TAB_WIDTH,
            _ => break,
        }
    }
    width
}

pub fn line_infos(masked: &str) -> Vec<LineInfo> {
    let mut infos = Vec::new();
    let mut start = 0;
    let mut depth = 0i32;
    let mut open_triple: Option<u8> = None;

    for line in masked.split('\n') {
        infos.push(LineInfo {
            start,
            end: start + line.len(),
            indent: indent_width(line),
            blank: line.trim().is_empty(),
            continuation: depth > 0 || open_triple.is_some(),
        });

        let bytes = line.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            let is_triple = bytes.get(i + 1) == Some(&b) && bytes.get(i + 2) == Some(&b);
            match open_triple {
                Some(quote) if b == quote && is_triple => {
                    open_triple = None;
                    i += 3;
                }
                Some(_) => i += 1,
                None => match b {
                    b'"' | b'\'' if is_triple => {
                        open_triple = Some(b);
                        i += 3;
                    }
                    // Interiors are blank, so the next quote closes the literal
                    b'"' | b'\'' => {
                        i = bytes[i + 1..]
                            .iter()
                            .position(|&c| c == b)
                            .map(|p| i + p + 2)
                            .unwrap_or(bytes.len());
                    }
                    b'(' | b'[' | b'{' => {
                        depth += 1;
                        i += 1;
                    }
                    b')' | b']' | b'}' => {
                        depth = (depth - 1).max(0);
                        i += 1;
                    }
                    _ => i += 1,
                },
            }
        }
        start += line.len() + 1;
    }
    infos
}

/// First `:` at bracket depth zero, starting at `from`.
///
/// The search ends with the logical line: a newline outside brackets that
/// does not follow a `\` means the header has no colon.
pub fn header_colon(masked: &str, from: usize) -> Option<usize> {
    let bytes = masked.as_bytes();
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate().skip(from) {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b':' if depth <= 0 => return Some(i),
            b'\n' if depth <= 0 && (i == 0 || bytes[i - 1] != b'\\') => return None,
            _ => {}
        }
    }
    None
}

/// Index of the `)` matching the `(` at `open`, or the end of text.
pub fn matching_paren(masked: &str, open: usize) -> usize {
    let mut depth = 0i32;
    for (i, &b) in masked.as_bytes().iter().enumerate().skip(open) {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => {
                depth -= 1;
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
    }
    masked.len()
}

/// Split on commas that are not nested inside brackets.
pub fn split_commas(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_blanks_comments_and_strings() {
        let source = "x = 'def a():'  # class B:\ny = \"\"\"\ndef c():\n\"\"\"\n";
        let masked = mask(source);
        assert_eq!(masked.len(), source.len());
        assert!(!masked.contains("def a"));
        assert!(!masked.contains("class B"));
        assert!(!masked.contains("def c"));
        assert_eq!(masked.matches('\n').count(), source.matches('\n').count());
        assert!(masked.contains("\"\"\""));
    }

    #[test]
    fn test_mask_handles_escapes_and_unterminated_strings() {
        let masked = mask("a = 'it\\'s'\nb = 'open\nc = 1\n");
        assert!(masked.contains("c = 1"));
        assert!(!masked.contains("it"));
    }

    #[test]
    fn test_line_infos_tracks_indentation() {
        let infos = line_infos("def f():\n\treturn 1\n\n    # note\n");
        assert_eq!(infos[0].indent, 0);
        assert_eq!(infos[1].indent, 4);
        assert!(infos[2].blank);
        assert_eq!(infos[1].start, 9);
    }

    #[test]
    fn test_line_infos_marks_continuations() {
        let source = "def f():\n    x = \"\"\"\ntext\n\"\"\"\n    call(\na)\n    return x\n";
        let infos = line_infos(&mask(source));
        let flags: Vec<bool> = infos.iter().map(|l| l.continuation).collect();
        assert_eq!(flags, vec![false, false, true, true, false, true, false, false]);
    }

    #[test]
    fn test_header_colon_skips_annotations_in_parens() {
        let text = "def f(a: int, b: dict = {}) -> int:\n";
        let colon = header_colon(text, 0).unwrap();
        assert_eq!(&text[colon - 3..colon], "int");
        assert_eq!(colon, text.len() - 2);
    }

    #[test]
    fn test_header_colon_stops_at_end_of_logical_line() {
        assert_eq!(header_colon("class Broken\n\ndef ok():\n", 0), None);

        let wrapped = "def f(a,\n      b) \\\n    -> int:\n";
        assert_eq!(header_colon(wrapped, 0), Some(wrapped.len() - 2));
    }

    #[test]
    fn test_split_commas_respects_brackets() {
        let parts = split_commas("Base, Generic[T, U], metaclass=Meta");
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].trim(), "Generic[T, U]");
        assert!(is_identifier("Base"));
        assert!(!is_identifier("metaclass=Meta"));
    }
}
