//! Small text utilities shared by the language scanners

/// Collapse runs of whitespace into single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Byte offset at which every line starts.
pub fn line_starts(text: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(text.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

/// 1-based line number containing byte offset `pos`.
pub fn line_of(starts: &[usize], pos: usize) -> usize {
    starts.partition_point(|&start| start <= pos).max(1)
}

/// `start..end` with the sorted, non-overlapping `holes` cut out.
pub fn subtract(start: usize, end: usize, holes: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut cursor = start;
    for &(hole_start, hole_end) in holes {
        if hole_end <= cursor || hole_start >= end {
            continue;
        }
        if hole_start > cursor {
            ranges.push((cursor, hole_start));
        }
        cursor = cursor.max(hole_end);
    }
    if cursor < end {
        ranges.push((cursor, end));
    }
    ranges
}
