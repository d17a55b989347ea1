//! Text scanning helpers used to locate cells and import blocks.
//!
//! Everything here is pure: offsets are byte offsets into UTF-8 text and no
//! function touches the file system.

/// Count non-overlapping occurrences of `marker` at or after `from`.
///
/// Each match advances the search past the marker, so `"aaaa"` contains two
/// occurrences of `"aa"`. An empty marker never matches.
pub fn count_occurrences(text: &str, marker: &str, from: usize) -> usize {
    if marker.is_empty() {
        return 0;
    }

    let mut count = 0;
    let mut cursor = from;
    while let Some(found) = find_from(text, marker, cursor) {
        count += 1;
        cursor = found + marker.len();
    }
    count
}

/// Locate the byte offset of the `n`-th occurrence of `marker` at or after `from`.
///
/// Uses the same forward-search-and-advance strategy as [`count_occurrences`], so
/// for any `n <= count_occurrences(..)` the returned offset starts a match. `n` of
/// zero is treated as one.
pub fn find_nth_occurrence(text: &str, marker: &str, n: usize, from: usize) -> Option<usize> {
    if marker.is_empty() {
        return None;
    }

    let mut remaining = n.max(1);
    let mut cursor = from;
    loop {
        let found = find_from(text, marker, cursor)?;
        if remaining == 1 {
            return Some(found);
        }
        remaining -= 1;
        cursor = found + marker.len();
    }
}

/// Collect the leading run of trimmed, non-blank lines accepted by `predicate`.
///
/// Blank lines are skipped without ending the run. The first non-blank line that
/// fails the predicate stops the scan and is not included. Only lines terminated
/// by a line feed are examined.
pub fn collect_prefix_lines<F>(text: &str, mut predicate: F) -> Vec<&str>
where
    F: FnMut(&str) -> bool,
{
    let mut lines = Vec::new();
    for raw in text.split_inclusive('\n') {
        if !raw.ends_with('\n') {
            break;
        }
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if !predicate(line) {
            break;
        }
        lines.push(line);
    }
    lines
}

/// Largest character boundary at or below `offset`, capped at the text length.
pub fn floor_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// Convert a 1-based line and character column into a byte offset.
///
/// Columns past the end of the line clamp to the line end. Returns `None` when the
/// text has fewer lines than requested.
pub fn offset_at(text: &str, line: usize, column: usize) -> Option<usize> {
    let mut start = 0;
    for _ in 1..line.max(1) {
        start += text[start..].find('\n')? + 1;
    }

    let rest = &text[start..];
    let line_len = rest.find('\n').unwrap_or(rest.len());
    let within = rest[..line_len]
        .char_indices()
        .nth(column.max(1) - 1)
        .map_or(line_len, |(index, _)| index);
    Some(start + within)
}

fn find_from(text: &str, marker: &str, from: usize) -> Option<usize> {
    text.get(from..)?.find(marker).map(|index| index + from)
}
