//! Expansion of an `input_buffer` into concrete candidate strings.
//!
//! A buffer entry is either a literal candidate, or a half-open range of the
//! form `"start-end"` (decimal, `end` exclusive) that expands to the decimal
//! string of every integer in `[start, end)`. A buffer is treated as
//! range-form only when its *first* entry contains a `-`; a mixed buffer is
//! not supported, matching the convention every entry in a chunked buffer
//! shares the same shape.

pub fn is_range_form(input_buffer: &[String]) -> bool {
    input_buffer.first().map(|s| s.contains('-')).unwrap_or(false)
}

/// Parses a `"start-end"` entry into its endpoints.
pub fn parse_range(entry: &str) -> Option<(u64, u64)> {
    let (start, end) = entry.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?))
}

/// Number of candidate strings a buffer expands to, without allocating them.
/// Used for hash-rate accounting.
pub fn expanded_len(input_buffer: &[String]) -> u64 {
    if is_range_form(input_buffer) {
        input_buffer
            .iter()
            .filter_map(|s| parse_range(s))
            .map(|(start, end)| end.saturating_sub(start))
            .sum()
    } else {
        input_buffer.len() as u64
    }
}

/// Lazily expands a buffer into an iterator of owned candidate strings.
pub fn expand(input_buffer: &[String]) -> Box<dyn Iterator<Item = String> + '_> {
    if is_range_form(input_buffer) {
        Box::new(
            input_buffer
                .iter()
                .filter_map(|s| parse_range(s))
                .flat_map(|(start, end)| (start..end).map(|n| n.to_string())),
        )
    } else {
        Box::new(input_buffer.iter().cloned())
    }
}
