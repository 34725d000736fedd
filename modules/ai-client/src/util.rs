use std::sync::OnceLock;

use regex::Regex;

/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

/// Strip markdown code blocks from a response.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Find the outermost `[...]` slice in free-form model output.
///
/// Models asked for JSON sometimes wrap it in prose; this recovers the array
/// without attempting to parse it.
pub fn json_array_slice(response: &str) -> Option<&str> {
    static ARRAY: OnceLock<Regex> = OnceLock::new();
    let re = ARRAY.get_or_init(|| Regex::new(r"(?s)\[.*\]").expect("static regex"));
    re.find(response).map(|m| m.as_str())
}
