//! Tag list parsing.
//!
//! Tag lists are written as `cat;dog;outdoor`, optionally wrapped in double
//! quotes. Whitespace around each tag is trimmed and empty entries are
//! dropped.

/// Separator between tags in a tag list.
pub const TAG_SEPARATOR: char = ';';

/// Parse a tag list into distinct tag names, preserving first occurrence order.
pub fn parse_tags(input: &str) -> Vec<String> {
    let cleaned = input.replace('"', "");
    let mut tags: Vec<String> = Vec::new();
    for tag in cleaned.split(TAG_SEPARATOR).map(str::trim) {
        if tag.is_empty() || tags.iter().any(|t| t == tag) {
            continue;
        }
        tags.push(tag.to_string());
    }
    tags
}
