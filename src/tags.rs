use std::collections::HashSet;

/// Collapses a comma-separated tag list to its first occurrence of each tag.
///
/// Tags are compared case-insensitively after trimming; the original casing
/// of the first occurrence is kept. Empty segments (doubled commas, trailing
/// commas) are dropped. Weight and bracket syntax is part of the tag text,
/// so `{masterpiece}` and `masterpiece` are distinct tags.
pub fn deduplicate_tags(prompt: &str) -> String {
    if prompt.is_empty() {
        return String::new();
    }

    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for tag in prompt.split(',') {
        let tag = tag.trim();
        if tag.is_empty() {
            continue;
        }
        if seen.insert(tag.to_lowercase()) {
            unique.push(tag);
        }
    }
    unique.join(", ")
}
