//! Pure normalization helpers for handles and alias lists.

use std::collections::HashSet;

/// Return the handle with exactly one leading `@`, or `None` when blank.
///
/// Idempotent: normalizing an already-normalized handle returns it unchanged.
pub fn normalize_handle(value: Option<&str>) -> Option<String> {
    let cleaned = value?.trim();
    let bare = cleaned.trim_start_matches('@');
    if bare.is_empty() {
        return None;
    }
    Some(format!("@{bare}"))
}

/// Deduplicate aliases case-insensitively while preserving order.
///
/// Blank entries are dropped and survivors are trimmed. The first-seen
/// casing of each alias wins.
pub fn dedupe_aliases<I, S>(aliases: I) -> Vec<String>
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for alias in aliases.into_iter().flatten() {
        let cleaned = alias.as_ref().trim();
        if cleaned.is_empty() {
            continue;
        }
        if seen.insert(cleaned.to_lowercase()) {
            result.push(cleaned.to_string());
        }
    }
    result
}

/// Comparison key used for tokens and aliases: trimmed and lowercased.
pub(crate) fn token_key(value: &str) -> String {
    value.trim().to_lowercase()
}
