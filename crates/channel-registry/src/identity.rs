//! Turning free-form channel references into lookup tokens and seed fields.
//!
//! Accepted shapes: raw channel ids (`UC…`), `@handles`, channel URLs
//! (`https://www.youtube.com/@handle`, `/c/<slug>`, `/channel/<id>`), and
//! free text such as a title or owner name.

use std::collections::BTreeSet;

use url::Url;

use crate::{
    normalize::{normalize_handle, token_key},
    types::{SYNTHETIC_ID_PREFIX, is_canonical_id, is_synthetic_id},
};

const YOUTUBE_HOST_MARKER: &str = "youtube.com";

/// Lookup tokens derived from one identifier.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IdentifierTokens {
    /// Case-preserved candidates that may be canonical ids, checked against
    /// the primary key before any token scan.
    pub canonical: Vec<String>,
    /// Lowercased tokens matched against each record's search tokens.
    pub search: BTreeSet<String>,
}

impl IdentifierTokens {
    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty() && self.search.is_empty()
    }
}

/// Expand an identifier into the tokens used for resolution.
pub fn expand_identifier(identifier: &str) -> IdentifierTokens {
    let mut tokens = IdentifierTokens::default();
    let cleaned = identifier.trim();
    if cleaned.is_empty() {
        return tokens;
    }

    push_canonical(&mut tokens.canonical, cleaned);
    let lowered = token_key(cleaned);
    if let Some(bare) = lowered.strip_prefix('@') {
        let bare = bare.trim_start_matches('@');
        if !bare.is_empty() {
            tokens.search.insert(bare.to_string());
        }
    }
    tokens.search.insert(lowered);

    if let Some(path) = url_path(cleaned) {
        for segment in path.split('/') {
            push_canonical(&mut tokens.canonical, segment);
            if let Some(handle) = segment.strip_prefix('@')
                && !handle.is_empty()
            {
                tokens.search.insert(token_key(handle));
            }
        }
        let lowered_path = token_key(&path);
        if let Some((_, after)) = lowered_path.split_once('@')
            && !after.is_empty()
        {
            tokens.search.insert(after.to_string());
        }
        tokens.search.insert(lowered_path);
    }

    tokens
}

/// Placeholder-aware channel id for an identifier with no registry match.
///
/// Identifiers that already look like a channel id or a placeholder id are
/// used as-is; anything else becomes `synthetic::<lowercased identifier>`.
pub fn deduce_channel_id(identifier: &str) -> String {
    let cleaned = identifier.trim();
    if is_canonical_id(cleaned) || is_synthetic_id(cleaned) {
        return cleaned.to_string();
    }
    format!("{SYNTHETIC_ID_PREFIX}{}", cleaned.to_lowercase())
}

/// Handle implied by an identifier: an `@handle` itself or the `@` segment
/// of a channel URL.
pub fn extract_handle(identifier: &str) -> Option<String> {
    let text = identifier.trim();
    if text.contains(YOUTUBE_HOST_MARKER)
        && let Some(path) = url_path(text)
        && let Some(segment) = path.split('/').find(|s| s.starts_with('@'))
    {
        return normalize_handle(Some(segment));
    }
    if text.starts_with('@') {
        return normalize_handle(Some(text));
    }
    None
}

/// Vanity slug from a channel URL: `/c/<slug>`, `/channel/<slug>`, or the
/// trailing path segment.
pub fn extract_custom_slug(identifier: &str) -> Option<String> {
    let text = identifier.trim();
    if !text.contains(YOUTUBE_HOST_MARKER) {
        return None;
    }
    let path = url_path(text)?;
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [] => None,
        [kind, slug, ..] if kind.eq_ignore_ascii_case("c") || kind.eq_ignore_ascii_case("channel") => {
            Some((*slug).to_string())
        },
        [.., last] => Some((*last).to_string()),
    }
}

/// Percent-decoded URL path with surrounding slashes removed.
///
/// Only identifiers that parse as URLs with a host qualify. Scheme-less
/// `youtube.com/...` references are parsed as `https://`.
fn url_path(text: &str) -> Option<String> {
    let parsed = match Url::parse(text) {
        Ok(url) => url,
        Err(_) if text.contains(YOUTUBE_HOST_MARKER) && !text.contains("://") => {
            Url::parse(&format!("https://{text}")).ok()?
        },
        Err(_) => return None,
    };
    parsed.host_str()?;
    let raw = parsed.path().trim_matches('/');
    let decoded = urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    (!decoded.is_empty()).then_some(decoded)
}

fn push_canonical(candidates: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if is_canonical_id(value) && !candidates.iter().any(|c| c == value) {
        candidates.push(value.to_string());
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_handle_with_and_without_at() {
        let tokens = expand_identifier("  @TestHandle ");
        assert!(tokens.search.contains("@testhandle"));
        assert!(tokens.search.contains("testhandle"));
        assert!(tokens.canonical.is_empty());
    }

    #[test]
    fn expands_channel_url() {
        let tokens = expand_identifier("https://www.youtube.com/@testhandle/videos");
        assert!(tokens.search.contains("testhandle/videos"));
        assert!(tokens.search.contains("@testhandle/videos"));
        assert!(tokens.search.contains("testhandle"));
    }

    #[test]
    fn canonical_candidates_keep_case() {
        let tokens = expand_identifier("https://youtube.com/channel/UCabcDEF");
        assert_eq!(tokens.canonical, vec!["UCabcDEF".to_string()]);
        assert!(tokens.search.contains("channel/ucabcdef"));

        let raw = expand_identifier("UCxyz");
        assert_eq!(raw.canonical, vec!["UCxyz".to_string()]);
    }

    #[test]
    fn free_text_is_single_token() {
        let tokens = expand_identifier("Serhii Sternenko");
        assert_eq!(tokens.search.len(), 1);
        assert!(tokens.search.contains("serhii sternenko"));
        assert!(expand_identifier("   ").is_empty());
    }

    #[test]
    fn percent_encoded_handles_are_decoded() {
        let tokens = expand_identifier("https://www.youtube.com/@%D0%BA%D0%B0%D0%BD%D0%B0%D0%BB");
        assert!(tokens.search.contains("канал"));
    }

    #[test]
    fn deduces_placeholder_ids() {
        assert_eq!(deduce_channel_id(" UC123 "), "UC123");
        assert_eq!(
            deduce_channel_id("Serhii Sternenko"),
            "synthetic::serhii sternenko"
        );
        assert_eq!(deduce_channel_id("synthetic::@x"), "synthetic::@x");
    }

    #[test]
    fn extracts_handles() {
        assert_eq!(extract_handle("@foo").as_deref(), Some("@foo"));
        assert_eq!(
            extract_handle("https://www.youtube.com/@Foo/streams").as_deref(),
            Some("@Foo")
        );
        assert_eq!(extract_handle("youtube.com/@bar").as_deref(), Some("@bar"));
        assert_eq!(extract_handle("Some Owner"), None);
        assert_eq!(extract_handle("https://example.com/@foo"), None);
    }

    #[test]
    fn extracts_custom_slugs() {
        assert_eq!(
            extract_custom_slug("https://www.youtube.com/c/MySlug").as_deref(),
            Some("MySlug")
        );
        assert_eq!(
            extract_custom_slug("https://www.youtube.com/channel/UC1/featured").as_deref(),
            Some("UC1")
        );
        assert_eq!(
            extract_custom_slug("https://www.youtube.com/@handle").as_deref(),
            Some("@handle")
        );
        assert_eq!(extract_custom_slug("https://www.youtube.com/"), None);
        assert_eq!(extract_custom_slug("@handle"), None);
    }
}
