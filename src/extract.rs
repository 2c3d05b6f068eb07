//! Page metadata derived from generated markup and aggregated sources.

use regex::Regex;
use std::sync::OnceLock;

use crate::models::SourceRecord;

pub const DESCRIPTION_MAX_CHARS: usize = 200;

/// Title, description and thumbnail for a freshly generated page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
}

pub fn extract_metadata(normalized_query: &str, html: &str, sources: &[SourceRecord]) -> PageMetadata {
    PageMetadata {
        title: title_from_query(normalized_query),
        description: description_from_html(normalized_query, html),
        thumbnail_url: thumbnail_from_sources(sources),
    }
}

/// Upper-cases the first character only.
pub fn title_from_query(normalized_query: &str) -> String {
    let mut chars = normalized_query.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn paragraph_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<p>(.*?)</p>").expect("valid paragraph regex"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"))
}

pub fn strip_tags(html: &str) -> String {
    tag_re().replace_all(html, "").into_owned()
}

/// Text of the first `<p>` element, or a stock sentence when there is none.
/// Truncated by characters, not at word boundaries.
pub fn description_from_html(normalized_query: &str, html: &str) -> String {
    let description = match paragraph_re().captures(html).and_then(|c| c.get(1)) {
        Some(m) => strip_tags(m.as_str()),
        None => format!("AI-generated page about {}", normalized_query),
    };
    description.chars().take(DESCRIPTION_MAX_CHARS).collect()
}

/// Image URL of the first source that carries a non-empty one.
pub fn thumbnail_from_sources(sources: &[SourceRecord]) -> Option<String> {
    sources
        .iter()
        .filter_map(|s| s.image_url.as_deref())
        .find(|url| !url.is_empty())
        .map(str::to_string)
}
