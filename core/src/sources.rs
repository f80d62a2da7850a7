//! Projection of grounding metadata into the citation list shown to users.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::GroundingMetadata;

/// A web page the model's answer was grounded on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    pub title: String,
}

/// Normalizes grounding metadata into an ordered list of distinct sources.
///
/// Chunks are visited in provider order. A chunk contributes only when its
/// `web.uri` is non-empty; the title falls back to the URL's host. The first
/// chunk for a given URL wins.
pub fn extract_sources(metadata: Option<&GroundingMetadata>) -> Vec<Source> {
    let Some(chunks) = metadata.and_then(|m| m.grounding_chunks.as_ref()) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut sources = Vec::new();

    for web in chunks.iter().filter_map(|chunk| chunk.web.as_ref()) {
        let Some(uri) = web.uri.as_deref().filter(|uri| !uri.is_empty()) else {
            continue;
        };
        if !seen.insert(uri) {
            continue;
        }

        let title = match web.title.as_deref() {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => host_or_url(uri),
        };

        sources.push(Source {
            url: uri.to_string(),
            title,
        });
    }

    sources
}

fn host_or_url(uri: &str) -> String {
    Url::parse(uri)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| uri.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GroundingChunk, WebSource};

    fn chunk(uri: Option<&str>, title: Option<&str>) -> GroundingChunk {
        GroundingChunk {
            web: Some(WebSource {
                uri: uri.map(str::to_string),
                title: title.map(str::to_string),
            }),
        }
    }

    fn metadata(chunks: Vec<GroundingChunk>) -> GroundingMetadata {
        GroundingMetadata {
            grounding_chunks: Some(chunks),
            ..Default::default()
        }
    }

    #[test]
    fn test_absent_metadata_yields_nothing() {
        assert!(extract_sources(None).is_empty());
        assert!(extract_sources(Some(&GroundingMetadata::default())).is_empty());
        assert!(extract_sources(Some(&metadata(vec![]))).is_empty());
    }

    #[test]
    fn test_title_defaults_to_host() {
        let meta = metadata(vec![chunk(Some("http://a.com"), Some(""))]);
        assert_eq!(
            extract_sources(Some(&meta)),
            vec![Source {
                url: "http://a.com".to_string(),
                title: "a.com".to_string(),
            }]
        );

        let meta = metadata(vec![chunk(Some("https://news.example.org/x?y=1"), None)]);
        assert_eq!(extract_sources(Some(&meta))[0].title, "news.example.org");
    }

    #[test]
    fn test_unparsable_url_uses_url_as_title() {
        let meta = metadata(vec![chunk(Some("not a url"), None)]);
        let sources = extract_sources(Some(&meta));
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].title, "not a url");
    }

    #[test]
    fn test_chunks_without_uri_are_skipped() {
        let meta = metadata(vec![
            GroundingChunk { web: None },
            chunk(None, Some("No uri")),
            chunk(Some(""), Some("Empty uri")),
            chunk(Some("https://kept.com/page"), Some("Kept")),
        ]);

        let sources = extract_sources(Some(&meta));
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].title, "Kept");
    }

    #[test]
    fn test_duplicates_keep_first_occurrence_in_order() {
        let meta = metadata(vec![
            chunk(Some("https://b.com"), Some("B first")),
            chunk(Some("https://a.com"), Some("A")),
            chunk(Some("https://b.com"), Some("B second")),
            chunk(Some("https://c.com"), None),
            chunk(Some("https://a.com"), None),
        ]);

        let sources = extract_sources(Some(&meta));
        let urls: Vec<&str> = sources.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, vec!["https://b.com", "https://a.com", "https://c.com"]);
        assert_eq!(sources[0].title, "B first");
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let meta = metadata(vec![
            chunk(Some("https://a.com"), None),
            chunk(Some("https://a.com"), Some("dup")),
            chunk(Some("https://b.com"), Some("B")),
        ]);

        assert_eq!(extract_sources(Some(&meta)), extract_sources(Some(&meta)));
    }
}
