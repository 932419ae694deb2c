//! arXiv identifier handling and metadata lookup.
//!
//! Modern arXiv identifiers have the shape `YYMM.NNNNN` (four digits, a dot,
//! four or five digits); they appear in urls like
//! `https://arxiv.org/abs/2101.12345v2`. Metadata for a single paper comes
//! from the arXiv Atom API (`export.arxiv.org/api/query`).

use super::cache::CachedPaper;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Matches a modern arXiv identifier, version suffix excluded.
static ARXIV_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4}\.\d{4,5})").expect("static regex"));

/// Extract a clean arXiv ID from a url or raw identifier.
///
/// `http://arxiv.org/abs/2101.12345v2` and `2101.12345` both yield
/// `2101.12345`; anything without an identifier yields `None`.
pub fn extract_arxiv_id(url_or_id: &str) -> Option<String> {
    ARXIV_ID
        .captures(url_or_id)
        .map(|captures| captures[1].to_string())
}

#[derive(Debug, Deserialize)]
struct AtomQueryFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomQueryEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomQueryEntry {
    title: Option<String>,
    summary: Option<String>,
    published: Option<String>,
    #[serde(rename = "author", default)]
    authors: Vec<AtomAuthor>,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    name: Option<String>,
}

/// Fetch paper metadata from the arXiv Atom API.
///
/// Returns `None` on any failure; the caller falls back to whatever cache
/// or placeholder info it has. The provided timeout bounds the whole call.
#[instrument(level = "debug", skip(client, timeout))]
pub async fn fetch_arxiv_metadata(
    client: &reqwest::Client,
    arxiv_id: &str,
    timeout: Duration,
) -> Option<CachedPaper> {
    let url = format!("http://export.arxiv.org/api/query?id_list={arxiv_id}&max_results=1");
    let request = async {
        let response = client.get(&url).send().await.ok()?;
        if !response.status().is_success() {
            warn!(%url, status = %response.status(), "arXiv metadata request rejected");
            return None;
        }
        response.text().await.ok()
    };

    let body = match tokio::time::timeout(timeout, request).await {
        Ok(Some(body)) => body,
        Ok(None) => return None,
        Err(_) => {
            warn!(arxiv_id, "arXiv metadata request timed out");
            return None;
        }
    };

    let feed: AtomQueryFeed = match quick_xml::de::from_str(&body) {
        Ok(feed) => feed,
        Err(e) => {
            warn!(arxiv_id, error = %e, "arXiv metadata parse failed");
            return None;
        }
    };
    let entry = feed.entries.into_iter().next()?;

    let clean = |s: String| s.split_whitespace().collect::<Vec<_>>().join(" ");
    let paper = CachedPaper {
        arxiv_id: arxiv_id.to_string(),
        title: entry.title.map(clean).unwrap_or_else(|| arxiv_id.to_string()),
        authors: entry.authors.into_iter().filter_map(|a| a.name).collect(),
        published: entry.published.map(|p| p.chars().take(10).collect()),
        summary: entry.summary.map(clean).unwrap_or_default(),
        url: format!("https://arxiv.org/abs/{arxiv_id}"),
        total_citations: 0,
    };
    debug!(arxiv_id, title = %paper.title, "Fetched arXiv metadata");
    Some(paper)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_abs_url() {
        assert_eq!(
            extract_arxiv_id("http://arxiv.org/abs/2101.12345v2"),
            Some("2101.12345".to_string())
        );
    }

    #[test]
    fn test_extract_from_bare_id() {
        assert_eq!(
            extract_arxiv_id("2507.00123"),
            Some("2507.00123".to_string())
        );
    }

    #[test]
    fn test_extract_four_digit_suffix() {
        assert_eq!(
            extract_arxiv_id("https://arxiv.org/abs/1406.2661"),
            Some("1406.2661".to_string())
        );
    }

    #[test]
    fn test_extract_none_for_non_arxiv_urls() {
        assert_eq!(extract_arxiv_id("https://example.com/story"), None);
        assert_eq!(extract_arxiv_id(""), None);
    }

    #[test]
    fn test_atom_query_parsing() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <title>Attention Is
  All You Need</title>
    <summary>We propose a new
  architecture.</summary>
    <published>2017-06-12T17:57:34Z</published>
    <author><name>Ashish Vaswani</name></author>
    <author><name>Noam Shazeer</name></author>
  </entry>
</feed>"#;
        let feed: AtomQueryFeed = quick_xml::de::from_str(body).unwrap();
        assert_eq!(feed.entries.len(), 1);
        let entry = &feed.entries[0];
        assert_eq!(entry.authors.len(), 2);
        assert_eq!(entry.published.as_deref(), Some("2017-06-12T17:57:34Z"));
    }
}
