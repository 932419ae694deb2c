//! TLDR newsletter fetcher.
//!
//! TLDR publishes dated pages (`https://tldr.tech/{edition}/{YYYY-MM-DD}`)
//! where each story is an `<article>` block: a linked headline followed by a
//! "(N minute read)" marker and the summary text. Sponsor blocks are skipped,
//! and a block that fails to parse is dropped without affecting its siblings.

use super::FetchError;
use crate::config::SourceSpec;
use crate::models::Article;
use crate::utils::sanitize_title;
use chrono::NaiveDateTime;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, warn};

const EDITIONS: [&str; 2] = ["tech", "ai"];

/// Fetch today's TLDR Tech and TLDR AI pages.
///
/// The urls are constructed from `now`'s date; the configured source record
/// carries no url of its own.
#[instrument(level = "info", skip_all, fields(source = %spec.name))]
pub async fn fetch(
    client: &reqwest::Client,
    spec: &SourceSpec,
    now: NaiveDateTime,
) -> Result<Vec<Article>, FetchError> {
    let date = now.date().format("%Y-%m-%d");
    let mut articles = Vec::new();

    for edition in EDITIONS {
        let url = format!("https://tldr.tech/{edition}/{date}");
        match client.get(&url).send().await {
            Ok(response) => {
                let body = response.text().await?;
                let mut parsed = parse_page(&body, spec, now);
                debug!(%url, count = parsed.len(), "Parsed TLDR edition");
                articles.append(&mut parsed);
            }
            Err(e) => {
                warn!(%url, error = %e, "TLDR edition fetch failed; skipping");
            }
        }
    }

    Ok(articles)
}

/// Extract articles from a TLDR page body.
pub fn parse_page(body: &str, spec: &SourceSpec, now: NaiveDateTime) -> Vec<Article> {
    let doc = Html::parse_document(body);
    let block_selector = Selector::parse("article").expect("static selector");
    let link_selector = Selector::parse("a[href]").expect("static selector");

    let mut articles = Vec::new();
    for block in doc.select(&block_selector) {
        if let Some(article) = parse_block(block, &link_selector, spec, now) {
            articles.push(article);
        }
    }
    articles
}

fn parse_block(
    block: ElementRef<'_>,
    link_selector: &Selector,
    spec: &SourceSpec,
    now: NaiveDateTime,
) -> Option<Article> {
    let content = block.text().collect::<Vec<_>>().join(" ");
    if content.contains("(Sponsor)") {
        return None;
    }

    let link = block.select(link_selector).next()?;
    let href = link.value().attr("href")?.trim();
    if href.is_empty() {
        return None;
    }
    let title = sanitize_title(link.text().collect::<Vec<_>>().join(" ").trim());

    // Stories read "Headline (N minute read) summary..."; keep the tail.
    let lowered = content.to_lowercase();
    let summary = if let Some(pos) = lowered.find("minute read)") {
        content[pos + "minute read)".len()..].trim().to_string()
    } else {
        content.trim().to_string()
    };

    let mut article = Article::new(title, href);
    article.summary = summary;
    article.source = spec.name.clone();
    article.published_at = Some(now);
    article.keywords = spec.keywords.clone();
    Some(article)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SourceKind, SourceSpec};
    use chrono::NaiveDate;

    fn spec() -> SourceSpec {
        SourceSpec {
            name: "TLDR Tech".to_string(),
            url: None,
            kind: SourceKind::Tldr,
            keywords: vec!["Technology".to_string()],
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    const PAGE: &str = r#"<html><body>
<article>
  <h3><a href="https://example.com/story-1">Big launch (5 minute read)</a></h3>
  <div>The product shipped today with new features.</div>
</article>
<article>
  <h3><a href="https://sponsor.example.com">Buy our thing (Sponsor)</a></h3>
  <div>Advertising copy.</div>
</article>
<article>
  <h3>No link in this block</h3>
</article>
<article>
  <h3><a href="https://example.com/story-2">Quick note</a></h3>
</article>
</body></html>"#;

    #[test]
    fn test_parse_page_skips_sponsors_and_broken_blocks() {
        let articles = parse_page(PAGE, &spec(), now());
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].url, "https://example.com/story-1");
        assert_eq!(
            articles[0].summary,
            "The product shipped today with new features."
        );
        assert_eq!(articles[1].url, "https://example.com/story-2");
    }

    #[test]
    fn test_parse_page_stamps_now_and_keywords() {
        let articles = parse_page(PAGE, &spec(), now());
        assert_eq!(articles[0].published_at, Some(now()));
        assert_eq!(articles[0].source, "TLDR Tech");
        assert_eq!(articles[0].keywords, vec!["Technology".to_string()]);
    }

    #[test]
    fn test_parse_page_empty_document() {
        assert!(parse_page("<html></html>", &spec(), now()).is_empty());
    }
}
