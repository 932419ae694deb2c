//! Generic page scraper for `scrape`-type sources.
//!
//! Produces a single article per page: the `<title>` as headline and the
//! first 500 characters of the visible text as summary, stamped with the
//! current time.

use super::{require_url, FetchError};
use crate::config::SourceSpec;
use crate::models::Article;
use crate::utils::{element_text, sanitize_title};
use chrono::NaiveDateTime;
use scraper::{Html, Selector};
use tracing::{debug, instrument};

const SUMMARY_LIMIT: usize = 500;

/// Fetch a page and normalize it into a single article.
#[instrument(level = "info", skip_all, fields(source = %spec.name))]
pub async fn fetch(
    client: &reqwest::Client,
    spec: &SourceSpec,
    now: NaiveDateTime,
) -> Result<Vec<Article>, FetchError> {
    let url = require_url(spec)?;
    let body = client.get(url).send().await?.text().await?;
    let article = parse_page(&body, url, spec, now);
    debug!(bytes = article.summary.len(), "Scraped page");
    Ok(vec![article])
}

/// Reduce a page body to one article record.
pub fn parse_page(body: &str, url: &str, spec: &SourceSpec, now: NaiveDateTime) -> Article {
    let doc = Html::parse_document(body);

    let title_selector = Selector::parse("title").expect("static selector");
    let title = doc
        .select(&title_selector)
        .next()
        .map(|t| t.text().collect::<Vec<_>>().join(" ").trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "No title".to_string());

    // Script and style subtrees are dropped before text extraction, so raw
    // JS and CSS never reach the summary.
    let body_selector = Selector::parse("body").expect("static selector");
    let text = doc
        .select(&body_selector)
        .next()
        .map(element_text)
        .unwrap_or_default();

    let mut article = Article::new(sanitize_title(&title), url);
    article.summary = text.chars().take(SUMMARY_LIMIT).collect();
    article.source = spec.name.clone();
    article.published_at = Some(now);
    article.keywords = spec.keywords.clone();
    article
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SourceKind, SourceSpec};
    use chrono::NaiveDate;

    fn spec() -> SourceSpec {
        SourceSpec {
            name: "Some Page".to_string(),
            url: Some("https://example.com/page".to_string()),
            kind: SourceKind::Scrape,
            keywords: vec![],
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_page_title_and_summary() {
        let body = format!(
            "<html><head><title>Page Title</title></head><body><p>{}</p></body></html>",
            "word ".repeat(200)
        );
        let article = parse_page(&body, "https://example.com/page", &spec(), now());
        assert_eq!(article.title, "Page Title");
        assert_eq!(article.summary.chars().count(), 500);
        assert_eq!(article.published_at, Some(now()));
    }

    #[test]
    fn test_parse_page_missing_title() {
        let article = parse_page(
            "<html><body>text</body></html>",
            "https://example.com",
            &spec(),
            now(),
        );
        assert_eq!(article.title, "No title");
        assert_eq!(article.summary, "text");
    }

    #[test]
    fn test_parse_page_drops_script_and_style_text() {
        let body = "<html><head><title>T</title></head><body>\
                    <style>body { margin: 0; }</style>\
                    <p>visible text</p>\
                    <script>window.tracker = init();</script>\
                    </body></html>";
        let article = parse_page(body, "https://example.com", &spec(), now());
        assert_eq!(article.summary, "visible text");
    }
}
