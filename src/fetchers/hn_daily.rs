//! Hacker News Daily digest fetcher.
//!
//! The digest lives at `https://www.daemonology.net/hn-daily/{date}.html`
//! and covers the previous day, so the url is built from yesterday's date.
//! Every anchor whose visible text is not a "comments" link and does not
//! mention Hacker News itself becomes an article with an empty summary.

use super::FetchError;
use crate::config::SourceSpec;
use crate::models::Article;
use crate::utils::sanitize_title;
use chrono::{Duration, NaiveDateTime};
use scraper::{Html, Selector};
use tracing::{debug, instrument};

/// Fetch yesterday's Hacker News Daily digest.
#[instrument(level = "info", skip_all, fields(source = %spec.name))]
pub async fn fetch(
    client: &reqwest::Client,
    spec: &SourceSpec,
    now: NaiveDateTime,
) -> Result<Vec<Article>, FetchError> {
    let date = (now - Duration::days(1)).date().format("%Y-%m-%d");
    let url = format!("https://www.daemonology.net/hn-daily/{date}.html");

    let body = client.get(&url).send().await?.text().await?;
    let articles = parse_page(&body, spec, now);
    debug!(%url, count = articles.len(), "Parsed HN daily digest");
    Ok(articles)
}

/// Extract story links from a digest page body.
pub fn parse_page(body: &str, spec: &SourceSpec, now: NaiveDateTime) -> Vec<Article> {
    let doc = Html::parse_document(body);
    let anchor_selector = Selector::parse("a[href]").expect("static selector");

    let mut articles = Vec::new();
    for anchor in doc.select(&anchor_selector) {
        let text = anchor.text().collect::<Vec<_>>().join(" ").trim().to_string();
        if text.is_empty()
            || text.eq_ignore_ascii_case("comments")
            || text.to_lowercase().contains("hacker news")
        {
            continue;
        }
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if !href.starts_with("http") {
            continue;
        }

        let mut article = Article::new(sanitize_title(&text), href.trim());
        article.source = spec.name.clone();
        article.published_at = Some(now);
        article.keywords = spec.keywords.clone();
        articles.push(article);
    }
    articles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SourceKind, SourceSpec};
    use chrono::NaiveDate;

    fn spec() -> SourceSpec {
        SourceSpec {
            name: "Hacker News Daily".to_string(),
            url: None,
            kind: SourceKind::HnDaily,
            keywords: vec![],
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    const PAGE: &str = r#"<html><body>
<span class="storylink"><a href="https://example.com/story">A great story</a></span>
<span class="postlink"><a href="https://news.ycombinator.com/item?id=1">comments</a></span>
<a href="https://www.daemonology.net/hn-daily/">Hacker News Daily archive</a>
<a href="/hn-daily/about.html">about</a>
<span class="storylink"><a href="https://example.com/other">Another story</a></span>
</body></html>"#;

    #[test]
    fn test_parse_page_filters_comment_and_self_links() {
        let articles = parse_page(PAGE, &spec(), now());
        let urls: Vec<&str> = articles.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://example.com/story", "https://example.com/other"]
        );
    }

    #[test]
    fn test_parse_page_articles_have_empty_summaries() {
        let articles = parse_page(PAGE, &spec(), now());
        assert!(articles.iter().all(|a| a.summary.is_empty()));
        assert!(articles.iter().all(|a| a.published_at == Some(now())));
    }
}
