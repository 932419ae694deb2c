//! RSS 2.0 and Atom feed fetcher.
//!
//! Entries are kept when their publication (or update) timestamp falls inside
//! the `now − days` window, or when no timestamp can be parsed at all. HTML
//! is stripped from summaries, titles are sanitized, and entries with empty
//! summaries are dropped, since standard feeds without a description carry no
//! content worth clustering.

use super::{require_url, FetchError};
use crate::config::SourceSpec;
use crate::models::Article;
use crate::utils::{parse_feed_date, sanitize_title, strip_html};
use chrono::{Duration, NaiveDateTime};
use serde::Deserialize;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

/// An element that may carry attributes (e.g. `<title type="html">`), so its
/// text must be pulled from the `$text` node.
#[derive(Debug, Default, Deserialize)]
struct TextNode {
    #[serde(rename = "$text")]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<TextNode>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    summary: Option<TextNode>,
    content: Option<TextNode>,
    published: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
}

/// Fetch and parse a feed into articles within the lookback window.
#[instrument(level = "info", skip_all, fields(source = %spec.name))]
pub async fn fetch(
    client: &reqwest::Client,
    spec: &SourceSpec,
    days: u32,
    now: NaiveDateTime,
) -> Result<Vec<Article>, FetchError> {
    let url = require_url(spec)?;
    let body = client.get(url).send().await?.text().await?;
    let cutoff = now - Duration::days(i64::from(days));

    let articles = parse_feed(&body, spec, cutoff)?;
    debug!(count = articles.len(), "Parsed feed");
    Ok(articles)
}

/// Parse a feed document, trying RSS 2.0 first and falling back to Atom.
pub fn parse_feed(
    body: &str,
    spec: &SourceSpec,
    cutoff: NaiveDateTime,
) -> Result<Vec<Article>, FetchError> {
    if let Ok(rss) = quick_xml::de::from_str::<Rss>(body) {
        return Ok(rss_articles(rss, spec, cutoff));
    }
    match quick_xml::de::from_str::<AtomFeed>(body) {
        Ok(atom) => Ok(atom_articles(atom, spec, cutoff)),
        Err(e) => Err(FetchError::Parse(e.to_string())),
    }
}

fn rss_articles(rss: Rss, spec: &SourceSpec, cutoff: NaiveDateTime) -> Vec<Article> {
    let mut articles = Vec::new();
    for item in rss.channel.items {
        let Some(link) = item.link.filter(|l| !l.trim().is_empty()) else {
            continue;
        };
        let published_at = item.pub_date.as_deref().and_then(parse_feed_date);
        if let Some(ts) = published_at {
            if ts < cutoff {
                continue;
            }
        }
        let summary = strip_html(item.description.as_deref().unwrap_or(""));
        if summary.is_empty() {
            continue;
        }
        let title = sanitize_title(item.title.as_deref().unwrap_or("(no title)"));

        let mut article = Article::new(title, link.trim());
        article.summary = summary;
        article.source = spec.name.clone();
        article.published_at = published_at;
        article.keywords = spec.keywords.clone();
        articles.push(article);
    }
    articles
}

fn atom_articles(atom: AtomFeed, spec: &SourceSpec, cutoff: NaiveDateTime) -> Vec<Article> {
    let mut articles = Vec::new();
    for entry in atom.entries {
        let Some(link) = entry
            .links
            .iter()
            .find_map(|l| l.href.as_deref())
            .filter(|l| !l.trim().is_empty())
        else {
            continue;
        };
        let published_at = entry
            .published
            .as_deref()
            .or(entry.updated.as_deref())
            .and_then(parse_feed_date);
        if let Some(ts) = published_at {
            if ts < cutoff {
                continue;
            }
        }
        let raw_summary = entry
            .summary
            .and_then(|t| t.value)
            .or_else(|| entry.content.and_then(|t| t.value))
            .unwrap_or_default();
        let summary = strip_html(&raw_summary);
        if summary.is_empty() {
            continue;
        }
        let raw_title = entry
            .title
            .and_then(|t| t.value)
            .unwrap_or_else(|| "(no title)".to_string());
        let title = sanitize_title(&raw_title);

        let mut article = Article::new(title, link.trim());
        article.summary = summary;
        article.source = spec.name.clone();
        article.published_at = published_at;
        article.keywords = spec.keywords.clone();
        articles.push(article);
    }
    articles
}
