//! Source fetchers for the configured information streams.
//!
//! Each fetcher normalizes one kind of upstream into [`Article`] records:
//!
//! | Source type | Module | Method |
//! |-------------|--------|--------|
//! | `rss` | [`rss`] | RSS 2.0 / Atom feed parsing |
//! | `scrape` | [`scrape`] | Whole-page text extraction |
//! | `tldr` | [`tldr`] | TLDR newsletter page for today's date |
//! | `hn-daily` | [`hn_daily`] | Hacker News Daily digest for yesterday |
//!
//! Fetchers are independently cancellable and never propagate errors upward:
//! [`fetch_source`] turns every failure into an empty result plus a warning
//! log. The shared HTTP client carries the per-request timeout (10 s default).
//! Deduplication by url is the ingest pipeline's responsibility.

pub mod hn_daily;
pub mod rss;
pub mod scrape;
pub mod tldr;

use crate::config::{SourceKind, SourceSpec};
use crate::models::Article;
use chrono::NaiveDateTime;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Default per-request timeout for source fetches.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Failures inside a single fetcher. These never leave this module's public
/// entry point; they exist for logging and tests.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("feed parse failed: {0}")]
    Parse(String),
    #[error("source of type {0:?} requires a url")]
    MissingUrl(SourceKind),
}

/// Build the HTTP client shared by all fetchers.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .user_agent(concat!("daily_briefing/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

/// Fetch one configured source, absorbing every failure.
///
/// Returns the articles the source yielded, or an empty vector on any error.
/// `days` bounds how far back feed entries may be published; `now` anchors
/// the window so tests are deterministic.
#[instrument(level = "info", skip(client, spec), fields(source = %spec.name))]
pub async fn fetch_source(
    client: &reqwest::Client,
    spec: &SourceSpec,
    days: u32,
    now: NaiveDateTime,
) -> Vec<Article> {
    let result = match spec.kind {
        SourceKind::Rss => rss::fetch(client, spec, days, now).await,
        SourceKind::Scrape => scrape::fetch(client, spec, now).await,
        SourceKind::Tldr => tldr::fetch(client, spec, now).await,
        SourceKind::HnDaily => hn_daily::fetch(client, spec, now).await,
    };

    match result {
        Ok(articles) => {
            info!(count = articles.len(), "Fetched source");
            articles
        }
        Err(e) => {
            warn!(error = %e, "Source fetch failed; continuing without it");
            Vec::new()
        }
    }
}

/// Resolve the url a source record points at, erroring for kinds that
/// require one.
fn require_url(spec: &SourceSpec) -> Result<&str, FetchError> {
    spec.url
        .as_deref()
        .ok_or(FetchError::MissingUrl(spec.kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SourceKind, SourceSpec};
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_source_absorbs_unreachable_upstream() {
        let client = http_client();
        let spec = SourceSpec {
            name: "dead".to_string(),
            url: Some("http://127.0.0.1:1/feed.xml".to_string()),
            kind: SourceKind::Rss,
            keywords: vec![],
        };
        let articles = fetch_source(&client, &spec, 1, now()).await;
        assert!(articles.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_source_missing_url_is_absorbed() {
        let client = http_client();
        let spec = SourceSpec {
            name: "broken".to_string(),
            url: None,
            kind: SourceKind::Rss,
            keywords: vec![],
        };
        let articles = fetch_source(&client, &spec, 1, now()).await;
        assert!(articles.is_empty());
    }
}
