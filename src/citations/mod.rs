//! arXiv citation-graph analysis.
//!
//! Builds a directed citation graph over recently fetched arXiv papers:
//! edges point from citing paper to cited paper, and a paper's in-degree
//! (how many of today's papers cite it) is the ranking score. The result is
//! a "most cited by recent submissions" list: the foundational work that
//! current research is building on.
//!
//! The reference lists come from an external citation service under
//! rate-limit and timeout pressure, so:
//! - every upstream call runs under a deadline (default 30 s) and an
//!   inter-call delay (default 0.5 s),
//! - reference lists and paper metadata are cached in SQLite with a maximum
//!   age (default 30 days); fresh rows are never re-fetched,
//! - any failure shrinks the result instead of aborting; the report's
//!   `error` field records degraded mode.

pub mod arxiv;
pub mod cache;

use crate::config::{SourceKind, SourceSpec};
use crate::fetchers;
use crate::models::{Article, CitationParams, CitationReport, CitedPaper};
use arxiv::{extract_arxiv_id, fetch_arxiv_metadata};
use cache::{CacheError, CachedPaper, CitationCache};
use chrono::NaiveDateTime;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{info, instrument, warn};

/// Citation subsystem failures. They never escape the analyzer's public
/// operations; the report's `error` field is the outward signal.
#[derive(Debug, Error)]
pub enum CitationError {
    #[error("citation service request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("citation service returned status {0}")]
    Status(u16),
    #[error("citation service response malformed: {0}")]
    Malformed(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Upstream supplying reference lists and paper metadata. Abstracted so the
/// analyzer can be tested against deterministic stubs.
pub trait ReferenceSource {
    /// arXiv IDs referenced by the given paper.
    async fn references(&self, arxiv_id: &str) -> Result<Vec<String>, CitationError>;

    /// Full metadata for one paper.
    async fn paper(&self, arxiv_id: &str) -> Result<CachedPaper, CitationError>;
}

/// Semantic Scholar graph API client.
pub struct SemanticScholarClient {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl SemanticScholarClient {
    const BASE: &'static str = "https://api.semanticscholar.org/graph/v1";

    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
    ) -> Result<T, CitationError> {
        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CitationError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| CitationError::Malformed(e.to_string()))
    }
}

#[derive(Deserialize)]
struct ReferencesResponse {
    #[serde(default)]
    data: Vec<ReferenceEntry>,
}

#[derive(Deserialize)]
struct ReferenceEntry {
    #[serde(rename = "citedPaper")]
    cited_paper: Option<ExternalPaper>,
}

#[derive(Deserialize)]
struct ExternalPaper {
    #[serde(rename = "externalIds")]
    external_ids: Option<ExternalIds>,
}

#[derive(Deserialize)]
struct ExternalIds {
    #[serde(rename = "ArXiv")]
    arxiv: Option<String>,
}

#[derive(Deserialize)]
struct PaperResponse {
    title: Option<String>,
    #[serde(rename = "abstract")]
    summary: Option<String>,
    #[serde(rename = "publicationDate")]
    publication_date: Option<String>,
    #[serde(rename = "citationCount")]
    citation_count: Option<u32>,
    #[serde(default)]
    authors: Vec<AuthorEntry>,
}

#[derive(Deserialize)]
struct AuthorEntry {
    name: Option<String>,
}

impl ReferenceSource for SemanticScholarClient {
    async fn references(&self, arxiv_id: &str) -> Result<Vec<String>, CitationError> {
        let url = format!(
            "{}/paper/arXiv:{arxiv_id}/references?fields=externalIds&limit=500",
            Self::BASE
        );
        let parsed: ReferencesResponse = self.get_json(&url).await?;
        Ok(parsed
            .data
            .into_iter()
            .filter_map(|r| r.cited_paper?.external_ids?.arxiv)
            .filter_map(|raw| extract_arxiv_id(&raw))
            .collect())
    }

    async fn paper(&self, arxiv_id: &str) -> Result<CachedPaper, CitationError> {
        let url = format!(
            "{}/paper/arXiv:{arxiv_id}?fields=title,abstract,authors,publicationDate,citationCount",
            Self::BASE
        );
        let parsed: PaperResponse = self.get_json(&url).await?;
        Ok(CachedPaper {
            arxiv_id: arxiv_id.to_string(),
            title: parsed.title.unwrap_or_else(|| arxiv_id.to_string()),
            authors: parsed.authors.into_iter().filter_map(|a| a.name).collect(),
            published: parsed.publication_date,
            summary: parsed.summary.unwrap_or_default(),
            url: format!("https://arxiv.org/abs/{arxiv_id}"),
            total_citations: parsed.citation_count.unwrap_or(0),
        })
    }
}

/// Analyzer tuning. Defaults mirror the production settings.
#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    /// Deadline per upstream call.
    pub api_timeout: Duration,
    /// Inter-call delay to respect rate limits.
    pub api_delay: Duration,
    /// Maximum citation-cache row age before a re-fetch.
    pub max_age_days: u32,
    /// Concurrent in-flight reference fetches.
    pub concurrency: usize,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            api_timeout: Duration::from_secs(30),
            api_delay: Duration::from_millis(500),
            max_age_days: 30,
            concurrency: 2,
        }
    }
}

/// Citation rows older than this are deleted at the start of an analysis.
const RETENTION_DAYS: u32 = 90;

/// The citation-graph analyzer.
pub struct CitationAnalyzer<'a, R> {
    source: &'a R,
    cache: &'a CitationCache,
    http: reqwest::Client,
    options: AnalyzerOptions,
}

impl<'a, R: ReferenceSource> CitationAnalyzer<'a, R> {
    pub fn new(source: &'a R, cache: &'a CitationCache, options: AnalyzerOptions) -> Self {
        Self {
            source,
            cache,
            http: fetchers::http_client(),
            options,
        }
    }

    /// Full pipeline: fetch recent papers from the arXiv RSS feed for the
    /// given categories, then analyze them.
    #[instrument(level = "info", skip(self), fields(categories = categories.len()))]
    pub async fn analyze(
        &self,
        categories: &[String],
        days: u32,
        top_n: usize,
        min_citations: u32,
        now: NaiveDateTime,
    ) -> CitationReport {
        let feed_url = format!("https://export.arxiv.org/rss/{}", categories.join("+"));
        let spec = SourceSpec {
            name: "arXiv".to_string(),
            url: Some(feed_url),
            kind: SourceKind::Rss,
            keywords: Vec::new(),
        };
        let articles = fetchers::fetch_source(&self.http, &spec, days, now).await;
        self.analyze_articles(&articles, categories, days, top_n, min_citations, now)
            .await
    }

    /// Analyze pre-fetched articles (no RSS re-fetch).
    #[instrument(level = "info", skip_all, fields(articles = articles.len(), top_n, min_citations))]
    pub async fn analyze_articles(
        &self,
        articles: &[Article],
        categories: &[String],
        days: u32,
        top_n: usize,
        min_citations: u32,
        now: NaiveDateTime,
    ) -> CitationReport {
        let params = CitationParams {
            days,
            top_n,
            min_citations,
            categories: categories.to_vec(),
        };

        // Identify the citing papers and seed the metadata map from what the
        // feed already told us.
        let mut info: HashMap<String, CachedPaper> = HashMap::new();
        let mut citing: Vec<String> = Vec::new();
        for article in articles {
            let Some(arxiv_id) = extract_arxiv_id(&article.url) else {
                continue;
            };
            if info.contains_key(&arxiv_id) {
                continue;
            }
            info.insert(
                arxiv_id.clone(),
                CachedPaper {
                    arxiv_id: arxiv_id.clone(),
                    title: article.title.clone(),
                    authors: Vec::new(),
                    published: article.published_at.map(|t| t.format("%Y-%m-%d").to_string()),
                    summary: article.summary.clone(),
                    url: article.url.clone(),
                    total_citations: 0,
                },
            );
            citing.push(arxiv_id);
        }

        if citing.is_empty() {
            return empty_report(params, now, "no recent arXiv papers found");
        }

        // Rows past their retention horizon are dropped up front.
        if let Err(e) = self.cache.clear_old(RETENTION_DAYS, now) {
            warn!(error = %e, "Citation cache cleanup failed");
        }

        let (graph, fetch_failures) = self.build_graph(&citing, &mut info, now).await;
        info!(
            citing = citing.len(),
            cited = graph.len(),
            fetch_failures,
            "Citation graph built"
        );

        let ranked = most_cited(&graph, top_n, min_citations);
        let papers = self.enrich(&ranked, &info, now).await;

        let error = if graph.is_empty() && fetch_failures == citing.len() {
            Some("citation service unavailable; no references collected".to_string())
        } else {
            None
        };

        CitationReport {
            generated_at: now,
            params,
            papers,
            error,
        }
    }

    /// Reproduce the ranking from the SQLite cache alone; no fresh RSS
    /// fetch, no citation-service calls. Metadata for still-unknown papers
    /// comes from the arXiv Atom API under the usual timeout discipline.
    #[instrument(level = "info", skip(self), fields(top_n, min_citations))]
    pub async fn rebuild_from_cache(
        &self,
        categories: &[String],
        top_n: usize,
        min_citations: u32,
        now: NaiveDateTime,
    ) -> CitationReport {
        let params = CitationParams {
            days: 1,
            top_n,
            min_citations,
            categories: categories.to_vec(),
        };

        let ranked = match self.cache.get_most_cited(min_citations, top_n) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Citation cache unavailable");
                return empty_report(params, now, "citation cache unavailable");
            }
        };
        if ranked.is_empty() {
            return empty_report(params, now, "no citation data in cache");
        }

        let mut papers = Vec::with_capacity(ranked.len());
        for (arxiv_id, count) in ranked {
            let cached = self
                .cache
                .get_paper(&arxiv_id, self.options.max_age_days, now)
                .ok()
                .flatten();
            let meta = match cached {
                Some(meta) => meta,
                None => {
                    match fetch_arxiv_metadata(&self.http, &arxiv_id, self.options.api_timeout)
                        .await
                    {
                        Some(meta) => {
                            if let Err(e) = self.cache.cache_paper(&meta, now) {
                                warn!(error = %e, "Caching arXiv metadata failed");
                            }
                            sleep(self.options.api_delay).await;
                            meta
                        }
                        None => CachedPaper::placeholder(&arxiv_id),
                    }
                }
            };
            papers.push(cited_paper(meta, count));
        }

        CitationReport {
            generated_at: now,
            params,
            papers,
            error: None,
        }
    }

    /// Collect reference lists (cache first, then the service) and fold them
    /// into an in-degree map. Returns the map and the number of papers whose
    /// fetch failed outright.
    async fn build_graph(
        &self,
        citing: &[String],
        info: &mut HashMap<String, CachedPaper>,
        now: NaiveDateTime,
    ) -> (HashMap<String, u32>, usize) {
        // Cache pre-pass: fresh rows never hit the service.
        let mut resolved: Vec<(String, Vec<String>)> = Vec::new();
        let mut misses: Vec<String> = Vec::new();
        for id in citing {
            match self.cache.get_citations(id, self.options.max_age_days, now) {
                Ok(Some(refs)) => resolved.push((id.clone(), refs)),
                Ok(None) => misses.push(id.clone()),
                Err(e) => {
                    warn!(arxiv_id = %id, error = %e, "Citation cache read failed");
                    misses.push(id.clone());
                }
            }
        }
        info!(
            hits = resolved.len(),
            misses = misses.len(),
            "Citation cache consulted"
        );

        // Bounded-concurrency fetch of the misses; each call is bracketed by
        // a deadline and followed by the rate-limit delay.
        let mut failures = 0usize;
        let fetched: Vec<(String, Option<Vec<String>>)> = stream::iter(misses)
            .map(|id| async move {
                let result = timeout(self.options.api_timeout, self.source.references(&id)).await;
                let refs = match result {
                    Ok(Ok(refs)) => Some(refs),
                    Ok(Err(e)) => {
                        warn!(arxiv_id = %id, error = %e, "Reference fetch failed");
                        None
                    }
                    Err(_) => {
                        warn!(arxiv_id = %id, "Reference fetch timed out");
                        None
                    }
                };
                sleep(self.options.api_delay).await;
                (id, refs)
            })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        for (id, refs) in fetched {
            match refs {
                Some(refs) => {
                    if let Err(e) = self.cache.cache_citations(&id, &refs, now) {
                        warn!(arxiv_id = %id, error = %e, "Caching citations failed");
                    }
                    if let Some(meta) = info.get(&id) {
                        if let Err(e) = self.cache.cache_paper(meta, now) {
                            warn!(arxiv_id = %id, error = %e, "Caching paper metadata failed");
                        }
                    }
                    resolved.push((id, refs));
                }
                None => failures += 1,
            }
        }

        let mut graph: HashMap<String, u32> = HashMap::new();
        for (_, refs) in &resolved {
            for cited_id in refs {
                *graph.entry(cited_id.clone()).or_insert(0) += 1;
                info.entry(cited_id.clone())
                    .or_insert_with(|| CachedPaper::placeholder(cited_id));
            }
        }
        (graph, failures)
    }

    /// Fill in display metadata for the ranked papers: run info, then the
    /// cache, then the service; placeholders when everything fails.
    async fn enrich(
        &self,
        ranked: &[(String, u32)],
        info: &HashMap<String, CachedPaper>,
        now: NaiveDateTime,
    ) -> Vec<CitedPaper> {
        let mut papers = Vec::with_capacity(ranked.len());
        for (arxiv_id, count) in ranked {
            let known = info.get(arxiv_id).cloned();
            let needs_lookup = known
                .as_ref()
                .map(|m| m.title == *arxiv_id)
                .unwrap_or(true);

            let meta = if needs_lookup {
                match self
                    .cache
                    .get_paper(arxiv_id, self.options.max_age_days, now)
                    .ok()
                    .flatten()
                {
                    Some(meta) => meta,
                    None => {
                        let fetched =
                            timeout(self.options.api_timeout, self.source.paper(arxiv_id)).await;
                        match fetched {
                            Ok(Ok(meta)) => {
                                if let Err(e) = self.cache.cache_paper(&meta, now) {
                                    warn!(error = %e, "Caching enriched paper failed");
                                }
                                sleep(self.options.api_delay).await;
                                meta
                            }
                            _ => known.unwrap_or_else(|| CachedPaper::placeholder(arxiv_id)),
                        }
                    }
                }
            } else {
                known.unwrap_or_else(|| CachedPaper::placeholder(arxiv_id))
            };
            papers.push(cited_paper(meta, *count));
        }
        papers
    }
}

/// Rank the in-degree map: `count ≥ min_citations`, count descending, arXiv
/// id ascending on ties, first `top_n`.
fn most_cited(
    graph: &HashMap<String, u32>,
    top_n: usize,
    min_citations: u32,
) -> Vec<(String, u32)> {
    let mut ranked: Vec<(String, u32)> = graph
        .iter()
        .filter(|&(_, &count)| count >= min_citations)
        .map(|(id, &count)| (id.clone(), count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(top_n);
    ranked
}

fn cited_paper(meta: CachedPaper, count: u32) -> CitedPaper {
    CitedPaper {
        arxiv_id: meta.arxiv_id,
        title: meta.title,
        url: meta.url,
        summary: meta.summary,
        published: meta.published,
        authors: meta.authors,
        citation_count: count,
        total_citations: meta.total_citations,
    }
}

fn empty_report(params: CitationParams, now: NaiveDateTime, reason: &str) -> CitationReport {
    warn!(reason, "Citation analysis degraded");
    CitationReport {
        generated_at: now,
        params,
        papers: Vec::new(),
        error: Some(reason.to_string()),
    }
}
