//! Data models for articles, story clusters, and briefing corpora.
//!
//! This module defines the core data structures used throughout the engine:
//! - [`Article`]: A normalized article from any source (RSS, scrape, TLDR, HN)
//! - [`Group`]: A cluster of related articles with temporal bookkeeping
//! - [`ClusterStatus`]: The temporal classification of a cluster
//! - [`Corpus`]: The structured result of a full briefing run
//! - [`CitationReport`] / [`CitedPaper`]: Output of the citation analyzer
//!
//! Articles are created by the fetchers, enriched with an embedding vector by
//! the embedder, assigned a cluster by the clusterer, and frozen thereafter.
//! Clusters are recomputed on every run; cross-run continuity comes from the
//! article cache, never from cluster identity.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A normalized article from any configured source.
///
/// Identity is the trimmed `url`: two articles are the same article iff their
/// urls match after whitespace trimming. `published_at` of `None` means the
/// source's date could not be parsed; such articles are treated as published
/// "now" by the windowing logic but remain distinguishable from articles with
/// a real timestamp.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Article {
    /// Canonical identity; unique key everywhere in the engine.
    pub url: String,
    /// Headline, with `<`/`>` sanitized to underscores.
    pub title: String,
    /// HTML-stripped summary; may be empty for link-digest sources.
    #[serde(default)]
    pub summary: String,
    /// Short human source tag (feed name from the source config).
    #[serde(default)]
    pub source: String,
    /// Naive UTC publication time; `None` when the source date was unparseable.
    pub published_at: Option<NaiveDateTime>,
    /// Keyword tags inherited from the feed configuration.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Unit-norm embedding vector, present once the article has been embedded.
    /// An all-zeros vector marks an article whose embedding failed; the
    /// clusterer excludes those from similarity computations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    /// Cluster index assigned by the clusterer for the current run.
    #[serde(skip)]
    pub cluster: Option<usize>,
}

impl Article {
    /// Build an article with just the identity fields; the rest default.
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            summary: String::new(),
            source: String::new(),
            published_at: None,
            keywords: Vec::new(),
            vector: None,
            cluster: None,
        }
    }

    /// Identity key: the url with surrounding whitespace trimmed.
    pub fn key(&self) -> &str {
        self.url.trim()
    }

    /// Publication time used for windowing; unparseable dates count as `now`.
    pub fn effective_published(&self, now: NaiveDateTime) -> NaiveDateTime {
        self.published_at.unwrap_or(now)
    }

    /// The text representation fed to the embedder: title plus the first
    /// 500 characters of the summary.
    pub fn embedding_text(&self) -> String {
        let title = self.title.trim();
        let summary: String = self.summary.trim().chars().take(500).collect();
        if summary.is_empty() {
            title.to_string()
        } else {
            format!("{title}. {summary}")
        }
    }

    /// True when the article carries a usable (non-zero) embedding.
    pub fn has_live_vector(&self) -> bool {
        self.vector
            .as_ref()
            .is_some_and(|v| v.iter().any(|x| *x != 0.0))
    }
}

/// Temporal classification of a story cluster relative to the today window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterStatus {
    /// All articles inside the today window, two or more in total.
    New,
    /// Articles both inside and outside the today window, two or more total.
    Continuing,
    /// Two or more articles previously, none inside the today window.
    Dormant,
    /// Exactly one article.
    Single,
}

/// A cluster of related articles plus temporal bookkeeping.
///
/// For `Continuing` groups the `articles` list is restricted to the today
/// window while `total_count` spans the whole corpus window. For `Dormant`
/// groups the article list is cleared and only `representative_title`
/// survives for display.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Group {
    /// Display label. Starts as the first article's title and is replaced by
    /// an LLM-generated label for clusters of two or more articles.
    pub label: String,
    /// Member articles (possibly restricted to the today window).
    pub articles: Vec<Article>,
    /// Cluster size across the whole corpus window.
    pub total_count: usize,
    /// Cluster size inside the today window.
    pub today_count: usize,
    /// Temporal classification, assigned by the categorizer.
    pub status: ClusterStatus,
    /// Title retained for display when the article list is cleared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub representative_title: Option<String>,
}

impl Group {
    /// Create a fresh cluster around a seed set of articles. The label is the
    /// first article's title; counts default to the article count until the
    /// categorizer refines them.
    pub fn from_articles(articles: Vec<Article>) -> Self {
        let label = articles
            .first()
            .map(|a| a.title.clone())
            .unwrap_or_default();
        let n = articles.len();
        Self {
            label,
            articles,
            total_count: n,
            today_count: n,
            status: ClusterStatus::Single,
            representative_title: None,
        }
    }

    /// Most recent publication time among members, for tie-breaking sorts.
    pub fn latest_published(&self, now: NaiveDateTime) -> NaiveDateTime {
        self.articles
            .iter()
            .map(|a| a.effective_published(now))
            .max()
            .unwrap_or(now)
    }
}

/// Structured result of a briefing run: clusters bucketed by status, in the
/// order produced by the per-bucket ranking step.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Corpus {
    /// Stories with ongoing coverage from previous days.
    pub continuing: Vec<Group>,
    /// Stories that appeared for the first time today.
    pub new: Vec<Group>,
    /// Stories with prior coverage but nothing today.
    pub dormant: Vec<Group>,
    /// Individual articles that did not join a larger story.
    pub singles: Vec<Group>,
    /// Most-cited-papers analysis, when the research section ran it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<CitationReport>,
}

impl Corpus {
    /// Total number of articles across every bucket.
    pub fn article_count(&self) -> usize {
        self.continuing
            .iter()
            .chain(&self.new)
            .chain(&self.dormant)
            .chain(&self.singles)
            .map(|g| g.articles.len())
            .sum()
    }
}

/// One paper in the most-cited ranking.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CitedPaper {
    /// Bare arXiv identifier, e.g. `2101.12345`.
    pub arxiv_id: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub summary: String,
    /// Publication date as reported by the metadata source, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    /// In-degree: how many recent papers cited this one.
    pub citation_count: u32,
    /// All-time citation count from the metadata source, when enriched.
    #[serde(default)]
    pub total_citations: u32,
}

/// Parameters a citation analysis ran with, echoed into its report.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CitationParams {
    pub days: u32,
    pub top_n: usize,
    pub min_citations: u32,
    pub categories: Vec<String>,
}

/// Result object of the citation analyzer. Failures reduce `papers` and set
/// `error`; the analyzer itself never aborts.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CitationReport {
    pub generated_at: NaiveDateTime,
    pub params: CitationParams,
    pub papers: Vec<CitedPaper>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
