//! Source and preference configuration loaded from YAML documents.
//!
//! Two documents drive a briefing run:
//! - `sources.yaml`: the list of information streams to ingest, each a
//!   `{name, url, type}` record where `type` is one of `rss`, `scrape`,
//!   `tldr`, or `hn-daily` (`url` may be null for the last two; the fetcher
//!   constructs it from today's date).
//! - `preferences.yaml`: tuning knobs for content selection and the research
//!   section. Missing keys fall back to defaults; unknown keys are ignored.
//!
//! A missing or malformed source list is a fatal configuration error and is
//! reported before any network I/O starts.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Configuration failures. These are the only errors that abort a run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config file {path}: {source}")]
    Invalid {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("source list is empty")]
    NoSources,
}

/// The kind of fetcher a source record selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Rss,
    Scrape,
    Tldr,
    HnDaily,
}

/// One configured information stream.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceSpec {
    /// Short human tag, carried onto every article from this source.
    pub name: String,
    /// Feed or page url; `None` for `tldr`/`hn-daily` where the fetcher
    /// builds the url from the date.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    /// Keyword tags seeded onto articles from this source.
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Top-level shape of `sources.yaml`.
#[derive(Debug, Deserialize)]
struct SourcesDoc {
    sources: Vec<SourceSpec>,
}

/// Load the source list from a YAML document.
pub fn load_sources(path: &Path) -> Result<Vec<SourceSpec>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
        path: path.display().to_string(),
        source: e,
    })?;
    let doc: SourcesDoc = serde_yaml::from_str(&text).map_err(|e| ConfigError::Invalid {
        path: path.display().to_string(),
        source: e,
    })?;
    if doc.sources.is_empty() {
        return Err(ConfigError::NoSources);
    }
    Ok(doc.sources)
}

/// Default news sources used when no `sources.yaml` is provided.
pub fn default_news_sources() -> Vec<SourceSpec> {
    let rss = |name: &str, url: &str, keywords: &[&str]| SourceSpec {
        name: name.to_string(),
        url: Some(url.to_string()),
        kind: SourceKind::Rss,
        keywords: keywords.iter().map(|s| s.to_string()).collect(),
    };
    vec![
        rss("NYT US", "https://rss.nytimes.com/services/xml/rss/nyt/US.xml", &["US News"]),
        rss("NYT World", "https://rss.nytimes.com/services/xml/rss/nyt/World.xml", &["World News"]),
        rss("The Atlantic", "https://www.theatlantic.com/feed/all/", &["US News"]),
        rss("LfaA", "https://heathercoxrichardson.substack.com/feed", &["US News", "History"]),
        rss("MF", "https://rss.metafilter.com/metafilter.rss", &["Culture"]),
        rss("Acoup", "https://acoup.blog/feed/", &["Culture", "History"]),
        rss("Nature", "https://www.nature.com/nature.rss", &["Science"]),
        rss("Quanta", "http://www.quantamagazine.org/feed/", &["Science"]),
    ]
}

/// Default tech sources: link digests plus a couple of feeds.
pub fn default_tech_sources() -> Vec<SourceSpec> {
    vec![
        SourceSpec {
            name: "TLDR Tech".to_string(),
            url: None,
            kind: SourceKind::Tldr,
            keywords: vec!["Technology".to_string()],
        },
        SourceSpec {
            name: "Hacker News Daily".to_string(),
            url: None,
            kind: SourceKind::HnDaily,
            keywords: vec!["Technology".to_string()],
        },
        SourceSpec {
            name: "Ars Technica".to_string(),
            url: Some("https://feeds.arstechnica.com/arstechnica/index".to_string()),
            kind: SourceKind::Rss,
            keywords: vec!["Technology".to_string()],
        },
    ]
}

/// Default research source: the arXiv systems/architecture feed.
pub fn default_research_sources() -> Vec<SourceSpec> {
    vec![SourceSpec {
        name: "ArXiv CS".to_string(),
        url: Some("https://export.arxiv.org/rss/cs.DC+cs.SY+cs.PF+cs.AR".to_string()),
        kind: SourceKind::Rss,
        keywords: vec!["Research".to_string()],
    }]
}

/// Content-selection knobs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ContentPreferences {
    /// Drop articles younger than this many hours (0 disables the floor).
    pub min_article_age_hours: u32,
    /// Cap on displayed articles per briefing section.
    pub max_articles_per_section: Option<usize>,
    /// Run the citation analyzer on the arXiv subset of the research feeds
    /// and lead the section with its top-N, ahead of the LLM-ranked
    /// remainder.
    pub hybrid_research_ranking: bool,
}

impl Default for ContentPreferences {
    fn default() -> Self {
        Self {
            min_article_age_hours: 0,
            max_articles_per_section: None,
            hybrid_research_ranking: true,
        }
    }
}

/// Research-section knobs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResearchPreferences {
    /// Maximum papers shown in the research section.
    pub max_research_papers: usize,
    /// Substring filters on paper title/summary; empty means no filtering.
    pub research_categories: Vec<String>,
}

impl Default for ResearchPreferences {
    fn default() -> Self {
        Self {
            max_research_papers: 10,
            research_categories: Vec::new(),
        }
    }
}

/// User preferences document. The topic-steering lists are passed through to
/// prompt construction by callers; the engine itself only consumes the
/// structured preference blocks.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Preferences {
    pub content_preferences: ContentPreferences,
    pub research_preferences: ResearchPreferences,
    pub focus_areas: Vec<String>,
    pub exclude_topics: Vec<String>,
    pub preferred_sources: Vec<String>,
}

impl Preferences {
    /// Load preferences from a YAML file; a missing file yields defaults,
    /// a malformed file is a config error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!(path = %path.display(), "No preferences file; using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_yaml::from_str(&text).map_err(|e| ConfigError::Invalid {
            path: path.display().to_string(),
            source: e,
        })
    }
}
