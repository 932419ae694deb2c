//! Command-line interface for the daily-briefing engine.
//!
//! All options can be provided as flags; API keys fall back to environment
//! variables. The LLM backend itself is configured purely through the
//! environment (`BRIEFING_LLM_BASE_URL`, `BRIEFING_LLM_API_KEY`,
//! `BRIEFING_LLM_MODEL`, `BRIEFING_EMBED_MODEL`).

use clap::{Parser, ValueEnum};

/// Command-line arguments for a briefing run.
///
/// # Examples
///
/// ```sh
/// # Full briefing with default sources
/// daily_briefing -m ./briefings
///
/// # Custom sources and preferences
/// daily_briefing -m ./briefings --sources sources.yaml --preferences prefs.yaml
///
/// # Rebuild the most-cited-papers report from the SQLite cache only
/// daily_briefing -m ./briefings --citations-from-cache
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Output directory for the Markdown briefing
    #[arg(short, long, default_value = "briefings")]
    pub markdown_output_dir: String,

    /// Archive directory for structured JSON output
    #[arg(short, long, default_value = "briefings/archive")]
    pub archive_dir: String,

    /// Cache root (article embeddings, citation database)
    #[arg(long, default_value = ".cache")]
    pub cache_dir: String,

    /// Path to the sources YAML document (built-in defaults when omitted)
    #[arg(short, long)]
    pub sources: Option<String>,

    /// Path to the preferences YAML document
    #[arg(short, long, default_value = "preferences.yaml")]
    pub preferences: String,

    /// Days of history feeding the cluster corpus
    #[arg(long, default_value_t = 3)]
    pub corpus_days: u32,

    /// Width of the "today" window in days
    #[arg(long, default_value_t = 1)]
    pub today_days: u32,

    /// Clustering algorithm for all sections
    #[arg(long, value_enum, default_value = "threshold")]
    pub algorithm: Algorithm,

    /// Minimum cosine similarity for threshold clustering
    #[arg(long, default_value_t = 0.575)]
    pub similarity_threshold: f32,

    /// Skip the general-news section
    #[arg(long)]
    pub skip_news: bool,

    /// Skip the technology section
    #[arg(long)]
    pub skip_tech: bool,

    /// Skip the research section
    #[arg(long)]
    pub skip_research: bool,

    /// Number of most-cited papers to report
    #[arg(long, default_value_t = 10)]
    pub top_cited: usize,

    /// Minimum in-degree for a paper to appear in the citation ranking
    #[arg(long, default_value_t = 2)]
    pub min_citations: u32,

    /// Rebuild the citation report from the SQLite cache and exit
    #[arg(long)]
    pub citations_from_cache: bool,

    /// Semantic Scholar API key (raises rate limits)
    #[arg(long, env = "S2_API_KEY")]
    pub s2_api_key: Option<String>,
}

/// Clustering algorithm choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Algorithm {
    /// Threshold-agglomerative over embeddings
    Threshold,
    /// DBSCAN eps-sweep over embedding distances
    Dbscan,
    /// DBSCAN eps-sweep over keyword Jaccard distances
    Keywords,
}
