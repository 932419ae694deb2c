//! # Daily Briefing
//!
//! A personal daily-briefing engine. It ingests heterogeneous information
//! streams (RSS/Atom feeds, scraped pages, TLDR newsletters, Hacker News
//! digests, arXiv preprints), groups related articles into story clusters
//! across a multi-day rolling window, classifies each cluster as new,
//! continuing, or dormant, ranks clusters with an LLM, analyzes an arXiv
//! citation graph for the most-cited recent papers, and assembles a Markdown
//! briefing plus a JSON archive.
//!
//! ## Usage
//!
//! ```sh
//! daily_briefing -m ./briefings --sources sources.yaml
//! ```
//!
//! ## Architecture
//!
//! The run is a single pipeline per section:
//! 1. **Ingest**: concurrent source fetch, url dedup, age floor
//! 2. **Embed**: batch embeddings, reusing the rolling 7-day article cache
//! 3. **Cluster**: threshold-agglomerative story grouping
//! 4. **Categorize**: new / continuing / dormant / single classification
//! 5. **Rank**: batched LLM top-k per status bucket
//!
//! The research section additionally runs the citation-graph analyzer over
//! recent arXiv papers, backed by a SQLite citation cache.

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cache;
mod categorize;
mod citations;
mod cli;
mod cluster;
mod config;
mod embed;
mod fetchers;
mod llm;
mod models;
mod outputs;
mod pipeline;
mod rank;
mod sections;
mod utils;

use cache::ArticleCache;
use citations::cache::CitationCache;
use citations::{AnalyzerOptions, CitationAnalyzer, SemanticScholarClient};
use cli::Cli;
use config::Preferences;
use llm::Backend;
use models::Corpus;
use outputs::archive::{self, BriefingDoc};
use outputs::markdown::BriefingRenderer;
use pipeline::ClusterAlgorithm;
use sections::{NewsSection, ResearchSection, SectionSettings, TechSection};
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("daily_briefing starting up");

    let args = Cli::parse();

    // --- Configuration (the only fatal phase) ---
    let markdown_dir = Path::new(&args.markdown_output_dir);
    let archive_dir = Path::new(&args.archive_dir);
    if let Err(e) = ensure_writable_dir(markdown_dir) {
        error!(path = %markdown_dir.display(), error = %e, "Markdown output directory is not writable");
        return Err(e.into());
    }
    if let Err(e) = ensure_writable_dir(archive_dir) {
        error!(path = %archive_dir.display(), error = %e, "Archive directory is not writable");
        return Err(e.into());
    }

    let sources = match &args.sources {
        Some(path) => config::load_sources(Path::new(path))?,
        None => Vec::new(),
    };
    let prefs = Preferences::load(Path::new(&args.preferences))?;
    info!(configured_sources = sources.len(), "Configuration loaded");

    let now = Utc::now().naive_utc();
    let settings = SectionSettings {
        corpus_days: args.corpus_days,
        today_days: args.today_days,
        algorithm: match args.algorithm {
            cli::Algorithm::Threshold => ClusterAlgorithm::Threshold,
            cli::Algorithm::Dbscan => ClusterAlgorithm::DbscanEmbeddings,
            cli::Algorithm::Keywords => ClusterAlgorithm::DbscanKeywords,
        },
        similarity_threshold: args.similarity_threshold,
        embed_dimension: std::env::var("BRIEFING_EMBED_DIM")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1536),
    };

    // --- Backends ---
    let llm = Backend::from_env(Duration::from_secs(120));
    let article_cache = ArticleCache::new(&args.cache_dir);

    let citation_http = reqwest::Client::builder()
        .timeout(Duration::from_secs(35))
        .build()
        .unwrap_or_default();
    let s2 = SemanticScholarClient::new(citation_http, args.s2_api_key.clone());
    let citation_cache =
        match CitationCache::open(Path::new(&args.cache_dir).join("citations.db")) {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!(error = %e, "Citation cache unavailable; citation analysis disabled");
                None
            }
        };
    let analyzer = citation_cache
        .as_ref()
        .map(|cache| CitationAnalyzer::new(&s2, cache, AnalyzerOptions::default()));

    // --- Rebuild-from-cache mode: citation report only, then exit ---
    if args.citations_from_cache {
        let Some(analyzer) = &analyzer else {
            return Err("citation cache unavailable; cannot rebuild from cache".into());
        };
        let categories: Vec<String> = ResearchSection::DEFAULT_CATEGORIES
            .iter()
            .map(|s| s.to_string())
            .collect();
        let report = analyzer
            .rebuild_from_cache(&categories, args.top_cited, args.min_citations, now)
            .await;
        info!(papers = report.papers.len(), "Rebuilt citation report from cache");
        archive::write_citations_latest(&report, archive_dir).await?;
        return Ok(());
    }

    // --- Sections ---
    let mut produced: Vec<(String, Corpus)> = Vec::new();

    if !args.skip_news {
        let section = NewsSection::new(&sources, &prefs, settings);
        let corpus = section.run(&llm, &article_cache, now).await;
        info!(
            continuing = corpus.continuing.len(),
            new = corpus.new.len(),
            dormant = corpus.dormant.len(),
            singles = corpus.singles.len(),
            "News section complete"
        );
        produced.push(("News".to_string(), corpus));
    }

    if !args.skip_tech {
        let section = TechSection::new(&sources, &prefs, settings);
        let corpus = section.run(&llm, &article_cache, now).await;
        info!(
            continuing = corpus.continuing.len(),
            new = corpus.new.len(),
            singles = corpus.singles.len(),
            "Tech section complete"
        );
        produced.push(("Technology".to_string(), corpus));
    }

    if !args.skip_research {
        let section = ResearchSection::new(&sources, &prefs, settings, args.min_citations);
        let corpus = section
            .run(&llm, &article_cache, analyzer.as_ref(), now)
            .await;
        info!(
            papers = corpus.article_count(),
            cited = corpus.citations.as_ref().map(|c| c.papers.len()).unwrap_or(0),
            "Research section complete"
        );
        produced.push(("Research".to_string(), corpus));
    }

    // --- Outputs ---
    let mut renderer = BriefingRenderer::new(now);
    for (name, corpus) in &produced {
        renderer.add_section(name, corpus, args.corpus_days);
    }
    let markdown = renderer.finish();
    if let Err(e) = archive::write_markdown(&markdown, markdown_dir, now).await {
        error!(error = %e, "Failed to write Markdown briefing");
    }

    let doc = BriefingDoc::new(
        now,
        produced
            .iter()
            .map(|(name, corpus)| (name.clone(), corpus))
            .collect(),
    );
    if let Err(e) = archive::write_briefing(&doc, archive_dir).await {
        error!(error = %e, "Failed to write briefing archive");
    }
    if let Some(report) = produced
        .iter()
        .find_map(|(_, corpus)| corpus.citations.as_ref())
    {
        if let Err(e) = archive::write_citations_latest(report, archive_dir).await {
            error!(error = %e, "Failed to write citation report");
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        sections = produced.len(),
        "Execution complete"
    );

    Ok(())
}
