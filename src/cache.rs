//! Rolling, date-partitioned article cache.
//!
//! Embedding vectors are the expensive part of a briefing run, so articles
//! that already carry one are persisted to disk and reused across runs.
//! Partitions are JSONL files named by date:
//!
//! ```text
//! <root>/articles/embeddings_2025-01-02.jsonl
//! ```
//!
//! One JSON object per line with fields `{url, title, summary, source,
//! published_at, vector}`. Partitions older than the retention horizon
//! (7 days) are eligible for eviction.
//!
//! Every operation is best-effort: read and write failures are logged and
//! treated as cache misses. The ingest pipeline stays correct (just slower)
//! with a cache that always returns empty.

use crate::models::Article;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Days of partitions kept on disk.
pub const RETENTION_DAYS: u32 = 7;

/// File-backed rolling article store.
#[derive(Debug, Clone)]
pub struct ArticleCache {
    root: PathBuf,
}

impl ArticleCache {
    /// Create a cache rooted at `root`. The articles directory is created on
    /// demand by `store`; a missing directory just means every read misses.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn articles_dir(&self) -> PathBuf {
        self.root.join("articles")
    }

    fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.articles_dir()
            .join(format!("embeddings_{}.jsonl", date.format("%Y-%m-%d")))
    }

    /// Load all cached articles from the last `days` days, keyed by url.
    ///
    /// Partitions are read oldest-first and entries overwrite, so on
    /// duplicate urls the most recent date wins, and within one day the last
    /// write wins.
    #[instrument(level = "info", skip(self))]
    pub fn load_recent(&self, days: u32, now: NaiveDateTime) -> HashMap<String, Article> {
        let mut cached: HashMap<String, Article> = HashMap::new();

        for days_ago in (0..days).rev() {
            let date = (now - Duration::days(i64::from(days_ago))).date();
            let path = self.partition_path(date);
            if !path.exists() {
                continue;
            }
            match read_partition(&path) {
                Ok(articles) => {
                    for article in articles {
                        cached.insert(article.key().to_string(), article);
                    }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Article cache read failed");
                }
            }
        }

        if !cached.is_empty() {
            info!(count = cached.len(), days, "Loaded cached articles");
        }
        cached
    }

    /// Append all vector-bearing articles to today's partition.
    ///
    /// Articles without a vector are silently skipped; there is nothing
    /// expensive to save. Returns the number of articles written.
    #[instrument(level = "info", skip_all, fields(candidates = articles.len()))]
    pub fn store(&self, articles: &[Article], now: NaiveDateTime) -> usize {
        let to_write: Vec<&Article> = articles.iter().filter(|a| a.vector.is_some()).collect();
        if to_write.is_empty() {
            return 0;
        }

        let dir = self.articles_dir();
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!(path = %dir.display(), error = %e, "Article cache dir creation failed");
            return 0;
        }

        let path = self.partition_path(now.date());
        let mut file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Article cache open failed");
                return 0;
            }
        };

        let mut written = 0usize;
        for article in to_write {
            match serde_json::to_string(article) {
                Ok(line) => {
                    if let Err(e) = writeln!(file, "{line}") {
                        warn!(error = %e, "Article cache write failed");
                        break;
                    }
                    written += 1;
                }
                Err(e) => warn!(url = %article.url, error = %e, "Article serialization failed"),
            }
        }

        if written > 0 {
            info!(count = written, path = %path.display(), "Cached article embeddings");
        }
        written
    }

    /// Remove partitions older than [`RETENTION_DAYS`].
    #[instrument(level = "info", skip(self))]
    pub fn evict(&self, now: NaiveDateTime) {
        let horizon = now.date() - Duration::days(i64::from(RETENTION_DAYS));
        let dir = self.articles_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(date) = partition_date(&name.to_string_lossy()) else {
                continue;
            };
            if date < horizon {
                match fs::remove_file(entry.path()) {
                    Ok(()) => debug!(path = %entry.path().display(), "Evicted cache partition"),
                    Err(e) => {
                        warn!(path = %entry.path().display(), error = %e, "Eviction failed")
                    }
                }
            }
        }
    }
}

/// Parse the date out of a partition filename, `None` for foreign files.
fn partition_date(name: &str) -> Option<NaiveDate> {
    let date_part = name
        .strip_prefix("embeddings_")?
        .strip_suffix(".jsonl")?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Read one JSONL partition, skipping unreadable lines.
fn read_partition(path: &Path) -> std::io::Result<Vec<Article>> {
    let reader = BufReader::new(fs::File::open(path)?);
    let mut articles = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Article>(&line) {
            Ok(article) => articles.push(article),
            Err(e) => {
                warn!(path = %path.display(), line = lineno + 1, error = %e,
                      "Skipping corrupt cache line");
            }
        }
    }
    Ok(articles)
}
