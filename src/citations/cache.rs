//! SQLite-backed citation cache.
//!
//! Citation lookups against the external service are slow and rate-limited,
//! so both paper metadata and `(citing, cited)` edges are persisted with a
//! `last_updated` stamp. A row is *fresh* while `last_updated ≥ now −
//! max_age`; fresh rows are served from the cache, stale or absent rows
//! require a fetch, and a failed fetch leaves the row untouched.
//!
//! Connections follow a connection-per-operation pattern: every method opens
//! its own connection and runs inside a transaction that rolls back on error.
//! Concurrent readers are fine; writers serialize on SQLite's own locking.

use chrono::{Duration, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Citation cache failures. Callers treat them as cache misses.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("citation cache database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("citation cache io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Cached metadata for one paper.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPaper {
    pub arxiv_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub published: Option<String>,
    pub summary: String,
    pub url: String,
    pub total_citations: u32,
}

impl CachedPaper {
    /// Minimal placeholder for a paper only known by its identifier.
    pub fn placeholder(arxiv_id: &str) -> Self {
        Self {
            arxiv_id: arxiv_id.to_string(),
            title: arxiv_id.to_string(),
            authors: Vec::new(),
            published: None,
            summary: String::new(),
            url: format!("https://arxiv.org/abs/{arxiv_id}"),
            total_citations: 0,
        }
    }
}

/// SQLite store for citation edges and paper metadata.
#[derive(Debug, Clone)]
pub struct CitationCache {
    db_path: PathBuf,
}

impl CitationCache {
    /// Open (and initialize) the cache at `db_path`. The parent directory is
    /// created when missing.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let cache = Self { db_path };
        cache.with_connection(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS papers (
                     arxiv_id TEXT PRIMARY KEY,
                     title TEXT,
                     authors TEXT,
                     published TEXT,
                     summary TEXT,
                     url TEXT,
                     total_citations INTEGER,
                     last_updated TEXT
                 );
                 CREATE TABLE IF NOT EXISTS citations (
                     citing_paper TEXT,
                     cited_paper TEXT,
                     last_updated TEXT,
                     PRIMARY KEY (citing_paper, cited_paper)
                 );
                 CREATE INDEX IF NOT EXISTS idx_cited_paper
                     ON citations(cited_paper);
                 CREATE INDEX IF NOT EXISTS idx_last_updated
                     ON papers(last_updated);",
            )?;
            Ok(())
        })?;
        Ok(cache)
    }

    /// Run `op` on a fresh connection inside a transaction; commit on `Ok`,
    /// roll back on `Err`.
    fn with_connection<T>(
        &self,
        op: impl FnOnce(&Connection) -> Result<T, CacheError>,
    ) -> Result<T, CacheError> {
        let mut conn = Connection::open(&self.db_path)?;
        let tx = conn.transaction()?;
        match op(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                // Dropping the transaction rolls it back.
                warn!(error = %e, "Citation cache operation rolled back");
                Err(e)
            }
        }
    }

    /// Store paper metadata, stamped `last_updated = now`.
    #[instrument(level = "debug", skip(self, paper), fields(arxiv_id = %paper.arxiv_id))]
    pub fn cache_paper(&self, paper: &CachedPaper, now: NaiveDateTime) -> Result<(), CacheError> {
        self.with_connection(|conn| {
            let authors_json =
                serde_json::to_string(&paper.authors).unwrap_or_else(|_| "[]".to_string());
            conn.execute(
                "INSERT OR REPLACE INTO papers
                 (arxiv_id, title, authors, published, summary, url, total_citations, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    paper.arxiv_id,
                    paper.title,
                    authors_json,
                    paper.published,
                    paper.summary,
                    paper.url,
                    paper.total_citations,
                    now.format("%Y-%m-%dT%H:%M:%S").to_string(),
                ],
            )?;
            Ok(())
        })
    }

    /// Store the outgoing citation edges of one paper.
    #[instrument(level = "debug", skip(self, cited), fields(citing, edges = cited.len()))]
    pub fn cache_citations(
        &self,
        citing: &str,
        cited: &[String],
        now: NaiveDateTime,
    ) -> Result<(), CacheError> {
        self.with_connection(|conn| {
            let stamp = now.format("%Y-%m-%dT%H:%M:%S").to_string();
            let mut statement = conn.prepare(
                "INSERT OR REPLACE INTO citations (citing_paper, cited_paper, last_updated)
                 VALUES (?1, ?2, ?3)",
            )?;
            for cited_id in cited {
                statement.execute(params![citing, cited_id, stamp])?;
            }
            Ok(())
        })
    }

    /// Fetch cached metadata no older than `max_age_days`.
    pub fn get_paper(
        &self,
        arxiv_id: &str,
        max_age_days: u32,
        now: NaiveDateTime,
    ) -> Result<Option<CachedPaper>, CacheError> {
        let cutoff = (now - Duration::days(i64::from(max_age_days)))
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string();
        self.with_connection(|conn| {
            let row = conn
                .query_row(
                    "SELECT arxiv_id, title, authors, published, summary, url, total_citations
                     FROM papers WHERE arxiv_id = ?1 AND last_updated > ?2",
                    params![arxiv_id, cutoff],
                    |row| {
                        let authors_json: String = row.get(2)?;
                        Ok(CachedPaper {
                            arxiv_id: row.get(0)?,
                            title: row.get(1)?,
                            authors: serde_json::from_str(&authors_json).unwrap_or_default(),
                            published: row.get(3)?,
                            summary: row.get(4)?,
                            url: row.get(5)?,
                            total_citations: row.get(6)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Fetch the cached reference list of a paper, `None` when absent or
    /// entirely stale.
    pub fn get_citations(
        &self,
        citing: &str,
        max_age_days: u32,
        now: NaiveDateTime,
    ) -> Result<Option<Vec<String>>, CacheError> {
        let cutoff = (now - Duration::days(i64::from(max_age_days)))
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string();
        self.with_connection(|conn| {
            let mut statement = conn.prepare(
                "SELECT cited_paper FROM citations
                 WHERE citing_paper = ?1 AND last_updated > ?2
                 ORDER BY cited_paper",
            )?;
            let cited: Vec<String> = statement
                .query_map(params![citing, cutoff], |row| row.get(0))?
                .collect::<Result<_, _>>()?;
            if cited.is_empty() {
                Ok(None)
            } else {
                Ok(Some(cited))
            }
        })
    }

    /// In-degree ranking straight from the cache: `(cited_paper, count)`
    /// pairs with `count ≥ min_citations`, ordered count descending then
    /// arXiv id ascending, at most `limit` rows.
    pub fn get_most_cited(
        &self,
        min_citations: u32,
        limit: usize,
    ) -> Result<Vec<(String, u32)>, CacheError> {
        self.with_connection(|conn| {
            let mut statement = conn.prepare(
                "SELECT cited_paper, COUNT(*) as cnt
                 FROM citations
                 GROUP BY cited_paper
                 HAVING cnt >= ?1
                 ORDER BY cnt DESC, cited_paper ASC
                 LIMIT ?2",
            )?;
            let rows: Vec<(String, u32)> = statement
                .query_map(params![min_citations, limit as i64], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?
                .collect::<Result<_, _>>()?;
            Ok(rows)
        })
    }

    /// Delete rows older than `max_age_days` from both tables.
    #[instrument(level = "debug", skip(self))]
    pub fn clear_old(&self, max_age_days: u32, now: NaiveDateTime) -> Result<(), CacheError> {
        let cutoff = (now - Duration::days(i64::from(max_age_days)))
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string();
        self.with_connection(|conn| {
            let papers = conn.execute("DELETE FROM papers WHERE last_updated < ?1", [&cutoff])?;
            let edges = conn.execute("DELETE FROM citations WHERE last_updated < ?1", [&cutoff])?;
            debug!(papers, edges, "Cleared old citation rows");
            Ok(())
        })
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn open_cache(dir: &tempfile::TempDir) -> CitationCache {
        CitationCache::open(dir.path().join("citations.db")).unwrap()
    }

    #[test]
    fn test_paper_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_cache(&dir);

        let paper = CachedPaper {
            arxiv_id: "2101.12345".to_string(),
            title: "A Test Paper".to_string(),
            authors: vec!["Alice".to_string(), "Bob".to_string()],
            published: Some("2021-01-28".to_string()),
            summary: "Abstract text".to_string(),
            url: "https://arxiv.org/abs/2101.12345".to_string(),
            total_citations: 100,
        };
        cache.cache_paper(&paper, now()).unwrap();

        let fetched = cache.get_paper("2101.12345", 30, now()).unwrap().unwrap();
        assert_eq!(fetched, paper);
    }

    #[test]
    fn test_stale_paper_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_cache(&dir);

        let paper = CachedPaper::placeholder("2101.00001");
        let long_ago = now() - Duration::days(60);
        cache.cache_paper(&paper, long_ago).unwrap();

        assert!(cache.get_paper("2101.00001", 30, now()).unwrap().is_none());
        // A wider freshness window still sees it.
        assert!(cache.get_paper("2101.00001", 90, now()).unwrap().is_some());
    }

    #[test]
    fn test_citations_roundtrip_and_freshness() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_cache(&dir);

        let cited = vec!["2001.00001".to_string(), "2001.00002".to_string()];
        cache.cache_citations("2101.12345", &cited, now()).unwrap();

        let fetched = cache.get_citations("2101.12345", 30, now()).unwrap().unwrap();
        assert_eq!(fetched, cited);
        assert!(cache.get_citations("none.at.all", 30, now()).unwrap().is_none());
    }

    #[test]
    fn test_refetch_replaces_edges() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_cache(&dir);

        cache
            .cache_citations("2101.12345", &["2001.00001".to_string()], now())
            .unwrap();
        // Same edge again later: primary key dedups, stamp refreshes.
        cache
            .cache_citations("2101.12345", &["2001.00001".to_string()], now())
            .unwrap();
        assert_eq!(
            cache.get_most_cited(1, 10).unwrap(),
            vec![("2001.00001".to_string(), 1)]
        );
    }

    #[test]
    fn test_most_cited_ordering_and_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_cache(&dir);

        // A ← B, C, D; E ← B, C; F ← B.
        cache
            .cache_citations("B", &["A".to_string(), "E".to_string(), "F".to_string()], now())
            .unwrap();
        cache
            .cache_citations("C", &["A".to_string(), "E".to_string()], now())
            .unwrap();
        cache.cache_citations("D", &["A".to_string()], now()).unwrap();

        let top = cache.get_most_cited(2, 10).unwrap();
        assert_eq!(
            top,
            vec![("A".to_string(), 3), ("E".to_string(), 2)]
        );
    }

    #[test]
    fn test_most_cited_ties_break_on_id_ascending() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_cache(&dir);

        cache
            .cache_citations("X", &["2201.0002".to_string(), "2201.0001".to_string()], now())
            .unwrap();
        cache
            .cache_citations("Y", &["2201.0002".to_string(), "2201.0001".to_string()], now())
            .unwrap();

        let top = cache.get_most_cited(1, 10).unwrap();
        assert_eq!(
            top,
            vec![("2201.0001".to_string(), 2), ("2201.0002".to_string(), 2)]
        );
    }

    #[test]
    fn test_clear_old_removes_expired_rows() {
        let dir = tempfile::tempdir().unwrap();
        let cache = open_cache(&dir);

        let long_ago = now() - Duration::days(120);
        cache
            .cache_paper(&CachedPaper::placeholder("old.paper"), long_ago)
            .unwrap();
        cache
            .cache_citations("old.paper", &["other".to_string()], long_ago)
            .unwrap();
        cache
            .cache_paper(&CachedPaper::placeholder("new.paper"), now())
            .unwrap();

        cache.clear_old(90, now()).unwrap();
        assert!(cache.get_paper("old.paper", 365, now()).unwrap().is_none());
        assert!(cache.get_paper("new.paper", 30, now()).unwrap().is_some());
        assert!(cache.get_most_cited(1, 10).unwrap().is_empty());
    }
}
