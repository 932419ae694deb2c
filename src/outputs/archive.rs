//! JSON archive of briefing runs.
//!
//! Each run writes the structured corpus to a date-partitioned directory and
//! refreshes `citations_latest.json` when a citation report was produced.
//! Archive writes are best-effort: failures are logged and the briefing run
//! carries on.

use crate::models::{CitationReport, Corpus};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

/// One archived briefing: every section's corpus plus the run timestamp.
#[derive(Debug, Serialize)]
pub struct BriefingDoc<'a> {
    pub generated_at: NaiveDateTime,
    pub date: String,
    pub sections: Vec<SectionDoc<'a>>,
}

/// A named section inside the archive document.
#[derive(Debug, Serialize)]
pub struct SectionDoc<'a> {
    pub name: String,
    pub corpus: &'a Corpus,
}

impl<'a> BriefingDoc<'a> {
    pub fn new(now: NaiveDateTime, sections: Vec<(String, &'a Corpus)>) -> Self {
        Self {
            generated_at: now,
            date: now.date().format("%Y-%m-%d").to_string(),
            sections: sections
                .into_iter()
                .map(|(name, corpus)| SectionDoc { name, corpus })
                .collect(),
        }
    }
}

/// Write the structured briefing to `<archive>/<date>/briefing.json`.
#[instrument(level = "info", skip_all, fields(archive_dir = %archive_dir.display()))]
pub async fn write_briefing(
    doc: &BriefingDoc<'_>,
    archive_dir: &Path,
) -> Result<(), Box<dyn Error>> {
    let day_dir = archive_dir.join(&doc.date);
    fs::create_dir_all(&day_dir).await?;

    let path = day_dir.join("briefing.json");
    let json = serde_json::to_string_pretty(doc)?;
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote briefing archive");
    Ok(())
}

/// Refresh `<archive>/citations_latest.json` with the newest report.
#[instrument(level = "info", skip_all, fields(archive_dir = %archive_dir.display()))]
pub async fn write_citations_latest(
    report: &CitationReport,
    archive_dir: &Path,
) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(archive_dir).await?;
    let path = archive_dir.join("citations_latest.json");
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&path, json).await?;
    info!(path = %path.display(), papers = report.papers.len(), "Wrote citation report");
    Ok(())
}

/// Write the rendered Markdown briefing to
/// `<markdown_dir>/briefing_<date>.md`.
#[instrument(level = "info", skip_all, fields(markdown_dir = %markdown_dir.display()))]
pub async fn write_markdown(
    markdown: &str,
    markdown_dir: &Path,
    now: NaiveDateTime,
) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(markdown_dir).await?;
    let path = markdown_dir.join(format!("briefing_{}.md", now.date().format("%Y-%m-%d")));
    if let Err(e) = fs::write(&path, markdown).await {
        error!(path = %path.display(), error = %e, "Failed writing Markdown briefing");
        return Err(e.into());
    }
    info!(path = %path.display(), "Wrote Markdown briefing");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Article, CitationParams, Group};
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_write_briefing_creates_dated_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut corpus = Corpus::default();
        corpus
            .singles
            .push(Group::from_articles(vec![Article::new("T", "https://ex.com")]));

        let doc = BriefingDoc::new(now(), vec![("News".to_string(), &corpus)]);
        write_briefing(&doc, dir.path()).await.unwrap();

        let path = dir.path().join("2025-01-02").join("briefing.json");
        let contents = std::fs::read_to_string(path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["date"], "2025-01-02");
        assert_eq!(parsed["sections"][0]["name"], "News");
        assert_eq!(
            parsed["sections"][0]["corpus"]["singles"][0]["articles"][0]["url"],
            "https://ex.com"
        );
    }

    #[tokio::test]
    async fn test_write_citations_latest_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let report = CitationReport {
            generated_at: now(),
            params: CitationParams {
                days: 1,
                top_n: 5,
                min_citations: 2,
                categories: vec!["cs.AI".to_string()],
            },
            papers: vec![],
            error: Some("no citation data in cache".to_string()),
        };

        write_citations_latest(&report, dir.path()).await.unwrap();
        write_citations_latest(&report, dir.path()).await.unwrap();

        let contents =
            std::fs::read_to_string(dir.path().join("citations_latest.json")).unwrap();
        assert!(contents.contains("no citation data in cache"));
    }

    #[tokio::test]
    async fn test_write_markdown_names_file_by_date() {
        let dir = tempfile::tempdir().unwrap();
        write_markdown("# Daily Briefing", dir.path(), now())
            .await
            .unwrap();
        assert!(dir.path().join("briefing_2025-01-02.md").exists());
    }
}
