//! Markdown rendering for the daily briefing.
//!
//! Sections render their status buckets in a fixed order (continuing, new,
//! singles, dormant) with every article link collected into a numbered
//! reference list at the bottom of the document. Dormant stories render as a
//! one-line mention (their article lists are empty by contract). A citation
//! report, when present, becomes a "Most Cited Papers" section.

use crate::models::{CitationReport, Corpus, Group};
use chrono::NaiveDateTime;
use std::fmt::Write;

/// Accumulates sections and their reference links into one document.
pub struct BriefingRenderer {
    body: String,
    links: Vec<String>,
}

impl BriefingRenderer {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            body: format!("# Daily Briefing - {}\n\n", now.date().format("%Y-%m-%d")),
            links: Vec::new(),
        }
    }

    /// Append one briefing section built from a corpus.
    pub fn add_section(&mut self, title: &str, corpus: &Corpus, corpus_days: u32) {
        let _ = writeln!(self.body, "## {title}\n");

        if !corpus.continuing.is_empty() {
            let _ = writeln!(self.body, "### Continuing Stories\n");
            let _ = writeln!(
                self.body,
                "Major stories with ongoing coverage ({} stories)\n",
                corpus.continuing.len()
            );
            for group in &corpus.continuing {
                let refs = self.cite_all(group);
                let _ = writeln!(self.body, "**{}** {}", group.label, refs);
                let _ = writeln!(
                    self.body,
                    "*{} new article(s) today (total: {} articles across {} days)*\n",
                    group.today_count, group.total_count, corpus_days
                );
            }
        }

        if !corpus.new.is_empty() {
            let _ = writeln!(self.body, "### New Stories Today\n");
            let _ = writeln!(
                self.body,
                "Stories that appeared for the first time today ({} stories)\n",
                corpus.new.len()
            );
            for group in &corpus.new {
                let refs = self.cite_all(group);
                let _ = writeln!(self.body, "**{}** {}", group.label, refs);
                let _ = writeln!(self.body, "*{} article(s)*\n", group.total_count);
            }
        }

        if !corpus.singles.is_empty() {
            let _ = writeln!(self.body, "### Single Articles\n");
            for group in &corpus.singles {
                if let Some(article) = group.articles.first() {
                    let n = self.cite(&article.url);
                    let _ = writeln!(self.body, "- {} [{}]", article.title, n);
                }
            }
            let _ = writeln!(self.body);
        }

        if !corpus.dormant.is_empty() {
            let _ = writeln!(self.body, "### Dormant Stories\n");
            let _ = writeln!(
                self.body,
                "Stories with coverage in previous days but none today\n"
            );
            for group in &corpus.dormant {
                let title = group.representative_title.as_deref().unwrap_or(&group.label);
                let _ = writeln!(
                    self.body,
                    "- {} ({} articles, none today)",
                    title, group.total_count
                );
            }
            let _ = writeln!(self.body);
        }

        if let Some(report) = &corpus.citations {
            self.add_citations(report);
        }

        let _ = writeln!(
            self.body,
            "*Summary: {} continuing, {} new, {} single, {} dormant*\n",
            corpus.continuing.len(),
            corpus.new.len(),
            corpus.singles.len(),
            corpus.dormant.len()
        );
    }

    fn add_citations(&mut self, report: &CitationReport) {
        let _ = writeln!(self.body, "### Most Cited Papers\n");
        if let Some(error) = &report.error {
            let _ = writeln!(self.body, "_No citation data available: {error}_\n");
            return;
        }
        let _ = writeln!(
            self.body,
            "Papers most cited by the last {} day(s) of arXiv submissions\n",
            report.params.days
        );
        for (i, paper) in report.papers.iter().enumerate() {
            let _ = writeln!(
                self.body,
                "{}. [{}]({}) - cited by {} recent paper(s)",
                i + 1,
                paper.title,
                paper.url,
                paper.citation_count
            );
            if !paper.authors.is_empty() {
                let mut authors = paper.authors.iter().take(3).cloned().collect::<Vec<_>>();
                if paper.authors.len() > 3 {
                    authors.push(format!("et al. ({} authors)", paper.authors.len()));
                }
                let _ = writeln!(self.body, "   - {}", authors.join(", "));
            }
        }
        let _ = writeln!(self.body);
    }

    /// Register a url and return its reference number.
    fn cite(&mut self, url: &str) -> usize {
        self.links.push(url.to_string());
        self.links.len()
    }

    /// Reference markers for every article in a group, e.g. `[1] [2] [3]`.
    fn cite_all(&mut self, group: &Group) -> String {
        group
            .articles
            .iter()
            .map(|a| format!("[{}]", self.cite(&a.url)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Finish the document, appending the collected reference links.
    pub fn finish(mut self) -> String {
        if !self.links.is_empty() {
            let _ = writeln!(self.body, "---\n");
            let _ = writeln!(self.body, "## References\n");
            for (i, url) in self.links.iter().enumerate() {
                let _ = writeln!(self.body, "[{}]: {}", i + 1, url);
            }
        }
        self.body
    }
}
