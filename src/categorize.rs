//! Temporal categorization of story clusters.
//!
//! Each cluster's articles are split around `cutoff = now − today_days` into
//! a "today" subset (including articles whose date never parsed) and an
//! "older" subset, then classified:
//!
//! | total ≥ 2? | today > 0? | older > 0? | status |
//! |-----------|-----------|-----------|--------|
//! | yes | yes | no  | new |
//! | yes | yes | yes | continuing |
//! | yes | no  | yes | dormant |
//! | no  | yes | no  | single |
//! | no  | no  | yes | dropped |
//!
//! Continuing stories display only their today subset but keep the full
//! window in `total_count`. Dormant stories drop their article list entirely,
//! retaining just a representative title. Continuing stories sort by
//! `total_count × today_count` descending; new and dormant sort by
//! `total_count` descending; all ties break on the most recent publication
//! time.

use crate::models::{Article, ClusterStatus, Group};
use chrono::{Duration, NaiveDateTime};
use tracing::{info, instrument};

/// Clusters bucketed by temporal status, each bucket sorted for display.
#[derive(Debug, Default)]
pub struct Categorized {
    pub new: Vec<Group>,
    pub continuing: Vec<Group>,
    pub dormant: Vec<Group>,
    pub singles: Vec<Group>,
}

/// Classify clusters against the today window.
#[instrument(level = "info", skip(groups), fields(groups = groups.len()))]
pub fn categorize(groups: Vec<Group>, now: NaiveDateTime, today_days: u32) -> Categorized {
    let cutoff = now - Duration::days(i64::from(today_days));
    let mut out = Categorized::default();
    // Dormant groups shed their articles, so capture the tie-break key first.
    let mut dormant: Vec<(Group, NaiveDateTime)> = Vec::new();

    for mut group in groups {
        let (today, older): (Vec<Article>, Vec<Article>) = group
            .articles
            .drain(..)
            .partition(|a| a.effective_published(now) >= cutoff);

        let total = today.len() + older.len();
        if total == 0 {
            continue;
        }
        let latest = today
            .iter()
            .chain(&older)
            .map(|a| a.effective_published(now))
            .max()
            .unwrap_or(now);

        if !today.is_empty() && older.is_empty() {
            group.today_count = today.len();
            group.total_count = total;
            group.articles = today;
            if total >= 2 {
                group.status = ClusterStatus::New;
                out.new.push(group);
            } else {
                group.status = ClusterStatus::Single;
                out.singles.push(group);
            }
        } else if !today.is_empty() && !older.is_empty() {
            // Both sides populated implies total ≥ 2.
            group.today_count = today.len();
            group.total_count = total;
            group.articles = today;
            group.status = ClusterStatus::Continuing;
            out.continuing.push(group);
        } else if today.is_empty() && older.len() >= 2 {
            group.today_count = 0;
            group.total_count = total;
            group.representative_title = older.first().map(|a| a.title.clone());
            group.articles = Vec::new();
            group.status = ClusterStatus::Dormant;
            dormant.push((group, latest));
        }
        // A lone article entirely outside the today window is dropped.
    }

    out.continuing.sort_by(|a, b| {
        (b.total_count * b.today_count, b.latest_published(now))
            .cmp(&(a.total_count * a.today_count, a.latest_published(now)))
    });
    out.new.sort_by(|a, b| {
        (b.total_count, b.latest_published(now)).cmp(&(a.total_count, a.latest_published(now)))
    });
    dormant.sort_by(|(a, a_latest), (b, b_latest)| {
        (b.total_count, *b_latest).cmp(&(a.total_count, *a_latest))
    });
    out.dormant = dormant.into_iter().map(|(g, _)| g).collect();

    info!(
        new = out.new.len(),
        continuing = out.continuing.len(),
        dormant = out.dormant.len(),
        singles = out.singles.len(),
        "Categorized clusters"
    );
    out
}
