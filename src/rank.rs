//! Generic batched top-k selection over numbered item listings.
//!
//! The ranker presents items to the LLM as a numbered list and asks for a
//! JSON array of the best indices. Listings larger than one batch are reduced
//! tournament-style: each batch elects up to `top_k` survivors, survivors are
//! pooled, and the process repeats until at most `top_k` remain.
//!
//! The ranker never fails. Any LLM error or malformed response degrades to
//! "first k of the current batch", and every returned index is a valid index
//! into the original listing.

use crate::llm::Llm;
use crate::utils::truncate_for_log;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument, warn};

/// Default number of items per ranking batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Matches the `[N]` prefix that makes a line an item.
static ITEM_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[\d+\]\s").expect("static regex"));

/// Matches the first JSON array of integers in an LLM response.
static INDEX_ARRAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[\d,\s]+\]").expect("static regex"));

/// Batched top-k selector backed by an LLM.
#[derive(Debug)]
pub struct Ranker<'a, L> {
    llm: &'a L,
}

impl<'a, L: Llm> Ranker<'a, L> {
    pub fn new(llm: &'a L) -> Self {
        Self { llm }
    }

    /// Select up to `top_k` item indices from a numbered listing.
    ///
    /// `items` is a newline-delimited listing where each line starting with
    /// `[N] ` defines item N. `template` is a prompt with `{items}`,
    /// `{top_k}`, and optional `{count}` placeholders.
    #[instrument(level = "info", skip_all, fields(top_k, batch_size))]
    pub async fn rank_items(
        &self,
        items: &str,
        template: &str,
        top_k: usize,
        batch_size: usize,
    ) -> Vec<usize> {
        let item_lines = item_lines(items);
        let num_items = item_lines.len();

        if num_items <= top_k {
            return (0..num_items).collect();
        }
        if num_items <= batch_size.max(1) {
            return self
                .rank_single_batch(items, template, top_k, num_items)
                .await;
        }
        self.rank_batched(&item_lines, template, top_k, batch_size.max(1))
            .await
    }

    /// Ask the LLM to rank one batch; fall back to the first `top_k` on any
    /// failure.
    async fn rank_single_batch(
        &self,
        items: &str,
        template: &str,
        top_k: usize,
        num_items: usize,
    ) -> Vec<usize> {
        let quota = top_k.min(num_items);
        let prompt = template
            .replace("{count}", &num_items.to_string())
            .replace("{top_k}", &quota.to_string())
            .replace("{items}", items);

        match self.llm.generate(&prompt).await {
            Ok(response) => match parse_index_array(&response, num_items) {
                Some(selected) => {
                    let mut selected = selected;
                    selected.truncate(quota);
                    selected
                }
                None => {
                    warn!(
                        response_preview = %truncate_for_log(&response, 200),
                        "Unparseable ranking response; falling back to first-k"
                    );
                    (0..quota).collect()
                }
            },
            Err(e) => {
                warn!(error = %e, "Ranking call failed; falling back to first-k");
                (0..quota).collect()
            }
        }
    }

    /// Tournament reduction for listings larger than one batch.
    async fn rank_batched(
        &self,
        item_lines: &[String],
        template: &str,
        top_k: usize,
        batch_size: usize,
    ) -> Vec<usize> {
        let mut current: Vec<usize> = (0..item_lines.len()).collect();

        while current.len() > top_k {
            let mut survivors = Vec::new();

            for batch in current.chunks(batch_size) {
                // Renumber the batch 0..M-1 so the model's indices are local.
                let batch_listing = batch
                    .iter()
                    .enumerate()
                    .map(|(local, &original)| {
                        ITEM_PREFIX
                            .replace(&item_lines[original], format!("[{local}] "))
                            .into_owned()
                    })
                    .collect::<Vec<_>>()
                    .join("\n");

                let selected = self
                    .rank_single_batch(&batch_listing, template, top_k.min(batch.len()), batch.len())
                    .await;
                survivors.extend(selected.into_iter().filter_map(|i| batch.get(i).copied()));
            }

            if survivors.len() >= current.len() {
                debug!(count = current.len(), "Ranking round made no progress; stopping");
                break;
            }
            current = survivors;
        }

        current.truncate(top_k);
        current
    }
}

/// Extract the item lines (`[N] ...`) from a listing.
fn item_lines(items: &str) -> Vec<String> {
    items
        .lines()
        .map(str::trim)
        .filter(|line| ITEM_PREFIX.is_match(line))
        .map(String::from)
        .collect()
}

/// Find the first JSON integer array in a response and keep in-range indices.
fn parse_index_array(response: &str, num_items: usize) -> Option<Vec<usize>> {
    let raw = INDEX_ARRAY.find(response)?.as_str();
    let parsed: Vec<usize> = serde_json::from_str(raw).ok()?;
    Some(parsed.into_iter().filter(|&i| i < num_items).collect())
}

/// Build a short label for a cluster from its article titles. Returns `None`
/// on any LLM failure; callers keep their current label.
#[instrument(level = "debug", skip_all, fields(titles = titles.len()))]
pub async fn generate_label<L: Llm>(llm: &L, titles: &[String]) -> Option<String> {
    if titles.is_empty() {
        return None;
    }
    let listing = titles
        .iter()
        .take(10)
        .map(|t| format!("- {t}"))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = format!(
        "These news headlines all cover the same story:\n\n{listing}\n\n\
         Write a single short title (under 10 words) for the story.\n\
         Respond with ONLY the title, no quotes, no explanation."
    );

    match llm.generate(&prompt).await {
        Ok(response) => {
            let label = response.lines().next().unwrap_or("").trim().trim_matches('"');
            if label.is_empty() {
                None
            } else {
                Some(label.to_string())
            }
        }
        Err(e) => {
            warn!(error = %e, "Cluster label generation failed; keeping headline");
            None
        }
    }
}
