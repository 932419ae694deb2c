//! Story clustering over unit-norm article embeddings.
//!
//! Two algorithms are offered, selected by section policy:
//!
//! 1. **Threshold-agglomerative** (default for news): articles are visited in
//!    descending publication order; each joins the existing cluster whose
//!    centroid it is most similar to when that similarity clears the
//!    threshold, otherwise it founds a new cluster. Ties prefer the older
//!    cluster (smaller index). O(N·K).
//! 2. **DBSCAN-like** (alternate): a full cosine-distance matrix is swept
//!    over a ladder of `eps` candidates; each candidate labeling is scored by
//!    silhouette and the best positive score wins. Noise points are given
//!    unique labels so no article is globally "noise". A keyword-Jaccard
//!    variant uses the same sweep with a coarser step.
//!
//! Both algorithms are deterministic given their inputs. Articles whose
//! vector is missing or zeroed (failed embedding) never enter a similarity
//! computation; they come out as singleton clusters.
//!
//! Labeling is a separate async pass: clusters of two or more articles get a
//! short LLM-generated title, with the first article's headline kept on any
//! failure.

use crate::llm::Llm;
use crate::models::{Article, Group};
use crate::rank::generate_label;
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, instrument};

/// Tunable clustering parameters. The defaults reproduce the production
/// behavior; everything is exposed so experiments need no code changes.
#[derive(Debug, Clone)]
pub struct ClusterParams {
    /// Minimum cosine similarity to join an existing cluster (algorithm 1).
    pub similarity_threshold: f32,
    /// `eps` ladder step for the embedding-distance sweep (algorithm 2).
    pub eps_step_embedding: f32,
    /// `eps` ladder step for the keyword-Jaccard sweep.
    pub eps_step_jaccard: f32,
    /// Number of `eps` candidates in a sweep.
    pub eps_candidates: usize,
    /// DBSCAN core-point threshold, the point itself included.
    pub min_samples: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.575,
            eps_step_embedding: 0.01,
            eps_step_jaccard: 0.03,
            eps_candidates: 30,
            min_samples: 2,
        }
    }
}

/// Cosine similarity that tolerates non-unit vectors (centroids are running
/// means, so their norm drifts below 1).
fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

/// Threshold-agglomerative clustering (algorithm 1).
///
/// Input order is normalized here: articles are sorted by publication time
/// descending before the sweep, as the assignment depends on visit order.
/// Each article's `cluster` field records the index of the group it joined.
#[instrument(level = "info", skip_all, fields(articles = articles.len(), threshold = params.similarity_threshold))]
pub fn cluster_threshold(
    mut articles: Vec<Article>,
    params: &ClusterParams,
    now: NaiveDateTime,
) -> Vec<Group> {
    articles.sort_by(|a, b| {
        b.effective_published(now)
            .cmp(&a.effective_published(now))
    });

    // (centroid, members); centroid is the running mean of member vectors.
    let mut clusters: Vec<(Vec<f32>, Vec<Article>)> = Vec::new();
    let mut stragglers: Vec<Article> = Vec::new();

    for mut article in articles {
        let vector = match article.vector.clone() {
            Some(v) if article.has_live_vector() => v,
            _ => {
                stragglers.push(article);
                continue;
            }
        };

        let mut best: Option<(usize, f32)> = None;
        for (idx, (centroid, _)) in clusters.iter().enumerate() {
            let sim = cosine(&vector, centroid);
            // Strictly-greater keeps the oldest cluster on ties.
            if best.is_none_or(|(_, s)| sim > s) {
                best = Some((idx, sim));
            }
        }

        match best {
            Some((idx, sim)) if sim >= params.similarity_threshold => {
                article.cluster = Some(idx);
                let (centroid, members) = &mut clusters[idx];
                members.push(article);
                // New mean over all member vectors.
                let n = members.len() as f32;
                for (c, x) in centroid.iter_mut().zip(&vector) {
                    *c += (x - *c) / n;
                }
            }
            _ => {
                let idx = clusters.len();
                article.cluster = Some(idx);
                clusters.push((vector, vec![article]));
            }
        }
    }

    let mut groups: Vec<Group> = clusters
        .into_iter()
        .map(|(_, members)| Group::from_articles(members))
        .collect();

    // Unembedded articles cluster alone.
    for mut article in stragglers {
        article.cluster = Some(groups.len());
        groups.push(Group::from_articles(vec![article]));
    }

    info!(clusters = groups.len(), "Threshold clustering complete");
    groups
}

/// DBSCAN-like clustering over embedding cosine distances (algorithm 2).
#[instrument(level = "info", skip_all, fields(articles = articles.len()))]
pub fn cluster_dbscan_embeddings(articles: Vec<Article>, params: &ClusterParams) -> Vec<Group> {
    let (mut live, stragglers): (Vec<Article>, Vec<Article>) =
        articles.into_iter().partition(Article::has_live_vector);

    let distances = embedding_distance_matrix(&live);
    let labels = sweep_eps(&distances, params.eps_step_embedding, params);
    let mut groups = groups_from_labels(&mut live, labels);

    for mut article in stragglers {
        article.cluster = Some(groups.len());
        groups.push(Group::from_articles(vec![article]));
    }
    groups
}

/// DBSCAN-like clustering over keyword Jaccard distances.
#[instrument(level = "info", skip_all, fields(articles = articles.len()))]
pub fn cluster_dbscan_keywords(mut articles: Vec<Article>, params: &ClusterParams) -> Vec<Group> {
    let distances = jaccard_distance_matrix(&articles);
    let labels = sweep_eps(&distances, params.eps_step_jaccard, params);
    groups_from_labels(&mut articles, labels)
}

/// Generate display labels for multi-article groups.
///
/// Groups of size ≥ 2 get a short LLM title built from their member
/// headlines; any failure keeps the first headline as the label.
pub async fn label_groups<L: Llm>(llm: &L, groups: &mut [Group]) {
    for group in groups.iter_mut() {
        if group.articles.len() < 2 {
            continue;
        }
        let titles: Vec<String> = group.articles.iter().map(|a| a.title.clone()).collect();
        if let Some(label) = generate_label(llm, &titles).await {
            group.label = label;
        }
    }
}

/// N×N cosine distance matrix `|1 − sim|` over article vectors.
fn embedding_distance_matrix(articles: &[Article]) -> Vec<Vec<f32>> {
    let n = articles.len();
    let mut distances = vec![vec![0.0; n]; n];
    for i in 0..n {
        let vi = articles[i].vector.as_deref().unwrap_or(&[]);
        for j in (i + 1)..n {
            let vj = articles[j].vector.as_deref().unwrap_or(&[]);
            let d = (1.0 - cosine(vi, vj)).abs();
            distances[i][j] = d;
            distances[j][i] = d;
        }
    }
    distances
}

/// N×N Jaccard distance matrix over article keyword sets. Two empty sets are
/// considered identical (distance 0).
fn jaccard_distance_matrix(articles: &[Article]) -> Vec<Vec<f32>> {
    let sets: Vec<HashSet<&str>> = articles
        .iter()
        .map(|a| a.keywords.iter().map(String::as_str).collect())
        .collect();

    let n = articles.len();
    let mut distances = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let union = sets[i].union(&sets[j]).count();
            let d = if union == 0 {
                0.0
            } else {
                let inter = sets[i].intersection(&sets[j]).count();
                1.0 - (inter as f32 / union as f32)
            };
            distances[i][j] = d;
            distances[j][i] = d;
        }
    }
    distances
}

/// Sweep the eps ladder and keep the labeling with the best silhouette.
///
/// Candidates are `step·k` for `k = 1..=eps_candidates`. Noise points are
/// relabelled with unique ids before scoring. A labeling only qualifies when
/// it has at least two clusters and is not all-singletons; if nothing scores
/// above zero, every point becomes its own cluster.
fn sweep_eps(distances: &[Vec<f32>], step: f32, params: &ClusterParams) -> Vec<usize> {
    let n = distances.len();
    if n < 2 {
        return (0..n).collect();
    }

    let mut best_score = 0.0f32;
    let mut best_labels: Option<Vec<usize>> = None;

    for k in 1..=params.eps_candidates {
        let eps = step * k as f32;
        let mut labels = dbscan(distances, eps, params.min_samples);

        // No global noise: each unclustered point becomes its own cluster.
        for (i, label) in labels.iter_mut().enumerate() {
            if *label == NOISE {
                *label = (n + i) as i64;
            }
        }

        let distinct: HashSet<i64> = labels.iter().copied().collect();
        if distinct.len() < 2 || distinct.len() > n - 1 {
            continue;
        }

        let score = silhouette_score(distances, &labels);
        debug!(k, eps, score, "Evaluated eps candidate");
        if score > best_score {
            best_score = score;
            best_labels = Some(labels.iter().map(|&l| l as usize).collect());
        }
    }

    match best_labels {
        Some(labels) => compact_labels(&labels),
        None => (0..n).collect(),
    }
}

const NOISE: i64 = -1;

/// Classic DBSCAN over a precomputed distance matrix. `min_samples` counts
/// the point itself. Deterministic: points and neighbors are visited in
/// index order.
fn dbscan(distances: &[Vec<f32>], eps: f32, min_samples: usize) -> Vec<i64> {
    let n = distances.len();
    let neighborhoods: Vec<Vec<usize>> = (0..n)
        .map(|i| (0..n).filter(|&j| distances[i][j] <= eps).collect())
        .collect();

    let mut labels = vec![NOISE; n];
    let mut visited = vec![false; n];
    let mut next_cluster: i64 = 0;

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        if neighborhoods[i].len() < min_samples {
            continue;
        }

        let cluster = next_cluster;
        next_cluster += 1;
        labels[i] = cluster;

        let mut frontier: Vec<usize> = neighborhoods[i].clone();
        let mut cursor = 0;
        while cursor < frontier.len() {
            let p = frontier[cursor];
            cursor += 1;

            if labels[p] == NOISE {
                labels[p] = cluster;
            }
            if visited[p] {
                continue;
            }
            visited[p] = true;
            labels[p] = cluster;
            if neighborhoods[p].len() >= min_samples {
                frontier.extend(neighborhoods[p].iter().copied());
            }
        }
    }

    labels
}

/// Mean silhouette coefficient over a precomputed distance matrix.
fn silhouette_score(distances: &[Vec<f32>], labels: &[i64]) -> f32 {
    let n = labels.len();
    let mut by_label: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        by_label.entry(label).or_default().push(i);
    }

    let mut total = 0.0f32;
    for i in 0..n {
        let own = &by_label[&labels[i]];
        if own.len() <= 1 {
            // Singleton clusters contribute zero by convention.
            continue;
        }
        let a = own
            .iter()
            .filter(|&&j| j != i)
            .map(|&j| distances[i][j])
            .sum::<f32>()
            / (own.len() - 1) as f32;

        let b = by_label
            .iter()
            .filter(|(label, _)| **label != labels[i])
            .map(|(_, members)| {
                members.iter().map(|&j| distances[i][j]).sum::<f32>() / members.len() as f32
            })
            .fold(f32::INFINITY, f32::min);

        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }
    total / n as f32
}

/// Renumber arbitrary labels to dense 0-based cluster indices, preserving
/// first-appearance order.
fn compact_labels(labels: &[usize]) -> Vec<usize> {
    let mut mapping: BTreeMap<usize, usize> = BTreeMap::new();
    let mut next = 0;
    labels
        .iter()
        .map(|&l| {
            *mapping.entry(l).or_insert_with(|| {
                let id = next;
                next += 1;
                id
            })
        })
        .collect()
}

/// Bucket labelled articles into groups ordered by first appearance.
fn groups_from_labels(articles: &mut Vec<Article>, labels: Vec<usize>) -> Vec<Group> {
    let mut buckets: BTreeMap<usize, Vec<Article>> = BTreeMap::new();
    for (mut article, label) in articles.drain(..).zip(labels) {
        article.cluster = Some(label);
        buckets.entry(label).or_default().push(article);
    }
    buckets.into_values().map(Group::from_articles).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::{FailingLlm, ScriptedLlm};
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn article(url: &str, vector: Vec<f32>, hours_ago: i64) -> Article {
        let mut a = Article::new(format!("Title {url}"), url);
        a.published_at = Some(now() - chrono::Duration::hours(hours_ago));
        a.vector = Some(vector);
        a
    }

    #[test]
    fn test_threshold_empty_input() {
        let groups = cluster_threshold(vec![], &ClusterParams::default(), now());
        assert!(groups.is_empty());
    }

    #[test]
    fn test_threshold_single_article_is_singleton() {
        let groups = cluster_threshold(
            vec![article("u1", vec![1.0, 0.0], 0)],
            &ClusterParams::default(),
            now(),
        );
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].articles.len(), 1);
    }

    #[test]
    fn test_threshold_groups_similar_articles() {
        // Two nearly-parallel vectors and one orthogonal.
        let a = article("u1", vec![1.0, 0.0], 0);
        let b = article("u2", vec![0.995, 0.0998], 1);
        let c = article("u3", vec![0.0, 1.0], 2);

        let groups = cluster_threshold(vec![a, b, c], &ClusterParams::default(), now());
        assert_eq!(groups.len(), 2);
        let sizes: Vec<usize> = groups.iter().map(|g| g.articles.len()).collect();
        assert!(sizes.contains(&2));
        assert!(sizes.contains(&1));
    }

    #[test]
    fn test_threshold_tie_break_prefers_older_cluster() {
        // a and b are orthogonal and found clusters 0 and 1; c at 45° is
        // exactly as similar to both centroids, so the tie must resolve to
        // the older cluster (index 0).
        let params = ClusterParams {
            similarity_threshold: 0.5,
            ..ClusterParams::default()
        };
        let a = article("u1", vec![1.0, 0.0], 0);
        let b = article("u2", vec![0.0, 1.0], 1);
        let c = article("u3", vec![0.7071, 0.7071], 2);

        let groups = cluster_threshold(vec![a, b, c], &params, now());
        assert_eq!(groups.len(), 2);
        let first = &groups[0];
        assert_eq!(first.articles.len(), 2);
        assert!(first.articles.iter().any(|x| x.url == "u3"));
    }

    #[test]
    fn test_threshold_zero_vector_excluded_from_similarity() {
        let a = article("u1", vec![1.0, 0.0], 0);
        let b = article("u2", vec![1.0, 0.0], 1);
        let dead = article("u3", vec![0.0, 0.0], 2);

        let groups = cluster_threshold(vec![a, b, dead], &ClusterParams::default(), now());
        assert_eq!(groups.len(), 2);
        let dead_group = groups
            .iter()
            .find(|g| g.articles.iter().any(|x| x.url == "u3"))
            .unwrap();
        assert_eq!(dead_group.articles.len(), 1);
    }

    #[test]
    fn test_threshold_assigns_cluster_ids() {
        let a = article("u1", vec![1.0, 0.0], 0);
        let b = article("u2", vec![1.0, 0.0], 1);
        let groups = cluster_threshold(vec![a, b], &ClusterParams::default(), now());
        for (idx, group) in groups.iter().enumerate() {
            for member in &group.articles {
                assert_eq!(member.cluster, Some(idx));
            }
        }
    }

    #[test]
    fn test_threshold_is_deterministic() {
        let make = || {
            vec![
                article("u1", vec![1.0, 0.0, 0.0], 0),
                article("u2", vec![0.9, 0.1, 0.0], 1),
                article("u3", vec![0.0, 1.0, 0.0], 2),
                article("u4", vec![0.1, 0.9, 0.0], 3),
            ]
        };
        let p = ClusterParams::default();
        let g1: Vec<Vec<String>> = cluster_threshold(make(), &p, now())
            .into_iter()
            .map(|g| g.articles.into_iter().map(|a| a.url).collect())
            .collect();
        let g2: Vec<Vec<String>> = cluster_threshold(make(), &p, now())
            .into_iter()
            .map(|g| g.articles.into_iter().map(|a| a.url).collect())
            .collect();
        assert_eq!(g1, g2);
    }

    #[test]
    fn test_dbscan_embeddings_separates_two_blobs() {
        let articles = vec![
            article("a1", vec![1.0, 0.0], 0),
            article("a2", vec![0.999, 0.04], 1),
            article("a3", vec![0.998, 0.06], 2),
            article("b1", vec![0.0, 1.0], 3),
            article("b2", vec![0.04, 0.999], 4),
            article("b3", vec![0.06, 0.998], 5),
        ];
        let groups = cluster_dbscan_embeddings(articles, &ClusterParams::default());
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.articles.len() == 3));
    }

    #[test]
    fn test_dbscan_all_scattered_yields_singletons() {
        // Pairwise-orthogonal vectors: distance 1.0 everywhere, far outside
        // the eps ladder (max 0.30), and no positive silhouette exists.
        let articles = vec![
            article("u1", vec![1.0, 0.0, 0.0], 0),
            article("u2", vec![0.0, 1.0, 0.0], 1),
            article("u3", vec![0.0, 0.0, 1.0], 2),
        ];
        let groups = cluster_dbscan_embeddings(articles, &ClusterParams::default());
        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(|g| g.articles.len() == 1));
    }

    #[test]
    fn test_dbscan_keywords_groups_matching_sets() {
        let with_keys = |url: &str, keys: &[&str]| {
            let mut a = Article::new(url, url);
            a.keywords = keys.iter().map(|s| s.to_string()).collect();
            a
        };
        let articles = vec![
            with_keys("u1", &["ai", "ml"]),
            with_keys("u2", &["ai", "ml"]),
            with_keys("u3", &["sports"]),
            with_keys("u4", &["weather", "storms"]),
        ];
        let groups = cluster_dbscan_keywords(articles, &ClusterParams::default());
        let sizes: Vec<usize> = groups.iter().map(|g| g.articles.len()).collect();
        assert!(sizes.contains(&2));
        assert_eq!(sizes.iter().sum::<usize>(), 4);
    }

    #[test]
    fn test_dbscan_core_point_definition() {
        // eps chain: a-b within eps, b-c within eps, a-c not. With
        // min_samples=2 all three join one cluster via density reachability.
        let d = vec![
            vec![0.0, 0.05, 0.12],
            vec![0.05, 0.0, 0.05],
            vec![0.12, 0.05, 0.0],
        ];
        let labels = dbscan(&d, 0.06, 2);
        assert_eq!(labels, vec![0, 0, 0]);
    }

    #[test]
    fn test_silhouette_prefers_tight_separation() {
        // Two tight pairs far apart score well.
        let d = vec![
            vec![0.0, 0.01, 0.9, 0.9],
            vec![0.01, 0.0, 0.9, 0.9],
            vec![0.9, 0.9, 0.0, 0.01],
            vec![0.9, 0.9, 0.01, 0.0],
        ];
        let good = silhouette_score(&d, &[0, 0, 1, 1]);
        let bad = silhouette_score(&d, &[0, 1, 0, 1]);
        assert!(good > 0.9);
        assert!(bad < good);
    }

    #[tokio::test]
    async fn test_label_groups_replaces_multi_article_labels() {
        let llm = ScriptedLlm::new(vec!["Storm coverage"]);
        let mut groups = vec![
            Group::from_articles(vec![
                article("u1", vec![1.0, 0.0], 0),
                article("u2", vec![1.0, 0.0], 1),
            ]),
            Group::from_articles(vec![article("u3", vec![0.0, 1.0], 2)]),
        ];
        label_groups(&llm, &mut groups).await;
        assert_eq!(groups[0].label, "Storm coverage");
        // Singletons keep their headline label and cost no LLM call.
        assert_eq!(groups[1].label, "Title u3");
        assert_eq!(*llm.generate_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_label_groups_keeps_headline_on_failure() {
        let llm = FailingLlm;
        let mut groups = vec![Group::from_articles(vec![
            article("u1", vec![1.0, 0.0], 0),
            article("u2", vec![1.0, 0.0], 1),
        ])];
        label_groups(&llm, &mut groups).await;
        assert_eq!(groups[0].label, "Title u1");
    }
}
