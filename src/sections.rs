//! Briefing section adapters: `News`, `TechNews`, and `Research`.
//!
//! Each adapter is a thin façade over the ingest pipeline: it selects a
//! source set (from the configuration document, with hard-coded defaults),
//! picks the clustering algorithm and ranking prompt for its domain. For
//! research it also applies the hybrid policy that runs the citation analyzer
//! over the arXiv subset and attaches its report to the corpus.

use crate::cache::ArticleCache;
use crate::citations::arxiv::extract_arxiv_id;
use crate::citations::{CitationAnalyzer, ReferenceSource};
use crate::config::{Preferences, SourceKind, SourceSpec};
use crate::llm::Llm;
use crate::models::{Article, ClusterStatus, Corpus, Group};
use crate::pipeline::{ClusterAlgorithm, IngestPipeline, PipelineConfig, DEFAULT_RANK_TEMPLATE};
use crate::{config, utils};
use chrono::NaiveDateTime;
use tracing::{info, instrument};

const TECH_RANK_TEMPLATE: &str = "\
Rank these technology story clusters by importance to a technical reader.
Focus on: engineering significance, novelty, and industry impact.

{items}

Respond with ONLY a JSON array of the top {top_k} indices (e.g., [3, 7, 12, 1, 18]).
No explanation, just the JSON array.";

const RESEARCH_RANK_TEMPLATE: &str = "\
You are ranking clusters of research papers by importance and impact.
Consider: novelty, potential impact, breadth of interest, and practical relevance.

{items}

Respond with ONLY a JSON array of the top {top_k} indices (e.g., [2, 0, 5, 1, 3]).
No explanation, just the JSON array.";

/// Run-level settings shared by every section: window widths plus the
/// clustering knobs that used to be hard-coded.
#[derive(Debug, Clone, Copy)]
pub struct SectionSettings {
    pub corpus_days: u32,
    pub today_days: u32,
    pub algorithm: ClusterAlgorithm,
    /// Minimum cosine similarity for the threshold-agglomerative algorithm.
    pub similarity_threshold: f32,
    /// Output dimension of the configured embedding model.
    pub embed_dimension: usize,
}

impl Default for SectionSettings {
    fn default() -> Self {
        Self {
            corpus_days: 3,
            today_days: 1,
            algorithm: ClusterAlgorithm::Threshold,
            similarity_threshold: 0.575,
            embed_dimension: 1536,
        }
    }
}

fn apply_settings(config: &mut PipelineConfig, prefs: &Preferences, settings: SectionSettings) {
    config.corpus_days = settings.corpus_days;
    config.today_days = settings.today_days;
    config.algorithm = settings.algorithm;
    config.cluster.similarity_threshold = settings.similarity_threshold;
    config.embed_dimension = settings.embed_dimension;
    config.min_article_age_hours = prefs.content_preferences.min_article_age_hours;
    config.max_singles = prefs.content_preferences.max_articles_per_section;
}

/// General-news section: RSS sources, threshold clustering, news prompt.
pub struct NewsSection {
    sources: Vec<SourceSpec>,
    config: PipelineConfig,
}

impl NewsSection {
    /// Select the news sources: the configured `rss` records that are not
    /// arXiv feeds, or the built-in defaults when nothing is configured.
    pub fn new(configured: &[SourceSpec], prefs: &Preferences, settings: SectionSettings) -> Self {
        let mut sources: Vec<SourceSpec> = configured
            .iter()
            .filter(|s| s.kind == SourceKind::Rss)
            .filter(|s| !is_arxiv(s))
            .cloned()
            .collect();
        if sources.is_empty() {
            sources = config::default_news_sources();
        }

        let mut config = PipelineConfig {
            rank_template: DEFAULT_RANK_TEMPLATE.to_string(),
            ..PipelineConfig::default()
        };
        apply_settings(&mut config, prefs, settings);
        Self { sources, config }
    }

    #[instrument(level = "info", skip_all)]
    pub async fn run<L: Llm>(
        &self,
        llm: &L,
        cache: &ArticleCache,
        now: NaiveDateTime,
    ) -> Corpus {
        info!(sources = self.sources.len(), "Running news section");
        IngestPipeline::new(llm, cache, self.config.clone())
            .build_corpus(&self.sources, now)
            .await
    }
}

/// Technology section: link digests (TLDR, HN daily) plus tech feeds.
pub struct TechSection {
    sources: Vec<SourceSpec>,
    config: PipelineConfig,
}

impl TechSection {
    /// Select the tech sources: configured `tldr`/`hn-daily` records plus
    /// `rss` records tagged "Technology", or the built-in defaults.
    pub fn new(configured: &[SourceSpec], prefs: &Preferences, settings: SectionSettings) -> Self {
        let mut sources: Vec<SourceSpec> = configured
            .iter()
            .filter(|s| {
                matches!(s.kind, SourceKind::Tldr | SourceKind::HnDaily)
                    || (s.kind == SourceKind::Rss
                        && s.keywords.iter().any(|k| k == "Technology")
                        && !is_arxiv(s))
            })
            .cloned()
            .collect();
        if sources.is_empty() {
            sources = config::default_tech_sources();
        }

        let mut config = PipelineConfig {
            rank_template: TECH_RANK_TEMPLATE.to_string(),
            ..PipelineConfig::default()
        };
        apply_settings(&mut config, prefs, settings);
        Self { sources, config }
    }

    #[instrument(level = "info", skip_all)]
    pub async fn run<L: Llm>(
        &self,
        llm: &L,
        cache: &ArticleCache,
        now: NaiveDateTime,
    ) -> Corpus {
        info!(sources = self.sources.len(), "Running tech section");
        IngestPipeline::new(llm, cache, self.config.clone())
            .build_corpus(&self.sources, now)
            .await
    }
}

/// Research section: arXiv feeds, research ranking prompt, optional hybrid
/// citation analysis.
pub struct ResearchSection {
    sources: Vec<SourceSpec>,
    config: PipelineConfig,
    categories: Vec<String>,
    category_filters: Vec<String>,
    hybrid: bool,
    max_papers: usize,
    min_citations: u32,
}

impl ResearchSection {
    /// Default arXiv categories analyzed for citations.
    pub const DEFAULT_CATEGORIES: [&'static str; 8] = [
        "cs.AI", "cs.LG", "cs.CL", "cs.CV", "cs.DC", "cs.SY", "cs.PF", "cs.AR",
    ];

    /// Select the research sources: configured arXiv `rss` records, or the
    /// built-in default feed.
    pub fn new(
        configured: &[SourceSpec],
        prefs: &Preferences,
        settings: SectionSettings,
        min_citations: u32,
    ) -> Self {
        let mut sources: Vec<SourceSpec> = configured
            .iter()
            .filter(|s| s.kind == SourceKind::Rss && is_arxiv(s))
            .cloned()
            .collect();
        if sources.is_empty() {
            sources = config::default_research_sources();
        }

        let max_papers = prefs.research_preferences.max_research_papers;
        let mut config = PipelineConfig {
            rank_template: RESEARCH_RANK_TEMPLATE.to_string(),
            ..PipelineConfig::default()
        };
        apply_settings(&mut config, prefs, settings);
        config.max_singles = Some(max_papers);

        Self {
            sources,
            config,
            categories: Self::DEFAULT_CATEGORIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            category_filters: prefs.research_preferences.research_categories.clone(),
            hybrid: prefs.content_preferences.hybrid_research_ranking,
            max_papers,
            min_citations,
        }
    }

    /// Run the section. When hybrid ranking is on, the citation analyzer
    /// runs over the arXiv subset of the fetched papers, and the fetched
    /// papers that made its top-N lead the section ahead of the ranked
    /// remainder.
    #[instrument(level = "info", skip_all)]
    pub async fn run<L: Llm, R: ReferenceSource>(
        &self,
        llm: &L,
        cache: &ArticleCache,
        analyzer: Option<&CitationAnalyzer<'_, R>>,
        now: NaiveDateTime,
    ) -> Corpus {
        info!(sources = self.sources.len(), hybrid = self.hybrid, "Running research section");
        let articles = IngestPipeline::new(llm, cache, self.config.clone())
            .ingest(&self.sources, now)
            .await;
        self.process(llm, cache, analyzer, articles, now).await
    }

    /// Everything after ingest: the category filter, the hybrid citation
    /// split, and the cluster/categorize/rank path for the remainder.
    async fn process<L: Llm, R: ReferenceSource>(
        &self,
        llm: &L,
        cache: &ArticleCache,
        analyzer: Option<&CitationAnalyzer<'_, R>>,
        mut articles: Vec<Article>,
        now: NaiveDateTime,
    ) -> Corpus {
        // Preference-driven category filter; an empty match keeps everything
        // rather than emptying the section.
        if !self.category_filters.is_empty() {
            let filtered: Vec<_> = articles
                .iter()
                .filter(|a| {
                    let text = format!("{} {}", a.title, a.summary).to_lowercase();
                    self.category_filters
                        .iter()
                        .any(|c| text.contains(&c.to_lowercase()))
                })
                .cloned()
                .collect();
            if !filtered.is_empty() {
                info!(
                    kept = filtered.len(),
                    total = articles.len(),
                    "Filtered papers by preferred categories"
                );
                articles = filtered;
            }
        }

        let pipeline = IngestPipeline::new(llm, cache, self.config.clone());

        let citations = match (self.hybrid, analyzer) {
            (true, Some(analyzer)) => {
                let arxiv_subset: Vec<Article> = articles
                    .iter()
                    .filter(|a| extract_arxiv_id(&a.url).is_some())
                    .cloned()
                    .collect();
                Some(
                    analyzer
                        .analyze_articles(
                            &arxiv_subset,
                            &self.categories,
                            self.config.corpus_days,
                            self.max_papers,
                            self.min_citations,
                            now,
                        )
                        .await,
                )
            }
            _ => None,
        };

        // Hybrid merge: fetched papers that made the citation top-N are
        // pulled out before clustering and lead the section in citation
        // rank order; only the remainder goes through the LLM ranking.
        let mut corpus = if let Some(report) = &citations {
            let mut cited: Vec<(usize, Article)> = Vec::new();
            let mut remainder: Vec<Article> = Vec::new();
            for article in articles {
                let rank = extract_arxiv_id(&article.url)
                    .and_then(|id| report.papers.iter().position(|p| p.arxiv_id == id));
                match rank {
                    Some(rank) => cited.push((rank, article)),
                    None => remainder.push(article),
                }
            }
            cited.sort_by_key(|(rank, _)| *rank);
            if !cited.is_empty() {
                info!(
                    cited = cited.len(),
                    remainder = remainder.len(),
                    "Citation top-N leads the research section"
                );
            }

            let mut corpus = pipeline.assemble(remainder, now).await;
            let mut singles: Vec<Group> = cited
                .into_iter()
                .map(|(_, article)| {
                    let mut group = Group::from_articles(vec![article]);
                    group.status = ClusterStatus::Single;
                    group
                })
                .collect();
            singles.extend(corpus.singles);
            singles.truncate(self.max_papers);
            corpus.singles = singles;
            corpus
        } else {
            pipeline.assemble(articles, now).await
        };

        corpus.citations = citations;
        corpus
    }
}

/// True when a source record points at an arXiv feed.
fn is_arxiv(spec: &SourceSpec) -> bool {
    spec.url
        .as_deref()
        .and_then(|u| utils::host_of(u))
        .is_some_and(|h| h.ends_with("arxiv.org"))
}
