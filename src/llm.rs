//! LLM capability interface with exponential backoff retry logic.
//!
//! The engine depends on exactly two LLM operations, injected once per run:
//! text generation (for ranking and cluster labeling) and batch embedding
//! (for similarity clustering). Both live on the [`Llm`] trait so tests can
//! substitute deterministic stubs.
//!
//! # Architecture
//!
//! - [`Llm`]: Core trait defining async generation and embedding
//! - [`OpenAiClient`]: reqwest-backed client for any OpenAI-compatible API
//! - [`RetryLlm`]: Decorator that adds retry logic to any `Llm` implementation
//!
//! # Retry Strategy
//!
//! - Maximum 5 retry attempts by default
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use rand::{rng, Rng};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

/// Failures from the LLM backend.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LLM returned status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("LLM response missing expected field: {0}")]
    Malformed(String),
    #[error("no embedding backend configured")]
    EmbeddingsUnavailable,
}

/// Async LLM interaction: generation plus batch embedding.
///
/// Implementors send prompts to a language model and texts to an embedding
/// model. Decorators (like [`RetryLlm`]) and test stubs implement the same
/// trait.
pub trait Llm {
    /// Send a prompt and return the model's text response.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    /// Embed a batch of texts, one vector per input, input order preserved.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;

    /// Whether an embedding backend is configured at all.
    fn has_embeddings(&self) -> bool;
}

/// Client for an OpenAI-compatible chat/embeddings API.
///
/// Configuration comes from the environment:
/// - `BRIEFING_LLM_BASE_URL`, e.g. `https://api.openai.com/v1`
/// - `BRIEFING_LLM_API_KEY`
/// - `BRIEFING_LLM_MODEL`: chat model name
/// - `BRIEFING_EMBED_MODEL`: embedding model name (optional; embedding
///   calls fail with [`LlmError::EmbeddingsUnavailable`] when unset)
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    embed_model: Option<String>,
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("embed_model", &self.embed_model)
            .finish()
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiClient {
    /// Build a client with explicit settings and a per-request timeout.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        embed_model: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            embed_model,
        })
    }

    /// Build a client from `BRIEFING_LLM_*` environment variables. Returns
    /// `None` when no endpoint is configured.
    pub fn from_env(timeout: Duration) -> Option<Self> {
        let base_url = std::env::var("BRIEFING_LLM_BASE_URL").ok()?;
        let api_key = std::env::var("BRIEFING_LLM_API_KEY").unwrap_or_default();
        let model =
            std::env::var("BRIEFING_LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let embed_model = std::env::var("BRIEFING_EMBED_MODEL").ok();
        Self::new(base_url, api_key, model, embed_model, timeout).ok()
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<String, LlmError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                body: crate::utils::truncate_for_log(&text, 300),
            });
        }
        Ok(text)
    }
}

impl Llm for OpenAiClient {
    #[instrument(level = "debug", skip_all)]
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
        });
        let text = self.post("/chat/completions", body).await?;
        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::Malformed(format!("chat response: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .ok_or_else(|| LlmError::Malformed("empty choices".to_string()))
    }

    #[instrument(level = "debug", skip_all, fields(batch = texts.len()))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let model = self
            .embed_model
            .as_deref()
            .ok_or(LlmError::EmbeddingsUnavailable)?;
        let body = json!({ "model": model, "input": texts });
        let text = self.post("/embeddings", body).await?;
        let parsed: EmbeddingResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::Malformed(format!("embedding response: {e}")))?;

        // The API is free to reorder; restore input order by index.
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        if data.len() != texts.len() {
            return Err(LlmError::Malformed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                data.len()
            )));
        }
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn has_embeddings(&self) -> bool {
        self.embed_model.is_some()
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`Llm`]
/// implementation.
///
/// The delay between retries follows:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryLlm<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T: Llm> RetryLlm<T> {
    /// Wrap an LLM client with retry behavior.
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    async fn with_retries<F, Fut, R>(&self, mut call: F) -> Result<R, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, LlmError>>,
    {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match call().await {
                Ok(resp) => return Ok(resp),
                // Missing configuration never heals by retrying.
                Err(e @ LlmError::EmbeddingsUnavailable) => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        warn!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %e,
                            "LLM call exhausted retries"
                        );
                        return Err(e);
                    }

                    // backoff calc
                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + Duration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        "LLM call failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

impl<T> fmt::Debug for RetryLlm<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryLlm")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T: Llm> Llm for RetryLlm<T> {
    #[instrument(level = "info", skip_all)]
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let t0 = Instant::now();
        let res = self.with_retries(|| self.inner.generate(prompt)).await;
        if res.is_ok() {
            info!(elapsed_ms = t0.elapsed().as_millis() as u64, "generate succeeded");
        }
        res
    }

    #[instrument(level = "info", skip_all, fields(batch = texts.len()))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.with_retries(|| self.inner.embed(texts)).await
    }

    fn has_embeddings(&self) -> bool {
        self.inner.has_embeddings()
    }
}

/// Stand-in backend for runs without an LLM endpoint configured.
///
/// Every call fails, which drives the documented degraded paths: the ranker
/// returns first-k, cluster labels stay on headlines, and the pipeline falls
/// back to keyword clustering.
#[derive(Debug, Default)]
pub struct OfflineLlm;

impl Llm for OfflineLlm {
    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Malformed("no LLM backend configured".to_string()))
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Err(LlmError::EmbeddingsUnavailable)
    }

    fn has_embeddings(&self) -> bool {
        false
    }
}

/// The backend a briefing run is wired to: a retrying remote client when the
/// environment provides one, the offline stand-in otherwise.
#[derive(Debug)]
pub enum Backend {
    Remote(RetryLlm<OpenAiClient>),
    Offline(OfflineLlm),
}

impl Backend {
    /// Wire up from `BRIEFING_LLM_*` environment variables.
    pub fn from_env(timeout: Duration) -> Self {
        match OpenAiClient::from_env(timeout) {
            Some(client) => {
                Self::Remote(RetryLlm::new(client, 5, Duration::from_secs(1)))
            }
            None => {
                warn!("BRIEFING_LLM_BASE_URL not set; running without an LLM backend");
                Self::Offline(OfflineLlm)
            }
        }
    }
}

impl Llm for Backend {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        match self {
            Self::Remote(llm) => llm.generate(prompt).await,
            Self::Offline(llm) => llm.generate(prompt).await,
        }
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        match self {
            Self::Remote(llm) => llm.embed(texts).await,
            Self::Offline(llm) => llm.embed(texts).await,
        }
    }

    fn has_embeddings(&self) -> bool {
        match self {
            Self::Remote(llm) => llm.has_embeddings(),
            Self::Offline(llm) => llm.has_embeddings(),
        }
    }
}
