//! OpenAI-compatible embedding and answer generation backends.
//!
//! This module is only available when the `openai` feature is enabled. Both
//! clients talk to any server exposing the OpenAI `/v1/embeddings` and
//! `/v1/chat/completions` endpoints (OpenAI itself, or a local model server)
//! through a configurable base URL.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generator::AnswerGenerator;

/// The default OpenAI API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// The default model for embeddings.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// The default dimensionality for `text-embedding-3-small`.
const DEFAULT_DIMENSIONS: usize = 1536;

/// The default model for answer generation.
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

fn api_key_from_env(provider: &str) -> Result<String> {
    std::env::var("OPENAI_API_KEY").map_err(|_| {
        RagError::ConfigError(format!("{provider}: OPENAI_API_KEY environment variable not set"))
    })
}

/// Connection to one OpenAI-compatible server, shared by both backends.
///
/// Failures come back as plain messages so each backend can wrap them in its
/// own [`RagError`] variant.
#[derive(Debug, Clone)]
struct Endpoint {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl Endpoint {
    /// `None` when the key is empty.
    fn new(api_key: String) -> Option<Self> {
        (!api_key.is_empty()).then(|| Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    fn set_base_url(&mut self, url: impl Into<String>) {
        self.base_url = url.into().trim_end_matches('/').to_string();
    }

    /// POST `body` as JSON to `{base_url}/{path}` and decode the reply.
    async fn post<B, R>(&self, path: &str, body: &B) -> std::result::Result<R, String>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        let url = format!("{}/{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request to {url} failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(format!("API returned {status}: {detail}"));
        }

        response.json().await.map_err(|e| format!("failed to parse response: {e}"))
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// An [`EmbeddingProvider`] backed by an OpenAI-compatible `/embeddings` API.
///
/// Defaults to `text-embedding-3-small` (1536 dimensions) on
/// `https://api.openai.com/v1`. [`with_dimensions`](Self::with_dimensions)
/// asks the server to shorten its vectors.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new("sk-...")?
///     .with_base_url("http://localhost:1234/v1")
///     .with_model("nomic-embed-text");
/// let embedding = provider.embed("What is kajmak?").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    endpoint: Endpoint,
    model: String,
    dimensions: usize,
    shorten_to: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let endpoint = Endpoint::new(api_key.into())
            .ok_or_else(|| Self::failure("API key must not be empty".to_string()))?;
        Ok(Self {
            endpoint,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: DEFAULT_DIMENSIONS,
            shorten_to: None,
        })
    }

    /// Create a provider using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env("OpenAI embeddings")?)
    }

    /// Set the API base URL (e.g. `http://localhost:1234/v1`).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint.set_base_url(url);
        self
    }

    /// Set the embedding model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Request vectors of `dims` components; also what
    /// [`dimensions()`](EmbeddingProvider::dimensions) reports.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.shorten_to = Some(dims);
        self
    }

    fn failure(message: String) -> RagError {
        RagError::EmbeddingError { provider: "OpenAI".to_string(), message }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .pop()
            .ok_or_else(|| Self::failure("API returned no embedding".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(provider = "OpenAI", model = %self.model, batch_size = texts.len(), "embedding");

        let request =
            EmbeddingRequest { model: &self.model, input: texts, dimensions: self.shorten_to };
        let response: EmbeddingResponse =
            self.endpoint.post("embeddings", &request).await.map_err(|message| {
                error!(provider = "OpenAI", error = %message, "embedding request failed");
                Self::failure(message)
            })?;

        if response.data.len() != texts.len() {
            return Err(Self::failure(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                response.data.len()
            )));
        }
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// An [`AnswerGenerator`] backed by an OpenAI-compatible chat completions API.
///
/// The prompt is sent as a single user message with temperature 0;
/// `max_length` maps to `max_tokens`.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::openai::OpenAIAnswerGenerator;
///
/// let generator = OpenAIAnswerGenerator::from_env()?
///     .with_base_url("http://localhost:1234/v1")
///     .with_model("qwen2.5-1.5b-instruct");
/// let answer = generator.generate(&prompt, 150).await?;
/// ```
pub struct OpenAIAnswerGenerator {
    endpoint: Endpoint,
    model: String,
}

impl OpenAIAnswerGenerator {
    /// Create a generator with the given API key.
    ///
    /// Local servers usually accept any non-empty key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let endpoint = Endpoint::new(api_key.into())
            .ok_or_else(|| Self::failure("API key must not be empty".to_string()))?;
        Ok(Self { endpoint, model: DEFAULT_CHAT_MODEL.to_string() })
    }

    /// Create a generator using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env("OpenAI chat")?)
    }

    /// Set the API base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint.set_base_url(url);
        self
    }

    /// Set the chat model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn failure(message: String) -> RagError {
        RagError::GeneratorError { generator: "OpenAI".to_string(), message }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: usize,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl AnswerGenerator for OpenAIAnswerGenerator {
    async fn generate(&self, prompt: &str, max_length: usize) -> Result<String> {
        debug!(
            generator = "OpenAI",
            model = %self.model,
            prompt_len = prompt.len(),
            max_length,
            "generating answer"
        );

        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "user", content: prompt }],
            max_tokens: max_length,
            temperature: 0.0,
        };
        let response: ChatResponse =
            self.endpoint.post("chat/completions", &request).await.map_err(|message| {
                error!(generator = "OpenAI", error = %message, "chat request failed");
                Self::failure(message)
            })?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Self::failure("API returned no answer".to_string()))
    }
}
