//! Settings resolution: config file, then environment, then flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use docqa_rag::RagConfig;
use serde::{Deserialize, Serialize};

/// Where the persistent index lives unless configured otherwise.
pub const DEFAULT_INDEX_PATH: &str = ".docqa/index.json";

/// How documents and questions are embedded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Offline feature hashing; no server needed.
    #[default]
    Hashing,
    /// An OpenAI-compatible `/embeddings` endpoint.
    Openai,
}

/// Contents of the `--config` JSON file. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    /// Retrieval settings, given as top-level keys (`top_k`, `collection`, ...).
    #[serde(flatten)]
    pub rag: RagConfig,
    /// Path of the index snapshot.
    pub index_path: Option<PathBuf>,
    /// Base URL of the OpenAI-compatible server.
    pub base_url: Option<String>,
    /// Chat model used for answers.
    pub model: Option<String>,
    /// API key; `DOCQA_API_KEY` takes precedence.
    pub api_key: Option<String>,
    /// Embedding backend.
    pub embeddings: Option<EmbeddingBackend>,
    /// Embedding model for the `openai` backend.
    pub embedding_model: Option<String>,
}

impl FileSettings {
    /// Read settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))
    }
}

/// Flag values that override the file and the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `--index`
    pub index_path: Option<PathBuf>,
    /// `--base-url`
    pub base_url: Option<String>,
    /// `--model`
    pub model: Option<String>,
    /// `--embeddings`
    pub embeddings: Option<EmbeddingBackend>,
    /// `--embedding-model`
    pub embedding_model: Option<String>,
    /// `--top-k`
    pub top_k: Option<usize>,
    /// `--threshold`
    pub threshold: Option<f32>,
}

/// Fully resolved settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Validated retrieval settings.
    pub rag: RagConfig,
    /// Path of the index snapshot; [`DEFAULT_INDEX_PATH`] unless configured.
    pub index_path: PathBuf,
    /// Base URL of the OpenAI-compatible server, if not the public API.
    pub base_url: Option<String>,
    /// Chat model, if not the generator's default.
    pub model: Option<String>,
    /// API key from `DOCQA_API_KEY`, the file or `OPENAI_API_KEY`.
    pub api_key: Option<String>,
    /// Embedding backend.
    pub embeddings: EmbeddingBackend,
    /// Embedding model, if not the provider's default.
    pub embedding_model: Option<String>,
}

impl Settings {
    /// Merge the layers, later ones winning: file, `DOCQA_*` variables, flags.
    ///
    /// The API key falls back to `OPENAI_API_KEY`.
    pub fn resolve(file: FileSettings, overrides: Overrides) -> Result<Self> {
        let env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let mut rag = file.rag;
        if let Some(k) = overrides.top_k {
            rag.top_k = k;
        }
        if let Some(t) = overrides.threshold {
            rag.relevance_threshold = t;
        }
        rag.validate().context("invalid configuration")?;

        Ok(Self {
            rag,
            index_path: overrides
                .index_path
                .or_else(|| env("DOCQA_INDEX").map(PathBuf::from))
                .or(file.index_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_INDEX_PATH)),
            base_url: overrides.base_url.or_else(|| env("DOCQA_BASE_URL")).or(file.base_url),
            model: overrides.model.or_else(|| env("DOCQA_MODEL")).or(file.model),
            api_key: env("DOCQA_API_KEY").or(file.api_key).or_else(|| env("OPENAI_API_KEY")),
            embeddings: overrides.embeddings.or(file.embeddings).unwrap_or_default(),
            embedding_model: overrides.embedding_model.or(file.embedding_model),
        })
    }
}
