//! `docqa`: ask questions about your own documents from the terminal.
//!
//! Documents are ingested into a persistent local index; questions are
//! answered by an OpenAI-compatible chat model using only the retrieved text.

mod chat;
mod settings;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use docqa_rag::openai::{OpenAIAnswerGenerator, OpenAIEmbeddingProvider};
use docqa_rag::{
    Answer, EmbeddingProvider, HashingEmbeddingProvider, InMemoryVectorIndex, KnowledgeBase,
    MarkdownExporter, Reconcile, Session, UploadedFile,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::settings::{EmbeddingBackend, FileSettings, Overrides, Settings};

#[derive(Parser)]
#[command(name = "docqa")]
#[command(about = "Ask questions about your documents", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path of the persistent index snapshot
    #[arg(long, global = true)]
    index: Option<PathBuf>,

    /// Base URL of the OpenAI-compatible server
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Chat model used to answer questions
    #[arg(long, global = true)]
    model: Option<String>,

    /// Embedding backend
    #[arg(long, global = true, value_enum)]
    embeddings: Option<EmbeddingBackend>,

    /// Embedding model (openai backend only)
    #[arg(long, global = true)]
    embedding_model: Option<String>,

    /// Number of documents used as context
    #[arg(long, global = true)]
    top_k: Option<usize>,

    /// Maximum distance for a document to count as relevant
    #[arg(long, global = true)]
    threshold: Option<f32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add documents (pdf, doc, docx, txt) to the index
    Ingest {
        /// Files to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Answer a single question
    Ask {
        /// The question
        question: String,
    },
    /// Interactive question loop
    Chat,
    /// List indexed documents
    Docs,
    /// Remove a document from the index
    Delete {
        /// Document id (the uploaded filename)
        id: String,
    },
    /// Convert documents to markdown files without indexing them
    Convert {
        /// Files to convert
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Destination folder for the `.md` files
        #[arg(short, long, default_value = "output_markdown")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let file = match &cli.config {
        Some(path) => FileSettings::load(path)?,
        None => FileSettings::default(),
    };
    let settings = Settings::resolve(
        file,
        Overrides {
            index_path: cli.index,
            base_url: cli.base_url,
            model: cli.model,
            embeddings: cli.embeddings,
            embedding_model: cli.embedding_model,
            top_k: cli.top_k,
            threshold: cli.threshold,
        },
    )?;

    match cli.command {
        Commands::Ingest { files } => ingest(&settings, &files).await,
        Commands::Ask { question } => {
            let session = open_session(&settings).await?;
            let answer = session.ask(&question).await?;
            print_answer(&answer);
            Ok(())
        }
        Commands::Chat => chat::run(open_session(&settings).await?).await,
        Commands::Docs => {
            let kb = open_knowledge_base(&settings).await?;
            chat::print_documents(&kb.documents().await);
            Ok(())
        }
        Commands::Delete { id } => {
            let kb = open_knowledge_base(&settings).await?;
            if kb.delete(&id).await? {
                println!("Deleted {id}");
            } else {
                println!("No document named {id}");
            }
            Ok(())
        }
        Commands::Convert { files, out } => convert(&files, &out).await,
    }
}

async fn convert(paths: &[PathBuf], out_dir: &Path) -> Result<()> {
    let report = MarkdownExporter::default()
        .export_all(paths, out_dir)
        .await
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    for failure in &report.failures {
        eprintln!("Failed: {failure}");
    }
    if report.written.is_empty() {
        bail!("no documents were converted");
    }
    println!("Saved {} markdown file(s) to {}", report.written.len(), out_dir.display());
    Ok(())
}

async fn ingest(settings: &Settings, paths: &[PathBuf]) -> Result<()> {
    let kb = open_knowledge_base(settings).await?;

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        match tokio::fs::read(path).await {
            Ok(bytes) => files.push(UploadedFile::new(display_name(path), bytes)),
            Err(e) => eprintln!("{}: {e}", path.display()),
        }
    }

    let report = kb.ingest_batch(&files).await;
    for message in report.failure_messages() {
        eprintln!("{message}");
    }
    if !report.ingested.is_empty() {
        println!(
            "Processed {} document(s), {} words in total",
            report.ingested.len(),
            report.total_words()
        );
    }
    if report.ingested.is_empty() && !files.is_empty() {
        bail!("no documents were ingested");
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text);
    if !answer.source_ids.is_empty() {
        println!("\nSources: {}", answer.source_ids.join(", "));
    }
}

fn embedding_provider(settings: &Settings) -> Result<Arc<dyn EmbeddingProvider>> {
    match settings.embeddings {
        EmbeddingBackend::Hashing => Ok(Arc::new(HashingEmbeddingProvider::default())),
        EmbeddingBackend::Openai => {
            let mut provider = OpenAIEmbeddingProvider::new(api_key(settings)?)?;
            if let Some(url) = &settings.base_url {
                provider = provider.with_base_url(url);
            }
            if let Some(model) = &settings.embedding_model {
                provider = provider.with_model(model);
            }
            Ok(Arc::new(provider))
        }
    }
}

/// Local servers usually ignore the key, so any placeholder works once a
/// custom base URL is set.
fn api_key(settings: &Settings) -> Result<String> {
    match (&settings.api_key, &settings.base_url) {
        (Some(key), _) => Ok(key.clone()),
        (None, Some(_)) => Ok("docqa".to_string()),
        (None, None) => {
            bail!("set OPENAI_API_KEY or DOCQA_API_KEY, or point --base-url at a local server")
        }
    }
}

async fn open_index(settings: &Settings) -> Result<Arc<InMemoryVectorIndex>> {
    let index = InMemoryVectorIndex::persistent(&settings.index_path)
        .await
        .with_context(|| format!("failed to open index {}", settings.index_path.display()))?;
    Ok(Arc::new(index))
}

/// Open the knowledge base and adopt whatever a previous run left in the index.
async fn open_knowledge_base(settings: &Settings) -> Result<KnowledgeBase> {
    let kb = KnowledgeBase::builder()
        .config(settings.rag.clone())
        .embedding_provider(embedding_provider(settings)?)
        .vector_index(open_index(settings).await?)
        .build()
        .await?;
    let adopted = kb.reconcile(Reconcile::Adopt).await?;
    info!(count = adopted.len(), "loaded documents from index");
    Ok(kb)
}

async fn open_session(settings: &Settings) -> Result<Session> {
    let mut generator = OpenAIAnswerGenerator::new(api_key(settings)?)?;
    if let Some(url) = &settings.base_url {
        generator = generator.with_base_url(url);
    }
    if let Some(model) = &settings.model {
        generator = generator.with_model(model);
    }

    let session = Session::builder()
        .config(settings.rag.clone())
        .embedding_provider(embedding_provider(settings)?)
        .vector_index(open_index(settings).await?)
        .generator(Arc::new(generator))
        .build()
        .await?;
    let adopted = session.reconcile(Reconcile::Adopt).await?;
    if adopted.is_empty() {
        warn!(index = %settings.index_path.display(), "index is empty; run `docqa ingest` first");
    }
    Ok(session)
}
