//! Document-to-text conversion.
//!
//! Uploads are tagged with a [`DocumentFormat`] once, at ingestion entry, and
//! dispatched through a [`ConverterRegistry`] that maps each format to a
//! [`Converter`]. Built-in converters:
//!
//! - [`PlainTextConverter`] for `.txt` (UTF-8, falling back to Latin-1)
//! - [`CommandConverter`] for formats handled by an external program (`.doc`
//!   via `antiword` by default)
//! - `PdfConverter` for `.pdf` (feature `pdf`)
//! - `DocxConverter` for `.docx` (feature `docx`)

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::ConversionError;

/// The upload formats accepted for ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Portable Document Format.
    Pdf,
    /// Legacy Word binary document.
    Doc,
    /// Office Open XML Word document.
    Docx,
    /// Plain text.
    Txt,
}

impl DocumentFormat {
    /// Every accepted format.
    pub const ALL: [DocumentFormat; 4] = [Self::Pdf, Self::Doc, Self::Docx, Self::Txt];

    /// Resolve a bare extension (without the dot), case-insensitively.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "doc" => Some(Self::Doc),
            "docx" => Some(Self::Docx),
            "txt" => Some(Self::Txt),
            _ => None,
        }
    }

    /// The canonical lowercase extension.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Doc => "doc",
            Self::Docx => "docx",
            Self::Txt => "txt",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Lowercase extension of `filename` without the dot, or an empty string.
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// A backend that turns a file on disk into markdown or plain text.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Convert the file at `path`, which holds a document of `format`.
    ///
    /// # Errors
    ///
    /// [`ConversionError::Unsupported`] if this converter does not handle
    /// `format`, [`ConversionError::Unreadable`] if the file is corrupt or
    /// cannot be read.
    async fn convert(&self, path: &Path, format: DocumentFormat) -> Result<String, ConversionError>;
}

/// Maps each [`DocumentFormat`] to the converter responsible for it.
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    converters: HashMap<DocumentFormat, Arc<dyn Converter>>,
}

impl ConverterRegistry {
    /// A registry with no converters.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry with the built-in converters enabled by crate features.
    pub fn with_defaults() -> Self {
        let registry = Self::empty()
            .register(DocumentFormat::Txt, Arc::new(PlainTextConverter))
            .register(DocumentFormat::Doc, Arc::new(CommandConverter::antiword()));
        #[cfg(feature = "pdf")]
        let registry = registry.register(DocumentFormat::Pdf, Arc::new(crate::pdf::PdfConverter));
        #[cfg(feature = "docx")]
        let registry =
            registry.register(DocumentFormat::Docx, Arc::new(crate::docx::DocxConverter));
        registry
    }

    /// Route `format` to `converter`, replacing any previous entry.
    pub fn register(mut self, format: DocumentFormat, converter: Arc<dyn Converter>) -> Self {
        self.converters.insert(format, converter);
        self
    }

    /// Whether a converter is registered for `format`.
    pub fn supports(&self, format: DocumentFormat) -> bool {
        self.converters.contains_key(&format)
    }

    /// Convert `path` with the converter registered for `format`.
    ///
    /// # Errors
    ///
    /// [`ConversionError::Unsupported`] when nothing is registered for
    /// `format`; otherwise whatever the converter returns.
    pub async fn convert(
        &self,
        path: &Path,
        format: DocumentFormat,
    ) -> Result<String, ConversionError> {
        let converter = self
            .converters
            .get(&format)
            .ok_or_else(|| ConversionError::Unsupported(format.extension().to_string()))?;
        debug!(path = %path.display(), %format, "converting document");
        converter.convert(path, format).await
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut formats: Vec<_> = self.converters.keys().map(|k| k.extension()).collect();
        formats.sort_unstable();
        f.debug_struct("ConverterRegistry").field("formats", &formats).finish()
    }
}

pub(crate) fn unreadable(path: &Path, message: impl fmt::Display) -> ConversionError {
    ConversionError::Unreadable { path: path.display().to_string(), message: message.to_string() }
}

/// Reads `.txt` files as UTF-8, decoding them as Latin-1 when they are not
/// valid UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextConverter;

#[async_trait]
impl Converter for PlainTextConverter {
    async fn convert(&self, path: &Path, format: DocumentFormat) -> Result<String, ConversionError> {
        if format != DocumentFormat::Txt {
            return Err(ConversionError::Unsupported(format.extension().to_string()));
        }
        let bytes = tokio::fs::read(path).await.map_err(|e| unreadable(path, e))?;
        Ok(decode_text(bytes))
    }
}

fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        // Latin-1 maps every byte to the code point of the same value.
        Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
    }
}

/// Runs an external program that prints the document text on stdout.
///
/// The staged file path is appended as the last argument.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: String,
    args: Vec<String>,
    format: DocumentFormat,
}

impl CommandConverter {
    /// Convert `format` documents with `program args... <path>`.
    pub fn new(program: impl Into<String>, args: Vec<String>, format: DocumentFormat) -> Self {
        Self { program: program.into(), args, format }
    }

    /// `antiword -w 0 <path>` for legacy `.doc` files.
    pub fn antiword() -> Self {
        Self::new("antiword", vec!["-w".to_string(), "0".to_string()], DocumentFormat::Doc)
    }
}

#[async_trait]
impl Converter for CommandConverter {
    async fn convert(&self, path: &Path, format: DocumentFormat) -> Result<String, ConversionError> {
        if format != self.format {
            return Err(ConversionError::Unsupported(format.extension().to_string()));
        }

        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .output()
            .await
            .map_err(|e| {
                error!(program = %self.program, error = %e, "failed to run converter");
                unreadable(path, format!("failed to run {}: {e}", self.program))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(program = %self.program, status = %output.status, "converter failed");
            return Err(unreadable(path, format!("{} failed: {}", self.program, stderr.trim())));
        }

        Ok(decode_text(output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_resolve_case_insensitively() {
        assert_eq!(DocumentFormat::from_extension("PDF"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_extension("Docx"), Some(DocumentFormat::Docx));
        assert_eq!(DocumentFormat::from_extension("csv"), None);
        assert_eq!(DocumentFormat::from_extension(""), None);
    }

    #[test]
    fn extension_of_handles_paths_without_extension() {
        assert_eq!(extension_of("notes.TXT"), "txt");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("README"), "");
    }

    #[test]
    fn latin1_fallback_keeps_every_byte() {
        assert_eq!(decode_text(b"caf\xe9".to_vec()), "café");
        assert_eq!(decode_text("ćevapi".as_bytes().to_vec()), "ćevapi");
    }

    #[tokio::test]
    async fn plain_text_converter_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "hello there").unwrap();
        let text = PlainTextConverter.convert(&path, DocumentFormat::Txt).await.unwrap();
        assert_eq!(text, "hello there");
    }

    #[tokio::test]
    async fn plain_text_converter_reports_missing_file_as_unreadable() {
        let err = PlainTextConverter
            .convert(Path::new("/definitely/not/here.txt"), DocumentFormat::Txt)
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::Unreadable { .. }));
    }

    #[tokio::test]
    async fn empty_registry_reports_unsupported() {
        let err = ConverterRegistry::empty()
            .convert(Path::new("x.pdf"), DocumentFormat::Pdf)
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::Unsupported(ext) if ext == "pdf"));
    }

    #[test]
    fn defaults_cover_text_and_doc() {
        let registry = ConverterRegistry::with_defaults();
        assert!(registry.supports(DocumentFormat::Txt));
        assert!(registry.supports(DocumentFormat::Doc));
    }
}
