//! PDF text extraction using the `pdf-extract` crate.
//!
//! This module is only available when the `pdf` feature is enabled. Layout
//! analysis and OCR are out of scope; image-only PDFs convert to (almost) no
//! text and are rejected by the ingestion length check.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::convert::{Converter, DocumentFormat, unreadable};
use crate::error::ConversionError;

/// A [`Converter`] for `.pdf` files.
///
/// Extraction is CPU-bound and runs on the blocking thread pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfConverter;

#[async_trait]
impl Converter for PdfConverter {
    async fn convert(&self, path: &Path, format: DocumentFormat) -> Result<String, ConversionError> {
        if format != DocumentFormat::Pdf {
            return Err(ConversionError::Unsupported(format.extension().to_string()));
        }

        let bytes = tokio::fs::read(path).await.map_err(|e| unreadable(path, e))?;
        debug!(path = %path.display(), size = bytes.len(), "extracting pdf text");

        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| unreadable(path, format!("extraction task failed: {e}")))?
            .map_err(|e| {
                error!(path = %path.display(), error = %e, "pdf extraction failed");
                unreadable(path, format!("PDF extraction error: {e}"))
            })?;

        Ok(text)
    }
}
