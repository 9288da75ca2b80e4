//! Batch conversion of documents to markdown files.
//!
//! [`MarkdownExporter`] runs each input through the [`ConverterRegistry`] and
//! writes `<stem>.md` into an output directory. A file that cannot be
//! converted is reported and skipped; the rest of the batch carries on.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::convert::{ConverterRegistry, DocumentFormat, extension_of};
use crate::error::{ExportError, Result};

/// Outcome of [`MarkdownExporter::export_all`].
#[derive(Debug, Default)]
pub struct ExportReport {
    /// Markdown files written, in input order.
    pub written: Vec<PathBuf>,
    /// Per-file failures, in input order.
    pub failures: Vec<ExportError>,
}

impl ExportReport {
    /// True when every input was converted.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Converts documents on disk into markdown files.
#[derive(Debug, Clone)]
pub struct MarkdownExporter {
    converters: ConverterRegistry,
}

impl Default for MarkdownExporter {
    fn default() -> Self {
        Self::new(ConverterRegistry::with_defaults())
    }
}

impl MarkdownExporter {
    /// Export with the given converter table.
    pub fn new(converters: ConverterRegistry) -> Self {
        Self { converters }
    }

    /// Convert every file in `paths` into `out_dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Only fails when `out_dir` cannot be created; per-file problems are
    /// collected in the report.
    pub async fn export_all(&self, paths: &[PathBuf], out_dir: &Path) -> Result<ExportReport> {
        tokio::fs::create_dir_all(out_dir).await?;

        let mut report = ExportReport::default();
        for path in paths {
            match self.export(path, out_dir).await {
                Ok(written) => report.written.push(written),
                Err(e) => {
                    error!(path = %path.display(), error = %e, "export failed");
                    report.failures.push(e);
                }
            }
        }
        info!(
            written = report.written.len(),
            failed = report.failures.len(),
            out_dir = %out_dir.display(),
            "markdown export finished"
        );
        Ok(report)
    }

    /// Convert one file and write `<stem>.md` into `out_dir`.
    ///
    /// # Errors
    ///
    /// [`ExportError`] naming the file when its extension is not accepted,
    /// the converter fails or the output cannot be written.
    pub async fn export(
        &self,
        path: &Path,
        out_dir: &Path,
    ) -> std::result::Result<PathBuf, ExportError> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let extension = extension_of(&filename);
        let Some(format) = DocumentFormat::from_extension(&extension) else {
            return Err(ExportError::UnsupportedType { filename, extension });
        };

        let markdown = match self.converters.convert(path, format).await {
            Ok(markdown) => markdown,
            Err(source) => return Err(ExportError::Conversion { filename, source }),
        };

        let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let target = out_dir.join(format!("{stem}.md"));
        if let Err(source) = tokio::fs::write(&target, markdown).await {
            return Err(ExportError::Write { filename, source });
        }
        Ok(target)
    }
}
