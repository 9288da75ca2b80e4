//! DOCX text extraction.
//!
//! This module is only available when the `docx` feature is enabled. A DOCX
//! file is a zip archive; the body text lives in `word/document.xml`. Each
//! `<w:p>` paragraph becomes one line, tabs and breaks are kept, everything
//! else (styles, tables, images) is dropped.

use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::error;

use crate::convert::{Converter, DocumentFormat, unreadable};
use crate::error::ConversionError;

const DOCUMENT_XML: &str = "word/document.xml";

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<w:(?:br|cr)\b[^>]*/>").expect("valid regex"));
static TAB: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<w:tab\b[^>]*/>").expect("valid regex"));
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// A [`Converter`] for `.docx` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxConverter;

#[async_trait]
impl Converter for DocxConverter {
    async fn convert(&self, path: &Path, format: DocumentFormat) -> Result<String, ConversionError> {
        if format != DocumentFormat::Docx {
            return Err(ConversionError::Unsupported(format.extension().to_string()));
        }

        let bytes = tokio::fs::read(path).await.map_err(|e| unreadable(path, e))?;
        let xml = tokio::task::spawn_blocking(move || read_document_xml(bytes))
            .await
            .map_err(|e| unreadable(path, format!("extraction task failed: {e}")))?
            .map_err(|message| {
                error!(path = %path.display(), error = %message, "docx extraction failed");
                unreadable(path, message)
            })?;

        Ok(document_xml_to_text(&xml))
    }
}

fn read_document_xml(bytes: Vec<u8>) -> Result<String, String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("not a zip archive: {e}"))?;
    let mut entry = archive
        .by_name(DOCUMENT_XML)
        .map_err(|e| format!("missing {DOCUMENT_XML}: {e}"))?;
    let mut xml = String::new();
    entry.read_to_string(&mut xml).map_err(|e| format!("failed to read {DOCUMENT_XML}: {e}"))?;
    Ok(xml)
}

/// Turn the body XML of a Word document into plain text, one paragraph per
/// line.
pub fn document_xml_to_text(xml: &str) -> String {
    let text = xml.replace("</w:p>", "\n");
    let text = TAB.replace_all(&text, "\t");
    let text = BREAK.replace_all(&text, "\n");
    let text = TAG.replace_all(&text, "");
    let text = unescape_entities(&text);
    BLANK_RUNS.replace_all(text.trim(), "\n\n").into_owned()
}

fn unescape_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').and_then(|semi| {
            let entity = &tail[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, semi + 1))
        });
        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
