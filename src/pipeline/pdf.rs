//! PDF text extraction via pdfium.
//!
//! Extraction is tolerant at page granularity: a page whose text layer cannot
//! be read contributes an empty string instead of failing the whole file.
//! Only a document that cannot be opened at all is reported as an error.
//!
//! The pdfium shared library is bound lazily on each call. An explicit path
//! from [`crate::config::AppConfig::pdfium_library_path`] takes precedence;
//! otherwise the system library search path is used.

use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Anything that can turn PDF bytes into per-page text.
///
/// Implementations must never fail on a single bad page; they return
/// `Err` only when the document as a whole is unreadable.
pub trait TextExtractor: Send + Sync {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>, String>;
}

/// pdfium-backed [`TextExtractor`].
#[derive(Debug, Clone, Default)]
pub struct PdfiumExtractor {
    library_path: Option<PathBuf>,
}

impl PdfiumExtractor {
    pub fn new(library_path: Option<PathBuf>) -> Self {
        Self { library_path }
    }

    fn bind(&self) -> Result<Pdfium, String> {
        let bindings = match &self.library_path {
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| format!("failed to bind pdfium: {:?}", e))?;
        Ok(Pdfium::new(bindings))
    }
}

impl TextExtractor for PdfiumExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>, String> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| format!("failed to open PDF: {:?}", e))?;

        let pages: Vec<String> = document
            .pages()
            .iter()
            .enumerate()
            .map(|(idx, page)| match page.text() {
                Ok(text) => text.all(),
                Err(e) => {
                    warn!("Page {}: text extraction failed ({:?}); using empty text", idx + 1, e);
                    String::new()
                }
            })
            .collect();

        debug!("Extracted text from {} PDF pages", pages.len());
        Ok(pages)
    }
}

/// Join per-page text the way it is placed into the text bundle.
pub fn join_pages(pages: &[String]) -> String {
    pages.join("\n")
}
