//! # note-organizer
//!
//! Turn a pile of lecture notes, PDFs and whiteboard photos into a structured
//! study guide, and save it as a Word document.
//!
//! ## Why this crate?
//!
//! Raw notes arrive in every shape: plain-text dumps, slide decks exported to
//! PDF, phone photos of a whiteboard. This crate normalises all of them into
//! one content bundle (labeled text plus downscaled JPEGs), asks a generative
//! model to restructure it into categories and tables, and rebuilds the
//! model's Markdown into a real DOCX with headings, lists and grid tables.
//!
//! ## Pipeline Overview
//!
//! ```text
//! files
//!  │
//!  ├─ 1. Ingest       txt / pdf / png / jpg → text bundle + image payload
//!  ├─ 2. Model        one generateContent call (Gemini REST)
//!  ├─ 3. Tidy         strip fences, CRLF, invisible characters
//!  ├─ 4. Reconstruct  Markdown → headings, paragraphs, list items, tables
//!  └─ 5. Render       DOCX, written atomically
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use note_organizer::{compile, export_docx, AlwaysTruncate, AppConfig, GeminiClient, Ingestor, NoteSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key from config.json or GEMINI_API_KEY
//!     let config = AppConfig::load("config.json".as_ref())?;
//!     let mut session = NoteSession::new(&config);
//!     session.ingest(&Ingestor::new(&config), &["week1.txt", "slides.pdf"], &AlwaysTruncate)?;
//!
//!     let notes = compile(&mut session, &GeminiClient::new(&config)?, "").await?;
//!     export_docx(&notes, "Notes.docx".as_ref(), &config.document_title)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `notes` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! note-organizer = { version = "0.1", default-features = false }
//! ```
//!
//! ## PDF support
//!
//! PDF text is read through pdfium, loaded at runtime. Point
//! `pdfium_library_path` at `libpdfium` or install it on the system library
//! path; without it PDFs are listed as `Error: <name>` and everything else
//! still works.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod compile;
pub mod config;
pub mod document;
pub mod error;
mod persist;
pub mod pipeline;
pub mod policy;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use compile::{
    build_document, compile, default_output_filename, default_output_filename_today,
    export_docx, save_markdown, ExportSummary,
};
pub use config::{save_theme, AppConfig, AppConfigBuilder, Theme};
pub use document::{DocumentNode, Table};
pub use error::{ItemError, NotesError, TransportError};
pub use pipeline::ingest::{
    AlwaysTruncate, ContentManifest, FileKind, IngestReport, IngestSession, Ingestor,
    ManifestEntry, NeverTruncate, OversizeOutcome, TruncationPolicy,
};
pub use pipeline::llm::{extract_text, generate_notes, GeminiClient, ModelRequest, ModelTransport};
pub use pipeline::markdown::reconstruct;
pub use progress::{IngestProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::{NoteSession, ProcessingGuard};
