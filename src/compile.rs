//! Top-level entry points: run a processing cycle and export the result.
//!
//! The main entry points are:
//!
//! * [`compile`]: prepare a request from a [`NoteSession`], call the model,
//!   store the answer back into the session.
//! * [`export_docx`]: tidy, reconstruct and render Markdown notes to a DOCX
//!   file.
//! * [`save_markdown`]: write the notes verbatim to a `.md` file.
//!
//! [`default_output_filename`] gives the date-stamped name the CLI proposes
//! when no output path is supplied.

use crate::document::DocumentNode;
use crate::error::NotesError;
use crate::persist::write_atomic;
use crate::pipeline::llm::{generate_notes, ModelTransport};
use crate::pipeline::markdown::reconstruct;
use crate::pipeline::postprocess::tidy_response;
use crate::pipeline::render::{render_document, save_docx};
use crate::session::NoteSession;
use chrono::{Local, NaiveDate};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Notes shorter than this (after trimming) are not worth exporting.
pub const MIN_EXPORT_CHARS: usize = 10;

/// Outcome of a successful [`export_docx`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    /// Nodes written after the title.
    pub nodes: usize,
    pub tables: usize,
}

/// Run one processing cycle against `transport`.
///
/// Returns the new output text, which is also stored in the session. A failed
/// model call is not an `Err`: its `"Error: …"` text is the output. `Err` is
/// reserved for cycles that could not start ([`NotesError::NothingToProcess`],
/// [`NotesError::Busy`]).
///
/// # Example
/// ```rust,no_run
/// use note_organizer::{compile, AppConfig, GeminiClient, Ingestor, NoteSession, AlwaysTruncate};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = AppConfig::load("config.json".as_ref())?;
/// let mut session = NoteSession::new(&config);
/// session.ingest(&Ingestor::new(&config), &["lecture.txt"], &AlwaysTruncate)?;
/// let client = GeminiClient::new(&config)?;
/// let notes = compile(&mut session, &client, "focus on dates").await?;
/// println!("{notes}");
/// # Ok(())
/// # }
/// ```
pub async fn compile<T: ModelTransport>(
    session: &mut NoteSession,
    transport: &T,
    instructions: &str,
) -> Result<String, NotesError> {
    let (request, guard) = session.prepare_request(instructions)?;
    let text = generate_notes(transport, &request).await;
    session.apply_output(text.clone());
    drop(guard);
    Ok(text)
}

/// Tidy and reconstruct Markdown notes into document nodes.
pub fn build_document(markdown: &str) -> Vec<DocumentNode> {
    reconstruct(&tidy_response(markdown))
}

/// Render Markdown notes to a DOCX file at `path`, headed by `title`.
///
/// Fails with [`NotesError::NothingToExport`] when the trimmed notes are
/// shorter than [`MIN_EXPORT_CHARS`]; nothing is written in that case.
pub fn export_docx(markdown: &str, path: &Path, title: &str) -> Result<ExportSummary, NotesError> {
    let trimmed = markdown.trim();
    if trimmed.chars().count() < MIN_EXPORT_CHARS {
        return Err(NotesError::NothingToExport);
    }

    let nodes = build_document(trimmed);
    let tables = nodes
        .iter()
        .filter(|n| matches!(n, DocumentNode::Table(_)))
        .count();
    save_docx(render_document(&nodes, title), path)?;

    info!("Exported {} nodes ({} tables) to {}", nodes.len(), tables, path.display());
    Ok(ExportSummary {
        path: path.to_path_buf(),
        nodes: nodes.len(),
        tables,
    })
}

/// Write the notes as-is to a Markdown file, atomically.
pub fn save_markdown(markdown: &str, path: &Path) -> Result<(), NotesError> {
    write_atomic(path, |file| {
        file.write_all(markdown.as_bytes())
            .map_err(|e| format!("write: {e}"))
    })
}

/// `Notes_<YYYYMMDD>.docx` for `date`.
pub fn default_output_filename(date: NaiveDate) -> String {
    format!("Notes_{}.docx", date.format("%Y%m%d"))
}

/// [`default_output_filename`] for today's local date.
pub fn default_output_filename_today() -> String {
    default_output_filename(Local::now().date_naive())
}
