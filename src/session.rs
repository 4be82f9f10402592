//! Session state: ingested content, latest model output, busy flag.
//!
//! A [`NoteSession`] is owned by the foreground (the CLI's main task). A
//! processing cycle is split in three so the network call can run on a worker
//! without touching session state:
//!
//! 1. [`NoteSession::prepare_request`] snapshots the content into an owned
//!    [`ModelRequest`] and raises the busy flag, returning a
//!    [`ProcessingGuard`].
//! 2. The worker runs [`crate::pipeline::llm::generate_notes`] on the
//!    snapshot and hands back a `String`.
//! 3. The foreground calls [`NoteSession::apply_output`] and drops the guard.
//!
//! While a guard is alive, ingestion, reset and a second prepare all fail
//! with [`NotesError::Busy`].

use crate::config::AppConfig;
use crate::error::NotesError;
use crate::pipeline::ingest::{ContentManifest, IngestReport, IngestSession, Ingestor, TruncationPolicy};
use crate::pipeline::llm::{build_request, is_error_text, ModelRequest};
use crate::prompts::SYSTEM_INSTRUCTION;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Holds the busy flag raised for the lifetime of one processing cycle.
///
/// Dropping the guard, including on a panic or an early return, clears the
/// flag.
#[derive(Debug)]
#[must_use = "dropping the guard ends the processing cycle"]
pub struct ProcessingGuard {
    flag: Arc<AtomicBool>,
}

impl ProcessingGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Ingested content plus the latest compiled notes.
#[derive(Debug)]
pub struct NoteSession {
    content: IngestSession,
    output: String,
    system_instruction: String,
    busy: Arc<AtomicBool>,
}

impl NoteSession {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            content: IngestSession::new(),
            output: String::new(),
            system_instruction: config
                .system_instruction
                .clone()
                .unwrap_or_else(|| SYSTEM_INSTRUCTION.to_string()),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn content(&self) -> &IngestSession {
        &self.content
    }

    pub fn manifest(&self) -> &ContentManifest {
        self.content.manifest()
    }

    /// Latest model output, empty until the first cycle completes.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// `true` when the latest output reports a failed model call.
    pub fn output_is_error(&self) -> bool {
        is_error_text(&self.output)
    }

    pub fn is_processing(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn ensure_idle(&self) -> Result<(), NotesError> {
        if self.is_processing() {
            Err(NotesError::Busy)
        } else {
            Ok(())
        }
    }

    /// Ingest another batch of files, appending to the current content.
    pub fn ingest<P: AsRef<Path>>(
        &mut self,
        ingestor: &Ingestor,
        paths: &[P],
        policy: &dyn TruncationPolicy,
    ) -> Result<IngestReport, NotesError> {
        self.ensure_idle()?;
        Ok(ingestor.ingest_files(&mut self.content, paths, policy))
    }

    /// Clear text, images and manifest. The latest output is kept.
    pub fn reset(&mut self) -> Result<(), NotesError> {
        self.ensure_idle()?;
        self.content.reset();
        debug!("Session inputs cleared");
        Ok(())
    }

    /// Snapshot the content into a request and start a processing cycle.
    ///
    /// `instructions` is trimmed before it is placed in the prompt.
    pub fn prepare_request(&self, instructions: &str) -> Result<(ModelRequest, ProcessingGuard), NotesError> {
        if self.content.has_no_content() {
            return Err(NotesError::NothingToProcess);
        }
        let guard = ProcessingGuard::acquire(&self.busy).ok_or(NotesError::Busy)?;
        let request = build_request(
            instructions.trim(),
            self.content.text(),
            self.content.images(),
            &self.system_instruction,
        );
        debug!(
            "Prepared request: {} text chars, {} images",
            self.content.text_chars(),
            request.image_count()
        );
        Ok((request, guard))
    }

    /// Store the worker's result. Replaces any previous output.
    pub fn apply_output(&mut self, text: String) {
        self.output = text;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ingest::AlwaysTruncate;
    use tempfile::TempDir;

    fn loaded_session(dir: &TempDir) -> NoteSession {
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "enzymes").unwrap();
        let config = AppConfig::default();
        let mut session = NoteSession::new(&config);
        session
            .ingest(&Ingestor::new(&config), &[path], &AlwaysTruncate)
            .unwrap();
        session
    }

    #[test]
    fn empty_session_has_nothing_to_process() {
        let session = NoteSession::new(&AppConfig::default());
        assert!(matches!(
            session.prepare_request(""),
            Err(NotesError::NothingToProcess)
        ));
        assert!(!session.is_processing());
    }

    #[test]
    fn second_prepare_is_busy_until_guard_drops() {
        let dir = TempDir::new().unwrap();
        let session = loaded_session(&dir);

        let (request, guard) = session.prepare_request("  be brief  ").unwrap();
        assert!(session.is_processing());
        assert!(matches!(session.prepare_request(""), Err(NotesError::Busy)));

        let prompt = serde_json::to_value(&request).unwrap()["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(prompt.contains("User Instructions: be brief\n"));
        assert!(prompt.contains("enzymes"));

        drop(guard);
        assert!(!session.is_processing());
        assert!(session.prepare_request("").is_ok());
    }

    #[test]
    fn ingest_and_reset_refused_while_busy() {
        let dir = TempDir::new().unwrap();
        let mut session = loaded_session(&dir);

        let busy = Arc::clone(&session.busy);
        let guard = ProcessingGuard::acquire(&busy).unwrap();
        assert!(matches!(session.reset(), Err(NotesError::Busy)));
        let no_paths: [&Path; 0] = [];
        assert!(matches!(
            session.ingest(&Ingestor::new(&AppConfig::default()), &no_paths, &AlwaysTruncate),
            Err(NotesError::Busy)
        ));
        drop(guard);

        session.reset().unwrap();
        assert!(session.content().has_no_content());
        assert!(session.manifest().is_empty());
    }

    #[test]
    fn output_survives_reset() {
        let dir = TempDir::new().unwrap();
        let mut session = loaded_session(&dir);
        session.apply_output("## Guide".into());
        session.reset().unwrap();
        assert_eq!(session.output(), "## Guide");
        assert!(!session.output_is_error());

        session.apply_output("Error: API Error 500: boom".into());
        assert!(session.output_is_error());
    }

    #[test]
    fn system_instruction_override_is_used() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "x").unwrap();
        let config = AppConfig::builder().system_instruction("Be terse.").build().unwrap();
        let mut session = NoteSession::new(&config);
        session
            .ingest(&Ingestor::new(&config), &[path], &AlwaysTruncate)
            .unwrap();

        let (request, _guard) = session.prepare_request("").unwrap();
        let v = serde_json::to_value(&request).unwrap();
        assert_eq!(v["systemInstruction"]["parts"][0]["text"], "Be terse.");
    }
}
