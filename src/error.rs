//! Error types for the note-organizer library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`NotesError`]: **Fatal for the initiating action**: configuration could
//!   not be read, there is nothing to send, a cycle is already in flight, or
//!   the document could not be saved. Returned as `Err(NotesError)`.
//!
//! * [`ItemError`]: **Non-fatal**: a single input file failed to load. It is
//!   logged and recorded as an `Error: <name>` entry in the
//!   [`crate::pipeline::ingest::ContentManifest`]; the rest of the batch
//!   carries on.
//!
//! * [`TransportError`]: the model call failed. It never escapes
//!   [`crate::pipeline::llm::generate_notes`]; it is turned into the output
//!   text itself (prefixed with [`crate::pipeline::llm::ERROR_PREFIX`]) so the
//!   caller always has something to show.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors returned by the note-organizer library.
#[derive(Debug, Error)]
pub enum NotesError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// The config file exists but could not be read.
    #[error("Failed to read config file '{path}': {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON.
    #[error("Config file '{path}' is not valid JSON: {detail}")]
    ConfigParse { path: PathBuf, detail: String },

    /// Writing the theme preference back to the config file failed.
    #[error("Failed to update config file '{path}': {detail}")]
    ConfigWrite { path: PathBuf, detail: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No API key was found in the config file or the environment.
    #[error("API key missing.\nSet GEMINI_API_KEY in config.json or in the environment.")]
    ApiKeyMissing,

    // ── Session errors ────────────────────────────────────────────────────
    /// Neither text nor images have been loaded yet.
    #[error("Nothing to process: add some files first")]
    NothingToProcess,

    /// A processing cycle is already running.
    #[error("A processing cycle is already in progress")]
    Busy,

    // ── Output errors ─────────────────────────────────────────────────────
    /// The notes are too short to be worth exporting.
    #[error("No notes to save")]
    NothingToExport,

    /// The document could not be written; no file was left at `path`.
    #[error("Failed to save document '{path}': {reason}")]
    PersistFailed { path: PathBuf, reason: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single input file.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ItemError {
    /// The file could not be read from disk.
    #[error("{name}: read failed: {detail}")]
    Read { name: String, detail: String },

    /// The PDF could not be opened at all (individual bad pages are tolerated).
    #[error("{name}: PDF text extraction failed: {detail}")]
    PdfExtraction { name: String, detail: String },

    /// The image bytes could not be decoded.
    #[error("{name}: image decode failed: {detail}")]
    ImageDecode { name: String, detail: String },

    /// The normalised image could not be re-encoded.
    #[error("{name}: image encode failed: {detail}")]
    ImageEncode { name: String, detail: String },
}

/// Failure of the outbound model call.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent or the connection dropped.
    #[error("Request failed: {0}")]
    Request(String),

    /// No response within the configured timeout.
    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The API answered with a non-success status code.
    #[error("API Error {status}: {body}")]
    Status { status: u16, body: String },

    /// The API answered 2xx but the body was not JSON.
    #[error("Invalid response body: {0}")]
    InvalidBody(String),
}
