//! Ingestion: turn a batch of input files into the uniform content bundle
//! sent to the model.
//!
//! Each path is classified into a [`FileKind`] by extension and handed to the
//! [`IngestHandler`] registered for that kind. Handlers produce either a text
//! fragment, an inline image, or nothing. Results accumulate in an
//! [`IngestSession`]:
//!
//! * the **text bundle**, labeled fragments concatenated in input order,
//! * the **image payload**, normalised JPEGs in input order,
//! * the **manifest**, one entry per attempted file.
//!
//! A failing file never aborts the batch: its error is logged and recorded as
//! an `Error: <name>` manifest entry. After the batch the text bundle is held
//! against the character budget and a [`TruncationPolicy`] decides whether
//! an oversized bundle is cut down.

use crate::config::AppConfig;
use crate::error::ItemError;
use crate::pipeline::encode::{self, ImagePart, NormalizeError};
use crate::pipeline::pdf::{self, PdfiumExtractor, TextExtractor};
use crate::policy;
use crate::progress::{NoopProgressCallback, ProgressCallback};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ── File kinds ───────────────────────────────────────────────────────────

/// Handling category for an input file, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    PlainText,
    Pdf,
    Image,
    Unsupported,
}

impl FileKind {
    /// Classify by lowercased extension: `txt`, `pdf`, `png`/`jpg`/`jpeg`.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("txt") => FileKind::PlainText,
            Some("pdf") => FileKind::Pdf,
            Some("png" | "jpg" | "jpeg") => FileKind::Image,
            _ => FileKind::Unsupported,
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────

/// What a handler contributed for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingested {
    /// A text fragment; `label` names the source kind in the separator line.
    Text { label: &'static str, body: String },
    Image(ImagePart),
    /// Recorded in the manifest only.
    Nothing,
}

/// One ingestion strategy per [`FileKind`].
pub trait IngestHandler: Send + Sync {
    fn ingest(&self, path: &Path, name: &str) -> Result<Ingested, ItemError>;
}

fn read_bytes(path: &Path, name: &str) -> Result<Vec<u8>, ItemError> {
    std::fs::read(path).map_err(|e| ItemError::Read {
        name: name.to_string(),
        detail: e.to_string(),
    })
}

/// Plain text, decoded lossily so invalid UTF-8 never fails the file.
#[derive(Debug, Default)]
pub struct PlainTextHandler;

impl IngestHandler for PlainTextHandler {
    fn ingest(&self, path: &Path, name: &str) -> Result<Ingested, ItemError> {
        let bytes = read_bytes(path, name)?;
        Ok(Ingested::Text {
            label: "FILE",
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

/// PDF text, one page per line group, via a [`TextExtractor`].
pub struct PdfHandler {
    extractor: Arc<dyn TextExtractor>,
}

impl PdfHandler {
    pub fn new(extractor: Arc<dyn TextExtractor>) -> Self {
        Self { extractor }
    }
}

impl IngestHandler for PdfHandler {
    fn ingest(&self, path: &Path, name: &str) -> Result<Ingested, ItemError> {
        let bytes = read_bytes(path, name)?;
        let pages = self
            .extractor
            .extract_pages(&bytes)
            .map_err(|detail| ItemError::PdfExtraction {
                name: name.to_string(),
                detail,
            })?;
        debug!("{}: {} pages", name, pages.len());
        Ok(Ingested::Text {
            label: "PDF",
            body: pdf::join_pages(&pages),
        })
    }
}

/// Raster images, downscaled and re-encoded as JPEG.
#[derive(Debug)]
pub struct ImageHandler {
    max_edge: u32,
    quality: u8,
}

impl ImageHandler {
    pub fn new(max_edge: u32, quality: u8) -> Self {
        Self { max_edge, quality }
    }
}

impl IngestHandler for ImageHandler {
    fn ingest(&self, path: &Path, name: &str) -> Result<Ingested, ItemError> {
        let bytes = read_bytes(path, name)?;
        encode::normalize_image(&bytes, self.max_edge, self.quality)
            .map(Ingested::Image)
            .map_err(|e| match e {
                NormalizeError::Decode(e) => ItemError::ImageDecode {
                    name: name.to_string(),
                    detail: e.to_string(),
                },
                NormalizeError::Encode(e) => ItemError::ImageEncode {
                    name: name.to_string(),
                    detail: e.to_string(),
                },
            })
    }
}

/// Fallback: the file is listed but contributes no content.
#[derive(Debug, Default)]
pub struct UnsupportedHandler;

impl IngestHandler for UnsupportedHandler {
    fn ingest(&self, _path: &Path, name: &str) -> Result<Ingested, ItemError> {
        debug!("{}: unsupported file type, listed only", name);
        Ok(Ingested::Nothing)
    }
}

// ── Manifest ─────────────────────────────────────────────────────────────

/// Outcome for one attempted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestEntry {
    Loaded(String),
    Failed(String),
}

impl ManifestEntry {
    pub fn name(&self) -> &str {
        match self {
            ManifestEntry::Loaded(n) | ManifestEntry::Failed(n) => n,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ManifestEntry::Failed(_))
    }
}

impl fmt::Display for ManifestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestEntry::Loaded(n) => f.write_str(n),
            ManifestEntry::Failed(n) => write!(f, "Error: {n}"),
        }
    }
}

/// Ordered, append-only record of every attempted file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentManifest {
    entries: Vec<ManifestEntry>,
}

impl ContentManifest {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Display labels: the file name, or `Error: <name>` for failures.
    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(ToString::to_string).collect()
    }

    pub fn failed_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_failed()).count()
    }

    fn push(&mut self, entry: ManifestEntry) {
        self.entries.push(entry);
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

// ── Session state ────────────────────────────────────────────────────────

/// Accumulated ingestion state: text bundle, image payload and manifest.
#[derive(Debug, Clone, Default)]
pub struct IngestSession {
    text: String,
    images: Vec<ImagePart>,
    manifest: ContentManifest,
}

impl IngestSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn images(&self) -> &[ImagePart] {
        &self.images
    }

    pub fn manifest(&self) -> &ContentManifest {
        &self.manifest
    }

    pub fn text_chars(&self) -> usize {
        policy::char_count(&self.text)
    }

    /// `true` when there is neither text nor any image to send.
    pub fn has_no_content(&self) -> bool {
        self.text.is_empty() && self.images.is_empty()
    }

    /// Clear text, images and manifest together.
    pub fn reset(&mut self) {
        self.text.clear();
        self.images.clear();
        self.manifest.clear();
    }

    fn append_text(&mut self, label: &str, name: &str, body: &str) {
        self.text.push_str(&format!("\n\n--- {label}: {name} ---\n"));
        self.text.push_str(body);
    }
}

// ── Truncation policy ────────────────────────────────────────────────────

/// Decides whether an oversized text bundle is truncated to the budget.
///
/// Any `Fn(usize) -> bool` closure is a policy; it receives the bundle's
/// current character count.
pub trait TruncationPolicy {
    fn should_truncate(&self, char_count: usize) -> bool;
}

impl<F: Fn(usize) -> bool> TruncationPolicy for F {
    fn should_truncate(&self, char_count: usize) -> bool {
        self(char_count)
    }
}

/// Always accept truncation (the recommended answer).
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysTruncate;

impl TruncationPolicy for AlwaysTruncate {
    fn should_truncate(&self, _char_count: usize) -> bool {
        true
    }
}

/// Never truncate; the oversized bundle is sent as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverTruncate;

impl TruncationPolicy for NeverTruncate {
    fn should_truncate(&self, _char_count: usize) -> bool {
        false
    }
}

/// What happened to the text bundle after a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OversizeOutcome {
    WithinBudget,
    Truncated { from: usize, to: usize },
    /// The policy declined; the bundle exceeds the budget.
    KeptOversize { chars: usize },
}

/// Summary of one ingestion batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub attempted: usize,
    pub loaded: usize,
    pub failed: usize,
    pub images_added: usize,
    /// Character count of the whole bundle after the batch.
    pub text_chars: usize,
    pub oversize: OversizeOutcome,
}

// ── Ingestor ─────────────────────────────────────────────────────────────

/// Dispatches files to per-kind handlers and applies the size policy.
pub struct Ingestor {
    handlers: HashMap<FileKind, Box<dyn IngestHandler>>,
    fallback: UnsupportedHandler,
    max_raw_chars: usize,
    progress: ProgressCallback,
}

impl Ingestor {
    /// Build an ingestor with the default handlers and pdfium text extraction.
    pub fn new(config: &AppConfig) -> Self {
        let extractor = Arc::new(PdfiumExtractor::new(config.pdfium_library_path.clone()));
        Self::with_text_extractor(config, extractor)
    }

    /// Build an ingestor with the default handlers and a custom PDF extractor.
    pub fn with_text_extractor(config: &AppConfig, extractor: Arc<dyn TextExtractor>) -> Self {
        let mut ingestor = Self {
            handlers: HashMap::new(),
            fallback: UnsupportedHandler,
            max_raw_chars: config.max_raw_chars,
            progress: Arc::new(NoopProgressCallback),
        };
        ingestor.register(FileKind::PlainText, Box::new(PlainTextHandler));
        ingestor.register(FileKind::Pdf, Box::new(PdfHandler::new(extractor)));
        ingestor.register(
            FileKind::Image,
            Box::new(ImageHandler::new(config.max_image_edge, config.jpeg_quality)),
        );
        ingestor
    }

    /// Replace (or add) the handler for `kind`.
    pub fn register(&mut self, kind: FileKind, handler: Box<dyn IngestHandler>) {
        self.handlers.insert(kind, handler);
    }

    /// Attach a progress callback.
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    fn handler_for(&self, kind: FileKind) -> &dyn IngestHandler {
        self.handlers
            .get(&kind)
            .map(Box::as_ref)
            .unwrap_or(&self.fallback)
    }

    /// Ingest `paths` in order, appending to `session`.
    ///
    /// Every path yields exactly one manifest entry. Earlier content in the
    /// session is kept; only [`IngestSession::reset`] clears it.
    pub fn ingest_files<P: AsRef<Path>>(
        &self,
        session: &mut IngestSession,
        paths: &[P],
        policy: &dyn TruncationPolicy,
    ) -> IngestReport {
        let total = paths.len();
        self.progress.on_batch_start(total);
        info!("Ingesting {} files", total);

        let mut loaded = 0usize;
        let mut images_added = 0usize;

        for (i, path) in paths.iter().enumerate() {
            let path = path.as_ref();
            let name = display_name(path);
            let kind = FileKind::from_path(path);
            self.progress.on_file_start(i + 1, total, &name);

            match self.handler_for(kind).ingest(path, &name) {
                Ok(ingested) => {
                    match ingested {
                        Ingested::Text { label, body } => {
                            session.append_text(label, &name, &body)
                        }
                        Ingested::Image(part) => {
                            session.images.push(part);
                            images_added += 1;
                        }
                        Ingested::Nothing => {}
                    }
                    session.manifest.push(ManifestEntry::Loaded(name.clone()));
                    loaded += 1;
                    debug!("Loaded {} as {:?}", name, kind);
                    self.progress.on_file_loaded(i + 1, total, &name);
                }
                Err(e) => {
                    warn!("Failed to load {}: {}", name, e);
                    session.manifest.push(ManifestEntry::Failed(name.clone()));
                    self.progress.on_file_error(i + 1, total, &name, &e.to_string());
                }
            }
        }

        self.progress.on_batch_complete(total, loaded);
        let oversize = self.apply_budget(session, policy);

        IngestReport {
            attempted: total,
            loaded,
            failed: total - loaded,
            images_added,
            text_chars: session.text_chars(),
            oversize,
        }
    }

    fn apply_budget(&self, session: &mut IngestSession, policy: &dyn TruncationPolicy) -> OversizeOutcome {
        if !policy::exceeds_budget(&session.text, self.max_raw_chars) {
            return OversizeOutcome::WithinBudget;
        }
        let chars = session.text_chars();
        if policy.should_truncate(chars) {
            policy::truncate_to_budget(&mut session.text, self.max_raw_chars);
            info!("Text truncated from {} to {} chars", chars, self.max_raw_chars);
            OversizeOutcome::Truncated {
                from: chars,
                to: self.max_raw_chars,
            }
        } else {
            warn!(
                "Text is {} chars, over the {} char budget; sending untruncated",
                chars, self.max_raw_chars
            );
            OversizeOutcome::KeptOversize { chars }
        }
    }
}

/// File name as shown in the manifest and fragment labels.
fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct FakeExtractor(Result<Vec<String>, String>);

    impl TextExtractor for FakeExtractor {
        fn extract_pages(&self, _bytes: &[u8]) -> Result<Vec<String>, String> {
            self.0.clone()
        }
    }

    fn ingestor_with(pages: Result<Vec<String>, String>) -> Ingestor {
        Ingestor::with_text_extractor(&AppConfig::default(), Arc::new(FakeExtractor(pages)))
    }

    fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let p = dir.path().join(name);
        std::fs::write(&p, bytes).unwrap();
        p
    }

    #[test]
    fn file_kind_by_extension() {
        assert_eq!(FileKind::from_path(Path::new("a.txt")), FileKind::PlainText);
        assert_eq!(FileKind::from_path(Path::new("A.TXT")), FileKind::PlainText);
        assert_eq!(FileKind::from_path(Path::new("doc.Pdf")), FileKind::Pdf);
        assert_eq!(FileKind::from_path(Path::new("x.jpeg")), FileKind::Image);
        assert_eq!(FileKind::from_path(Path::new("x.JPG")), FileKind::Image);
        assert_eq!(FileKind::from_path(Path::new("x.png")), FileKind::Image);
        assert_eq!(FileKind::from_path(Path::new("notes.md")), FileKind::Unsupported);
        assert_eq!(FileKind::from_path(Path::new("README")), FileKind::Unsupported);
    }

    #[test]
    fn text_file_is_labeled_and_listed() {
        let dir = TempDir::new().unwrap();
        let p = write(&dir, "lecture.txt", b"photosynthesis");
        let mut session = IngestSession::new();
        let report = ingestor_with(Ok(vec![])).ingest_files(&mut session, &[p], &AlwaysTruncate);

        assert_eq!(session.text(), "\n\n--- FILE: lecture.txt ---\nphotosynthesis");
        assert_eq!(session.manifest().labels(), vec!["lecture.txt"]);
        assert_eq!(report.loaded, 1);
        assert_eq!(report.oversize, OversizeOutcome::WithinBudget);
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let dir = TempDir::new().unwrap();
        let p = write(&dir, "bad.txt", &[b'o', b'k', 0xff, 0xfe, b'!']);
        let mut session = IngestSession::new();
        ingestor_with(Ok(vec![])).ingest_files(&mut session, &[p], &AlwaysTruncate);

        assert!(session.text().ends_with("ok\u{FFFD}\u{FFFD}!"));
        assert_eq!(session.manifest().failed_count(), 0);
    }

    #[test]
    fn pdf_pages_are_joined_with_newlines() {
        let dir = TempDir::new().unwrap();
        let p = write(&dir, "slides.pdf", b"%PDF-1.4");
        let pages = Ok(vec!["page one".into(), String::new(), "page three".into()]);
        let mut session = IngestSession::new();
        ingestor_with(pages).ingest_files(&mut session, &[p], &AlwaysTruncate);

        assert_eq!(
            session.text(),
            "\n\n--- PDF: slides.pdf ---\npage one\n\npage three"
        );
        assert_eq!(session.manifest().labels(), vec!["slides.pdf"]);
    }

    #[test]
    fn unreadable_pdf_is_recorded_as_error() {
        let dir = TempDir::new().unwrap();
        let p = write(&dir, "broken.pdf", b"garbage");
        let mut session = IngestSession::new();
        let report = ingestor_with(Err("corrupt".into())).ingest_files(&mut session, &[p], &AlwaysTruncate);

        assert_eq!(session.manifest().labels(), vec!["Error: broken.pdf"]);
        assert!(session.text().is_empty());
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn unsupported_file_is_listed_without_content() {
        let dir = TempDir::new().unwrap();
        let p = write(&dir, "deck.pptx", b"binary");
        let mut session = IngestSession::new();
        let report = ingestor_with(Ok(vec![])).ingest_files(&mut session, &[p], &AlwaysTruncate);

        assert_eq!(session.manifest().labels(), vec!["deck.pptx"]);
        assert!(session.has_no_content());
        assert_eq!(report.loaded, 1);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn missing_file_does_not_abort_batch() {
        let dir = TempDir::new().unwrap();
        let good = write(&dir, "good.txt", b"kept");
        let missing = dir.path().join("missing.txt");
        let corrupt_img = write(&dir, "photo.png", b"not a png");
        let paths = vec![missing, corrupt_img, good];

        let mut session = IngestSession::new();
        let report = ingestor_with(Ok(vec![])).ingest_files(&mut session, &paths, &AlwaysTruncate);

        assert_eq!(
            session.manifest().labels(),
            vec!["Error: missing.txt", "Error: photo.png", "good.txt"]
        );
        assert_eq!(session.manifest().len(), paths.len());
        assert!(session.text().contains("kept"));
        assert_eq!(report.failed, 2);
    }

    #[test]
    fn repeated_batches_append() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.txt", b"alpha");
        let b = write(&dir, "b.txt", b"beta");
        let ingestor = ingestor_with(Ok(vec![]));
        let mut session = IngestSession::new();

        ingestor.ingest_files(&mut session, &[a], &AlwaysTruncate);
        ingestor.ingest_files(&mut session, &[b], &AlwaysTruncate);

        assert_eq!(session.manifest().labels(), vec!["a.txt", "b.txt"]);
        let text = session.text();
        assert!(text.find("alpha").unwrap() < text.find("beta").unwrap());

        session.reset();
        assert!(session.has_no_content());
        assert!(session.manifest().is_empty());
    }

    #[test]
    fn oversize_bundle_truncated_when_accepted() {
        let dir = TempDir::new().unwrap();
        let p = write(&dir, "big.txt", "x".repeat(500).as_bytes());
        let config = AppConfig::builder().max_raw_chars(100).build().unwrap();
        let ingestor = Ingestor::with_text_extractor(&config, Arc::new(FakeExtractor(Ok(vec![]))));
        let mut session = IngestSession::new();

        let seen = std::cell::Cell::new(0usize);
        let policy = |n: usize| {
            seen.set(n);
            true
        };
        let report = ingestor.ingest_files(&mut session, &[p], &policy);

        assert_eq!(session.text_chars(), 100);
        assert!(seen.get() > 500);
        assert_eq!(
            report.oversize,
            OversizeOutcome::Truncated {
                from: seen.get(),
                to: 100
            }
        );
    }

    #[test]
    fn oversize_bundle_kept_when_declined() {
        let dir = TempDir::new().unwrap();
        let p = write(&dir, "big.txt", "y".repeat(500).as_bytes());
        let config = AppConfig::builder().max_raw_chars(100).build().unwrap();
        let ingestor = Ingestor::with_text_extractor(&config, Arc::new(FakeExtractor(Ok(vec![]))));
        let mut session = IngestSession::new();

        let report = ingestor.ingest_files(&mut session, &[p], &NeverTruncate);

        assert!(session.text_chars() > 500);
        assert!(matches!(report.oversize, OversizeOutcome::KeptOversize { .. }));
    }

    #[test]
    fn policy_not_consulted_under_budget() {
        let dir = TempDir::new().unwrap();
        let p = write(&dir, "small.txt", b"tiny");
        let mut session = IngestSession::new();
        let policy = |_: usize| -> bool { panic!("policy must not be asked") };
        ingestor_with(Ok(vec![])).ingest_files(&mut session, &[p], &policy);
        assert!(session.text().ends_with("tiny"));
    }

    #[test]
    fn registered_handler_overrides_default() {
        struct Shout;
        impl IngestHandler for Shout {
            fn ingest(&self, _path: &Path, _name: &str) -> Result<Ingested, ItemError> {
                Ok(Ingested::Text {
                    label: "FILE",
                    body: "LOUD".into(),
                })
            }
        }

        let dir = TempDir::new().unwrap();
        let p = write(&dir, "quiet.txt", b"quiet");
        let mut ingestor = ingestor_with(Ok(vec![]));
        ingestor.register(FileKind::PlainText, Box::new(Shout));
        let mut session = IngestSession::new();
        ingestor.ingest_files(&mut session, &[p], &AlwaysTruncate);
        assert!(session.text().ends_with("LOUD"));
    }
}
