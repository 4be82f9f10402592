//! CLI binary for note-organizer.
//!
//! A thin shim over the library crate: load config, ingest files, run one
//! model call on a background task, export the result.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use note_organizer::{
    default_output_filename_today, export_docx, generate_notes, policy, save_markdown, save_theme,
    AlwaysTruncate, AppConfig, AppConfigBuilder, GeminiClient, IngestProgressCallback,
    IngestReport, Ingestor, NeverTruncate, NoteSession, OversizeOutcome, ProgressCallback, Theme,
    TruncationPolicy,
};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI palette (no extra deps) ─────────────────────────────────────────────

/// Colours for status output, chosen by theme. Night mode uses the bright
/// variants so they stay readable on dark backgrounds.
#[derive(Clone, Copy)]
struct Palette {
    ok: u8,
    err: u8,
    accent: u8,
}

impl Palette {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Day => Self {
                ok: 32,
                err: 31,
                accent: 36,
            },
            Theme::Night => Self {
                ok: 92,
                err: 91,
                accent: 96,
            },
        }
    }

    fn paint(code: u8, s: &str) -> String {
        format!("\x1b[{code}m{s}\x1b[0m")
    }
    fn ok(&self, s: &str) -> String {
        Self::paint(self.ok, s)
    }
    fn err(&self, s: &str) -> String {
        Self::paint(self.err, s)
    }
    fn accent(&self, s: &str) -> String {
        Self::paint(self.accent, s)
    }
}

fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the batch plus a log line per file.
struct CliProgressCallback {
    bar: ProgressBar,
    palette: Palette,
}

impl CliProgressCallback {
    fn new(palette: Palette) -> Arc<Self> {
        Arc::new(Self {
            bar: ProgressBar::hidden(),
            palette,
        })
    }
}

impl IngestProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} files  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.set_length(total_files as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Loading");
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_file_start(&self, _index: usize, _total: usize, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn on_file_loaded(&self, index: usize, total: usize, name: &str) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}",
            self.palette.ok("✓"),
            index,
            total,
            name
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, name: &str, error: &str) {
        // Keep long errors on one line.
        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            self.palette.err("✗"),
            index,
            total,
            name,
            dim(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _total_files: usize, _loaded: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Organise a week of notes into Notes_<date>.docx
  notes week1.txt slides.pdf whiteboard.jpg

  # Extra instructions and an explicit output path
  notes -i "focus on dates and formulas" *.txt -o history.docx

  # Keep the raw Markdown too, and print it
  notes lecture.pdf --markdown lecture.md --print

  # Only list what would be sent (no API key needed)
  notes --manifest-only notes/*

  # Re-render a saved Markdown answer without calling the model
  notes --from-markdown lecture.md -o lecture.docx

SUPPORTED INPUTS:
  .txt              plain text (invalid UTF-8 is replaced, not rejected)
  .pdf              text layer via pdfium
  .png .jpg .jpeg   downscaled to 1200 px and sent as JPEG
  anything else     listed, not sent

CONFIG (config.json):
  GEMINI_API_KEY / API_KEY   API key (falls back to the environment)
  GEMINI_MODEL               model ID (default gemini-2.0-flash)
  GEMINI_API_BASE            API base URL
  APP_THEME                  "Day Mode" or "Night Mode"

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY    Google Gemini API key
  PDFIUM_LIB_PATH   Path to libpdfium (otherwise the system library is used)
  RUST_LOG          Override log filtering
"#;

/// Organise notes into a categorised study guide and save it as DOCX.
#[derive(Parser, Debug)]
#[command(
    name = "notes",
    version,
    about = "Organise notes, PDFs and photos into a study guide (DOCX) with a generative model",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input files: .txt, .pdf, .png, .jpg, .jpeg.
    files: Vec<PathBuf>,

    /// Extra instructions for the model.
    #[arg(short, long, default_value = "")]
    instructions: String,

    /// Write the DOCX here (default: Notes_<YYYYMMDD>.docx).
    #[arg(short, long, env = "NOTES_OUTPUT")]
    output: Option<PathBuf>,

    /// Also save the model's Markdown to this file.
    #[arg(long)]
    markdown: Option<PathBuf>,

    /// Print the model's Markdown to stdout.
    #[arg(long)]
    print: bool,

    /// Render an existing Markdown file instead of calling the model.
    #[arg(long, conflicts_with = "files")]
    from_markdown: Option<PathBuf>,

    /// Ingest and list files, then stop.
    #[arg(long)]
    manifest_only: bool,

    /// What to do when the text exceeds the character budget.
    #[arg(long, value_enum, default_value = "ask")]
    oversize: OversizeArg,

    /// Path to config.json.
    #[arg(long, env = "NOTES_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// API key (overrides config.json and GEMINI_API_KEY).
    #[arg(long)]
    api_key: Option<String>,

    /// Model ID (overrides config.json).
    #[arg(long, env = "GEMINI_MODEL")]
    model: Option<String>,

    /// Colour theme for terminal output.
    #[arg(long, value_enum)]
    theme: Option<ThemeArg>,

    /// Persist --theme into config.json (only if the file exists).
    #[arg(long, requires = "theme")]
    save_theme: bool,

    /// Title heading of the document.
    #[arg(long)]
    title: Option<String>,

    /// Path to libpdfium.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Disable progress bar and spinner.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OversizeArg {
    /// Prompt on a terminal; truncate otherwise.
    Ask,
    Truncate,
    Keep,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ThemeArg {
    Day,
    Night,
}

impl From<ThemeArg> for Theme {
    fn from(v: ThemeArg) -> Self {
        match v {
            ThemeArg::Day => Theme::Day,
            ThemeArg::Night => Theme::Night,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO logs are suppressed while the progress bar is active; the bar
    // already reports every file.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Config ───────────────────────────────────────────────────────────
    let config = build_config(&cli)?;
    let palette = Palette::for_theme(config.theme);

    if cli.save_theme {
        let saved = save_theme(&cli.config, config.theme).context("Failed to save theme")?;
        if !cli.quiet {
            if saved {
                eprintln!("{} Theme set to {}", palette.ok("✔"), bold(config.theme.name()));
            } else {
                eprintln!(
                    "{} {} not found; theme applies to this run only",
                    palette.accent("⚠"),
                    cli.config.display()
                );
            }
        }
        if cli.files.is_empty() && cli.from_markdown.is_none() {
            return Ok(());
        }
    }

    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(default_output_filename_today()));

    // ── Re-render mode ───────────────────────────────────────────────────
    if let Some(ref md_path) = cli.from_markdown {
        let markdown = std::fs::read_to_string(md_path)
            .with_context(|| format!("Failed to read {}", md_path.display()))?;
        export(&cli, &palette, &markdown, &output_path, &config.document_title)?;
        return Ok(());
    }

    if cli.files.is_empty() {
        anyhow::bail!("No input files given (see --help)");
    }

    // ── Ingest ───────────────────────────────────────────────────────────
    let mut ingestor = Ingestor::new(&config);
    if show_progress {
        let cb: ProgressCallback = CliProgressCallback::new(palette);
        ingestor = ingestor.with_progress(cb);
    }

    let mut session = NoteSession::new(&config);
    let policy = oversize_policy(cli.oversize, config.max_raw_chars);
    let report = session
        .ingest(&ingestor, cli.files.as_slice(), policy.as_ref())
        .context("Failed to load files")?;

    if !cli.quiet {
        print_manifest(&palette, &session, &report, show_progress);
    }
    if cli.manifest_only {
        return Ok(());
    }

    // ── Model call ───────────────────────────────────────────────────────
    let client = GeminiClient::new(&config).context("Cannot call the model")?;
    let (request, guard) = session
        .prepare_request(&cli.instructions)
        .context("Nothing to send")?;

    let spinner = if show_progress {
        let s = ProgressBar::new_spinner();
        s.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        s.set_prefix("Organizing");
        s.set_message(format!(
            "{} chars, {} images → {}",
            session.content().text_chars(),
            request.image_count(),
            config.model
        ));
        s.enable_steady_tick(Duration::from_millis(80));
        Some(s)
    } else {
        None
    };

    // The worker owns its snapshot; the session stays on this task.
    let worker = tokio::spawn(async move { generate_notes(&client, &request).await });
    let text = worker.await.context("Model worker panicked")?;
    if let Some(s) = spinner {
        s.finish_and_clear();
    }
    session.apply_output(text);
    drop(guard);

    if session.output_is_error() {
        anyhow::bail!("{}", session.output());
    }
    if !cli.quiet {
        eprintln!("{} Complete.", palette.ok("✔"));
    }

    // ── Output ───────────────────────────────────────────────────────────
    if cli.print {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(session.output().as_bytes())
            .context("Failed to write to stdout")?;
        if !session.output().ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if let Some(ref md_path) = cli.markdown {
        save_markdown(session.output(), md_path).context("Failed to save Markdown")?;
        if !cli.quiet {
            eprintln!("   Markdown  →  {}", bold(&md_path.display().to_string()));
        }
    }

    export(&cli, &palette, session.output(), &output_path, &config.document_title)
}

/// Layer CLI overrides on top of config.json.
fn build_config(cli: &Cli) -> Result<AppConfig> {
    let loaded = AppConfig::load(&cli.config).context("Failed to load config")?;
    let mut builder = AppConfigBuilder::from_config(loaded);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(theme) = cli.theme {
        builder = builder.theme(theme.into());
    }
    if let Some(ref title) = cli.title {
        builder = builder.document_title(title.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(lib.clone());
    }

    builder.build().context("Invalid configuration")
}

/// Map `--oversize` to a truncation policy.
fn oversize_policy(arg: OversizeArg, budget: usize) -> Box<dyn TruncationPolicy> {
    match arg {
        OversizeArg::Truncate => Box::new(AlwaysTruncate),
        OversizeArg::Keep => Box::new(NeverTruncate),
        OversizeArg::Ask if io::stdin().is_terminal() => {
            Box::new(move |chars: usize| ask_truncate(chars, budget))
        }
        OversizeArg::Ask => {
            warn!("stdin is not a terminal; truncating oversized text");
            Box::new(AlwaysTruncate)
        }
    }
}

/// Ask on the terminal; anything but an explicit "n" accepts.
fn ask_truncate(chars: usize, budget: usize) -> bool {
    let default_budget = budget == policy::MAX_RAW_CHARS;
    let limit = if default_budget {
        "200k".to_string()
    } else {
        budget.to_string()
    };
    eprint!(
        "Loaded text is large ({chars} chars) and may exceed model limits. \
         Truncate to first {limit} chars? (recommended) [Y/n] "
    );
    io::stderr().flush().ok();

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return true;
    }
    !matches!(answer.trim().to_ascii_lowercase().as_str(), "n" | "no")
}

fn print_manifest(palette: &Palette, session: &NoteSession, report: &IngestReport, progress_shown: bool) {
    if !progress_shown {
        for entry in session.manifest().entries() {
            if entry.is_failed() {
                eprintln!("  {}", palette.err(&entry.to_string()));
            } else {
                eprintln!("  {}", entry);
            }
        }
    }

    let mark = if report.failed == 0 {
        palette.ok("✔")
    } else {
        palette.accent("⚠")
    };
    eprintln!(
        "{} Files loaded: {}  {}",
        mark,
        bold(&session.manifest().len().to_string()),
        dim(&format!(
            "({} failed, {} images, {} chars)",
            report.failed, report.images_added, report.text_chars
        )),
    );
    match report.oversize {
        OversizeOutcome::WithinBudget => {}
        OversizeOutcome::Truncated { from, to } => {
            eprintln!("   {}", dim(&format!("text truncated {from} → {to} chars")));
        }
        OversizeOutcome::KeptOversize { chars } => {
            eprintln!(
                "{} text is {} chars, over the budget; the model may reject it",
                palette.accent("⚠"),
                chars
            );
        }
    }
}

fn export(cli: &Cli, palette: &Palette, markdown: &str, path: &Path, title: &str) -> Result<()> {
    let summary = export_docx(markdown, path, title).context("Export failed")?;
    if !cli.quiet {
        eprintln!(
            "{}  {} nodes, {} tables  →  {}",
            palette.ok("✔"),
            summary.nodes,
            summary.tables,
            bold(&summary.path.display().to_string()),
        );
    }
    Ok(())
}
