//! Configuration for ingestion, the model call and document export.
//!
//! All behaviour is controlled through [`AppConfig`], built via its
//! [`AppConfigBuilder`] or loaded from a `config.json` with
//! [`AppConfig::load`]. The file uses the flat upper-case keys below; the API
//! key falls back to the environment when the file does not provide one.
//!
//! ```json
//! {
//!   "GEMINI_API_KEY": "…",
//!   "GEMINI_MODEL": "gemini-2.0-flash",
//!   "APP_THEME": "Night Mode"
//! }
//! ```

use crate::error::NotesError;
use crate::policy::{JPEG_QUALITY, MAX_IMAGE_EDGE, MAX_RAW_CHARS};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Default REST base for the generative-language API.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default heading written at the top of every exported document.
pub const DEFAULT_DOCUMENT_TITLE: &str = "Study Guide";

const KEY_API_KEY: &str = "GEMINI_API_KEY";
const KEY_API_KEY_ALT: &str = "API_KEY";
const KEY_MODEL: &str = "GEMINI_MODEL";
const KEY_API_BASE: &str = "GEMINI_API_BASE";
const KEY_THEME: &str = "APP_THEME";

/// Configuration for a note-organizer session.
///
/// # Example
/// ```rust
/// use note_organizer::AppConfig;
///
/// let config = AppConfig::builder()
///     .api_key("secret")
///     .model("gemini-2.0-flash")
///     .max_raw_chars(50_000)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_raw_chars, 50_000);
/// ```
#[derive(Clone)]
pub struct AppConfig {
    /// API key for the generative model. Empty means "not configured".
    pub api_key: String,

    /// Model identifier, e.g. "gemini-2.0-flash". Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// REST base URL without a trailing slash. Default: [`DEFAULT_API_BASE`].
    pub api_base: String,

    /// Colour theme for the terminal front-end.
    pub theme: Theme,

    /// Timeout for the model call in seconds. Default: 120.
    pub request_timeout_secs: u64,

    /// Character budget for the text bundle. Default: 200 000.
    pub max_raw_chars: usize,

    /// Longest image edge in pixels. Default: 1200.
    pub max_image_edge: u32,

    /// JPEG quality (1–100) for re-encoded images. Default: 85.
    pub jpeg_quality: u8,

    /// Explicit path to a pdfium shared library. If None, the system library
    /// search path is used.
    pub pdfium_library_path: Option<PathBuf>,

    /// Heading written once at the top of exported documents.
    pub document_title: String,

    /// Custom system instruction. If None, uses the built-in default.
    pub system_instruction: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            theme: Theme::default(),
            request_timeout_secs: 120,
            max_raw_chars: MAX_RAW_CHARS,
            max_image_edge: MAX_IMAGE_EDGE,
            jpeg_quality: JPEG_QUALITY,
            pdfium_library_path: None,
            document_title: DEFAULT_DOCUMENT_TITLE.to_string(),
            system_instruction: None,
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field(
                "api_key",
                &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" },
            )
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("theme", &self.theme)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_raw_chars", &self.max_raw_chars)
            .field("max_image_edge", &self.max_image_edge)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("document_title", &self.document_title)
            .finish()
    }
}

impl AppConfig {
    /// Create a new builder for `AppConfig`.
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder {
            config: Self::default(),
        }
    }

    /// Load configuration from a JSON file, falling back to the environment.
    ///
    /// A missing file is not an error: defaults are used and the API key is
    /// looked up in `GEMINI_API_KEY`, then `API_KEY`. A present but malformed
    /// file is an error.
    pub fn load(path: &Path) -> Result<Self, NotesError> {
        let file = read_config_map(path)?;
        Ok(Self::from_sources(file.as_ref(), |k| std::env::var(k).ok()))
    }

    /// Resolve a configuration from an optional parsed file and an
    /// environment lookup. Split out of [`AppConfig::load`] for testing.
    pub(crate) fn from_sources(
        file: Option<&Map<String, Value>>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let file_str = |key: &str| -> Option<String> {
            file.and_then(|m| m.get(key))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let env_str = |key: &str| env(key).filter(|s| !s.trim().is_empty());

        let api_key = file_str(KEY_API_KEY)
            .or_else(|| file_str(KEY_API_KEY_ALT))
            .or_else(|| env_str(KEY_API_KEY))
            .or_else(|| env_str(KEY_API_KEY_ALT))
            .unwrap_or_default();

        let mut config = Self {
            api_key,
            ..Self::default()
        };
        if let Some(model) = file_str(KEY_MODEL) {
            config.model = model;
        }
        if let Some(base) = file_str(KEY_API_BASE) {
            config.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(name) = file_str(KEY_THEME) {
            match Theme::from_name(&name) {
                Some(theme) => config.theme = theme,
                None => warn!("Unknown theme '{}' in config; using {}", name, config.theme),
            }
        }
        config
    }

    /// Fail with [`NotesError::ApiKeyMissing`] unless an API key is set.
    pub fn require_api_key(&self) -> Result<&str, NotesError> {
        if self.api_key.trim().is_empty() {
            Err(NotesError::ApiKeyMissing)
        } else {
            Ok(&self.api_key)
        }
    }
}

/// Persist the theme preference into an existing config file.
///
/// Other keys are preserved. When the file does not exist nothing is written
/// and `Ok(false)` is returned.
pub fn save_theme(path: &Path, theme: Theme) -> Result<bool, NotesError> {
    let Some(mut map) = read_config_map(path)? else {
        debug!("No config at {}; theme not persisted", path.display());
        return Ok(false);
    };
    map.insert(KEY_THEME.to_string(), Value::String(theme.name().to_string()));

    let body = serde_json::to_string_pretty(&Value::Object(map)).map_err(|e| {
        NotesError::ConfigWrite {
            path: path.to_path_buf(),
            detail: e.to_string(),
        }
    })?;
    std::fs::write(path, body).map_err(|e| NotesError::ConfigWrite {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    Ok(true)
}

fn read_config_map(path: &Path) -> Result<Option<Map<String, Value>>, NotesError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("config.json not found at {}", path.display());
            return Ok(None);
        }
        Err(source) => {
            return Err(NotesError::ConfigRead {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(_) => Err(NotesError::ConfigParse {
            path: path.to_path_buf(),
            detail: "top level must be an object".into(),
        }),
        Err(e) => Err(NotesError::ConfigParse {
            path: path.to_path_buf(),
            detail: e.to_string(),
        }),
    }
}

/// Builder for [`AppConfig`].
#[derive(Debug)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    /// Start from an existing configuration (e.g. one loaded from disk).
    pub fn from_config(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn theme(mut self, theme: Theme) -> Self {
        self.config.theme = theme;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn max_raw_chars(mut self, n: usize) -> Self {
        self.config.max_raw_chars = n;
        self
    }

    pub fn max_image_edge(mut self, px: u32) -> Self {
        self.config.max_image_edge = px;
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn document_title(mut self, title: impl Into<String>) -> Self {
        self.config.document_title = title.into();
        self
    }

    pub fn system_instruction(mut self, text: impl Into<String>) -> Self {
        self.config.system_instruction = Some(text.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AppConfig, NotesError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(NotesError::InvalidConfig("model must not be empty".into()));
        }
        if c.max_raw_chars == 0 {
            return Err(NotesError::InvalidConfig(
                "max_raw_chars must be ≥ 1".into(),
            ));
        }
        if c.max_image_edge == 0 {
            return Err(NotesError::InvalidConfig(
                "max_image_edge must be ≥ 1".into(),
            ));
        }
        if c.request_timeout_secs == 0 {
            return Err(NotesError::InvalidConfig(
                "request timeout must be ≥ 1s".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Terminal colour theme. Serialised with the display names used in
/// `config.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    #[serde(rename = "Day Mode")]
    Day,
    #[serde(rename = "Night Mode")]
    Night,
}

impl Theme {
    pub fn name(self) -> &'static str {
        match self {
            Theme::Day => "Day Mode",
            Theme::Night => "Night Mode",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "Day Mode" => Some(Theme::Day),
            "Night Mode" => Some(Theme::Night),
            _ => None,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
