//! Prompts for the study-guide generation call.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth**: changing the editorial rules (e.g. asking
//!    for a summary section) requires editing exactly one place.
//!
//! 2. **Testability**: unit tests can inspect prompts directly without a
//!    network call, and the markdown reconstructor's expectations (H2/H3
//!    categories, pipe tables) are kept in step with what the model is told.
//!
//! Callers can override the system instruction via
//! [`crate::config::AppConfig::system_instruction`]; the constant here is used
//! only when no override is provided.

/// Default system instruction for restructuring raw notes.
///
/// The heading levels requested here are exactly the two the reconstructor
/// recognises (`##` and `###`).
pub const SYSTEM_INSTRUCTION: &str = "Act as a professional Academic Editor. \
Your goal is to restructure the raw input into a Master Study Guide. \
1. SEGMENTATION: Organize content into distinct thematic categories. \
2. TABLES: You MUST use Markdown tables for any comparative data, dates, pros/cons, or formulas. \
3. FORMATTING: Use H2 (##) for Categories and H3 (###) for sub-topics. \
4. GLOSSARY: End with a glossary of key terms.";

/// Marker opening the raw text bundle inside the prompt.
pub const RAW_DATA_START: &str = "--- RAW DATA ---";

/// Marker closing the raw text bundle inside the prompt.
pub const RAW_DATA_END: &str = "--- END RAW DATA ---";

/// Build the user prompt wrapping the text bundle.
///
/// `instructions` is free text from the user and may be empty. `raw_text` is
/// the accumulated bundle; images travel as separate request parts.
pub fn build_prompt(instructions: &str, raw_text: &str) -> String {
    format!(
        "Restructure the following input into a categorized study guide with tables.\n\
         User Instructions: {instructions}\n\n\
         {RAW_DATA_START}\n{raw_text}\n{RAW_DATA_END}\n"
    )
}
