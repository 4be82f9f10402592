//! Pipeline stages from input files to a saved study guide.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different text extractor or model transport)
//! without touching the other stages.
//!
//! ## Data Flow
//!
//! ```text
//! ingest ──▶ llm ──▶ postprocess ──▶ markdown ──▶ render
//! (files)   (model)  (cleanup)       (nodes)      (DOCX)
//!   ├─ pdf
//!   └─ encode
//! ```
//!
//! 1. [`ingest`]: classify each file and accumulate the text bundle, image
//!    payload and manifest; uses [`pdf`] for PDF text and [`encode`] for
//!    image downscaling
//! 2. [`llm`]: build the request and run the one network call; the only
//!    stage with network I/O
//! 3. [`postprocess`]: deterministic cleanup of the model's Markdown
//! 4. [`markdown`]: line automaton turning Markdown into document nodes
//! 5. [`render`]: write the nodes to a DOCX file atomically

pub mod encode;
pub mod ingest;
pub mod llm;
pub mod markdown;
pub mod pdf;
pub mod postprocess;
pub mod render;
