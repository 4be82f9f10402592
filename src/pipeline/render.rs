//! Document rendering: `DocumentNode` sequence → DOCX file.
//!
//! The renderer walks the reconstructed nodes once, in order, and emits the
//! matching Word constructs:
//!
//! | Node                     | DOCX                                        |
//! |--------------------------|---------------------------------------------|
//! | title (once, first)      | `Title` paragraph style                     |
//! | `Heading { level: 1 }`   | `Heading1` paragraph style                  |
//! | `Heading { level: 2 }`   | `Heading2` paragraph style                  |
//! | `Paragraph`              | plain paragraph                             |
//! | `ListItem`               | bullet or decimal numbering definition      |
//! | `Table`                  | bordered grid, bold header row when flagged |
//!
//! ## Why temp-file-then-rename?
//!
//! A crash or a full disk halfway through `pack` would otherwise leave a
//! truncated `.docx` at the user's chosen path that Word refuses to open.
//! Packing into a temp file in the target directory and
//! renaming it into place means the target either holds a complete document
//! or is untouched.

use crate::document::{self, DocumentNode};
use crate::error::NotesError;
use crate::persist::write_atomic;
use docx_rs::{
    AbstractNumbering, Docx, IndentLevel, Level, LevelJc, LevelText, NumberFormat, Numbering,
    NumberingId, Paragraph, Run, Start, Style, StyleType, Table, TableCell, TableRow,
};
use std::path::Path;
use tracing::{debug, info};

const TITLE_STYLE: &str = "Title";
const HEADING1_STYLE: &str = "Heading1";
const HEADING2_STYLE: &str = "Heading2";

const BULLET_NUMBERING: usize = 1;
const DECIMAL_NUMBERING: usize = 2;

/// Usable width of an A4 page with default margins, in twips.
const TEXT_WIDTH_TWIPS: usize = 9_000;

/// Build an in-memory DOCX for `nodes`, headed by `title`.
pub fn render_document(nodes: &[DocumentNode], title: &str) -> Docx {
    let mut docx = with_styles(Docx::new())
        .add_paragraph(styled_paragraph(title, TITLE_STYLE));

    for node in nodes {
        docx = match node {
            DocumentNode::Heading { level, text } => {
                let style = if *level <= 1 { HEADING1_STYLE } else { HEADING2_STYLE };
                docx.add_paragraph(styled_paragraph(text, style))
            }
            DocumentNode::Paragraph(text) => docx.add_paragraph(plain_paragraph(text)),
            DocumentNode::ListItem { text, ordered } => {
                let id = if *ordered { DECIMAL_NUMBERING } else { BULLET_NUMBERING };
                docx.add_paragraph(
                    plain_paragraph(text).numbering(NumberingId::new(id), IndentLevel::new(0)),
                )
            }
            DocumentNode::Table(table) => docx.add_table(render_table(table)),
        };
    }

    debug!("Rendered {} nodes under title '{}'", nodes.len(), title);
    docx
}

/// Pack `docx` and move it into place at `path`.
///
/// On any failure no file is left at `path`.
pub fn save_docx(docx: Docx, path: &Path) -> Result<(), NotesError> {
    write_atomic(path, |file| {
        docx.build()
            .pack(file)
            .map_err(|e| format!("pack: {e}"))?;
        Ok(())
    })?;

    info!("Saved {}", path.display());
    Ok(())
}

// ── Styles and numbering ─────────────────────────────────────────────────

fn with_styles(docx: Docx) -> Docx {
    docx.add_style(
        Style::new(TITLE_STYLE, StyleType::Paragraph)
            .name("Title")
            .size(48)
            .bold(),
    )
    .add_style(
        Style::new(HEADING1_STYLE, StyleType::Paragraph)
            .name("Heading 1")
            .size(32)
            .bold(),
    )
    .add_style(
        Style::new(HEADING2_STYLE, StyleType::Paragraph)
            .name("Heading 2")
            .size(26)
            .bold(),
    )
    .add_abstract_numbering(
        AbstractNumbering::new(BULLET_NUMBERING).add_level(Level::new(
            0,
            Start::new(1),
            NumberFormat::new("bullet"),
            LevelText::new("•"),
            LevelJc::new("left"),
        )),
    )
    .add_abstract_numbering(
        AbstractNumbering::new(DECIMAL_NUMBERING).add_level(Level::new(
            0,
            Start::new(1),
            NumberFormat::new("decimal"),
            LevelText::new("%1."),
            LevelJc::new("left"),
        )),
    )
    .add_numbering(Numbering::new(BULLET_NUMBERING, BULLET_NUMBERING))
    .add_numbering(Numbering::new(DECIMAL_NUMBERING, DECIMAL_NUMBERING))
}

// ── Nodes ────────────────────────────────────────────────────────────────

fn plain_paragraph(text: &str) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(text))
}

fn styled_paragraph(text: &str, style: &str) -> Paragraph {
    plain_paragraph(text).style(style)
}

fn render_table(table: &document::Table) -> Table {
    let cols = table.column_count().max(1);
    let rows: Vec<TableRow> = table
        .rows
        .iter()
        .enumerate()
        .map(|(r, row)| {
            let bold = table.is_header_row(r);
            let cells = (0..cols)
                .map(|c| {
                    let text = row.get(c).map(String::as_str).unwrap_or("");
                    let mut run = Run::new().add_text(text);
                    if bold {
                        run = run.bold();
                    }
                    TableCell::new().add_paragraph(Paragraph::new().add_run(run))
                })
                .collect();
            TableRow::new(cells)
        })
        .collect();

    Table::new(rows).set_grid(vec![TEXT_WIDTH_TWIPS / cols; cols])
}
