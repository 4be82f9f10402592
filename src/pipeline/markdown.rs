//! Markdown reconstruction: model response text → [`DocumentNode`] sequence.
//!
//! Only the markdown subset the system prompt asks for is recognised:
//! `##`/`###` headings, `*`/`-` bullets, `N.` numbered items, pipe tables and
//! plain paragraphs. Everything else becomes a paragraph verbatim.
//!
//! Tables are handled by an explicit two-state automaton. While in
//! [`State::InTable`] rows accumulate in a buffer; any non-table line, or the
//! end of input, flushes the buffer into a single [`DocumentNode::Table`].

use crate::document::{DocumentNode, Table};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\|?\s*:?-+:?\s*(\|\s*:?-+:?\s*)*\|?\s*$").unwrap());

static RE_NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\s+").unwrap());

/// Reconstruct a document tree from markdown text.
///
/// Pure: the same input always yields the same nodes, in line order.
pub fn reconstruct(text: &str) -> Vec<DocumentNode> {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    let mut reconstructor = Reconstructor::new();
    for (i, line) in lines.iter().enumerate() {
        reconstructor.feed(line, lines.get(i + 1).copied());
    }
    reconstructor.finish()
}

/// Line-at-a-time reconstructor.
///
/// [`reconstruct`] drives this over a whole block; it is public so callers
/// that receive text incrementally can feed lines as they arrive. `next` is
/// the following line when known; it is only used to recognise tables
/// written without outer pipes (`A | B` followed by `---|---`). Rows without
/// a leading `|` continue a table only when its block opened that way too.
#[derive(Debug, Default)]
pub struct Reconstructor {
    state: State,
    nodes: Vec<DocumentNode>,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Normal,
    InTable(TableBuffer),
}

#[derive(Debug, Default)]
struct TableBuffer {
    rows: Vec<Vec<String>>,
    /// Table lines seen so far, separator rows included.
    lines_seen: usize,
    has_header: bool,
    /// Opened by a line without a leading `|`.
    bare: bool,
}

impl TableBuffer {
    fn opened_by(line: &str) -> Self {
        Self {
            bare: !line.starts_with('|'),
            ..Self::default()
        }
    }

    fn push_line(&mut self, line: &str) {
        self.lines_seen += 1;
        if is_separator_row(line) {
            // Only a separator directly under the first row marks a header.
            if self.lines_seen == 2 && self.rows.len() == 1 {
                self.has_header = true;
            }
            return;
        }
        self.rows.push(split_cells(line));
    }

    fn into_table(self) -> Option<Table> {
        if self.rows.is_empty() {
            return None;
        }
        Some(Table::from_ragged(self.rows, self.has_header))
    }
}

impl Reconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a table block is currently open.
    pub fn in_table(&self) -> bool {
        matches!(self.state, State::InTable(_))
    }

    fn is_table_line(&self, line: &str, next: Option<&str>) -> bool {
        match &self.state {
            State::InTable(buffer) => {
                is_piped_row(line)
                    || is_separator_row(line)
                    || (buffer.bare && is_bare_pipe_row(line))
            }
            State::Normal => {
                if is_piped_row(line) {
                    return true;
                }
                if is_separator_row(line) {
                    return next.is_some_and(|n| is_piped_row(n) || is_bare_pipe_row(n));
                }
                is_bare_pipe_row(line) && next.is_some_and(is_separator_row)
            }
        }
    }

    /// Consume one line (already right-trimmed or not; trailing whitespace
    /// is ignored).
    pub fn feed(&mut self, line: &str, next: Option<&str>) {
        let line = line.trim_end();

        if self.is_table_line(line, next.map(str::trim_end)) {
            if !self.in_table() {
                self.state = State::InTable(TableBuffer::opened_by(line));
            }
            if let State::InTable(buffer) = &mut self.state {
                buffer.push_line(line);
            }
            return;
        }

        self.flush_table();

        if line.trim().is_empty() {
            return;
        }
        self.nodes.push(classify_line(line));
    }

    /// Flush any open table and return the nodes in order.
    pub fn finish(mut self) -> Vec<DocumentNode> {
        self.flush_table();
        self.nodes
    }

    fn flush_table(&mut self) {
        if let State::InTable(buffer) = std::mem::take(&mut self.state) {
            if let Some(table) = buffer.into_table() {
                self.nodes.push(DocumentNode::Table(table));
            }
        }
    }
}

/// Classify a non-blank line outside a table.
fn classify_line(line: &str) -> DocumentNode {
    if let Some(rest) = line.strip_prefix("## ") {
        return DocumentNode::heading(1, rest.trim());
    }
    if let Some(rest) = line.strip_prefix("### ") {
        return DocumentNode::heading(2, rest.trim());
    }
    if let Some(rest) = line.strip_prefix("* ").or_else(|| line.strip_prefix("- ")) {
        return DocumentNode::list_item(rest, false);
    }
    if let Some(m) = RE_NUMBERED.find(line) {
        return DocumentNode::list_item(&line[m.end()..], true);
    }
    DocumentNode::paragraph(line)
}

/// `true` when the line starts with `|` and has another `|` after it.
fn is_piped_row(line: &str) -> bool {
    line.starts_with('|') && line[1..].contains('|')
}

/// A pipe-containing line that would otherwise be a plain paragraph.
fn is_bare_pipe_row(line: &str) -> bool {
    line.contains('|')
        && !line.trim().is_empty()
        && matches!(classify_line(line), DocumentNode::Paragraph(_))
}

/// Dash groups joined by `|`; a lone `---` without any pipe is not one.
fn is_separator_row(line: &str) -> bool {
    let t = line.trim();
    t.contains('|') && RE_SEPARATOR.is_match(t)
}

/// Split a table row into trimmed cells, ignoring one outer pipe per side.
fn split_cells(line: &str) -> Vec<String> {
    let t = line.trim();
    let t = t.strip_prefix('|').unwrap_or(t);
    let t = t.strip_suffix('|').unwrap_or(t);
    t.split('|').map(|c| c.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_at(nodes: &[DocumentNode], i: usize) -> &Table {
        match &nodes[i] {
            DocumentNode::Table(t) => t,
            other => panic!("expected table at {i}, got {other:?}"),
        }
    }

    #[test]
    fn headings_paragraphs_and_lists() {
        let nodes = reconstruct("## Topic\nSome text\n* item one\n1. first");
        assert_eq!(
            nodes,
            vec![
                DocumentNode::heading(1, "Topic"),
                DocumentNode::paragraph("Some text"),
                DocumentNode::list_item("item one", false),
                DocumentNode::list_item("first", true),
            ]
        );
    }

    #[test]
    fn h3_and_dash_bullets() {
        let nodes = reconstruct("### Sub\n- dash item\n12.   twelfth");
        assert_eq!(
            nodes,
            vec![
                DocumentNode::heading(2, "Sub"),
                DocumentNode::list_item("dash item", false),
                DocumentNode::list_item("twelfth", true),
            ]
        );
    }

    #[test]
    fn unsupported_constructs_are_paragraphs() {
        let nodes = reconstruct("# Title\n#### Deep\n1.no-space\n*emphasis*");
        assert!(nodes
            .iter()
            .all(|n| matches!(n, DocumentNode::Paragraph(_))));
        assert_eq!(nodes.len(), 4);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let nodes = reconstruct("\n\npara one\n   \n\npara two\n\n");
        assert_eq!(
            nodes,
            vec![
                DocumentNode::paragraph("para one"),
                DocumentNode::paragraph("para two"),
            ]
        );
    }

    #[test]
    fn bare_table_with_separator_has_header() {
        let nodes = reconstruct("A | B\n---|---\n1 | 2");
        assert_eq!(nodes.len(), 1);
        let t = table_at(&nodes, 0);
        assert_eq!(t.row_count(), 2);
        assert_eq!(t.column_count(), 2);
        assert!(t.has_header);
        assert!(t.is_header_row(0));
        assert_eq!(t.rows[0], vec!["A", "B"]);
        assert_eq!(t.rows[1], vec!["1", "2"]);
    }

    #[test]
    fn piped_table_with_alignment_separator() {
        let nodes = reconstruct("| Name | Year |\n|:---|---:|\n| Ada | 1843 |\n| Alan | 1936 |");
        let t = table_at(&nodes, 0);
        assert!(t.has_header);
        assert_eq!(t.row_count(), 3);
        assert_eq!(t.rows[2], vec!["Alan", "1936"]);
    }

    #[test]
    fn table_without_separator_has_no_header() {
        let nodes = reconstruct("| a | b |\n| c | d |");
        let t = table_at(&nodes, 0);
        assert!(!t.has_header);
        assert_eq!(t.row_count(), 2);
    }

    #[test]
    fn separator_later_in_block_is_dropped_without_header() {
        let nodes = reconstruct("| a | b |\n| c | d |\n|---|---|\n| e | f |");
        let t = table_at(&nodes, 0);
        assert!(!t.has_header);
        assert_eq!(t.row_count(), 3);
    }

    #[test]
    fn ragged_table_is_padded() {
        let nodes = reconstruct("A | B\n---|---\n1 | 2 | 3");
        let t = table_at(&nodes, 0);
        assert_eq!(t.column_count(), 3);
        assert_eq!(t.rows[0], vec!["A", "B", ""]);
        assert_eq!(t.rows[1], vec!["1", "2", "3"]);
    }

    #[test]
    fn ragged_piped_rows_are_padded() {
        let nodes = reconstruct("| A | B |\n| 1 | 2 | 3 |");
        let t = table_at(&nodes, 0);
        assert_eq!(t.column_count(), 3);
        assert_eq!(t.rows[0], vec!["A", "B", ""]);
    }

    #[test]
    fn prose_with_pipe_after_piped_table_is_a_paragraph() {
        let nodes = reconstruct("| a | b |\n|---|---|\n| 1 | 2 |\nChoose x | y when in doubt.");
        assert_eq!(nodes.len(), 2);
        let t = table_at(&nodes, 0);
        assert_eq!(t.rows, vec![vec!["a", "b"], vec!["1", "2"]]);
        assert_eq!(nodes[1], DocumentNode::paragraph("Choose x | y when in doubt."));
    }

    #[test]
    fn adjacent_prose_lines_with_pipes_are_paragraphs() {
        let nodes = reconstruct("Use a | b here.\nOr c | d there.");
        assert_eq!(
            nodes,
            vec![
                DocumentNode::paragraph("Use a | b here."),
                DocumentNode::paragraph("Or c | d there."),
            ]
        );
    }

    #[test]
    fn bare_table_continues_with_bare_rows_only_after_separator() {
        let nodes = reconstruct("A | B\n---|---\n1 | 2\n3 | 4\nplain text");
        assert_eq!(nodes.len(), 2);
        assert_eq!(table_at(&nodes, 0).row_count(), 3);
        assert_eq!(nodes[1], DocumentNode::paragraph("plain text"));
    }

    #[test]
    fn single_column_separator_marks_header() {
        let nodes = reconstruct("| Term |\n|---|\n| ATP |");
        let t = table_at(&nodes, 0);
        assert!(t.has_header);
        assert_eq!(t.rows, vec![vec!["Term"], vec!["ATP"]]);
    }

    #[test]
    fn lone_dash_rule_is_not_a_separator() {
        assert!(!is_separator_row("---"));
        assert!(is_separator_row("|---|"));
        assert!(is_separator_row(":--|--:"));
    }

    #[test]
    fn trailing_table_is_flushed_at_end_of_input() {
        let nodes = reconstruct("intro\n| x | y |\n|---|---|\n| 1 | 2 |");
        assert_eq!(nodes.len(), 2);
        assert_eq!(table_at(&nodes, 1).row_count(), 2);
    }

    #[test]
    fn table_is_flushed_by_following_line() {
        let nodes = reconstruct("| x | y |\n| 1 | 2 |\nafter\n## Next");
        assert_eq!(nodes.len(), 3);
        table_at(&nodes, 0);
        assert_eq!(nodes[1], DocumentNode::paragraph("after"));
        assert_eq!(nodes[2], DocumentNode::heading(1, "Next"));
    }

    #[test]
    fn blank_line_splits_two_tables() {
        let nodes = reconstruct("| a | b |\n\n| c | d |");
        assert_eq!(nodes.len(), 2);
        table_at(&nodes, 0);
        table_at(&nodes, 1);
    }

    #[test]
    fn lone_pipe_in_prose_stays_a_paragraph() {
        let nodes = reconstruct("Use a | b to pipe.\nNext sentence.");
        assert_eq!(
            nodes,
            vec![
                DocumentNode::paragraph("Use a | b to pipe."),
                DocumentNode::paragraph("Next sentence."),
            ]
        );
    }

    #[test]
    fn list_items_with_pipes_are_not_tables() {
        let nodes = reconstruct("- a | b\n- c | d");
        assert_eq!(
            nodes,
            vec![
                DocumentNode::list_item("a | b", false),
                DocumentNode::list_item("c | d", false),
            ]
        );
    }

    #[test]
    fn separator_only_block_emits_nothing() {
        let nodes = reconstruct("|---|---|\n|---|---|");
        assert!(nodes.is_empty());
    }

    #[test]
    fn reconstruct_is_deterministic() {
        let input = "## A\n| h | i |\n|---|---|\n| 1 | 2 |\n- x\n2. y";
        assert_eq!(reconstruct(input), reconstruct(input));
    }

    #[test]
    fn reconstructor_tracks_state_and_flushes_on_finish() {
        let mut r = Reconstructor::new();
        r.feed("| a | b |", None);
        assert!(r.in_table());
        r.feed("| 1 | 2 |", None);
        let nodes = r.finish();
        assert_eq!(nodes.len(), 1);
        assert_eq!(table_at(&nodes, 0).row_count(), 2);
    }

    #[test]
    fn trailing_whitespace_is_ignored() {
        let nodes = reconstruct("## Topic   \n| a | b |   \n|---|---|  \n| 1 | 2 |\t");
        assert_eq!(nodes[0], DocumentNode::heading(1, "Topic"));
        assert!(table_at(&nodes, 1).has_header);
    }

    #[test]
    fn split_cells_strips_outer_pipes_once() {
        assert_eq!(split_cells("| a | b |"), vec!["a", "b"]);
        assert_eq!(split_cells("a|b"), vec!["a", "b"]);
        assert_eq!(split_cells("| a || c |"), vec!["a", "", "c"]);
    }
}
