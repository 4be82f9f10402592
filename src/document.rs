//! Document tree produced by the markdown reconstructor.

use serde::{Deserialize, Serialize};

/// One block of the reconstructed study document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentNode {
    /// `##` maps to level 1, `###` to level 2.
    Heading { level: u8, text: String },
    Paragraph(String),
    ListItem { text: String, ordered: bool },
    Table(Table),
}

impl DocumentNode {
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        DocumentNode::Heading {
            level,
            text: text.into(),
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        DocumentNode::Paragraph(text.into())
    }

    pub fn list_item(text: impl Into<String>, ordered: bool) -> Self {
        DocumentNode::ListItem {
            text: text.into(),
            ordered,
        }
    }
}

/// A pipe table. Every row holds exactly [`Table::column_count`] cells.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
    /// Row 0 is a header (a separator row followed it in the source).
    pub has_header: bool,
}

impl Table {
    /// Build a table from possibly ragged rows, padding short rows with empty
    /// cells up to the widest row.
    pub fn from_ragged(mut rows: Vec<Vec<String>>, has_header: bool) -> Self {
        let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(cols, String::new());
        }
        Self { rows, has_header }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    /// Whether the cell at `row` should be rendered bold.
    pub fn is_header_row(&self, row: usize) -> bool {
        self.has_header && row == 0
    }
}
