//! Table grid.
//!
//! Rows hold cells; rows are not forced to the same width. Structural
//! deletes refuse to take the last row or the last column.

use super::Alignment;
use super::rich_text::RichText;
use crate::core::{RowId, fresh_id};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TableCell {
    pub content: RichText,
    pub align: Option<Alignment>,
    pub col_span: Option<u32>,
    pub row_span: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub id: RowId,
    pub cells: Vec<TableCell>,
}

impl TableRow {
    pub fn with_width(width: usize) -> Self {
        Self {
            id: fresh_id(),
            cells: vec![TableCell::default(); width],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub with_headings: bool,
    rows: Vec<TableRow>,
}

impl Default for Table {
    fn default() -> Self {
        Self::new(3, 3)
    }
}

impl Table {
    /// A grid of empty cells. Zero dimensions are raised to one.
    pub fn new(rows: usize, columns: usize) -> Self {
        let columns = columns.max(1);
        Self {
            with_headings: false,
            rows: (0..rows.max(1)).map(|_| TableRow::with_width(columns)).collect(),
        }
    }

    /// Builds a table from existing rows; an empty row list becomes one
    /// empty cell, and empty rows get one cell.
    pub fn from_rows(with_headings: bool, rows: Vec<TableRow>) -> Self {
        let mut rows = rows;
        if rows.is_empty() {
            rows.push(TableRow::with_width(1));
        }
        for row in &mut rows {
            if row.cells.is_empty() {
                row.cells.push(TableCell::default());
            }
        }
        Self {
            with_headings,
            rows,
        }
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(|row| row.cells.len()).max().unwrap_or(0)
    }

    pub fn row_index(&self, id: RowId) -> Option<usize> {
        self.rows.iter().position(|row| row.id == id)
    }

    pub fn cell(&self, row: RowId, col: usize) -> Option<&TableCell> {
        self.rows
            .iter()
            .find(|candidate| candidate.id == row)
            .and_then(|row| row.cells.get(col))
    }

    pub fn cell_mut(&mut self, row: RowId, col: usize) -> Option<&mut TableCell> {
        self.rows
            .iter_mut()
            .find(|candidate| candidate.id == row)
            .and_then(|row| row.cells.get_mut(col))
    }

    /// Inserts an empty row at `at` (appends when `None` or out of range).
    pub fn insert_row(&mut self, at: Option<usize>) -> RowId {
        let row = TableRow::with_width(self.column_count().max(1));
        let id = row.id;
        let index = at.unwrap_or(self.rows.len()).min(self.rows.len());
        self.rows.insert(index, row);
        id
    }

    pub fn delete_row(&mut self, index: usize) -> bool {
        if self.rows.len() <= 1 || index >= self.rows.len() {
            return false;
        }
        self.rows.remove(index);
        true
    }

    /// Inserts an empty cell at column `at` in every row.
    pub fn insert_column(&mut self, at: Option<usize>) {
        let width = self.column_count();
        let index = at.unwrap_or(width).min(width);
        for row in &mut self.rows {
            let position = index.min(row.cells.len());
            row.cells.insert(position, TableCell::default());
        }
    }

    pub fn delete_column(&mut self, index: usize) -> bool {
        let width = self.column_count();
        if width <= 1 || index >= width {
            return false;
        }
        for row in &mut self.rows {
            if index < row.cells.len() && row.cells.len() > 1 {
                row.cells.remove(index);
            }
        }
        true
    }

    /// A copy with fresh row ids.
    pub fn with_fresh_ids(&self) -> Self {
        let mut copy = self.clone();
        for row in &mut copy.rows {
            row.id = fresh_id();
        }
        copy
    }

    /// One line per row, cells separated by a tab.
    pub fn row_lines(&self) -> Vec<RichText> {
        self.rows
            .iter()
            .map(|row| {
                let mut line = RichText::new();
                for (index, cell) in row.cells.iter().enumerate() {
                    if index > 0 {
                        line.append(&RichText::plain("\t"));
                    }
                    line.append(&cell.content);
                }
                line
            })
            .collect()
    }
}
