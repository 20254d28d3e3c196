//! Sheet – the in-memory document the layout engine builds and the workbook
//! writer persists. It is the single owner of output state for one report:
//! rows of cells, wrap flags, row heights, column widths and anchored images.
//!
//! Rows and columns are zero-based; row 0 is the header row.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::composite::RenderedImage;

/// One cell of text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub text: String,
    /// Wrap text on render (vertical centring comes with it).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub wrap: bool,
}

/// An image anchored at a cell's top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedImage {
    pub row: usize,
    pub column: usize,
    /// Pixel dimensions of the encoded image.
    pub width: u32,
    pub height: u32,
    /// PNG bytes (not part of the JSON dump).
    #[serde(skip)]
    pub png: Vec<u8>,
}

/// A single flat table with optional embedded images.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub title: String,
    rows: Vec<Vec<Cell>>,
    row_heights: BTreeMap<usize, f64>,
    column_widths: BTreeMap<usize, f64>,
    images: Vec<EmbeddedImage>,
}

impl Sheet {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Append a row of cell texts; returns its row index.
    pub fn append_row<I, S>(&mut self, values: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(
            values
                .into_iter()
                .map(|text| Cell {
                    text: text.into(),
                    wrap: false,
                })
                .collect(),
        );
        self.rows.len() - 1
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Text of a cell, empty when the cell does not exist.
    pub fn text(&self, row: usize, column: usize) -> &str {
        self.cell(row, column).map(|c| c.text.as_str()).unwrap_or("")
    }

    fn cell_mut(&mut self, row: usize, column: usize) -> Option<&mut Cell> {
        let cells = self.rows.get_mut(row)?;
        if cells.len() <= column {
            cells.resize(column + 1, Cell::default());
        }
        cells.get_mut(column)
    }

    /// Replace a cell's text. Does nothing for rows that were never appended.
    pub fn set_text(&mut self, row: usize, column: usize, text: impl Into<String>) {
        if let Some(cell) = self.cell_mut(row, column) {
            cell.text = text.into();
        }
    }

    pub fn set_wrap(&mut self, row: usize, column: usize, wrap: bool) {
        if let Some(cell) = self.cell_mut(row, column) {
            cell.wrap = wrap;
        }
    }

    pub fn row_height(&self, row: usize) -> Option<f64> {
        self.row_heights.get(&row).copied()
    }

    pub fn set_row_height(&mut self, row: usize, height: f64) {
        self.row_heights.insert(row, height);
    }

    pub fn row_heights(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.row_heights.iter().map(|(r, h)| (*r, *h))
    }

    pub fn column_width(&self, column: usize) -> Option<f64> {
        self.column_widths.get(&column).copied()
    }

    pub fn set_column_width(&mut self, column: usize, width: f64) {
        self.column_widths.insert(column, width);
    }

    pub fn column_widths(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.column_widths.iter().map(|(c, w)| (*c, *w))
    }

    /// Anchor an image at `(row, column)`.
    pub fn embed_image(&mut self, row: usize, column: usize, image: RenderedImage) {
        self.images.push(EmbeddedImage {
            row,
            column,
            width: image.width,
            height: image.height,
            png: image.png,
        });
    }

    pub fn images(&self) -> &[EmbeddedImage] {
        &self.images
    }

    /// Serialise to JSON (image bytes are left out).
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Deserialise from JSON.
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| e.to_string())
    }
}
