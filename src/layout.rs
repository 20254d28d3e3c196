//! Layout engine – fills a [`Sheet`] from merged rows in three passes.
//!
//! 1. **Cells** – one header row, then one row per merged record with every
//!    column's text resolved. Image and blank columns are empty placeholders.
//! 2. **Images** – composite columns with a resolvable base image get a
//!    banded composite; image columns get a thumbnail. Each embed widens its
//!    row and column to fit.
//! 3. **Sizing** – multi-line and composite cells wrap, rows grow to their
//!    line count and columns to their longest line, up to a maximum width.
//!
//! Images are placed before sizing so the sizing pass starts from the
//! dimensions the images demand.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::composite::{CompositeRenderer, RenderedImage};
use crate::error::{CellIssue, ReportError};
use crate::functions::FunctionRegistry;
use crate::merge::MergedRow;
use crate::schema::{Column, Schema, TextPosition};
use crate::sheet::Sheet;
use crate::text::TextRules;

/// Sizing constants, in the sheet's units (points for heights, character
/// widths for column widths).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    /// Embedded image height (px) → row height factor.
    pub image_height_factor: f64,
    /// Pixels per column-width unit for embedded images.
    pub pixels_per_width_unit: f64,
    /// Column width assumed when none has been set.
    pub min_column_width: f64,
    /// Upper bound on computed column widths.
    pub max_column_width: f64,
    /// Row height per text line.
    pub line_height: f64,
    /// Characters per column-width unit.
    pub chars_per_width_unit: f64,
    /// Width added to the longest line.
    pub width_padding: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            image_height_factor: 0.75,
            pixels_per_width_unit: 6.0,
            min_column_width: 10.0,
            max_column_width: 70.0,
            line_height: 15.0,
            chars_per_width_unit: 1.5,
            width_padding: 2.0,
        }
    }
}

/// What happened while rendering, for the run summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderStats {
    pub rows: usize,
    pub images: usize,
    pub issues: Vec<CellIssue>,
}

/// Drives the three layout passes for one schema.
pub struct LayoutEngine<'a> {
    schema: &'a Schema,
    functions: &'a FunctionRegistry,
    renderer: &'a CompositeRenderer,
    rules: &'a TextRules,
    options: &'a LayoutOptions,
}

impl<'a> LayoutEngine<'a> {
    pub fn new(
        schema: &'a Schema,
        functions: &'a FunctionRegistry,
        renderer: &'a CompositeRenderer,
        rules: &'a TextRules,
        options: &'a LayoutOptions,
    ) -> Self {
        Self {
            schema,
            functions,
            renderer,
            rules,
            options,
        }
    }

    /// Build the complete sheet for `rows`.
    pub fn build(&self, title: &str, rows: &[MergedRow]) -> Result<(Sheet, RenderStats), ReportError> {
        let mut sheet = Sheet::new(title);
        let mut stats = RenderStats::default();

        self.place_cells(&mut sheet, rows, &mut stats);
        self.place_images(&mut sheet, rows, &mut stats)?;
        self.fit_sizes(&mut sheet);

        stats.rows = rows.len();
        Ok((sheet, stats))
    }

    // ── Pass 1: cell values ───────────────────────────────────────────────

    fn place_cells(&self, sheet: &mut Sheet, rows: &[MergedRow], stats: &mut RenderStats) {
        sheet.append_row(self.schema.headers());
        for (i, row) in rows.iter().enumerate() {
            let sheet_row = i + 1;
            let values: Vec<String> = self
                .schema
                .columns
                .iter()
                .enumerate()
                .map(|(j, column)| self.cell_text(column, row, sheet_row, j, stats))
                .collect();
            sheet.append_row(values);
        }
    }

    /// Resolve the text for one cell.
    pub fn cell_text(
        &self,
        column: &Column,
        row: &MergedRow,
        sheet_row: usize,
        sheet_column: usize,
        stats: &mut RenderStats,
    ) -> String {
        match column {
            Column::Text {
                source,
                field,
                summarize,
                ..
            } => self.rules.transform(row.get(*source, field), field, *summarize),
            Column::Image { .. } | Column::Blank { .. } => String::new(),
            Column::Composite { texts, .. } => texts
                .iter()
                .filter_map(|c| {
                    self.rules.component(
                        row.resolve(&c.field),
                        &c.field.field,
                        c.summarize,
                        &c.prefix,
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Column::Computed { function, .. } => match self.functions.get(function) {
                Some(routine) => routine(row, self.rules).unwrap_or_default(),
                None => {
                    log::debug!("row {sheet_row}: no computed routine named {function:?}");
                    stats.issues.push(CellIssue::UnregisteredFunction {
                        row: sheet_row,
                        column: sheet_column,
                        function: function.clone(),
                    });
                    String::new()
                }
            },
        }
    }

    // ── Pass 2: images ────────────────────────────────────────────────────

    fn place_images(
        &self,
        sheet: &mut Sheet,
        rows: &[MergedRow],
        stats: &mut RenderStats,
    ) -> Result<(), ReportError> {
        for (i, row) in rows.iter().enumerate() {
            let sheet_row = i + 1;
            for (j, column) in self.schema.columns.iter().enumerate() {
                let (path, band) = match column {
                    Column::Composite {
                        image: Some(image),
                        text_position,
                        ..
                    } => (row.resolve(image), Some(*text_position)),
                    Column::Image { source, field, .. } => (row.get(*source, field), None),
                    _ => continue,
                };
                let Some(path) = path.non_blank().map(|p| PathBuf::from(p.trim())) else {
                    continue;
                };
                if !path.is_file() {
                    log::debug!("row {sheet_row}, column {j}: no image at '{}'", path.display());
                    stats.issues.push(CellIssue::AssetMissing {
                        row: sheet_row,
                        column: j,
                        path,
                    });
                    continue;
                }

                let rendered = match band {
                    Some(position) => self.render_composite(sheet, sheet_row, j, &path, position),
                    None => self.renderer.thumbnail_file(&path),
                };
                match rendered {
                    Ok(image) => {
                        if band.is_some() {
                            // The text now lives in the band.
                            sheet.set_text(sheet_row, j, "");
                        }
                        self.embed(sheet, sheet_row, j, image);
                        stats.images += 1;
                    }
                    Err(ReportError::Image(e)) => {
                        log::debug!("row {sheet_row}, column {j}: unreadable image: {e}");
                        stats.issues.push(CellIssue::ImageUnreadable {
                            row: sheet_row,
                            column: j,
                            path,
                            reason: e.to_string(),
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(())
    }

    fn render_composite(
        &self,
        sheet: &Sheet,
        row: usize,
        column: usize,
        path: &Path,
        position: TextPosition,
    ) -> Result<RenderedImage, ReportError> {
        let text = sheet.text(row, column);
        let lines: Vec<&str> = if text.is_empty() {
            Vec::new()
        } else {
            text.split('\n').collect()
        };
        self.renderer.render_file(path, &lines, position)
    }

    /// Anchor `image` and widen the row/column to at least its size.
    fn embed(&self, sheet: &mut Sheet, row: usize, column: usize, image: RenderedImage) {
        let opts = self.options;
        let height = image.height as f64 * opts.image_height_factor;
        let width = image.width as f64 / opts.pixels_per_width_unit;

        let row_height = sheet.row_height(row).unwrap_or(0.0).max(height);
        sheet.set_row_height(row, row_height);
        let column_width = sheet
            .column_width(column)
            .unwrap_or(opts.min_column_width)
            .max(width);
        sheet.set_column_width(column, column_width);

        sheet.embed_image(row, column, image);
    }

    // ── Pass 3: sizing ────────────────────────────────────────────────────

    fn fit_sizes(&self, sheet: &mut Sheet) {
        let opts = self.options;
        for (j, column) in self.schema.columns.iter().enumerate() {
            let mut longest_line = 0usize;
            for i in 0..sheet.row_count() {
                let (wrap, line_count, widest) = {
                    let text = sheet.text(i, j);
                    let widest = text.split('\n').map(|l| l.chars().count()).max().unwrap_or(0);
                    let line_count = if text.is_empty() { 1 } else { text.split('\n').count() };
                    (text.contains('\n') || column.is_composite(), line_count, widest)
                };
                longest_line = longest_line.max(widest);

                if wrap {
                    sheet.set_wrap(i, j, true);
                }
                if line_count > 1 {
                    let height = sheet
                        .row_height(i)
                        .unwrap_or(opts.line_height)
                        .max(line_count as f64 * opts.line_height);
                    sheet.set_row_height(i, height);
                }
            }

            let by_text = longest_line as f64 / opts.chars_per_width_unit + opts.width_padding;
            let width = sheet
                .column_width(j)
                .unwrap_or(opts.min_column_width)
                .max(by_text)
                .min(opts.max_column_width);
            sheet.set_column_width(j, width);
        }
    }
}
