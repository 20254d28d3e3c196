//! Error taxonomy for report generation.
//!
//! Fatal conditions are [`ReportError`] values and abort the run before any
//! output is written. Problems confined to a single cell are [`CellIssue`]s:
//! the cell degrades and the issue is collected into the render summary.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Structural problems in a template document.
///
/// Every column-level variant carries the zero-based index of the offending
/// column in the template's `columns` array.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("template is not a valid document: {0}")]
    Malformed(String),

    #[error("column {index}: unknown column kind {kind:?}")]
    UnknownKind { index: usize, kind: String },

    #[error("column {index} ({kind}): missing required `{field}`")]
    MissingField {
        index: usize,
        kind: &'static str,
        field: &'static str,
    },

    #[error("column {index}: unknown source {source_name:?} (expected `core` or `properties`)")]
    UnknownSource { index: usize, source_name: String },

    #[error("column {index} (composite): at least one component is required")]
    EmptyComposite { index: usize },

    #[error("column {index} (composite): expected exactly one image component, found {count}")]
    ImageComponentCount { index: usize, count: usize },

    #[error("column {index} (composite) component {component}: unknown component kind {kind:?}")]
    UnknownComponentKind {
        index: usize,
        component: usize,
        kind: String,
    },

    #[error("column {index} (composite) component {component}: missing required `field`")]
    ComponentMissingField { index: usize, component: usize },

    #[error("column {index} (composite): unknown text position {position:?}")]
    UnknownTextPosition { index: usize, position: String },

    #[error("column {index} (computed): no routine registered as {function:?}")]
    UnregisteredFunction { index: usize, function: String },
}

/// Crate-level error for a report run.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("required data source is missing: {0}")]
    DataSourceMissing(String),

    #[error("no compounds matched between `{core}` and `{properties}`")]
    EmptyResult { core: String, properties: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("layout error: {0}")]
    Layout(String),
}

/// A recoverable problem that degraded a single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellIssue {
    /// The referenced image file does not exist; the cell keeps its text only.
    AssetMissing {
        row: usize,
        column: usize,
        path: PathBuf,
    },
    /// The image file exists but could not be decoded.
    ImageUnreadable {
        row: usize,
        column: usize,
        path: PathBuf,
        reason: String,
    },
    /// A computed column names a routine the registry does not know.
    UnregisteredFunction {
        row: usize,
        column: usize,
        function: String,
    },
}

impl CellIssue {
    pub fn is_asset_issue(&self) -> bool {
        matches!(
            self,
            CellIssue::AssetMissing { .. } | CellIssue::ImageUnreadable { .. }
        )
    }
}

impl fmt::Display for CellIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellIssue::AssetMissing { row, column, path } => write!(
                f,
                "row {row}, column {column}: image not found at '{}'",
                path.display()
            ),
            CellIssue::ImageUnreadable {
                row,
                column,
                path,
                reason,
            } => write!(
                f,
                "row {row}, column {column}: could not read '{}': {reason}",
                path.display()
            ),
            CellIssue::UnregisteredFunction {
                row,
                column,
                function,
            } => write!(
                f,
                "row {row}, column {column}: no computed routine named {function:?}"
            ),
        }
    }
}
