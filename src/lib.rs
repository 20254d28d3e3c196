//! # reagent-forge – Template-driven compound report compiler
//!
//! This crate turns two relational tables describing chemical compounds into
//! a spreadsheet whose columns are declared by a user-authored template. The
//! pipeline stages are:
//!
//! 1. **Validate** – template JSON → typed columns ([`schema`])
//! 2. **Load** – core and wide-format property tables ([`table`], [`sqlite`])
//! 3. **Merge** – left join on the compound key ([`merge`])
//! 4. **Shape** – summarise, wrap and prefix cell text ([`text`], [`functions`])
//! 5. **Layout** – fill cells, embed banded images, size rows and columns
//!    ([`layout`], [`composite`], [`sheet`])
//! 6. **Write** – emit the `.xlsx` workbook ([`xlsx`])

pub mod composite;
pub mod error;
pub mod fonts;
pub mod functions;
pub mod layout;
pub mod merge;
pub mod pipeline;
pub mod schema;
pub mod sheet;
pub mod sqlite;
pub mod table;
pub mod templates;
pub mod text;
pub mod xlsx;

// Re-exports for convenience
pub use error::{CellIssue, ReportError, SchemaError};
pub use pipeline::{compile_report, generate_report, ReportConfig, ReportSummary};
pub use schema::Schema;
pub use sheet::Sheet;
