//! Pipeline – ties together template validation, data loading, merging,
//! layout and workbook output into a single function call.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::composite::{CompositeRenderer, CompositeStyle};
use crate::error::{CellIssue, ReportError};
use crate::fonts::FontManager;
use crate::functions::FunctionRegistry;
use crate::layout::{LayoutEngine, LayoutOptions, RenderStats};
use crate::merge::{left_join, sample_rows, SampleOptions};
use crate::schema::Schema;
use crate::sheet::Sheet;
use crate::sqlite::SqliteStore;
use crate::table::{Table, TableSource};
use crate::text::TextRules;
use crate::xlsx::{render_workbook, write_atomic};

/// How loudly recoverable image problems are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Debug-level log only; left out of the summary.
    Silent,
    /// Warning per cell and listed in the summary.
    #[default]
    Warn,
}

/// Configuration for a report run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Compounds database (default: "compounds.db").
    pub database: PathBuf,
    /// Template to render; required by [`generate_report`].
    pub template: Option<PathBuf>,
    /// Directory searched by [`list_templates`] (default: "templates").
    pub template_dir: PathBuf,
    /// Workbook path (default: "compound_report.xlsx").
    pub output: PathBuf,
    /// Core table, one row per compound.
    pub core_table: String,
    /// Wide-format properties table.
    pub properties_table: String,
    /// Long-format `(key, property_name, property_value)` table pivoted when
    /// the wide table is absent.
    pub long_properties_table: String,
    /// Join key shared by both tables.
    pub key: String,
    /// Worksheet name.
    pub sheet_title: String,
    /// Bounded test export; `None` renders every row.
    pub sample: Option<SampleOptions>,
    /// Preferred TrueType font for composite bands.
    pub font: Option<PathBuf>,
    /// Also write the finished sheet as JSON here.
    pub layout_dump: Option<PathBuf>,
    pub text: TextRules,
    pub layout: LayoutOptions,
    pub composite: CompositeStyle,
    pub missing_assets: Severity,
    /// Reject templates naming unregistered computed routines.
    pub strict_functions: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("compounds.db"),
            template: None,
            template_dir: PathBuf::from("templates"),
            output: PathBuf::from("compound_report.xlsx"),
            core_table: "compounds".to_string(),
            properties_table: "compound_properties_wide".to_string(),
            long_properties_table: "properties".to_string(),
            key: "cid".to_string(),
            sheet_title: "Reagent Table".to_string(),
            sample: None,
            font: None,
            layout_dump: None,
            text: TextRules::default(),
            layout: LayoutOptions::default(),
            composite: CompositeStyle::default(),
            missing_assets: Severity::Warn,
            strict_functions: false,
        }
    }
}

impl ReportConfig {
    /// Load a config file; fields it leaves out keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ReportError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            ReportError::Config(format!("cannot read '{}': {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| ReportError::Config(format!("'{}': {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no run can honour.
    pub fn validate(&self) -> Result<(), ReportError> {
        if self.sample.is_some_and(|s| s.size == 0) {
            return Err(ReportError::Config(
                "sample size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSummary {
    pub output: PathBuf,
    pub bytes: usize,
    pub rows: usize,
    pub images: usize,
    /// Degraded cells, filtered by the configured severity.
    pub issues: Vec<CellIssue>,
}

/// Load the core and properties tables from any table source.
pub fn load_tables(
    store: &dyn TableSource,
    config: &ReportConfig,
) -> Result<(Table, Table), ReportError> {
    let core = store.read_table(&config.core_table)?;
    let properties = if store.has_table(&config.properties_table)? {
        store.read_table(&config.properties_table)?
    } else if store.has_table(&config.long_properties_table)? {
        log::info!(
            "`{}` not found; pivoting `{}`",
            config.properties_table,
            config.long_properties_table
        );
        store
            .read_table(&config.long_properties_table)?
            .pivot_wide(
                &config.properties_table,
                &config.key,
                "property_name",
                "property_value",
            )?
    } else {
        return Err(ReportError::DataSourceMissing(format!(
            "table `{}`",
            config.properties_table
        )));
    };
    Ok((core, properties))
}

/// Compile a report into an in-memory sheet. No files are written; the
/// returned issues are already filtered by the configured severity.
pub fn compile_report(
    schema: &Schema,
    core: &Table,
    properties: &Table,
    config: &ReportConfig,
    functions: &FunctionRegistry,
) -> Result<(Sheet, RenderStats), ReportError> {
    config.validate()?;
    schema.check_functions(functions, config.strict_functions)?;

    let mut rows = left_join(core, properties, &config.key)?;
    if let Some(sample) = config.sample {
        rows = sample_rows(rows, sample);
    }

    let renderer = CompositeRenderer::new(
        FontManager::load(config.font.as_deref()),
        config.composite.clone(),
    );
    let fonts = renderer.fonts();
    match fonts.origin() {
        Some(path) if fonts.has_real_font() => log::debug!("band font: '{}'", path.display()),
        _ => log::debug!("band font: built-in glyphs"),
    }
    let engine = LayoutEngine::new(schema, functions, &renderer, &config.text, &config.layout);
    let (sheet, mut stats) = engine.build(&config.sheet_title, &rows)?;

    stats.issues = report_issues(std::mem::take(&mut stats.issues), config.missing_assets);
    Ok((sheet, stats))
}

/// Full pipeline: template + database → workbook on disk.
///
/// Every fatal check (template, tables, join) runs before the workbook is
/// written, so a failed run leaves no output behind.
pub fn generate_report(config: &ReportConfig) -> Result<ReportSummary, ReportError> {
    let template = config
        .template
        .as_deref()
        .ok_or_else(|| ReportError::DataSourceMissing("no template selected".to_string()))?;
    let schema = Schema::from_file(template)?;
    log::info!(
        "template '{}' validated ({} columns)",
        template.display(),
        schema.len()
    );

    let store = SqliteStore::open(&config.database)?;
    log::info!("loading tables from '{}'", store.path().display());
    let (core, properties) = load_tables(&store, config)?;

    let functions = FunctionRegistry::builtin();
    let (sheet, stats) = compile_report(&schema, &core, &properties, config, &functions)?;

    // The dump is removed again when the workbook cannot be written.
    let workbook = render_workbook(&sheet)?;
    if let Some(dump) = &config.layout_dump {
        write_atomic(dump, sheet.to_json().as_bytes())?;
        log::info!("layout written to '{}'", dump.display());
    }
    if let Err(e) = write_atomic(&config.output, &workbook) {
        if let Some(dump) = &config.layout_dump {
            let _ = std::fs::remove_file(dump);
        }
        return Err(e);
    }
    log::info!(
        "wrote '{}' using template '{}'",
        config.output.display(),
        template.display()
    );

    Ok(ReportSummary {
        output: config.output.clone(),
        bytes: workbook.len(),
        rows: stats.rows,
        images: stats.images,
        issues: stats.issues,
    })
}

/// Log each issue at its severity and keep the ones worth summarising.
fn report_issues(issues: Vec<CellIssue>, asset_severity: Severity) -> Vec<CellIssue> {
    issues
        .into_iter()
        .filter(|issue| {
            if issue.is_asset_issue() && asset_severity == Severity::Silent {
                log::debug!("{issue}");
                false
            } else {
                log::warn!("{issue}");
                true
            }
        })
        .collect()
}

/// Sorted `.json` templates in `dir`.
pub fn list_templates(dir: &Path) -> Result<Vec<PathBuf>, ReportError> {
    if !dir.is_dir() {
        return Err(ReportError::DataSourceMissing(format!(
            "template directory '{}'",
            dir.display()
        )));
    }
    let mut templates: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "json"))
        .collect();
    if templates.is_empty() {
        return Err(ReportError::DataSourceMissing(format!(
            "templates in '{}'",
            dir.display()
        )));
    }
    templates.sort();
    Ok(templates)
}
