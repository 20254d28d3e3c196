//! Integration tests for the report pipeline.
//!
//! These tests validate:
//! - Templates validate into the expected columns
//! - Merged rows land in the sheet in core order
//! - Text shaping, hazard summaries and computed columns
//! - Image columns degrade gracefully when assets are missing
//! - A full run against a SQLite database writes a valid workbook

use std::path::Path;

use reagent_forge::error::{CellIssue, ReportError, SchemaError};
use reagent_forge::functions::FunctionRegistry;
use reagent_forge::merge::SampleOptions;
use reagent_forge::pipeline::{compile_report, generate_report, ReportConfig, Severity};
use reagent_forge::schema::{Column, Schema};
use reagent_forge::sheet::Sheet;
use reagent_forge::table::{Table, Value};
use reagent_forge::templates;

// =====================================================================
// Helper
// =====================================================================

fn default_config() -> ReportConfig {
    ReportConfig::default()
}

fn core_table(rows: Vec<Vec<Value>>) -> Table {
    Table::from_rows(
        "compounds",
        ["cid", "name", "formula", "molecular_weight", "image_path"],
        rows,
    )
}

fn compound(cid: i64, name: &str, image: &str) -> Vec<Value> {
    vec![
        Value::Integer(cid),
        Value::text(name),
        Value::text("C3H6O"),
        Value::Real(58.08),
        Value::text(image),
    ]
}

fn compile(template: &str, core: &Table, props: &Table, config: &ReportConfig) -> Sheet {
    let schema = Schema::from_json(template).expect("template should validate");
    let (sheet, _) = compile_report(&schema, core, props, config, &FunctionRegistry::builtin())
        .expect("report should compile");
    sheet
}

fn write_png(path: &Path, width: u32, height: u32) {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([20, 40, 60, 255]));
    img.save(path).expect("write png");
}

fn assert_valid_xlsx(bytes: &[u8]) {
    assert!(bytes.len() > 100, "workbook too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..2], b"PK", "missing zip header");
}

// =====================================================================
// Template validation tests
// =====================================================================

#[test]
fn bundled_templates_validate() {
    let schema = Schema::from_json(templates::default_template()).unwrap();
    assert_eq!(schema.len(), 5);
    assert!(schema.columns[1].is_composite());
    assert_eq!(
        schema.headers(),
        [
            "Chemical Name",
            "Structure and MW (g/mol)",
            "Purpose",
            "Remarks",
            "Hazards"
        ]
    );

    let clemson = Schema::from_json(templates::clemson_template()).unwrap();
    assert_eq!(clemson.len(), 5);
    assert!(matches!(clemson.columns[4], Column::Blank { .. }));
}

#[test]
fn unknown_column_kind_is_rejected() {
    let err = Schema::from_json(
        r#"{"columns": [{"type": "text", "header": "Name", "source": "core", "field": "name"},
                        {"type": "chart", "header": "Plot"}]}"#,
    )
    .unwrap_err();
    assert_eq!(
        err,
        SchemaError::UnknownKind {
            index: 1,
            kind: "chart".to_string()
        }
    );
}

#[test]
fn text_column_without_field_is_rejected() {
    let err = Schema::from_json(
        r#"{"columns": [{"type": "text", "header": "Name", "source": "core"}]}"#,
    )
    .unwrap_err();
    assert!(matches!(err, SchemaError::MissingField { index: 0, .. }));
}

#[test]
fn strict_functions_reject_unknown_routines() {
    let schema = Schema::from_json(
        r#"{"columns": [{"type": "computed", "header": "X", "function": "no_such_routine"}]}"#,
    )
    .unwrap();
    let config = ReportConfig {
        strict_functions: true,
        ..default_config()
    };
    let core = core_table(vec![compound(1, "Acetone", "")]);
    let props = Table::from_rows("compound_properties_wide", ["cid"], vec![vec![Value::Integer(1)]]);
    let err = compile_report(&schema, &core, &props, &config, &FunctionRegistry::builtin())
        .unwrap_err();
    assert!(matches!(
        err,
        ReportError::Schema(SchemaError::UnregisteredFunction { .. })
    ));
}

// =====================================================================
// Sheet content tests
// =====================================================================

#[test]
fn blank_and_text_columns_fill_one_row_per_compound() {
    let template = r#"{"columns": [
        {"type": "text", "header": "Chemical Name", "source": "core", "field": "name"},
        {"type": "blank", "header": "Purpose"}
    ]}"#;
    let core = core_table(vec![
        compound(1, "Acetone", ""),
        compound(2, "Ethanol", ""),
        compound(3, "Benzene", ""),
    ]);
    let props = Table::from_rows("compound_properties_wide", ["cid"], Vec::<Vec<Value>>::new());
    let sheet = compile(template, &core, &props, &default_config());

    assert_eq!(sheet.row_count(), 4);
    assert_eq!(sheet.column_count(), 2);
    assert_eq!(sheet.text(0, 0), "Chemical Name");
    assert_eq!(sheet.text(0, 1), "Purpose");
    assert_eq!(sheet.text(1, 0), "Acetone");
    assert_eq!(sheet.text(3, 0), "Benzene");
    for row in 1..4 {
        assert_eq!(sheet.text(row, 1), "");
    }
}

#[test]
fn acetone_properties_flow_into_cells() {
    let template = r#"{"columns": [
        {"type": "text", "header": "Chemical Name", "source": "core", "field": "name"},
        {"type": "computed", "header": "Hazards", "function": "generate_hazards_summary"}
    ]}"#;
    let core = core_table(vec![compound(180, "Acetone", "")]);
    let props = Table::from_rows(
        "compound_properties_wide",
        ["cid", "Corrosivity"],
        vec![vec![Value::Integer(180), Value::text("Mild")]],
    );
    let sheet = compile(template, &core, &props, &default_config());

    assert_eq!(sheet.text(1, 0), "Acetone");
    assert_eq!(sheet.text(1, 1), "Corrosivity: Mild");
}

#[test]
fn hazard_statements_are_bulleted_and_capped() {
    let template = r#"{"columns": [
        {"type": "text", "header": "Hazards", "source": "properties", "field": "GHS Hazard Statements"}
    ]}"#;
    let core = core_table(vec![compound(1, "Acetone", "")]);
    let props = Table::from_rows(
        "compound_properties_wide",
        ["cid", "GHS Hazard Statements"],
        vec![vec![
            Value::Integer(1),
            Value::text("H225; H302; H315; H319; H335; H336; H373"),
        ]],
    );
    let sheet = compile(template, &core, &props, &default_config());

    let lines: Vec<&str> = sheet.text(1, 0).split('\n').collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0], "• H225");
    assert_eq!(lines[4], "• H335");
    assert_eq!(lines[5], "...");
    assert!(sheet.cell(1, 0).unwrap().wrap);
    assert!(sheet.row_height(1).unwrap() >= 6.0 * 15.0);
}

#[test]
fn long_text_wraps_without_losing_tokens() {
    let template = r#"{"columns": [
        {"type": "text", "header": "Description", "source": "properties", "field": "Description"}
    ]}"#;
    let words: Vec<String> = (1..=32).map(|i| format!("w{i}")).collect();
    let core = core_table(vec![compound(1, "Acetone", "")]);
    let props = Table::from_rows(
        "compound_properties_wide",
        ["cid", "Description"],
        vec![vec![Value::Integer(1), Value::text(words.join(" "))]],
    );
    let sheet = compile(template, &core, &props, &default_config());

    let text = sheet.text(1, 0);
    assert_eq!(text.split('\n').count(), 3);
    let tokens: Vec<&str> = text.split_whitespace().collect();
    assert_eq!(tokens, words.iter().map(String::as_str).collect::<Vec<_>>());
    assert!(sheet.column_width(0).unwrap() <= 70.0);
}

#[test]
fn multiline_cells_rewrap_on_total_tokens() {
    let template = r#"{"columns": [
        {"type": "text", "header": "Description", "source": "properties", "field": "Description"},
        {"type": "text", "header": "Hazards", "source": "properties", "field": "GHS Hazard Statements"}
    ]}"#;
    let core = core_table(vec![compound(1, "Acetone", "")]);
    let props = Table::from_rows(
        "compound_properties_wide",
        ["cid", "Description", "GHS Hazard Statements"],
        vec![vec![
            Value::Integer(1),
            Value::text("a b c d e f g h i j\nk l m n o p q r s t"),
            Value::text(
                "H225 flammable liquid; H319 eye irritant; H336 drowsy dizzy; \
                 H302 harmful swallowed; H315 skin irritant",
            ),
        ]],
    );
    let sheet = compile(template, &core, &props, &default_config());

    for column in 0..2 {
        let counts: Vec<usize> = sheet
            .text(1, column)
            .split('\n')
            .map(|l| l.split_whitespace().count())
            .collect();
        assert_eq!(counts, [15, 5], "column {column}");
        assert!(sheet.cell(1, column).unwrap().wrap);
    }
    assert_eq!(sheet.row_height(1), Some(30.0));
}

#[test]
fn unmatched_compounds_keep_their_row() {
    let template = r#"{"columns": [
        {"type": "text", "header": "Name", "source": "core", "field": "name"},
        {"type": "text", "header": "Density", "source": "properties", "field": "Density"}
    ]}"#;
    let core = core_table(vec![
        compound(1, "Acetone", ""),
        compound(2, "Ethanol", ""),
        compound(3, "Benzene", ""),
    ]);
    let props = Table::from_rows(
        "compound_properties_wide",
        ["cid", "Density"],
        vec![
            vec![Value::Integer(2), Value::text("0.789")],
            vec![Value::Integer(4), Value::text("1.0")],
        ],
    );
    let sheet = compile(template, &core, &props, &default_config());

    assert_eq!(sheet.row_count(), 4);
    assert_eq!(sheet.text(1, 1), "");
    assert_eq!(sheet.text(2, 1), "0.789");
    assert_eq!(sheet.text(3, 1), "");
}

#[test]
fn sampling_is_reproducible() {
    let core = core_table(
        (1..=12)
            .map(|i| compound(i, &format!("Compound {i}"), ""))
            .collect(),
    );
    let props = Table::from_rows("compound_properties_wide", ["cid"], Vec::<Vec<Value>>::new());
    let config = ReportConfig {
        sample: Some(SampleOptions { size: 4, seed: 7 }),
        ..default_config()
    };

    let a = compile(templates::minimal_template(), &core, &props, &config);
    let b = compile(templates::minimal_template(), &core, &props, &config);
    assert_eq!(a.row_count(), 5);
    assert_eq!(a.rows(), b.rows());
}

#[test]
fn empty_core_table_is_an_error() {
    let schema = Schema::from_json(templates::minimal_template()).unwrap();
    let core = core_table(Vec::new());
    let props = Table::from_rows("compound_properties_wide", ["cid"], Vec::<Vec<Value>>::new());
    let err = compile_report(
        &schema,
        &core,
        &props,
        &default_config(),
        &FunctionRegistry::builtin(),
    )
    .unwrap_err();
    assert!(matches!(err, ReportError::EmptyResult { .. }));
}

// =====================================================================
// Image tests
// =====================================================================

#[test]
fn missing_image_leaves_text_and_records_issue() {
    let core = core_table(vec![compound(1, "Acetone", "/nonexistent/acetone.png")]);
    let props = Table::from_rows("compound_properties_wide", ["cid"], vec![vec![Value::Integer(1)]]);
    let schema = Schema::from_json(templates::default_template()).unwrap();
    let (sheet, stats) = compile_report(
        &schema,
        &core,
        &props,
        &default_config(),
        &FunctionRegistry::builtin(),
    )
    .unwrap();

    assert_eq!(stats.images, 0);
    assert!(sheet.images().is_empty());
    assert_eq!(sheet.text(1, 1), "MW: 58.08");
    assert!(stats
        .issues
        .iter()
        .any(|i| matches!(i, CellIssue::AssetMissing { row: 1, column: 1, .. })));

    let quiet = ReportConfig {
        missing_assets: Severity::Silent,
        ..default_config()
    };
    let (_, stats) =
        compile_report(&schema, &core, &props, &quiet, &FunctionRegistry::builtin()).unwrap();
    assert!(stats.issues.is_empty());
}

#[test]
fn composite_image_is_embedded_with_band() {
    let dir = tempfile::tempdir().unwrap();
    let png = dir.path().join("acetone.png");
    write_png(&png, 60, 40);

    let core = core_table(vec![compound(1, "Acetone", png.to_str().unwrap())]);
    let props = Table::from_rows("compound_properties_wide", ["cid"], vec![vec![Value::Integer(1)]]);
    let schema = Schema::from_json(templates::default_template()).unwrap();
    let (sheet, stats) = compile_report(
        &schema,
        &core,
        &props,
        &default_config(),
        &FunctionRegistry::builtin(),
    )
    .unwrap();

    assert_eq!(stats.images, 1);
    let embedded = &sheet.images()[0];
    assert_eq!((embedded.row, embedded.column), (1, 1));
    assert_eq!(embedded.width, 60);
    assert!(embedded.height > 40, "band should extend the image");
    assert_eq!(sheet.text(1, 1), "");
    assert!(sheet.row_height(1).unwrap() >= embedded.height as f64 * 0.75);
    assert!(sheet.column_width(1).unwrap() >= 10.0);
}

// =====================================================================
// End-to-end tests
// =====================================================================

fn seed_database(path: &Path, image: &Path) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE compounds (cid INTEGER, name TEXT, formula TEXT,
                                 molecular_weight REAL, image_path TEXT);
         CREATE TABLE compound_properties_wide (cid INTEGER, Corrosivity TEXT,
                                                \"GHS Hazard Statements\" TEXT);",
    )
    .unwrap();
    conn.execute(
        "INSERT INTO compounds VALUES (180, 'Acetone', 'C3H6O', 58.08, ?1)",
        [image.to_str().unwrap()],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO compounds VALUES (702, 'Ethanol', 'C2H6O', 46.07, NULL)",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO compound_properties_wide VALUES (180, 'Mild', 'H225; H319; H336')",
        [],
    )
    .unwrap();
}

#[test]
fn generate_report_writes_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("acetone.png");
    write_png(&image, 50, 30);
    let db = dir.path().join("compounds.db");
    seed_database(&db, &image);
    let template = dir.path().join("default.json");
    std::fs::write(&template, templates::default_template()).unwrap();

    let config = ReportConfig {
        database: db,
        template: Some(template),
        output: dir.path().join("out").join("report.xlsx"),
        layout_dump: Some(dir.path().join("layout.json")),
        ..default_config()
    };
    let summary = generate_report(&config).unwrap();

    assert_eq!(summary.rows, 2);
    assert_eq!(summary.images, 1);
    assert!(summary.issues.is_empty());
    let bytes = std::fs::read(&config.output).unwrap();
    assert_eq!(bytes.len(), summary.bytes);
    assert_valid_xlsx(&bytes);

    let dump = std::fs::read_to_string(dir.path().join("layout.json")).unwrap();
    let sheet = Sheet::from_json(&dump).unwrap();
    assert_eq!(sheet.text(1, 0), "Acetone");
    assert_eq!(sheet.text(2, 0), "Ethanol");
    assert_eq!(sheet.text(1, 4), "Corrosivity: Mild");
}

#[test]
fn failed_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("bad.json");
    std::fs::write(&template, r#"{"columns": [{"type": "chart"}]}"#).unwrap();
    let db = dir.path().join("compounds.db");
    seed_database(&db, &dir.path().join("missing.png"));

    let config = ReportConfig {
        database: db.clone(),
        template: Some(template),
        output: dir.path().join("report.xlsx"),
        ..default_config()
    };
    assert!(matches!(
        generate_report(&config),
        Err(ReportError::Schema(SchemaError::UnknownKind { .. }))
    ));
    assert!(!config.output.exists());

    let config = ReportConfig {
        database: dir.path().join("absent.db"),
        template: config.template.clone(),
        output: config.output.clone(),
        ..default_config()
    };
    std::fs::write(config.template.as_ref().unwrap(), templates::minimal_template()).unwrap();
    assert!(matches!(
        generate_report(&config),
        Err(ReportError::DataSourceMissing(_))
    ));
    assert!(!config.output.exists());
}

#[test]
fn failed_layout_dump_writes_no_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("compounds.db");
    seed_database(&db, &dir.path().join("missing.png"));
    let template = dir.path().join("minimal.json");
    std::fs::write(&template, templates::minimal_template()).unwrap();
    // An existing directory where the dump should go.
    let dump = dir.path().join("layout.json");
    std::fs::create_dir(&dump).unwrap();
    std::fs::write(dump.join("keep"), b"x").unwrap();

    let config = ReportConfig {
        database: db,
        template: Some(template),
        output: dir.path().join("report.xlsx"),
        layout_dump: Some(dump),
        ..default_config()
    };
    assert!(matches!(generate_report(&config), Err(ReportError::Io(_))));
    assert!(!config.output.exists());
    assert!(!dir.path().join("report.xlsx.tmp").exists());
}
