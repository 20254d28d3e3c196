//! reagent-forge – command-line compound report generator.
//!
//! Usage:
//!   reagent-forge --template templates/Clemson.json [--database compounds.db]
//!                 [--output compound_report.xlsx] [--sample] [--config report.json]
//!   reagent-forge --list-templates [--template-dir templates]

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use reagent_forge::pipeline::{generate_report, list_templates, ReportConfig, Severity};

#[derive(Parser)]
#[command(name = "reagent-forge")]
#[command(about = "Render compound tables into a spreadsheet report from a column template")]
struct Cli {
    /// JSON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Template to render
    #[arg(short, long)]
    template: Option<PathBuf>,

    /// Directory holding templates
    #[arg(long)]
    template_dir: Option<PathBuf>,

    /// Compounds database
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Output workbook
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TrueType font for image text bands
    #[arg(long)]
    font: Option<PathBuf>,

    /// Export a seeded random sample of compounds instead of all of them
    #[arg(long)]
    sample: bool,

    /// Sample size, at least 1 (implies --sample)
    #[arg(long)]
    sample_size: Option<NonZeroUsize>,

    /// Sample seed (implies --sample)
    #[arg(long)]
    seed: Option<u64>,

    /// Write the finished sheet layout as JSON
    #[arg(long)]
    dump_layout: Option<PathBuf>,

    /// Do not report missing or unreadable images
    #[arg(long)]
    quiet_assets: bool,

    /// Fail when a computed column names an unknown routine
    #[arg(long)]
    strict: bool,

    /// List available templates and exit
    #[arg(long)]
    list_templates: bool,
}

impl Cli {
    fn into_config(self) -> Result<ReportConfig, String> {
        let mut config = match &self.config {
            Some(path) => ReportConfig::from_json_file(path).map_err(|e| e.to_string())?,
            None => ReportConfig::default(),
        };

        if let Some(t) = self.template {
            config.template = Some(t);
        }
        if let Some(dir) = self.template_dir {
            config.template_dir = dir;
        }
        if let Some(db) = self.database {
            config.database = db;
        }
        if let Some(out) = self.output {
            config.output = out;
        }
        if let Some(font) = self.font {
            config.font = Some(font);
        }
        if let Some(dump) = self.dump_layout {
            config.layout_dump = Some(dump);
        }
        if self.sample || self.sample_size.is_some() || self.seed.is_some() {
            let mut sample = config.sample.unwrap_or_default();
            if let Some(size) = self.sample_size {
                sample.size = size.get();
            }
            if let Some(seed) = self.seed {
                sample.seed = seed;
            }
            config.sample = Some(sample);
        }
        if self.quiet_assets {
            config.missing_assets = Severity::Silent;
        }
        if self.strict {
            config.strict_functions = true;
        }
        config.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    let list = cli.list_templates;
    let config = match cli.into_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if list {
        return match list_templates(&config.template_dir) {
            Ok(templates) => {
                for (idx, path) in templates.iter().enumerate() {
                    println!("[{idx}] {}", path.display());
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    match generate_report(&config) {
        Ok(summary) => {
            eprintln!(
                "Wrote '{}' ({} bytes, {} compound{}, {} image{})",
                summary.output.display(),
                summary.bytes,
                summary.rows,
                if summary.rows == 1 { "" } else { "s" },
                summary.images,
                if summary.images == 1 { "" } else { "s" }
            );
            if !summary.issues.is_empty() {
                eprintln!("{} cell(s) degraded:", summary.issues.len());
                for issue in &summary.issues {
                    eprintln!("  {issue}");
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error generating report: {e}");
            ExitCode::FAILURE
        }
    }
}
