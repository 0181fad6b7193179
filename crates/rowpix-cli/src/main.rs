//! rowpix CLI - export spreadsheet pictures row by row

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rowpix::{
    run_export, Engine, ExcelBridgeConfig, ExcelComConnector, ExportOptions, ExportRequest,
    FallbackNaming,
};
use rowpix_xlsx::XlsxImageReader;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "rowpix")]
#[command(
    author,
    version,
    about = "Export spreadsheet pictures row by row, named after a name column"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export the pictures of one sheet into a directory
    Export(ExportArgs),

    /// List the sheets of a workbook with their picture counts
    Sheets {
        /// Input workbook (.xlsx, .xlsm)
        input: PathBuf,
    },
}

#[derive(Args, Default)]
struct ExportArgs {
    /// Input workbook
    input: Option<PathBuf>,

    /// Existing directory the pictures are written to
    output_dir: Option<PathBuf>,

    /// JSON job file supplying defaults for every other option
    #[arg(long)]
    job: Option<PathBuf>,

    /// Worksheet name (default: Sheet2)
    #[arg(short, long)]
    sheet: Option<String>,

    /// Column holding the row names, as letters or a 1-based number (default: B)
    #[arg(long)]
    name_col: Option<String>,

    /// Column the pictures sit in; empty for any column (default: A)
    #[arg(long)]
    image_col: Option<String>,

    /// First row to export (default: 1)
    #[arg(long)]
    start_row: Option<u32>,

    /// How far a picture may sit from the image column (default: 2)
    #[arg(long)]
    col_tolerance: Option<u32>,

    /// auto, openpyxl (library) or com (automation)
    #[arg(short, long, value_parser = parse_engine)]
    engine: Option<Engine>,

    /// Automation captures below this size in KiB are treated as blank (default: 8)
    #[arg(long)]
    min_kb: Option<u64>,

    /// Capture rounds per picture (default: 3)
    #[arg(long)]
    retries: Option<u32>,

    /// Name of cell captures: index (name_1.png) or coordinate (name_A7.png)
    #[arg(long, value_parser = parse_fallback_naming)]
    fallback_naming: Option<FallbackNaming>,

    /// Do not capture the image cell of rows without picture shapes
    #[arg(long)]
    no_cell_fallback: bool,

    /// Reuse the previous row's name when the name cell is blank
    #[arg(long)]
    carry_names: bool,

    /// Path to excel-com-bridge.exe
    #[arg(long)]
    bridge_exe: Option<PathBuf>,

    /// WINE binary used to run the bridge
    #[arg(long)]
    wine: Option<PathBuf>,

    /// WINEPREFIX for the bridge
    #[arg(long)]
    wine_prefix: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    debug: bool,
}

fn parse_engine(s: &str) -> std::result::Result<Engine, String> {
    s.parse().map_err(|e: rowpix::ExportError| e.to_string())
}

fn parse_fallback_naming(s: &str) -> std::result::Result<FallbackNaming, String> {
    s.parse().map_err(|e: rowpix::ExportError| e.to_string())
}

/// A job file in the shape the automation hosts pass their arguments.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JobFile {
    #[serde(alias = "xlsxPath")]
    xlsx_path: Option<PathBuf>,
    #[serde(rename = "imgSavePath", alias = "img_save_path")]
    img_save_path: Option<PathBuf>,
    #[serde(deserialize_with = "flag")]
    debug: bool,
    #[serde(flatten)]
    options: ExportOptions,
}

/// `debug` is written as `0`/`1` or as a boolean.
fn flag<'de, D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        serde_json::Value::String(s) => matches!(s.trim(), "1" | "true"),
        _ => false,
    })
}

impl JobFile {
    fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job file '{}'", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid job file '{}'", path.display()))
    }
}

impl ExportArgs {
    /// Combine the job file (if any) with the flags; flags win.
    fn into_request(self) -> Result<(ExportRequest, ExcelBridgeConfig, bool)> {
        let job = match &self.job {
            Some(path) => JobFile::load(path)?,
            None => JobFile::default(),
        };

        let Some(input) = self.input.or(job.xlsx_path) else {
            bail!("No input workbook given (argument or \"xlsx_path\" in the job file)");
        };
        let Some(output_dir) = self.output_dir.or(job.img_save_path) else {
            bail!("No output directory given (argument or \"imgSavePath\" in the job file)");
        };

        let mut options = job.options;
        if let Some(sheet) = self.sheet {
            options.sheet = sheet;
        }
        if let Some(col) = self.name_col {
            options.name_col = col;
        }
        if let Some(col) = self.image_col {
            options.image_col = col;
        }
        if let Some(row) = self.start_row {
            options.start_row = row;
        }
        if let Some(tolerance) = self.col_tolerance {
            options.col_tolerance = tolerance;
        }
        if let Some(engine) = self.engine {
            options.engine = engine;
        }
        if let Some(min_kb) = self.min_kb {
            options.min_kb = min_kb;
        }
        if let Some(retries) = self.retries {
            options.retries = retries;
        }
        if let Some(naming) = self.fallback_naming {
            options.fallback_naming = naming;
        }
        if self.no_cell_fallback {
            options.cell_fallback = false;
        }
        if self.carry_names {
            options.carry_names = true;
        }

        let mut bridge = ExcelBridgeConfig::default();
        if self.bridge_exe.is_some() {
            bridge.bridge_exe_path = self.bridge_exe;
        }
        if self.wine.is_some() {
            bridge.wine_path = self.wine;
        }
        if self.wine_prefix.is_some() {
            bridge.wine_prefix = self.wine_prefix;
        }

        let request = ExportRequest::new(input, output_dir).with_options(options);
        Ok((request, bridge, self.debug || job.debug))
    }
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Export(args) => export(args),
        Commands::Sheets { input } => {
            init_logging(false);
            list_sheets(&input)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn export(args: ExportArgs) -> Result<ExitCode> {
    let (request, bridge, debug) = args.into_request()?;
    init_logging(debug);

    let summary = run_export(&request, ExcelComConnector::new(bridge))
        .with_context(|| format!("Export of '{}' failed", request.input.display()))?;

    for (backend, report) in [("openpyxl", &summary.library), ("com", &summary.automation)] {
        if let Some(report) = report {
            eprintln!("{backend}: {} file(s) from {} row(s)", report.exported, report.rows.len());
        }
    }
    eprintln!(
        "Exported {} file(s) to '{}'",
        summary.total(),
        request.output_dir.display()
    );

    Ok(if summary.total() > 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn list_sheets(input: &Path) -> Result<()> {
    let names = XlsxImageReader::sheet_names_file(input)
        .with_context(|| format!("Failed to open '{}'", input.display()))?;

    println!("Sheets in '{}':", input.display());
    for (i, name) in names.iter().enumerate() {
        match XlsxImageReader::read_sheet_file(input, name) {
            Ok(sheet) => println!(
                "  {}: {} ({} pictures, {} rows)",
                i,
                name,
                sheet.image_count(),
                sheet.declared_max_row
            ),
            Err(e) => println!("  {}: {} (unreadable: {})", i, name, e),
        }
    }

    Ok(())
}
