//! Export options, as given by callers and job files, and their resolved form.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use rowpix_core::{CapturePolicy, ColumnRef, LocateParams};

use crate::error::{ExportError, Result};

/// Which backend(s) to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Engine {
    /// Read the package directly
    #[serde(rename = "openpyxl", alias = "library")]
    Library,
    /// Drive Excel through the COM bridge
    #[serde(rename = "com", alias = "automation")]
    Automation,
    /// Library first, then automation for the rows the library did not export
    #[default]
    #[serde(rename = "auto")]
    Auto,
}

impl FromStr for Engine {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openpyxl" | "library" => Ok(Engine::Library),
            "com" | "automation" => Ok(Engine::Automation),
            "auto" => Ok(Engine::Auto),
            other => Err(ExportError::InvalidOption(format!(
                "unknown engine '{other}' (expected auto, openpyxl or com)"
            ))),
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Engine::Library => "openpyxl",
            Engine::Automation => "com",
            Engine::Auto => "auto",
        })
    }
}

/// File name of a cell captured because its row had no picture shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackNaming {
    /// `<name>_1.png`
    #[default]
    Index,
    /// `<name>_<column letters><row>.png`, e.g. `Valve_A7.png`
    Coordinate,
}

impl FromStr for FallbackNaming {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "index" => Ok(FallbackNaming::Index),
            "coordinate" => Ok(FallbackNaming::Coordinate),
            other => Err(ExportError::InvalidOption(format!(
                "unknown fallback naming '{other}' (expected index or coordinate)"
            ))),
        }
    }
}

/// Caller-facing options. Field aliases accept the camelCase keys of job files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    #[serde(alias = "sheetName")]
    pub sheet: String,
    /// Column holding row names: letters or a 1-based number
    #[serde(alias = "nameCol", deserialize_with = "column_spec")]
    pub name_col: String,
    /// Column the pictures sit in; blank means any column
    #[serde(alias = "imgCol", deserialize_with = "column_spec")]
    pub image_col: String,
    #[serde(alias = "startRow")]
    pub start_row: u32,
    /// Largest column distance between a picture and `image_col`
    #[serde(alias = "colTolerance")]
    pub col_tolerance: u32,
    pub engine: Engine,
    /// Automation captures smaller than this many KiB are treated as blank
    pub min_kb: u64,
    /// Capture rounds per picture (each tries screen then printer appearance)
    pub retries: u32,
    pub fallback_naming: FallbackNaming,
    /// Capture the image cell of rows without picture shapes (automation)
    pub cell_fallback: bool,
    /// Reuse the previous row's name when the name cell is blank
    pub carry_names: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            sheet: "Sheet2".to_string(),
            name_col: "B".to_string(),
            image_col: "A".to_string(),
            start_row: 1,
            col_tolerance: 2,
            engine: Engine::Auto,
            min_kb: 8,
            retries: 3,
            fallback_naming: FallbackNaming::Index,
            cell_fallback: true,
            carry_names: false,
        }
    }
}

/// Column given as `"B"`, `"2"`, `2` or `null`.
fn column_spec<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Spec {
        Text(String),
        Number(u32),
    }

    Ok(match Option::<Spec>::deserialize(deserializer)? {
        Some(Spec::Text(s)) => s,
        Some(Spec::Number(n)) => n.to_string(),
        None => String::new(),
    })
}

/// One export: where to read, where to write, and how.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub options: ExportOptions,
}

impl ExportRequest {
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            options: ExportOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }
}

/// Options checked and converted to the numbers the backends use.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub sheet: String,
    pub name_col: u32,
    pub image_col: Option<u32>,
    pub start_row: u32,
    pub col_tolerance: u32,
    pub capture: CapturePolicy,
    pub fallback_naming: FallbackNaming,
    pub cell_fallback: bool,
    pub carry_names: bool,
}

impl ExportJob {
    /// Resolve the options of `request`.
    ///
    /// The name column must parse. An image column that does not parse is
    /// ignored with a warning, as if it were blank.
    pub fn resolve(request: &ExportRequest) -> Result<Self> {
        let o = &request.options;

        let name_col = ColumnRef::parse(&o.name_col)
            .map_err(|e| ExportError::InvalidOption(format!("name column '{}': {e}", o.name_col)))?
            .index();

        let image_col = match ColumnRef::parse_optional(&o.image_col) {
            Ok(col) => col.map(ColumnRef::index),
            Err(e) => {
                log::warn!("image column '{}' ignored: {e}", o.image_col);
                None
            }
        };

        Ok(Self {
            input: request.input.clone(),
            output_dir: request.output_dir.clone(),
            sheet: o.sheet.clone(),
            name_col,
            image_col,
            start_row: o.start_row.max(1),
            col_tolerance: o.col_tolerance,
            capture: CapturePolicy {
                min_bytes: o.min_kb.saturating_mul(1024),
                retries: o.retries,
            },
            fallback_naming: o.fallback_naming,
            cell_fallback: o.cell_fallback,
            carry_names: o.carry_names,
        })
    }

    pub fn locate_params(&self) -> LocateParams {
        LocateParams {
            start_row: self.start_row,
            target_col: self.image_col,
            col_tolerance: self.col_tolerance,
        }
    }
}
