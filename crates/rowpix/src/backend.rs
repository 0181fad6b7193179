//! The interface shared by the library and automation backends.

use std::collections::BTreeSet;
use std::path::PathBuf;

use rowpix_core::sanitize_filename;

use crate::error::Result;
use crate::options::ExportJob;

/// A way of getting pictures out of a workbook.
pub trait ExtractionBackend {
    /// Short name used in log lines
    fn name(&self) -> &'static str;

    /// Export every bucketed row of `job` except those in `skip_rows`.
    ///
    /// Failures of a single picture or row are logged and skipped; an `Err`
    /// means the backend could not run at all.
    fn export(&mut self, job: &ExportJob, skip_rows: &BTreeSet<u32>) -> Result<ExportReport>;
}

/// What one backend wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub exported: usize,
    /// Rows that produced at least one file
    pub rows: BTreeSet<u32>,
    pub files: Vec<PathBuf>,
}

impl ExportReport {
    pub fn record(&mut self, row: u32, path: PathBuf) {
        log::info!("row {row}: saved {}", path.display());
        self.exported += 1;
        self.rows.insert(row);
        self.files.push(path);
    }

    pub fn is_empty(&self) -> bool {
        self.exported == 0
    }
}

/// Turns raw name cells into file-name bases.
///
/// With carry-forward on, a blank name cell reuses the previous row's name,
/// but only when that name came from a cell rather than the `row_<n>` default.
#[derive(Debug, Clone, Default)]
pub struct RowNamer {
    carry: bool,
    previous: Option<String>,
}

impl RowNamer {
    pub fn new(carry: bool) -> Self {
        Self {
            carry,
            previous: None,
        }
    }

    pub fn name(&mut self, row: u32, raw: Option<&str>) -> String {
        let raw = raw.map(str::trim).filter(|s| !s.is_empty());
        let default = format!("row_{row}");

        match raw {
            Some(raw) => {
                let name = sanitize_filename(Some(raw), &default);
                self.previous = (name != default).then(|| name.clone());
                name
            }
            None if self.carry => match &self.previous {
                Some(previous) => previous.clone(),
                None => default,
            },
            None => default,
        }
    }
}
