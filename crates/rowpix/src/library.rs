//! Library backend: reads pictures straight out of the XLSX package.

use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use rowpix_core::{locate, unique_path};
use rowpix_xlsx::{SheetImage, XlsxImageReader};

use crate::backend::{ExportReport, ExtractionBackend, RowNamer};
use crate::error::{ExportError, Result};
use crate::options::ExportJob;

const PACKAGE_EXTENSIONS: [&str; 2] = ["xlsx", "xlsm"];

/// Whether `path` names a package the library backend can open.
pub fn is_supported_package(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            PACKAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

#[derive(Debug, Default)]
pub struct LibraryBackend;

impl LibraryBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ExtractionBackend for LibraryBackend {
    fn name(&self) -> &'static str {
        "openpyxl"
    }

    fn export(&mut self, job: &ExportJob, skip_rows: &BTreeSet<u32>) -> Result<ExportReport> {
        let mut report = ExportReport::default();

        if !is_supported_package(&job.input) {
            log::warn!(
                "{}: not an .xlsx/.xlsm package, library backend skipped",
                job.input.display()
            );
            return Ok(report);
        }

        let sheet = XlsxImageReader::read_sheet_file(&job.input, &job.sheet)?;
        log::debug!(
            "sheet '{}': {} picture(s), declared max row {}",
            sheet.sheet_name,
            sheet.image_count(),
            sheet.declared_max_row
        );

        let buckets = locate(
            sheet.images.iter().map(|img| (img.anchor.resolve(), img)),
            job.locate_params(),
        );
        if buckets.dropped() > 0 {
            log::debug!("{} picture(s) without a usable anchor", buckets.dropped());
        }

        let mut namer = RowNamer::new(job.carry_names);
        for row in buckets.scan_range(sheet.declared_max_row) {
            let base = namer.name(row, sheet.merged_text(row, job.name_col));

            let images = buckets.get(row);
            if images.is_empty() || skip_rows.contains(&row) {
                continue;
            }

            for (k, image) in images.iter().enumerate() {
                match write_image(&job.output_dir, &base, k + 1, image) {
                    Ok(path) => report.record(row, path),
                    Err(e) => log::warn!("row {row}: picture {} skipped: {e}", k + 1),
                }
            }
        }

        log::info!(
            "library backend: {} file(s) from {} row(s)",
            report.exported,
            report.rows.len()
        );
        Ok(report)
    }
}

/// Validate the picture bytes and write them unchanged to `<base>_<index>.<ext>`.
fn write_image(dir: &Path, base: &str, index: usize, image: &SheetImage) -> Result<PathBuf> {
    let part = image.media_part.as_deref().unwrap_or("<unresolved>");
    let data = image
        .data
        .as_deref()
        .ok_or_else(|| ExportError::MissingMedia(part.to_string()))?;

    let format = image::guess_format(data)?;
    image::load_from_memory_with_format(data, format)?;

    let ext = format.extensions_str().first().copied().unwrap_or("img");
    let path = unique_path(dir, &format!("{base}_{index}.{ext}"))?;

    let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
    file.write_all(data)?;
    Ok(path)
}
