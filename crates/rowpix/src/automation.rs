//! Automation backend: renders pictures through a running spreadsheet
//! application.
//!
//! Shapes are copied as bitmaps and exported through a temporary chart by the
//! host. Each render is checked by [`run_capture`]; blank results are retried
//! with the other appearance and removed when every attempt fails.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use excel_com_protocol::{PictureAppearance, ShapeInfo};
use rowpix_core::{
    column_letters, locate, run_capture, unique_path, Anchor, Appearance, CaptureOutcome,
    CapturePolicy,
};
use rowpix_excel_com::{BridgeError, ExcelBridgeConfig, ExcelSession};

use crate::backend::{ExportReport, ExtractionBackend, RowNamer};
use crate::error::{ExportError, Result};
use crate::options::{ExportJob, FallbackNaming};

/// One workbook open in the automation host, positioned on one sheet.
pub trait AutomationSession {
    /// Last used row, scanning `fallback_column` upwards as the final strategy
    fn last_row(&mut self, fallback_column: u32) -> Result<u32>;

    /// Every shape on the sheet with its top-left cell
    fn shapes(&mut self) -> Result<Vec<ShapeInfo>>;

    /// Text of a cell, reading the top-left cell of a merge region
    fn cell_text(&mut self, row: u32, column: u32) -> Result<Option<String>>;

    /// Render `shape` to a PNG at `path`
    fn export_shape(&mut self, shape: &ShapeInfo, appearance: Appearance, path: &Path)
        -> Result<()>;

    /// Render the cell at `row`/`column` to a PNG at `path`
    fn export_cell(&mut self, row: u32, column: u32, appearance: Appearance, path: &Path)
        -> Result<()>;

    /// Close the workbook without saving and release the host
    fn close(self: Box<Self>) -> Result<()>;
}

/// Opens [`AutomationSession`]s.
pub trait AutomationConnector {
    fn connect(&mut self, workbook: &Path, sheet: &str) -> Result<Box<dyn AutomationSession>>;
}

/// Connects through the Excel COM bridge.
#[derive(Debug, Clone, Default)]
pub struct ExcelComConnector {
    pub config: ExcelBridgeConfig,
}

impl ExcelComConnector {
    pub fn new(config: ExcelBridgeConfig) -> Self {
        Self { config }
    }
}

impl AutomationConnector for ExcelComConnector {
    fn connect(&mut self, workbook: &Path, sheet: &str) -> Result<Box<dyn AutomationSession>> {
        match ExcelSession::open(self.config.clone(), workbook, sheet) {
            Ok(session) => Ok(Box::new(session)),
            Err(
                e @ (BridgeError::WineNotFound
                | BridgeError::BridgeExeNotFound(_)
                | BridgeError::SpawnFailed(_)),
            ) => Err(ExportError::BackendUnavailable(e.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

fn picture_appearance(appearance: Appearance) -> PictureAppearance {
    match appearance {
        Appearance::Screen => PictureAppearance::Screen,
        Appearance::Printer => PictureAppearance::Printer,
    }
}

impl AutomationSession for ExcelSession {
    fn last_row(&mut self, fallback_column: u32) -> Result<u32> {
        Ok(ExcelSession::last_row(self, fallback_column)?)
    }

    fn shapes(&mut self) -> Result<Vec<ShapeInfo>> {
        Ok(ExcelSession::shapes(self)?)
    }

    fn cell_text(&mut self, row: u32, column: u32) -> Result<Option<String>> {
        Ok(self.cell_value(row, column, true)?.as_text())
    }

    fn export_shape(
        &mut self,
        shape: &ShapeInfo,
        appearance: Appearance,
        path: &Path,
    ) -> Result<()> {
        Ok(ExcelSession::export_shape(
            self,
            shape.index,
            picture_appearance(appearance),
            path,
        )?)
    }

    fn export_cell(
        &mut self,
        row: u32,
        column: u32,
        appearance: Appearance,
        path: &Path,
    ) -> Result<()> {
        Ok(self.export_range(row, column, picture_appearance(appearance), path)?)
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(ExcelSession::close(*self)?)
    }
}

/// Exports through an [`AutomationConnector`].
pub struct AutomationBackend<C> {
    connector: C,
}

impl<C: AutomationConnector> AutomationBackend<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }
}

impl<C: AutomationConnector> ExtractionBackend for AutomationBackend<C> {
    fn name(&self) -> &'static str {
        "com"
    }

    fn export(&mut self, job: &ExportJob, skip_rows: &BTreeSet<u32>) -> Result<ExportReport> {
        let mut session = self.connector.connect(&job.input, &job.sheet)?;
        let result = export_rows(session.as_mut(), job, skip_rows);

        if let Err(e) = session.close() {
            log::warn!("automation session did not close cleanly: {e}");
        }

        let report = result?;
        log::info!(
            "automation backend: {} file(s) from {} row(s)",
            report.exported,
            report.rows.len()
        );
        Ok(report)
    }
}

fn export_rows(
    session: &mut dyn AutomationSession,
    job: &ExportJob,
    skip_rows: &BTreeSet<u32>,
) -> Result<ExportReport> {
    let shapes = session.shapes()?;
    log::debug!("{} shape(s) on sheet '{}'", shapes.len(), job.sheet);

    let pictures = shapes.iter().filter(|s| s.is_picture()).inspect(|s| {
        log::debug!(
            "shape #{} '{}' row={} col={} w={:.0} h={:.0}",
            s.index,
            s.name,
            s.row,
            s.column,
            s.width,
            s.height
        )
    });
    let buckets = locate(
        pictures.map(|s| (Some(Anchor::new(s.row, s.column)), s)),
        job.locate_params(),
    );

    let last_row = session.last_row(job.name_col)?;
    log::debug!("last row {last_row}, lowest picture row {}", buckets.max_anchor_row());

    let mut report = ExportReport::default();
    let mut namer = RowNamer::new(job.carry_names);
    let fallback_col = job.image_col.unwrap_or(1);

    for row in buckets.scan_range(last_row) {
        let raw = match session.cell_text(row, job.name_col) {
            Ok(raw) => raw,
            Err(e) => {
                log::debug!("row {row}: name cell unreadable: {e}");
                None
            }
        };
        // Named even when skipped so carried names survive rows exported elsewhere
        let base = namer.name(row, raw.as_deref());

        if skip_rows.contains(&row) {
            continue;
        }

        let shapes = buckets.get(row);
        if !shapes.is_empty() {
            for (k, shape) in shapes.iter().enumerate() {
                let filename = format!("{base}_{}.png", k + 1);
                let captured =
                    capture(&job.output_dir, &filename, &job.capture, |appearance, path| {
                        session.export_shape(shape, appearance, path)
                    });
                match captured {
                    Ok(Some(path)) => report.record(row, path),
                    Ok(None) => log::warn!("row {row}: shape '{}' produced no picture", shape.name),
                    Err(e) => log::warn!("row {row}: shape '{}' skipped: {e}", shape.name),
                }
            }
            continue;
        }

        if !job.cell_fallback {
            continue;
        }

        let filename = match job.fallback_naming {
            FallbackNaming::Index => format!("{base}_1.png"),
            FallbackNaming::Coordinate => {
                format!("{base}_{}{row}.png", column_letters(fallback_col))
            }
        };
        let captured = capture(&job.output_dir, &filename, &job.capture, |appearance, path| {
            session.export_cell(row, fallback_col, appearance, path)
        });
        match captured {
            Ok(Some(path)) => report.record(row, path),
            Ok(None) => log::debug!(
                "row {row}: no picture in {}{row}",
                column_letters(fallback_col)
            ),
            Err(e) => log::warn!("row {row}: cell capture skipped: {e}"),
        }
    }

    Ok(report)
}

/// Pick a free path for `filename` and render into it until the capture is
/// usable. `Ok(None)` when every attempt came out blank or failed.
fn capture<F>(
    dir: &Path,
    filename: &str,
    policy: &CapturePolicy,
    mut render: F,
) -> Result<Option<PathBuf>>
where
    F: FnMut(Appearance, &Path) -> Result<()>,
{
    let path = unique_path(dir, filename)?;
    match run_capture(policy, &path, |appearance| render(appearance, &path)) {
        CaptureOutcome::Success { renders, bytes } => {
            log::debug!("{}: {bytes} bytes after {renders} render(s)", path.display());
            Ok(Some(path))
        }
        CaptureOutcome::Exhausted { renders, last } => {
            log::debug!(
                "{}: gave up after {renders} render(s), last state {last:?}",
                path.display()
            );
            Ok(None)
        }
    }
}
