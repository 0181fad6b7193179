//! Backend selection and the top-level export entry points.

use std::collections::BTreeSet;

use rowpix_excel_com::ExcelBridgeConfig;

use crate::automation::{AutomationBackend, AutomationConnector, ExcelComConnector};
use crate::backend::{ExportReport, ExtractionBackend};
use crate::error::{ExportError, Result};
use crate::library::LibraryBackend;
use crate::options::{Engine, ExportJob, ExportRequest};

/// Per-backend results of one export. A backend that did not run, or that
/// failed to run, has no report.
#[derive(Debug, Clone, Default)]
pub struct ExportSummary {
    pub library: Option<ExportReport>,
    pub automation: Option<ExportReport>,
}

impl ExportSummary {
    pub fn total(&self) -> usize {
        self.reports().map(|r| r.exported).sum()
    }

    fn reports(&self) -> impl Iterator<Item = &ExportReport> {
        self.library.iter().chain(self.automation.iter())
    }
}

/// Check the things that make an export pointless before anything is opened.
fn check_preconditions(request: &ExportRequest) -> Result<()> {
    if !request.input.is_file() {
        return Err(ExportError::InputNotFound(request.input.clone()));
    }
    if !request.output_dir.is_dir() {
        return Err(ExportError::OutputDirNotFound(request.output_dir.clone()));
    }
    Ok(())
}

/// Run one backend, downgrading a failure to "no report".
fn run_backend(
    backend: &mut dyn ExtractionBackend,
    job: &ExportJob,
    skip_rows: &BTreeSet<u32>,
) -> Option<ExportReport> {
    match backend.export(job, skip_rows) {
        Ok(report) => Some(report),
        Err(e @ ExportError::BackendUnavailable(_)) => {
            log::info!("{} backend not available: {e}", backend.name());
            None
        }
        Err(e) => {
            log::warn!("{} backend failed: {e}", backend.name());
            None
        }
    }
}

/// Export with the engine chosen in `request`, automating through `connector`.
///
/// Only precondition failures are returned as errors; backend failures are
/// logged and leave that backend's report empty.
pub fn run_export<C: AutomationConnector>(
    request: &ExportRequest,
    connector: C,
) -> Result<ExportSummary> {
    check_preconditions(request)?;
    let job = ExportJob::resolve(request)?;
    let engine = request.options.engine;
    log::info!(
        "exporting '{}' from {} with engine {engine}",
        job.sheet,
        job.input.display()
    );

    let mut summary = ExportSummary::default();

    if matches!(engine, Engine::Library | Engine::Auto) {
        summary.library = run_backend(&mut LibraryBackend::new(), &job, &BTreeSet::new());
    }

    if matches!(engine, Engine::Automation | Engine::Auto) {
        let skip_rows = summary
            .library
            .as_ref()
            .map(|r| r.rows.clone())
            .unwrap_or_default();
        if !skip_rows.is_empty() {
            log::debug!("automation skips {} row(s) already exported", skip_rows.len());
        }
        summary.automation = run_backend(&mut AutomationBackend::new(connector), &job, &skip_rows);
    }

    log::info!("exported {} file(s)", summary.total());
    Ok(summary)
}

/// Export pictures row by row. True iff at least one file was written.
///
/// Automation goes through the Excel COM bridge with `bridge` settings.
pub fn export_images_by_row_with(request: &ExportRequest, bridge: ExcelBridgeConfig) -> bool {
    match run_export(request, ExcelComConnector::new(bridge)) {
        Ok(summary) => summary.total() > 0,
        Err(e) => {
            log::error!("{e}");
            false
        }
    }
}

/// [`export_images_by_row_with`] using the default bridge settings.
pub fn export_images_by_row(request: &ExportRequest) -> bool {
    export_images_by_row_with(request, ExcelBridgeConfig::default())
}
