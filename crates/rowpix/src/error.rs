//! Export error types

use std::path::PathBuf;

use thiserror::Error;

/// Result type for export operations
pub type Result<T> = std::result::Result<T, ExportError>;

/// Errors that abort an export or one unit of it
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Input workbook not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Output directory not found: {0}")]
    OutputDirNotFound(PathBuf),

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// The automation host cannot be started (bridge or WINE missing)
    #[error("Automation backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("No picture data for media part {0}")]
    MissingMedia(String),

    #[error("XLSX error: {0}")]
    Xlsx(#[from] rowpix_xlsx::XlsxError),

    #[error("Excel bridge error: {0}")]
    Bridge(#[from] rowpix_excel_com::BridgeError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Core error: {0}")]
    Core(#[from] rowpix_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExportError {
    /// Errors raised before any backend runs
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ExportError::InputNotFound(_)
                | ExportError::OutputDirNotFound(_)
                | ExportError::InvalidOption(_)
        )
    }
}
