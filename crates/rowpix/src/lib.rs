//! # rowpix
//!
//! Export the pictures of a spreadsheet row by row, naming each file after
//! the row's name cell.
//!
//! Two backends are available:
//! - [`LibraryBackend`] reads the XLSX package directly (drawing pictures and
//!   WPS cell images) and writes the embedded bytes unchanged
//! - [`AutomationBackend`] drives Excel through the COM bridge and renders
//!   each picture shape, or the image cell of rows without shapes, to PNG
//!
//! [`Engine::Auto`] runs the library backend first and lets automation handle
//! only the rows the library could not export.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rowpix::{export_images_by_row, ExportRequest};
//!
//! let mut request = ExportRequest::new("parts.xlsx", "out");
//! request.options.sheet = "Parts".into();
//! request.options.start_row = 2;
//!
//! if !export_images_by_row(&request) {
//!     eprintln!("nothing exported");
//! }
//! ```

pub mod automation;
pub mod backend;
pub mod error;
pub mod library;
pub mod options;
pub mod selector;

pub use automation::{AutomationBackend, AutomationConnector, AutomationSession, ExcelComConnector};
pub use backend::{ExportReport, ExtractionBackend, RowNamer};
pub use error::{ExportError, Result};
pub use library::LibraryBackend;
pub use options::{Engine, ExportJob, ExportOptions, ExportRequest, FallbackNaming};
pub use selector::{export_images_by_row, export_images_by_row_with, run_export, ExportSummary};

pub use rowpix_core::Appearance;
pub use rowpix_excel_com::ExcelBridgeConfig;
pub use excel_com_protocol::ShapeInfo;
