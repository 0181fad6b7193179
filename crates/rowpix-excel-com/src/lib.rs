//! Client for the Excel COM bridge process.
//!
//! The bridge is a Windows executable that automates Excel through COM and
//! talks JSON-over-stdio. On Windows it is spawned directly; elsewhere it runs
//! under WINE.
//!
//! # Architecture
//!
//! ```text
//! rowpix automation backend
//!     └── ExcelSession (this crate): one workbook, one sheet
//!           └── ExcelBridge: spawns [wine] excel-com-bridge.exe
//!                 └── COM: Excel.Application
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use rowpix_excel_com::{ExcelBridgeConfig, ExcelSession, PictureAppearance};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = ExcelSession::open(ExcelBridgeConfig::default(), Path::new("parts.xlsx"), "Sheet2")?;
//!     for shape in session.shapes()?.iter().filter(|s| s.is_picture()) {
//!         let out = format!("/tmp/shape_{}.png", shape.index);
//!         session.export_shape(shape.index, PictureAppearance::Screen, Path::new(&out))?;
//!     }
//!     session.close()?;
//!     Ok(())
//! }
//! ```

mod bridge;
mod session;

pub use bridge::{linux_to_wine_path, BridgeError, ExcelBridge, ExcelBridgeConfig};
pub use excel_com_protocol::{CellValue, PictureAppearance, ShapeInfo, SheetRef};
pub use session::ExcelSession;
