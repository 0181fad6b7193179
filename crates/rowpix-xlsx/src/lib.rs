//! # rowpix-xlsx
//!
//! Reads embedded pictures out of XLSX packages without a spreadsheet
//! application: floating pictures from the sheet's drawing part and WPS
//! cell images (`xl/cellimages.xml` placed by `DISPIMG` formulas), together
//! with the cell text and merge regions needed to name them.
//!
//! ## Example
//!
//! ```rust,ignore
//! use rowpix_xlsx::XlsxImageReader;
//!
//! let sheet = XlsxImageReader::read_sheet_file("parts.xlsx", "Sheet2")?;
//! for image in &sheet.images {
//!     println!("{:?} -> {:?}", image.anchor.resolve(), image.media_part);
//! }
//! ```

pub mod error;
pub mod images;
pub mod reader;

pub use error::{XlsxError, XlsxResult};
pub use images::{ImageSource, SheetImage, SheetImages};
pub use reader::XlsxImageReader;
