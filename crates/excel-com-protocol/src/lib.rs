//! Shared protocol types for communication between the rowpix client and the
//! Windows COM bridge process (run natively on Windows or under WINE).
//!
//! The protocol is JSON-over-stdio: one JSON object per line in each direction.
//! Rows and columns are 1-based, as in Excel's object model.

use serde::{Deserialize, Serialize};

/// A command sent from the client to the bridge process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Monotonically increasing request ID for correlating responses.
    pub id: u64,
    /// The command to execute.
    #[serde(flatten)]
    pub command: Command,
}

/// Commands the client can send to the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "params")]
pub enum Command {
    /// Initialize COM and create the Excel.Application instance.
    Init,

    /// Open an existing workbook from a file path (path as seen by Excel).
    /// Returns a workbook handle.
    OpenWorkbook { path: String },

    /// Last used row of a sheet. `fallback_column` is the column scanned
    /// upwards when the sheet-wide strategies fail.
    LastRow {
        workbook: u64,
        sheet: SheetRef,
        fallback_column: u32,
    },

    /// Every shape on the sheet with its top-left cell.
    ListShapes { workbook: u64, sheet: SheetRef },

    /// Text of a cell. With `merge_aware`, a cell inside a merge region
    /// reads the region's top-left cell.
    GetCellValue {
        workbook: u64,
        sheet: SheetRef,
        row: u32,
        column: u32,
        merge_aware: bool,
    },

    /// Copy a shape as a picture and export it as PNG to `path`.
    ExportShapePicture {
        workbook: u64,
        sheet: SheetRef,
        /// 1-based index into the sheet's `Shapes` collection
        shape: u32,
        appearance: PictureAppearance,
        path: String,
    },

    /// Copy a cell (its merge region when merged) as a picture and export it
    /// as PNG to `path`.
    ExportRangePicture {
        workbook: u64,
        sheet: SheetRef,
        row: u32,
        column: u32,
        appearance: PictureAppearance,
        path: String,
    },

    /// Close a workbook without saving.
    CloseWorkbook { workbook: u64 },

    /// Shut down the bridge: close all workbooks, quit Excel, uninitialize COM.
    Shutdown,
}

/// Reference to a worksheet, by 0-based index or by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SheetRef {
    Index(u32),
    Name(String),
}

impl From<&str> for SheetRef {
    fn from(s: &str) -> Self {
        SheetRef::Name(s.to_string())
    }
}

/// `XlPictureAppearance` used by `CopyPicture`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PictureAppearance {
    Screen,
    Printer,
}

impl PictureAppearance {
    /// `xlScreen = 1`, `xlPrinter = 2`
    pub fn as_xl(self) -> i32 {
        match self {
            PictureAppearance::Screen => 1,
            PictureAppearance::Printer => 2,
        }
    }
}

/// `msoLinkedPicture`
pub const MSO_LINKED_PICTURE: i32 = 11;
/// `msoPicture`
pub const MSO_PICTURE: i32 = 13;

/// One entry of a sheet's `Shapes` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeInfo {
    /// 1-based index into `Shapes`
    pub index: u32,
    pub name: String,
    /// `MsoShapeType`
    pub shape_type: i32,
    /// Row of `TopLeftCell` (1-based)
    pub row: u32,
    /// Column of `TopLeftCell` (1-based)
    pub column: u32,
    /// Points
    pub width: f64,
    /// Points
    pub height: f64,
}

impl ShapeInfo {
    /// Embedded or linked picture
    pub fn is_picture(&self) -> bool {
        self.shape_type == MSO_PICTURE || self.shape_type == MSO_LINKED_PICTURE
    }
}

/// A cell value read from Excel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

/// A response sent from the bridge back to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// The request ID this response corresponds to.
    pub id: u64,
    /// The result of the command.
    #[serde(flatten)]
    pub result: ResponseResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ResponseResult {
    #[serde(rename = "ok")]
    Ok {
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<ResponseData>,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

/// Data returned in successful responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    /// Handle to an opened workbook.
    WorkbookHandle { workbook: u64 },
    /// A cell value.
    Value { value: CellValue },
    /// A row number.
    Row { row: u32 },
    /// A sheet's shapes.
    Shapes { shapes: Vec<ShapeInfo> },
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Text as Excel would display a plain value; `None` for empty cells.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::String(s) => write!(f, "{s}"),
        }
    }
}
