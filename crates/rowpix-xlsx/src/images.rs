//! Pictures found on a worksheet, with the cell text needed to name them.

use std::collections::HashMap;

use rowpix_core::{CellRange, RawAnchor};

/// Where a picture was declared in the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// A floating picture in the sheet's drawing part (`xdr:pic`)
    Drawing,
    /// A WPS cell image (`xl/cellimages.xml`) placed by a `DISPIMG` formula
    CellImage,
}

/// One picture and its unresolved anchor.
#[derive(Debug, Clone)]
pub struct SheetImage {
    pub anchor: RawAnchor,
    pub source: ImageSource,
    /// `cNvPr` name of the picture, when present
    pub name: Option<String>,
    /// Package part holding the picture bytes (e.g. `xl/media/image1.png`)
    pub media_part: Option<String>,
    /// Picture bytes; `None` when the part could not be found
    pub data: Option<Vec<u8>>,
}

/// Everything read from one worksheet.
#[derive(Debug, Clone, Default)]
pub struct SheetImages {
    pub sheet_name: String,
    /// Last row the sheet itself declares (dimension or highest `<row>`)
    pub declared_max_row: u32,
    pub(crate) cells: HashMap<(u32, u32), String>,
    pub(crate) merged: Vec<CellRange>,
    pub images: Vec<SheetImage>,
}

impl SheetImages {
    /// Text of the cell at `row`/`col` (1-based), if it holds a value.
    pub fn cell_text(&self, row: u32, col: u32) -> Option<&str> {
        self.cells.get(&(row, col)).map(String::as_str)
    }

    /// Like [`cell_text`](Self::cell_text), but a cell inside a merge region
    /// reads the region's top-left cell.
    pub fn merged_text(&self, row: u32, col: u32) -> Option<&str> {
        match self.merge_region(row, col) {
            Some(range) => self.cell_text(range.start.row, range.start.col),
            None => self.cell_text(row, col),
        }
    }

    /// The merge region containing `row`/`col`, if any
    pub fn merge_region(&self, row: u32, col: u32) -> Option<&CellRange> {
        self.merged.iter().find(|r| r.contains(row, col))
    }

    pub fn merged_regions(&self) -> &[CellRange] {
        &self.merged
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}
