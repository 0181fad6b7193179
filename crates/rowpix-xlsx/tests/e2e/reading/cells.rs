//! Cell text, merges and sheet extent.

use std::io::Cursor;

use crate::{PackageFixture, SheetFixture};
use pretty_assertions::assert_eq;
use rowpix_xlsx::XlsxImageReader;

#[test]
fn test_merged_name_reads_top_left() {
    let package = PackageFixture::new()
        .sheet(
            SheetFixture::new("Sheet2")
                .text("B2", "Valve <DN50>")
                .text("B5", "Pump")
                .merge("B2:B4"),
        )
        .build();

    let sheet = XlsxImageReader::read_sheet(Cursor::new(package), "Sheet2").unwrap();
    assert_eq!(sheet.merged_text(3, 2), Some("Valve <DN50>"));
    assert_eq!(sheet.merged_text(4, 2), Some("Valve <DN50>"));
    assert_eq!(sheet.cell_text(3, 2), None);
    assert_eq!(sheet.merged_text(5, 2), Some("Pump"));
    assert_eq!(sheet.merged_regions().len(), 1);
}

#[test]
fn test_declared_max_row_uses_dimension_and_rows() {
    let package = PackageFixture::new()
        .sheet(SheetFixture::new("Sheet1").text("A3", "x").dimension("A1:C12"))
        .sheet(SheetFixture::new("Sheet2").text("A7", "y"))
        .build();

    let first = XlsxImageReader::read_sheet(Cursor::new(package.clone()), "Sheet1").unwrap();
    assert_eq!(first.declared_max_row, 12);

    let second = XlsxImageReader::read_sheet(Cursor::new(package), "Sheet2").unwrap();
    assert_eq!(second.declared_max_row, 7);
}

#[test]
fn test_escaped_inline_text_is_decoded() {
    let package = PackageFixture::new()
        .sheet(SheetFixture::new("Sheet1").text("A1", "line_x000a_two"))
        .build();

    let sheet = XlsxImageReader::read_sheet(Cursor::new(package), "Sheet1").unwrap();
    assert_eq!(sheet.cell_text(1, 1), Some("line\ntwo"));
}
