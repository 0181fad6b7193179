//! Excel object-model operations used by the picture exporter.

#![cfg(windows)]

use std::collections::HashMap;
use std::thread::sleep;
use std::time::Duration;

use windows::Win32::System::Variant::VARIANT;

use excel_com_protocol::{CellValue, PictureAppearance, ShapeInfo, SheetRef};

use crate::dispatch::{
    variant_bool, variant_f64, variant_get_bool, variant_get_f64, variant_get_string, variant_i32,
    variant_is_empty, variant_str, DispatchObject,
};

const XL_CELL_TYPE_LAST_CELL: i32 = 11;
const XL_UP: i32 = -4162;
const XL_BITMAP: i32 = 2;

/// Minimum side of the temporary chart, in points
const MIN_CHART_SIDE: f64 = 20.0;
/// Range size used when a range cannot report its own
const DEFAULT_RANGE_SIDE: f64 = 300.0;

const AFTER_COPY: Duration = Duration::from_millis(150);
const AROUND_PASTE: Duration = Duration::from_millis(100);

/// An Excel.Application COM instance and its open workbooks.
pub struct ExcelApp {
    app: DispatchObject,
    workbooks_collection: DispatchObject,
    workbooks: HashMap<u64, DispatchObject>,
    next_handle: u64,
}

/// Chart object created as a paste target; deleted when dropped.
struct TempChart {
    object: DispatchObject,
}

impl TempChart {
    fn add(sheet: &DispatchObject, width: f64, height: f64) -> Result<Self, String> {
        let object = sheet.call_obj("ChartObjects", &[])?.call_obj(
            "Add",
            &[
                variant_f64(0.0),
                variant_f64(0.0),
                variant_f64(width.max(MIN_CHART_SIDE)),
                variant_f64(height.max(MIN_CHART_SIDE)),
            ],
        )?;
        Ok(Self { object })
    }

    /// Paste the clipboard picture into the chart and export it to `path`.
    fn paste_and_export(&self, path: &str) -> Result<(), String> {
        let chart = self.object.get_obj("Chart", &[])?;
        if let Ok(area) = chart.get_obj("ChartArea", &[]) {
            let _ = area.call("Select", &[]);
        }
        sleep(AROUND_PASTE);
        chart.call("Paste", &[])?;
        sleep(AROUND_PASTE);

        let exported = chart.call("Export", &[variant_str(path)])?;
        match variant_get_bool(&exported) {
            Some(false) => Err(format!("Chart.Export returned False for {path}")),
            _ => Ok(()),
        }
    }
}

impl Drop for TempChart {
    fn drop(&mut self) {
        if let Err(e) = self.object.call("Delete", &[]) {
            eprintln!("[excel-com-bridge] failed to delete temporary chart: {e}");
        }
    }
}

impl ExcelApp {
    pub fn new() -> Result<Self, String> {
        let app = DispatchObject::create_from_progid("Excel.Application")?;

        app.put("Visible", variant_bool(false))?;
        app.put("DisplayAlerts", variant_bool(false))?;
        app.put("ScreenUpdating", variant_bool(false))?;

        let workbooks_collection = app.get_obj("Workbooks", &[])?;

        Ok(Self {
            app,
            workbooks_collection,
            workbooks: HashMap::new(),
            next_handle: 1,
        })
    }

    /// Open a workbook from a file path. Returns the handle ID.
    pub fn open_workbook(&mut self, path: &str) -> Result<u64, String> {
        let wb = self
            .workbooks_collection
            .call_obj("Open", &[variant_str(path)])?;
        let handle = self.next_handle;
        self.next_handle += 1;
        self.workbooks.insert(handle, wb);
        Ok(handle)
    }

    fn get_sheet(&self, wb_handle: u64, sheet: &SheetRef) -> Result<DispatchObject, String> {
        let wb = self
            .workbooks
            .get(&wb_handle)
            .ok_or_else(|| format!("Unknown workbook handle: {wb_handle}"))?;

        let sheets = wb.get_obj("Worksheets", &[])?;
        let index = match sheet {
            // Excel worksheets are 1-based, the protocol uses 0-based
            SheetRef::Index(idx) => variant_i32(*idx as i32 + 1),
            SheetRef::Name(name) => variant_str(name),
        };
        sheets
            .get_obj("Item", &[index])
            .map_err(|e| format!("Worksheet {sheet:?} not found: {e}"))
    }

    fn cell(sheet: &DispatchObject, row: u32, column: u32) -> Result<DispatchObject, String> {
        sheet.get_obj("Cells", &[variant_i32(row as i32), variant_i32(column as i32)])
    }

    /// A merged cell becomes the top-left cell of its merge area.
    fn merge_anchor(range: DispatchObject) -> DispatchObject {
        let merged = range
            .get("MergeCells", &[])
            .ok()
            .and_then(|v| variant_get_bool(&v))
            .unwrap_or(false);
        if !merged {
            return range;
        }
        range
            .get_obj("MergeArea", &[])
            .and_then(|area| Self::cell(&area, 1, 1))
            .unwrap_or(range)
    }

    /// Last used row: last cell, then used range, then `End(xlUp)` on the
    /// fallback column, then 1.
    pub fn last_row(
        &self,
        wb_handle: u64,
        sheet: &SheetRef,
        fallback_column: u32,
    ) -> Result<u32, String> {
        let ws = self.get_sheet(wb_handle, sheet)?;

        let last_cell = ws
            .get_obj("Cells", &[])
            .and_then(|cells| {
                cells.call_obj("SpecialCells", &[variant_i32(XL_CELL_TYPE_LAST_CELL)])
            })
            .and_then(|cell| cell.get_i32("Row"));
        if let Ok(row) = last_cell {
            return Ok(row.max(1) as u32);
        }

        let used = ws.get_obj("UsedRange", &[]).and_then(|ur| {
            let first = ur.get_i32("Row")?;
            let count = ur.get_obj("Rows", &[])?.get_i32("Count")?;
            Ok(first + count - 1)
        });
        if let Ok(row) = used {
            return Ok(row.max(1) as u32);
        }

        let from_bottom = ws
            .get_obj("Rows", &[])
            .and_then(|rows| rows.get_i32("Count"))
            .and_then(|count| Self::cell(&ws, count as u32, fallback_column))
            .and_then(|cell| cell.get_obj("End", &[variant_i32(XL_UP)]))
            .and_then(|end| end.get_i32("Row"));
        Ok(from_bottom.map_or(1, |row| row.max(1) as u32))
    }

    /// All shapes on a sheet; shapes whose position cannot be read are skipped.
    pub fn list_shapes(&self, wb_handle: u64, sheet: &SheetRef) -> Result<Vec<ShapeInfo>, String> {
        let ws = self.get_sheet(wb_handle, sheet)?;
        let shapes = ws.get_obj("Shapes", &[])?;
        let count = shapes.get_i32("Count")?;

        let mut out = Vec::with_capacity(count.max(0) as usize);
        for index in 1..=count {
            let info = shapes.call_obj("Item", &[variant_i32(index)]).and_then(|shape| {
                let top_left = shape.get_obj("TopLeftCell", &[])?;
                Ok(ShapeInfo {
                    index: index as u32,
                    name: shape
                        .get("Name", &[])
                        .ok()
                        .and_then(|v| variant_get_string(&v))
                        .unwrap_or_default(),
                    shape_type: shape.get_i32("Type")?,
                    row: top_left.get_i32("Row")? as u32,
                    column: top_left.get_i32("Column")? as u32,
                    width: shape.get_f64("Width").unwrap_or(0.0),
                    height: shape.get_f64("Height").unwrap_or(0.0),
                })
            });
            match info {
                Ok(info) => out.push(info),
                Err(e) => eprintln!("[excel-com-bridge] shape {index} skipped: {e}"),
            }
        }
        Ok(out)
    }

    pub fn get_cell_value(
        &self,
        wb_handle: u64,
        sheet: &SheetRef,
        row: u32,
        column: u32,
        merge_aware: bool,
    ) -> Result<CellValue, String> {
        let ws = self.get_sheet(wb_handle, sheet)?;
        let mut cell = Self::cell(&ws, row, column)?;
        if merge_aware {
            cell = Self::merge_anchor(cell);
        }
        let variant = cell.get("Value", &[])?;
        Ok(variant_to_cell_value(&variant))
    }

    fn copy_and_export(
        &self,
        ws: &DispatchObject,
        source: &DispatchObject,
        width: f64,
        height: f64,
        appearance: PictureAppearance,
        path: &str,
    ) -> Result<(), String> {
        let _ = self.app.put("CutCopyMode", variant_bool(false));

        source.call(
            "CopyPicture",
            &[variant_i32(appearance.as_xl()), variant_i32(XL_BITMAP)],
        )?;
        sleep(AFTER_COPY);

        let chart = TempChart::add(ws, width, height)?;
        chart.paste_and_export(path)
    }

    pub fn export_shape_picture(
        &self,
        wb_handle: u64,
        sheet: &SheetRef,
        shape: u32,
        appearance: PictureAppearance,
        path: &str,
    ) -> Result<(), String> {
        let ws = self.get_sheet(wb_handle, sheet)?;
        let shape = ws
            .get_obj("Shapes", &[])?
            .call_obj("Item", &[variant_i32(shape as i32)])?;
        let width = shape.get_f64("Width")?;
        let height = shape.get_f64("Height")?;
        self.copy_and_export(&ws, &shape, width, height, appearance, path)
    }

    pub fn export_range_picture(
        &self,
        wb_handle: u64,
        sheet: &SheetRef,
        row: u32,
        column: u32,
        appearance: PictureAppearance,
        path: &str,
    ) -> Result<(), String> {
        let ws = self.get_sheet(wb_handle, sheet)?;
        let range = Self::merge_anchor(Self::cell(&ws, row, column)?);
        let (width, height) = match (range.get_f64("Width"), range.get_f64("Height")) {
            (Ok(w), Ok(h)) => (w, h),
            _ => (DEFAULT_RANGE_SIDE, DEFAULT_RANGE_SIDE),
        };
        self.copy_and_export(&ws, &range, width, height, appearance, path)
    }

    /// Close a workbook without saving.
    pub fn close_workbook(&mut self, wb_handle: u64) -> Result<(), String> {
        let wb = self
            .workbooks
            .remove(&wb_handle)
            .ok_or_else(|| format!("Unknown workbook handle: {wb_handle}"))?;
        wb.call("Close", &[variant_bool(false)])?;
        Ok(())
    }

    /// Close all workbooks and quit Excel.
    pub fn shutdown(mut self) -> Result<(), String> {
        let handles: Vec<u64> = self.workbooks.keys().copied().collect();
        for h in handles {
            let _ = self.close_workbook(h);
        }
        self.app.call("Quit", &[])?;
        Ok(())
    }
}

fn variant_to_cell_value(variant: &VARIANT) -> CellValue {
    if variant_is_empty(variant) {
        CellValue::Null
    } else if let Some(b) = variant_get_bool(variant) {
        CellValue::Bool(b)
    } else if let Some(n) = variant_get_f64(variant) {
        CellValue::Number(n)
    } else if let Some(s) = variant_get_string(variant) {
        CellValue::String(s)
    } else {
        CellValue::Null
    }
}
