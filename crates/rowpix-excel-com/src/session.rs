//! One open workbook on one worksheet, for the lifetime of an export.

use std::path::Path;

use excel_com_protocol::{
    CellValue, Command as BridgeCommand, PictureAppearance, ResponseData, ShapeInfo, SheetRef,
};

use crate::bridge::{BridgeError, ExcelBridge, ExcelBridgeConfig};

/// A bridge with one workbook open and a fixed target sheet.
///
/// The workbook is closed without saving and the bridge shut down by
/// [`close`](Self::close), or by `Drop` when `close` was never reached.
pub struct ExcelSession {
    bridge: ExcelBridge,
    workbook: Option<u64>,
    sheet: SheetRef,
}

impl ExcelSession {
    /// Start a bridge, initialise Excel and open `workbook_path`.
    pub fn open(
        config: ExcelBridgeConfig,
        workbook_path: &Path,
        sheet: &str,
    ) -> Result<Self, BridgeError> {
        let bridge = ExcelBridge::start(config)?;
        let path = bridge.host_path(workbook_path);
        log::debug!("opening {path} in Excel");

        let data = bridge.send_command(BridgeCommand::OpenWorkbook { path })?;
        match data {
            Some(ResponseData::WorkbookHandle { workbook }) => Ok(Self {
                bridge,
                workbook: Some(workbook),
                sheet: SheetRef::from(sheet),
            }),
            _ => Err(BridgeError::UnexpectedResponse),
        }
    }

    fn handle(&self) -> Result<u64, BridgeError> {
        self.workbook.ok_or(BridgeError::NotRunning)
    }

    /// Last used row of the sheet, scanning `fallback_column` upwards as the
    /// final strategy.
    pub fn last_row(&self, fallback_column: u32) -> Result<u32, BridgeError> {
        let data = self.bridge.send_command(BridgeCommand::LastRow {
            workbook: self.handle()?,
            sheet: self.sheet.clone(),
            fallback_column,
        })?;
        match data {
            Some(ResponseData::Row { row }) => Ok(row),
            _ => Err(BridgeError::UnexpectedResponse),
        }
    }

    pub fn shapes(&self) -> Result<Vec<ShapeInfo>, BridgeError> {
        let data = self.bridge.send_command(BridgeCommand::ListShapes {
            workbook: self.handle()?,
            sheet: self.sheet.clone(),
        })?;
        match data {
            Some(ResponseData::Shapes { shapes }) => Ok(shapes),
            _ => Err(BridgeError::UnexpectedResponse),
        }
    }

    /// Value of a cell; with `merge_aware`, the merge region's top-left value.
    pub fn cell_value(
        &self,
        row: u32,
        column: u32,
        merge_aware: bool,
    ) -> Result<CellValue, BridgeError> {
        let data = self.bridge.send_command(BridgeCommand::GetCellValue {
            workbook: self.handle()?,
            sheet: self.sheet.clone(),
            row,
            column,
            merge_aware,
        })?;
        match data {
            Some(ResponseData::Value { value }) => Ok(value),
            _ => Err(BridgeError::UnexpectedResponse),
        }
    }

    /// Export shape `index` (1-based, as in [`ShapeInfo::index`]) as PNG.
    pub fn export_shape(
        &self,
        index: u32,
        appearance: PictureAppearance,
        path: &Path,
    ) -> Result<(), BridgeError> {
        self.bridge.send_command(BridgeCommand::ExportShapePicture {
            workbook: self.handle()?,
            sheet: self.sheet.clone(),
            shape: index,
            appearance,
            path: self.bridge.host_path(path),
        })?;
        Ok(())
    }

    /// Export the cell at `row`/`column` (its merge anchor when merged) as PNG.
    pub fn export_range(
        &self,
        row: u32,
        column: u32,
        appearance: PictureAppearance,
        path: &Path,
    ) -> Result<(), BridgeError> {
        self.bridge.send_command(BridgeCommand::ExportRangePicture {
            workbook: self.handle()?,
            sheet: self.sheet.clone(),
            row,
            column,
            appearance,
            path: self.bridge.host_path(path),
        })?;
        Ok(())
    }

    /// Close the workbook without saving and shut the bridge down.
    pub fn close(mut self) -> Result<(), BridgeError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), BridgeError> {
        let closed = match self.workbook.take() {
            Some(workbook) => self
                .bridge
                .send_command(BridgeCommand::CloseWorkbook { workbook })
                .map(|_| ()),
            None => Ok(()),
        };
        let stopped = self.bridge.shutdown();
        closed.and(stopped)
    }
}

impl Drop for ExcelSession {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("failed to release Excel session: {e}");
        }
    }
}
