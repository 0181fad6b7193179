//! Excel COM Bridge: a Windows process that automates Excel via COM for
//! rowpix, controlled by JSON commands over stdin/stdout.
//!
//! Runs natively on Windows or, cross-compiled, under WINE on Linux.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! - Reads `Request` objects from stdin
//! - Writes `Response` objects to stdout
//! - Diagnostic/log messages go to stderr (never stdout)

#[cfg(windows)]
mod dispatch;
#[cfg(windows)]
mod excel;

#[cfg(not(windows))]
fn main() {
    eprintln!("excel-com-bridge must be compiled for Windows (--target x86_64-pc-windows-gnu)");
    eprintln!("and run natively or under WINE.");
    std::process::exit(1);
}

#[cfg(windows)]
fn main() {
    use std::io::{self, BufRead, Write};

    use excel_com_protocol::*;

    eprintln!("[excel-com-bridge] Starting up...");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut excel: Option<excel::ExcelApp> = None;

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("[excel-com-bridge] stdin read error: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (response, shutdown) = match serde_json::from_str::<Request>(line) {
            Ok(request) => {
                let response = handle_command(&mut excel, &request);
                let shutdown = matches!(request.command, Command::Shutdown)
                    && matches!(response.result, ResponseResult::Ok { .. });
                (response, shutdown)
            }
            Err(e) => {
                eprintln!("[excel-com-bridge] JSON parse error: {e}");
                eprintln!("[excel-com-bridge] Line was: {line}");
                // id 0: the request could not be correlated
                let response = Response {
                    id: 0,
                    result: ResponseResult::Error {
                        message: format!("JSON parse error: {e}"),
                    },
                };
                (response, false)
            }
        };

        match serde_json::to_string(&response) {
            Ok(json) => {
                let _ = writeln!(out, "{json}");
                let _ = out.flush();
            }
            Err(e) => eprintln!("[excel-com-bridge] failed to encode response: {e}"),
        }

        if shutdown {
            eprintln!("[excel-com-bridge] Shutdown complete, exiting.");
            break;
        }
    }

    if let Some(app) = excel {
        eprintln!("[excel-com-bridge] stdin closed, shutting down Excel...");
        let _ = app.shutdown();
        uninit_com();
    }

    eprintln!("[excel-com-bridge] Process exiting.");
}

#[cfg(windows)]
fn handle_command(
    excel: &mut Option<excel::ExcelApp>,
    request: &excel_com_protocol::Request,
) -> excel_com_protocol::Response {
    use excel_com_protocol::*;

    let ok = |data: Option<ResponseData>| -> Result<ResponseResult, String> {
        Ok(ResponseResult::Ok { data })
    };

    let result = match &request.command {
        Command::Init => init_com_and_excel(excel),
        Command::OpenWorkbook { path } => with_excel(excel, |app| {
            let workbook = app.open_workbook(path)?;
            ok(Some(ResponseData::WorkbookHandle { workbook }))
        }),
        Command::LastRow {
            workbook,
            sheet,
            fallback_column,
        } => with_excel(excel, |app| {
            let row = app.last_row(*workbook, sheet, *fallback_column)?;
            ok(Some(ResponseData::Row { row }))
        }),
        Command::ListShapes { workbook, sheet } => with_excel(excel, |app| {
            let shapes = app.list_shapes(*workbook, sheet)?;
            ok(Some(ResponseData::Shapes { shapes }))
        }),
        Command::GetCellValue {
            workbook,
            sheet,
            row,
            column,
            merge_aware,
        } => with_excel(excel, |app| {
            let value = app.get_cell_value(*workbook, sheet, *row, *column, *merge_aware)?;
            ok(Some(ResponseData::Value { value }))
        }),
        Command::ExportShapePicture {
            workbook,
            sheet,
            shape,
            appearance,
            path,
        } => with_excel(excel, |app| {
            app.export_shape_picture(*workbook, sheet, *shape, *appearance, path)?;
            ok(None)
        }),
        Command::ExportRangePicture {
            workbook,
            sheet,
            row,
            column,
            appearance,
            path,
        } => with_excel(excel, |app| {
            app.export_range_picture(*workbook, sheet, *row, *column, *appearance, path)?;
            ok(None)
        }),
        Command::CloseWorkbook { workbook } => with_excel(excel, |app| {
            app.close_workbook(*workbook)?;
            ok(None)
        }),
        Command::Shutdown => match excel.take() {
            Some(app) => match app.shutdown() {
                Ok(()) => {
                    uninit_com();
                    ResponseResult::Ok { data: None }
                }
                Err(e) => ResponseResult::Error {
                    message: format!("Shutdown failed: {e}"),
                },
            },
            None => ResponseResult::Ok { data: None },
        },
    };

    Response {
        id: request.id,
        result,
    }
}

#[cfg(windows)]
fn init_com_and_excel(excel: &mut Option<excel::ExcelApp>) -> excel_com_protocol::ResponseResult {
    use excel_com_protocol::ResponseResult;
    use windows::Win32::System::Com::{CoInitializeEx, COINIT_APARTMENTTHREADED};

    if excel.is_some() {
        return ResponseResult::Ok { data: None };
    }

    // Excel requires a single-threaded apartment
    unsafe {
        if let Err(e) = CoInitializeEx(None, COINIT_APARTMENTTHREADED).ok() {
            return ResponseResult::Error {
                message: format!("CoInitializeEx failed: {e}"),
            };
        }
    }

    eprintln!("[excel-com-bridge] COM initialized (STA)");

    match excel::ExcelApp::new() {
        Ok(app) => {
            eprintln!("[excel-com-bridge] Excel.Application created successfully");
            *excel = Some(app);
            ResponseResult::Ok { data: None }
        }
        Err(e) => ResponseResult::Error {
            message: format!("Failed to create Excel.Application: {e}"),
        },
    }
}

#[cfg(windows)]
fn uninit_com() {
    unsafe {
        windows::Win32::System::Com::CoUninitialize();
    }
    eprintln!("[excel-com-bridge] COM uninitialized");
}

#[cfg(windows)]
fn with_excel(
    excel: &mut Option<excel::ExcelApp>,
    f: impl FnOnce(&mut excel::ExcelApp) -> Result<excel_com_protocol::ResponseResult, String>,
) -> excel_com_protocol::ResponseResult {
    match excel.as_mut() {
        Some(app) => {
            f(app).unwrap_or_else(|message| excel_com_protocol::ResponseResult::Error { message })
        }
        None => excel_com_protocol::ResponseResult::Error {
            message: "Excel not initialized. Send 'Init' command first.".to_string(),
        },
    }
}
