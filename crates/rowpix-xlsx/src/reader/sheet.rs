//! Worksheet part: cell text, extent, merges, drawing links and `DISPIMG` cells.

use std::collections::HashMap;
use std::io::{BufReader, Read, Seek};

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use super::{attr, decode_excel_escapes, Archive};
use crate::error::{XlsxError, XlsxResult};
use rowpix_core::{CellAddress, CellRange, MAX_ROWS};

#[derive(Debug, Default)]
pub(crate) struct ParsedSheet {
    pub declared_max_row: u32,
    pub cells: HashMap<(u32, u32), String>,
    pub merged: Vec<CellRange>,
    pub drawing_ids: Vec<String>,
    /// Cells whose formula places a WPS cell image, with the image id
    pub cell_image_refs: Vec<(CellAddress, String)>,
}

/// Current `<c>` element state
#[derive(Default)]
struct CellState {
    addr: Option<CellAddress>,
    cell_type: Option<String>,
    value: Option<String>,
    formula: Option<String>,
}

pub(crate) fn read_worksheet<R: Read + Seek>(
    archive: &mut Archive<R>,
    path: &str,
    shared_strings: &[String],
) -> XlsxResult<ParsedSheet> {
    let file = archive
        .by_name(path)
        .map_err(|_| XlsxError::MissingPart(path.to_string()))?;

    let mut xml_reader = Reader::from_reader(BufReader::new(file));
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut sheet = ParsedSheet::default();

    let mut cell: Option<CellState> = None;
    let mut in_value = false;
    let mut in_formula = false;
    let mut in_inline_text = false;

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => note_row(&mut sheet, attr(&e, b"r")),
                b"c" => {
                    cell = Some(CellState {
                        addr: attr(&e, b"r").and_then(|r| CellAddress::parse(&r).ok()),
                        cell_type: attr(&e, b"t"),
                        ..CellState::default()
                    });
                }
                b"v" if cell.is_some() => in_value = true,
                b"f" if cell.is_some() => in_formula = true,
                b"t" if cell.is_some() => in_inline_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"row" => note_row(&mut sheet, attr(&e, b"r")),
                b"dimension" => {
                    if let Some(range) = attr(&e, b"ref").and_then(|r| CellRange::parse(&r).ok()) {
                        sheet.declared_max_row = sheet.declared_max_row.max(range.end.row);
                    }
                }
                b"mergeCell" => {
                    if let Some(range) = attr(&e, b"ref").and_then(|r| CellRange::parse(&r).ok()) {
                        sheet.merged.push(range);
                    }
                }
                b"drawing" => {
                    if let Some(id) = attr(&e, b"id") {
                        sheet.drawing_ids.push(id);
                    }
                }
                _ => {}
            },
            Ok(Event::Text(e)) if cell.is_some() && (in_value || in_formula || in_inline_text) => {
                if let (Some(state), Ok(text)) = (cell.as_mut(), e.unescape()) {
                    let slot = if in_formula {
                        &mut state.formula
                    } else {
                        &mut state.value
                    };
                    slot.get_or_insert_with(String::new).push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" => in_value = false,
                b"f" => in_formula = false,
                b"t" => in_inline_text = false,
                b"c" => {
                    if let Some(state) = cell.take() {
                        finish_cell(&mut sheet, state, shared_strings);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(sheet)
}

/// Rows past the grid limit are ignored.
fn note_row(sheet: &mut ParsedSheet, r: Option<String>) {
    let row = r
        .and_then(|r| r.trim().parse::<u32>().ok())
        .filter(|&row| row <= MAX_ROWS);
    if let Some(row) = row {
        sheet.declared_max_row = sheet.declared_max_row.max(row);
    }
}

fn finish_cell(sheet: &mut ParsedSheet, state: CellState, shared_strings: &[String]) {
    let Some(addr) = state.addr else {
        return;
    };

    if let Some(id) = state.formula.as_deref().and_then(dispimg_id) {
        sheet.cell_image_refs.push((addr, id));
    }

    let Some(raw) = state.value else {
        return;
    };

    let text = match state.cell_type.as_deref() {
        Some("s") => match raw.trim().parse::<usize>().ok().and_then(|i| shared_strings.get(i)) {
            Some(s) => s.clone(),
            None => {
                log::debug!("{addr}: shared string index '{raw}' out of range");
                return;
            }
        },
        Some("b") => {
            if raw == "1" || raw.eq_ignore_ascii_case("true") {
                "TRUE".to_string()
            } else {
                "FALSE".to_string()
            }
        }
        Some("inlineStr") | Some("str") => decode_excel_escapes(&raw),
        _ => raw,
    };

    sheet.cells.insert((addr.row, addr.col), text);
}

/// Extract the image id from a `DISPIMG("ID_…",1)` formula.
pub(crate) fn dispimg_id(formula: &str) -> Option<String> {
    let upper = formula.to_ascii_uppercase();
    let start = upper.find("DISPIMG(")? + "DISPIMG(".len();
    let args = &formula[start..];
    let open = args.find('"')?;
    let rest = &args[open + 1..];
    let close = rest.find('"')?;
    let id = rest[..close].trim();
    (!id.is_empty()).then(|| id.to_string())
}
