//! XLSX picture reader

mod cell_images;
mod drawing;
mod sheet;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use crate::images::{ImageSource, SheetImage, SheetImages};
use rowpix_core::RawAnchor;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";

/// Decode Excel's `_xHHHH_` escape sequences in strings.
///
/// Excel uses this format to encode special characters in XML:
/// - `_x000d_` = CR (carriage return)
/// - `_x000a_` = LF (line feed)
/// - `_x005f_` = Underscore (escaped underscore)
pub(crate) fn decode_excel_escapes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find("_x") {
        result.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let hex = tail.get(2..6);
        let decoded = match (hex, tail.as_bytes().get(6)) {
            (Some(hex), Some(b'_')) if hex.bytes().all(|b| b.is_ascii_hexdigit()) => {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            }
            _ => None,
        };

        match decoded {
            Some(c) => {
                result.push(c);
                rest = &tail[7..];
            }
            None => {
                result.push('_');
                rest = &tail[1..];
            }
        }
    }

    result.push_str(rest);
    result
}

/// Value of the attribute whose local name (prefix stripped) is `local`.
pub(crate) fn attr(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Resolve a relationship `Target` against the part that owns the `.rels`.
///
/// `xl/drawings/drawing1.xml` + `../media/image1.png` → `xl/media/image1.png`
pub(crate) fn resolve_target(base_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = base_part.split('/').collect();
    segments.pop();
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// The `.rels` part describing the relationships of `part`.
///
/// `xl/worksheets/sheet1.xml` → `xl/worksheets/_rels/sheet1.xml.rels`
pub(crate) fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// One `<Relationship>` entry.
#[derive(Debug, Clone)]
pub(crate) struct Relationship {
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

pub(crate) type Archive<R> = zip::ZipArchive<R>;

/// Read a `.rels` part into `Id -> Relationship`. A missing part is empty.
pub(crate) fn read_relationships<R: Read + Seek>(
    archive: &mut Archive<R>,
    rels_path: &str,
) -> XlsxResult<HashMap<String, Relationship>> {
    let mut rels = HashMap::new();

    let file = match archive.by_name(rels_path) {
        Ok(f) => f,
        Err(_) => return Ok(rels),
    };

    let mut xml_reader = Reader::from_reader(BufReader::new(file));
    xml_reader.trim_text(true);
    let mut buf = Vec::new();

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attr(&e, b"Id"), attr(&e, b"Target")) {
                    let external = attr(&e, b"TargetMode")
                        .is_some_and(|m| m.trim().eq_ignore_ascii_case("External"));
                    rels.insert(
                        id,
                        Relationship {
                            rel_type: attr(&e, b"Type").unwrap_or_default(),
                            target,
                            external,
                        },
                    );
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// Read the bytes of a package part, `None` when the part is absent.
pub(crate) fn read_part<R: Read + Seek>(
    archive: &mut Archive<R>,
    part: &str,
) -> XlsxResult<Option<Vec<u8>>> {
    let mut file = match archive.by_name(part) {
        Ok(f) => f,
        Err(_) => return Ok(None),
    };
    let mut data = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut data)?;
    Ok(Some(data))
}

/// Reads one worksheet's pictures, anchors and cell text from an XLSX package.
pub struct XlsxImageReader;

impl XlsxImageReader {
    /// Read a sheet from a file path
    pub fn read_sheet_file<P: AsRef<Path>>(path: P, sheet_name: &str) -> XlsxResult<SheetImages> {
        let file = File::open(path)?;
        Self::read_sheet(BufReader::new(file), sheet_name)
    }

    /// List the workbook's sheet names in order
    pub fn sheet_names_file<P: AsRef<Path>>(path: P) -> XlsxResult<Vec<String>> {
        let file = File::open(path)?;
        Self::sheet_names(BufReader::new(file))
    }

    pub fn sheet_names<R: Read + Seek>(reader: R) -> XlsxResult<Vec<String>> {
        let mut archive = Self::open_archive(reader)?;
        let sheets = Self::read_workbook_xml(&mut archive)?;
        Ok(sheets.into_iter().map(|(name, _)| name).collect())
    }

    /// Read a sheet's pictures, anchors and cell text from a reader
    pub fn read_sheet<R: Read + Seek>(reader: R, sheet_name: &str) -> XlsxResult<SheetImages> {
        let mut archive = Self::open_archive(reader)?;

        let shared_strings = Self::read_shared_strings(&mut archive)?;
        let sheet_info = Self::read_workbook_xml(&mut archive)?;
        let workbook_rels = read_relationships(&mut archive, WORKBOOK_RELS_PART)?;

        let r_id = sheet_info
            .iter()
            .find(|(name, _)| name == sheet_name)
            .map(|(_, r_id)| r_id.clone())
            .ok_or_else(|| XlsxError::SheetNotFound {
                name: sheet_name.to_string(),
                available: sheet_info.iter().map(|(n, _)| n.clone()).collect(),
            })?;

        let sheet_part = workbook_rels
            .get(&r_id)
            .filter(|rel| rel.rel_type.ends_with("/worksheet"))
            .map(|rel| resolve_target(WORKBOOK_PART, &rel.target))
            .ok_or_else(|| {
                XlsxError::InvalidFormat(format!("no worksheet relationship for {r_id}"))
            })?;

        let parsed = sheet::read_worksheet(&mut archive, &sheet_part, &shared_strings)?;
        let sheet_rels = read_relationships(&mut archive, &rels_path_for(&sheet_part))?;

        let mut images = Vec::new();

        for drawing_id in &parsed.drawing_ids {
            let Some(rel) = sheet_rels.get(drawing_id) else {
                log::debug!("{sheet_part}: drawing relationship {drawing_id} not found");
                continue;
            };
            let drawing_part = resolve_target(&sheet_part, &rel.target);
            images.extend(drawing::read_drawing(&mut archive, &drawing_part)?);
        }

        if !parsed.cell_image_refs.is_empty() {
            let catalog = cell_images::read_cell_images(&mut archive, &workbook_rels)?;
            for (addr, id) in &parsed.cell_image_refs {
                let media_part = catalog.get(id).cloned();
                if media_part.is_none() {
                    log::debug!("{sheet_part}: {addr} references unknown cell image {id}");
                }
                images.push(SheetImage {
                    anchor: RawAnchor::from_cell_ref(addr.to_a1_string()),
                    source: ImageSource::CellImage,
                    name: Some(id.clone()),
                    media_part,
                    data: None,
                });
            }
        }

        for image in &mut images {
            if let Some(part) = &image.media_part {
                image.data = read_part(&mut archive, part)?;
                if image.data.is_none() {
                    log::debug!("media part {part} missing from package");
                }
            }
        }

        Ok(SheetImages {
            sheet_name: sheet_name.to_string(),
            declared_max_row: parsed.declared_max_row,
            cells: parsed.cells,
            merged: parsed.merged,
            images,
        })
    }

    fn open_archive<R: Read + Seek>(reader: R) -> XlsxResult<Archive<R>> {
        let mut archive = zip::ZipArchive::new(reader)?;

        if archive.by_name("[Content_Types].xml").is_err() {
            return Err(XlsxError::InvalidFormat(
                "Missing [Content_Types].xml".into(),
            ));
        }

        Ok(archive)
    }

    /// Read the shared strings table
    fn read_shared_strings<R: Read + Seek>(archive: &mut Archive<R>) -> XlsxResult<Vec<String>> {
        let mut strings = Vec::new();

        let file = match archive.by_name("xl/sharedStrings.xml") {
            Ok(f) => f,
            Err(_) => return Ok(strings), // No shared strings is valid
        };

        let mut xml_reader = Reader::from_reader(BufReader::new(file));
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut current_string = String::new();
        let mut in_si = false;
        let mut in_t = false;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"si" => {
                        in_si = true;
                        current_string.clear();
                    }
                    b"t" if in_si => in_t = true,
                    _ => {}
                },
                Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => {
                    strings.push(String::new());
                }
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"si" => {
                        strings.push(decode_excel_escapes(&current_string));
                        current_string.clear();
                        in_si = false;
                    }
                    b"t" => in_t = false,
                    _ => {}
                },
                Ok(Event::Text(e)) if in_t => {
                    if let Ok(text) = e.unescape() {
                        current_string.push_str(&text);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(strings)
    }

    /// Read workbook.xml to get sheet names and rIds
    fn read_workbook_xml<R: Read + Seek>(
        archive: &mut Archive<R>,
    ) -> XlsxResult<Vec<(String, String)>> {
        let file = archive
            .by_name(WORKBOOK_PART)
            .map_err(|_| XlsxError::MissingPart(WORKBOOK_PART.into()))?;

        let mut xml_reader = Reader::from_reader(BufReader::new(file));
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut sheets = Vec::new();

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e))
                    if e.local_name().as_ref() == b"sheet" =>
                {
                    if let (Some(name), Some(r_id)) = (attr(&e, b"name"), attr(&e, b"id")) {
                        sheets.push((name, r_id));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(sheets)
    }
}
