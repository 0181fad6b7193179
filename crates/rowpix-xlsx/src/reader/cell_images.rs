//! WPS cell-image catalog (`xl/cellimages.xml`).
//!
//! Each `etc:cellImage` wraps an `xdr:pic` whose `cNvPr name` is the id used
//! by `DISPIMG("ID_…",1)` formulas in the worksheet.

use std::collections::HashMap;
use std::io::{BufReader, Read, Seek};

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use super::{attr, read_relationships, rels_path_for, resolve_target, Archive, Relationship};
use crate::error::{XlsxError, XlsxResult};

const DEFAULT_PART: &str = "xl/cellimages.xml";

/// Locate the catalog part through the workbook relationships, falling back
/// to the conventional location.
fn catalog_part(workbook_rels: &HashMap<String, Relationship>) -> String {
    workbook_rels
        .values()
        .filter(|rel| !rel.external)
        .find(|rel| rel.target.to_ascii_lowercase().ends_with("cellimages.xml"))
        .map(|rel| resolve_target("xl/workbook.xml", &rel.target))
        .unwrap_or_else(|| DEFAULT_PART.to_string())
}

/// Map image id -> media part. A package without a catalog yields an empty map.
pub(crate) fn read_cell_images<R: Read + Seek>(
    archive: &mut Archive<R>,
    workbook_rels: &HashMap<String, Relationship>,
) -> XlsxResult<HashMap<String, String>> {
    let part = catalog_part(workbook_rels);
    let rels = read_relationships(archive, &rels_path_for(&part))?;
    let mut catalog = HashMap::new();

    let file = match archive.by_name(&part) {
        Ok(f) => f,
        Err(_) => {
            log::debug!("cell image catalog {part} missing from package");
            return Ok(catalog);
        }
    };

    let mut xml_reader = Reader::from_reader(BufReader::new(file));
    xml_reader.trim_text(true);
    let mut buf = Vec::new();

    let mut in_image = false;
    let mut name: Option<String> = None;
    let mut embed: Option<String> = None;

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"cellImage" => {
                in_image = true;
                name = None;
                embed = None;
            }
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if in_image => {
                match e.local_name().as_ref() {
                    b"cNvPr" if name.is_none() => name = attr(&e, b"name"),
                    b"blip" if embed.is_none() => embed = attr(&e, b"embed"),
                    _ => {}
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"cellImage" => {
                in_image = false;
                let target = embed
                    .take()
                    .and_then(|id| rels.get(&id))
                    .filter(|rel| !rel.external)
                    .map(|rel| resolve_target(&part, &rel.target));
                match (name.take(), target) {
                    (Some(id), Some(media)) => {
                        catalog.insert(id, media);
                    }
                    (id, _) => log::debug!("{part}: cell image {id:?} has no media target"),
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(catalog)
}
