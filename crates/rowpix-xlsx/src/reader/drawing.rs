//! Drawing part (`xdr:wsDr`): picture anchors and their media targets.
//!
//! Only anchors that hold an `xdr:pic` are reported; shapes, charts and
//! group frames are ignored. Within `mc:AlternateContent` the first branch
//! that yields a picture is used and later branches are skipped, so one
//! picture is not reported twice.

use std::io::{BufReader, Read, Seek};

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::reader::Reader;

use super::{attr, read_relationships, rels_path_for, resolve_target, Archive};
use crate::error::{XlsxError, XlsxResult};
use crate::images::{ImageSource, SheetImage};
use rowpix_core::{AnchorMarker, RawAnchor};

#[derive(Default)]
struct AnchorState {
    from_fields: Vec<(String, String)>,
    has_pic: bool,
    embed: Option<String>,
    name: Option<String>,
}

impl AnchorState {
    fn into_raw_anchor(self) -> (RawAnchor, Option<String>, Option<String>) {
        let exact = |key: &str| {
            self.from_fields
                .iter()
                .find(|(k, _)| k == key)
                .and_then(|(_, v)| v.trim().parse::<u32>().ok())
        };
        let from = match (exact("col"), exact("row")) {
            (Some(col), Some(row)) => Some(AnchorMarker { col, row }),
            _ => None,
        };

        let anchor = RawAnchor {
            from,
            cell_ref: None,
            fields: self.from_fields,
        };
        (anchor, self.embed, self.name)
    }
}

/// Per `mc:AlternateContent`: pictures seen when the current branch opened,
/// and whether an earlier branch already produced one.
struct AltState {
    pics_at_branch_start: usize,
    taken: bool,
}

pub(crate) fn read_drawing<R: Read + Seek>(
    archive: &mut Archive<R>,
    drawing_part: &str,
) -> XlsxResult<Vec<SheetImage>> {
    let rels = read_relationships(archive, &rels_path_for(drawing_part))?;

    let file = match archive.by_name(drawing_part) {
        Ok(f) => f,
        Err(_) => {
            log::debug!("drawing part {drawing_part} missing from package");
            return Ok(Vec::new());
        }
    };

    let mut xml_reader = Reader::from_reader(BufReader::new(file));
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut skip_buf = Vec::new();
    let mut images = Vec::new();

    let mut anchor: Option<AnchorState> = None;
    let mut in_from = false;
    let mut from_field: Option<String> = None;
    let mut pic_depth = 0usize;
    let mut pics_seen = 0usize;
    let mut alt_stack: Vec<AltState> = Vec::new();

    loop {
        let event = xml_reader.read_event_into(&mut buf);
        match event {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"oneCellAnchor" | b"twoCellAnchor" | b"absoluteAnchor" => {
                    anchor = Some(AnchorState::default());
                }
                b"AlternateContent" => alt_stack.push(AltState {
                    pics_at_branch_start: pics_seen,
                    taken: false,
                }),
                b"Choice" | b"Fallback" => {
                    if alt_stack.last().is_some_and(|alt| alt.taken) {
                        let name = e.name().as_ref().to_vec();
                        xml_reader.read_to_end_into(QName(&name), &mut skip_buf)?;
                        skip_buf.clear();
                    } else if let Some(alt) = alt_stack.last_mut() {
                        alt.pics_at_branch_start = pics_seen;
                    }
                }
                b"from" if anchor.is_some() => in_from = true,
                local if in_from => {
                    from_field = Some(String::from_utf8_lossy(local).into_owned());
                }
                b"pic" if anchor.is_some() => {
                    pic_depth += 1;
                    pics_seen += 1;
                    if let Some(state) = anchor.as_mut() {
                        state.has_pic = true;
                    }
                }
                _ => note_pic_child(&e, pic_depth, anchor.as_mut()),
            },
            Ok(Event::Empty(e)) => note_pic_child(&e, pic_depth, anchor.as_mut()),
            Ok(Event::Text(e)) if in_from => {
                if let (Some(field), Some(state), Ok(text)) =
                    (from_field.take(), anchor.as_mut(), e.unescape())
                {
                    state.from_fields.push((field, text.into_owned()));
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"oneCellAnchor" | b"twoCellAnchor" | b"absoluteAnchor" => {
                    if let Some(state) = anchor.take().filter(|s| s.has_pic) {
                        let (raw, embed, name) = state.into_raw_anchor();
                        let media_part = embed.as_ref().and_then(|id| match rels.get(id) {
                            Some(rel) if !rel.external => {
                                Some(resolve_target(drawing_part, &rel.target))
                            }
                            _ => {
                                log::debug!("{drawing_part}: embed {id} does not resolve to a package part");
                                None
                            }
                        });
                        images.push(SheetImage {
                            anchor: raw,
                            source: ImageSource::Drawing,
                            name,
                            media_part,
                            data: None,
                        });
                    }
                    in_from = false;
                    pic_depth = 0;
                }
                b"from" => {
                    in_from = false;
                    from_field = None;
                }
                b"pic" => pic_depth = pic_depth.saturating_sub(1),
                b"Choice" | b"Fallback" => {
                    if let Some(alt) = alt_stack.last_mut() {
                        if pics_seen > alt.pics_at_branch_start {
                            alt.taken = true;
                        }
                    }
                }
                b"AlternateContent" => {
                    alt_stack.pop();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(images)
}

/// Record `cNvPr name` and `a:blip r:embed` for the picture being read.
fn note_pic_child(e: &BytesStart<'_>, pic_depth: usize, anchor: Option<&mut AnchorState>) {
    let Some(state) = anchor else {
        return;
    };
    if pic_depth == 0 {
        return;
    }
    match e.local_name().as_ref() {
        b"cNvPr" if state.name.is_none() => state.name = attr(e, b"name"),
        b"blip" if state.embed.is_none() => state.embed = attr(e, b"embed"),
        _ => {}
    }
}
