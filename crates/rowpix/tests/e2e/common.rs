//! Fixtures: in-memory workbooks, PNG payloads and a scripted automation host.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use rowpix::{
    Appearance, AutomationConnector, AutomationSession, ExportError, ExportOptions,
    ExportRequest, Result, ShapeInfo,
};

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_XDR: &str = "http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// A small valid PNG of one colour.
pub fn png(r: u8, g: u8, b: u8) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([r, g, b])));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// A small valid JPEG.
pub fn jpeg() -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([200, 10, 10])));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .unwrap();
    bytes
}

/// A workbook whose first sheet is a filler and whose target sheet holds
/// text cells and floating pictures.
pub struct Workbook {
    sheet: String,
    cells: Vec<(u32, u32, String)>,
    merges: Vec<String>,
    /// `(row, col, media bytes)`, both 1-based
    pictures: Vec<(u32, u32, Vec<u8>)>,
}

impl Workbook {
    pub fn new(sheet: &str) -> Self {
        Self {
            sheet: sheet.to_string(),
            cells: Vec::new(),
            merges: Vec::new(),
            pictures: Vec::new(),
        }
    }

    pub fn text(mut self, row: u32, col: u32, text: &str) -> Self {
        self.cells.push((row, col, text.to_string()));
        self
    }

    pub fn merge(mut self, range: &str) -> Self {
        self.merges.push(range.to_string());
        self
    }

    pub fn picture(mut self, row: u32, col: u32, data: Vec<u8>) -> Self {
        self.pictures.push((row, col, data));
        self
    }

    fn sheet_xml(&self) -> String {
        let mut cells = self.cells.clone();
        cells.sort_by_key(|(r, c, _)| (*r, *c));

        let mut xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="{NS_MAIN}" xmlns:r="{NS_REL}"><sheetData>"#
        );
        let mut open_row = None;
        for (row, col, text) in &cells {
            if open_row != Some(*row) {
                if open_row.is_some() {
                    xml.push_str("</row>");
                }
                xml.push_str(&format!(r#"<row r="{row}">"#));
                open_row = Some(*row);
            }
            xml.push_str(&format!(
                r#"<c r="{}{row}" t="inlineStr"><is><t>{text}</t></is></c>"#,
                rowpix_core::column_letters(*col)
            ));
        }
        if open_row.is_some() {
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData>");
        if !self.merges.is_empty() {
            xml.push_str("<mergeCells>");
            for m in &self.merges {
                xml.push_str(&format!(r#"<mergeCell ref="{m}"/>"#));
            }
            xml.push_str("</mergeCells>");
        }
        if !self.pictures.is_empty() {
            xml.push_str(r#"<drawing r:id="rId1"/>"#);
        }
        xml.push_str("</worksheet>");
        xml
    }

    fn drawing_xml(&self) -> String {
        let mut xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><xdr:wsDr xmlns:xdr="{NS_XDR}" xmlns:a="{NS_A}" xmlns:r="{NS_REL}">"#
        );
        for (i, (row, col, _)) in self.pictures.iter().enumerate() {
            let n = i + 1;
            xml.push_str(&format!(
                r#"<xdr:oneCellAnchor><xdr:from><xdr:col>{}</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>{}</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:from><xdr:ext cx="100" cy="100"/><xdr:pic><xdr:nvPicPr><xdr:cNvPr id="{}" name="Picture {n}"/><xdr:cNvPicPr/></xdr:nvPicPr><xdr:blipFill><a:blip r:embed="rId{n}"/></xdr:blipFill><xdr:spPr/></xdr:pic><xdr:clientData/></xdr:oneCellAnchor>"#,
                col - 1,
                row - 1,
                n + 1
            ));
        }
        xml.push_str("</xdr:wsDr>");
        xml
    }

    pub fn build(&self) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        let mut put = |name: &str, data: &[u8]| {
            zip.start_file(name, options).unwrap();
            zip.write_all(data).unwrap();
        };
        let rels = |body: String| {
            format!(r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="{NS_PKG_REL}">{body}</Relationships>"#)
        };

        put(
            "[Content_Types].xml",
            br#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/></Types>"#,
        );
        put(
            "_rels/.rels",
            rels(format!(
                r#"<Relationship Id="rId1" Type="{REL_BASE}/officeDocument" Target="xl/workbook.xml"/>"#
            ))
            .as_bytes(),
        );
        put(
            "xl/workbook.xml",
            format!(
                r#"<?xml version="1.0"?><workbook xmlns="{NS_MAIN}" xmlns:r="{NS_REL}"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/><sheet name="{}" sheetId="2" r:id="rId2"/></sheets></workbook>"#,
                self.sheet
            )
            .as_bytes(),
        );
        put(
            "xl/_rels/workbook.xml.rels",
            rels(format!(
                r#"<Relationship Id="rId1" Type="{REL_BASE}/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="{REL_BASE}/worksheet" Target="worksheets/sheet2.xml"/>"#
            ))
            .as_bytes(),
        );
        put(
            "xl/worksheets/sheet1.xml",
            format!(r#"<?xml version="1.0"?><worksheet xmlns="{NS_MAIN}"><sheetData/></worksheet>"#)
                .as_bytes(),
        );
        put("xl/worksheets/sheet2.xml", self.sheet_xml().as_bytes());

        if !self.pictures.is_empty() {
            put(
                "xl/worksheets/_rels/sheet2.xml.rels",
                rels(format!(
                    r#"<Relationship Id="rId1" Type="{REL_BASE}/drawing" Target="../drawings/drawing1.xml"/>"#
                ))
                .as_bytes(),
            );
            put("xl/drawings/drawing1.xml", self.drawing_xml().as_bytes());

            let mut body = String::new();
            for (i, (_, _, data)) in self.pictures.iter().enumerate() {
                let n = i + 1;
                body.push_str(&format!(
                    r#"<Relationship Id="rId{n}" Type="{REL_BASE}/image" Target="../media/image{n}.bin"/>"#
                ));
                put(&format!("xl/media/image{n}.bin"), data);
            }
            put("xl/drawings/_rels/drawing1.xml.rels", rels(body).as_bytes());
        }

        zip.finish().unwrap().into_inner()
    }

    /// Write the package to `dir/book.xlsx`.
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        let path = dir.join("book.xlsx");
        fs::write(&path, self.build()).unwrap();
        path
    }
}

/// A temporary input workbook plus an empty output directory.
pub struct Scene {
    pub dir: tempfile::TempDir,
    pub input: PathBuf,
    pub output: PathBuf,
}

impl Scene {
    pub fn new(workbook: &Workbook) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let input = workbook.write_to(dir.path());
        let output = dir.path().join("out");
        fs::create_dir(&output).unwrap();
        Self { dir, input, output }
    }

    pub fn request(&self, options: ExportOptions) -> ExportRequest {
        ExportRequest::new(&self.input, &self.output).with_options(options)
    }

    /// File names in the output directory, sorted.
    pub fn outputs(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.output)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// What a render targets in the fake host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Shape(u32),
    Cell(u32, u32),
}

/// Everything the fake host was asked to do.
#[derive(Debug, Default)]
pub struct Calls {
    pub connects: usize,
    pub renders: Vec<(Target, Appearance)>,
    pub closed: bool,
}

/// A scripted automation host.
///
/// Each render of a target writes the next size queued for it, or
/// `default_size` once the queue is empty. A size of 0 writes nothing.
#[derive(Clone, Default)]
pub struct FakeHost {
    pub shapes: Vec<ShapeInfo>,
    pub last_row: u32,
    pub names: HashMap<(u32, u32), String>,
    pub sizes: HashMap<Target, VecDeque<u64>>,
    pub default_size: u64,
    pub failing_renders: bool,
    pub unavailable: bool,
    pub calls: Rc<RefCell<Calls>>,
}

impl FakeHost {
    pub fn new(last_row: u32) -> Self {
        Self {
            last_row,
            default_size: 9000,
            ..Self::default()
        }
    }

    pub fn picture(mut self, index: u32, row: u32, column: u32) -> Self {
        self.shapes.push(shape(index, 13, row, column));
        self
    }

    pub fn shape(mut self, info: ShapeInfo) -> Self {
        self.shapes.push(info);
        self
    }

    pub fn name(mut self, row: u32, col: u32, name: &str) -> Self {
        self.names.insert((row, col), name.to_string());
        self
    }

    pub fn sizes(mut self, target: Target, sizes: &[u64]) -> Self {
        self.sizes.insert(target, sizes.iter().copied().collect());
        self
    }

    pub fn connector(&self) -> FakeConnector {
        FakeConnector { host: self.clone() }
    }
}

pub fn shape(index: u32, shape_type: i32, row: u32, column: u32) -> ShapeInfo {
    ShapeInfo {
        index,
        name: format!("Picture {index}"),
        shape_type,
        row,
        column,
        width: 64.0,
        height: 48.0,
    }
}

pub struct FakeConnector {
    pub host: FakeHost,
}

impl AutomationConnector for FakeConnector {
    fn connect(&mut self, _workbook: &Path, _sheet: &str) -> Result<Box<dyn AutomationSession>> {
        self.host.calls.borrow_mut().connects += 1;
        if self.host.unavailable {
            return Err(ExportError::BackendUnavailable("no host in tests".into()));
        }
        Ok(Box::new(FakeSession {
            host: self.host.clone(),
        }))
    }
}

struct FakeSession {
    host: FakeHost,
}

impl FakeSession {
    fn render(&mut self, target: Target, appearance: Appearance, path: &Path) -> Result<()> {
        self.host.calls.borrow_mut().renders.push((target, appearance));
        if self.host.failing_renders {
            return Err(ExportError::InvalidOption("render refused".into()));
        }
        let size = self
            .host
            .sizes
            .get_mut(&target)
            .and_then(VecDeque::pop_front)
            .unwrap_or(self.host.default_size);
        if size > 0 {
            fs::write(path, vec![0u8; size as usize])?;
        }
        Ok(())
    }
}

impl AutomationSession for FakeSession {
    fn last_row(&mut self, _fallback_column: u32) -> Result<u32> {
        Ok(self.host.last_row)
    }

    fn shapes(&mut self) -> Result<Vec<ShapeInfo>> {
        Ok(self.host.shapes.clone())
    }

    fn cell_text(&mut self, row: u32, column: u32) -> Result<Option<String>> {
        Ok(self.host.names.get(&(row, column)).cloned())
    }

    fn export_shape(
        &mut self,
        shape: &ShapeInfo,
        appearance: Appearance,
        path: &Path,
    ) -> Result<()> {
        self.render(Target::Shape(shape.index), appearance, path)
    }

    fn export_cell(
        &mut self,
        row: u32,
        column: u32,
        appearance: Appearance,
        path: &Path,
    ) -> Result<()> {
        self.render(Target::Cell(row, column), appearance, path)
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.host.calls.borrow_mut().closed = true;
        Ok(())
    }
}
