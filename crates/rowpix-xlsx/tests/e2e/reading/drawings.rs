//! Floating pictures in the sheet drawing part.

use std::io::Cursor;

use crate::{PackageFixture, SheetFixture};
use pretty_assertions::assert_eq;
use rowpix_core::Anchor;
use rowpix_xlsx::{ImageSource, XlsxError, XlsxImageReader};

const PNG_A: &[u8] = b"\x89PNG\r\n\x1a\nfirst";
const PNG_B: &[u8] = b"\x89PNG\r\n\x1a\nsecond";

#[test]
fn test_picture_anchors_and_bytes() {
    let package = PackageFixture::new()
        .sheet(SheetFixture::new("Sheet1"))
        .sheet(
            SheetFixture::new("Sheet2")
                .picture(0, 1, "image1.png")
                .picture(0, 3, "image2.png"),
        )
        .media("image1.png", PNG_A)
        .media("image2.png", PNG_B)
        .build();

    let sheet = XlsxImageReader::read_sheet(Cursor::new(package), "Sheet2").unwrap();
    assert_eq!(sheet.sheet_name, "Sheet2");
    assert_eq!(sheet.image_count(), 2);

    let first = &sheet.images[0];
    assert_eq!(first.source, ImageSource::Drawing);
    assert_eq!(first.anchor.resolve(), Some(Anchor::new(2, 1)));
    assert_eq!(first.name.as_deref(), Some("Picture 1"));
    assert_eq!(first.media_part.as_deref(), Some("xl/media/image1.png"));
    assert_eq!(first.data.as_deref(), Some(PNG_A));

    let second = &sheet.images[1];
    assert_eq!(second.anchor.resolve(), Some(Anchor::new(4, 1)));
    assert_eq!(second.data.as_deref(), Some(PNG_B));
}

#[test]
fn test_sheet_without_drawing_has_no_images() {
    let package = PackageFixture::new()
        .sheet(SheetFixture::new("Sheet1").text("A1", "only text"))
        .build();

    let sheet = XlsxImageReader::read_sheet(Cursor::new(package), "Sheet1").unwrap();
    assert!(sheet.images.is_empty());
    assert_eq!(sheet.cell_text(1, 1), Some("only text"));
}

#[test]
fn test_missing_media_leaves_data_empty() {
    let package = PackageFixture::new()
        .sheet(SheetFixture::new("Sheet1").picture(2, 0, "gone.png"))
        .build();

    let sheet = XlsxImageReader::read_sheet(Cursor::new(package), "Sheet1").unwrap();
    assert_eq!(sheet.image_count(), 1);
    assert_eq!(sheet.images[0].media_part.as_deref(), Some("xl/media/gone.png"));
    assert_eq!(sheet.images[0].data, None);
}

#[test]
fn test_non_picture_anchors_are_ignored() {
    let shape = r#"<xdr:oneCellAnchor><xdr:from><xdr:col>1</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>5</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:from><xdr:ext cx="10" cy="10"/><xdr:sp><xdr:nvSpPr><xdr:cNvPr id="9" name="Rectangle 1"/><xdr:cNvSpPr/></xdr:nvSpPr><xdr:spPr/></xdr:sp><xdr:clientData/></xdr:oneCellAnchor>"#;
    let package = PackageFixture::new()
        .sheet(
            SheetFixture::new("Sheet1")
                .picture(0, 0, "image1.png")
                .raw_anchor(shape),
        )
        .media("image1.png", PNG_A)
        .build();

    let sheet = XlsxImageReader::read_sheet(Cursor::new(package), "Sheet1").unwrap();
    assert_eq!(sheet.image_count(), 1);
    assert_eq!(sheet.images[0].name.as_deref(), Some("Picture 1"));
}

#[test]
fn test_alternate_content_reports_one_picture() {
    let pic = |name: &str| {
        format!(
            r#"<xdr:pic><xdr:nvPicPr><xdr:cNvPr id="7" name="{name}"/><xdr:cNvPicPr/></xdr:nvPicPr><xdr:blipFill><a:blip r:embed="rId1"/></xdr:blipFill><xdr:spPr/></xdr:pic>"#
        )
    };
    let anchor = format!(
        r#"<mc:AlternateContent xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006"><mc:Choice Requires="a14"><xdr:oneCellAnchor><xdr:from><xdr:col>3</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>6</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:from><xdr:ext cx="10" cy="10"/>{}<xdr:clientData/></xdr:oneCellAnchor></mc:Choice><mc:Fallback><xdr:oneCellAnchor><xdr:from><xdr:col>3</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>6</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:from><xdr:ext cx="10" cy="10"/>{}<xdr:clientData/></xdr:oneCellAnchor></mc:Fallback></mc:AlternateContent>"#,
        pic("Choice picture"),
        pic("Fallback picture"),
    );
    let package = PackageFixture::new()
        .sheet(
            SheetFixture::new("Sheet1")
                .picture(0, 0, "image1.png")
                .raw_anchor(&anchor),
        )
        .media("image1.png", PNG_A)
        .build();

    let sheet = XlsxImageReader::read_sheet(Cursor::new(package), "Sheet1").unwrap();
    let names: Vec<_> = sheet.images.iter().map(|i| i.name.as_deref()).collect();
    assert_eq!(names, vec![Some("Picture 1"), Some("Choice picture")]);
    assert_eq!(sheet.images[1].anchor.resolve(), Some(Anchor::new(7, 4)));
}

#[test]
fn test_absolute_anchor_is_unresolved() {
    let absolute = r#"<xdr:absoluteAnchor><xdr:pos x="0" y="0"/><xdr:ext cx="10" cy="10"/><xdr:pic><xdr:nvPicPr><xdr:cNvPr id="5" name="Floating"/><xdr:cNvPicPr/></xdr:nvPicPr><xdr:blipFill><a:blip r:embed="rId1"/></xdr:blipFill><xdr:spPr/></xdr:pic><xdr:clientData/></xdr:absoluteAnchor>"#;
    let package = PackageFixture::new()
        .sheet(
            SheetFixture::new("Sheet1")
                .picture(0, 0, "image1.png")
                .raw_anchor(absolute),
        )
        .media("image1.png", PNG_A)
        .build();

    let sheet = XlsxImageReader::read_sheet(Cursor::new(package), "Sheet1").unwrap();
    assert_eq!(sheet.image_count(), 2);
    assert_eq!(sheet.images[1].name.as_deref(), Some("Floating"));
    assert_eq!(sheet.images[1].anchor.resolve(), None);
}

#[test]
fn test_sheet_not_found_lists_available() {
    let package = PackageFixture::new()
        .sheet(SheetFixture::new("Sheet1"))
        .sheet(SheetFixture::new("Data"))
        .build();

    let err = XlsxImageReader::read_sheet(Cursor::new(package), "Sheet2").unwrap_err();
    match err {
        XlsxError::SheetNotFound { name, available } => {
            assert_eq!(name, "Sheet2");
            assert_eq!(available, vec!["Sheet1".to_string(), "Data".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_not_a_zip() {
    let err = XlsxImageReader::read_sheet(Cursor::new(b"plain text".to_vec()), "Sheet1");
    assert!(matches!(err, Err(XlsxError::Zip(_))));
}

#[test]
fn test_sheet_names_in_order() {
    let package = PackageFixture::new()
        .sheet(SheetFixture::new("Sheet1"))
        .sheet(SheetFixture::new("Sheet2"))
        .sheet(SheetFixture::new("Photos & Names"))
        .build();

    let names = XlsxImageReader::sheet_names(Cursor::new(package)).unwrap();
    assert_eq!(names, vec!["Sheet1", "Sheet2", "Photos & Names"]);
}
