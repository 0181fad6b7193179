//! Library backend: pictures read from the package and written verbatim.

use std::collections::BTreeSet;
use std::fs;

use crate::{jpeg, png, FakeHost, Scene, Workbook};
use pretty_assertions::assert_eq;
use rowpix::{
    run_export, Engine, ExportJob, ExportOptions, ExtractionBackend, LibraryBackend,
};

fn library_options() -> ExportOptions {
    ExportOptions {
        engine: Engine::Library,
        ..ExportOptions::default()
    }
}

fn parts_book() -> Workbook {
    Workbook::new("Sheet2")
        .text(1, 2, "Name")
        .text(2, 2, "Valve")
        .text(3, 2, "Pump")
        .text(4, 2, "Gasket")
        .picture(2, 1, png(255, 0, 0))
        .picture(3, 1, png(0, 255, 0))
        .picture(4, 1, png(0, 0, 255))
}

#[test]
fn test_one_file_per_row() {
    let scene = Scene::new(&parts_book());
    let summary = run_export(&scene.request(library_options()), FakeHost::new(0).connector())
        .unwrap();

    assert_eq!(summary.total(), 3);
    assert_eq!(
        scene.outputs(),
        vec!["Gasket_1.png", "Pump_1.png", "Valve_1.png"]
    );

    let report = summary.library.unwrap();
    assert_eq!(report.rows.into_iter().collect::<Vec<_>>(), vec![2, 3, 4]);
    assert!(summary.automation.is_none());

    let written = fs::read(scene.output.join("Pump_1.png")).unwrap();
    assert_eq!(written, png(0, 255, 0));
}

#[test]
fn test_several_pictures_in_a_row_and_jpeg_extension() {
    let book = Workbook::new("Sheet2")
        .text(5, 2, "Flange")
        .picture(5, 1, png(1, 2, 3))
        .picture(5, 2, jpeg());
    let scene = Scene::new(&book);

    run_export(&scene.request(library_options()), FakeHost::new(0).connector()).unwrap();
    assert_eq!(scene.outputs(), vec!["Flange_1.png", "Flange_2.jpg"]);
}

#[test]
fn test_corrupt_picture_is_skipped() {
    let book = Workbook::new("Sheet2")
        .text(2, 2, "Broken")
        .text(3, 2, "Fine")
        .picture(2, 1, b"definitely not an image".to_vec())
        .picture(3, 1, png(9, 9, 9));
    let scene = Scene::new(&book);

    let summary =
        run_export(&scene.request(library_options()), FakeHost::new(0).connector()).unwrap();
    assert_eq!(summary.total(), 1);
    assert_eq!(scene.outputs(), vec!["Fine_1.png"]);
}

#[test]
fn test_column_tolerance() {
    let book = Workbook::new("Sheet2")
        .text(2, 2, "Near")
        .text(3, 2, "Far")
        .picture(2, 3, png(1, 1, 1))
        .picture(3, 6, png(2, 2, 2));
    let scene = Scene::new(&book);

    run_export(&scene.request(library_options()), FakeHost::new(0).connector()).unwrap();
    assert_eq!(scene.outputs(), vec!["Near_1.png"]);

    let any_column = ExportOptions {
        image_col: String::new(),
        ..library_options()
    };
    let scene = Scene::new(&book);
    run_export(&scene.request(any_column), FakeHost::new(0).connector()).unwrap();
    assert_eq!(scene.outputs(), vec!["Far_1.png", "Near_1.png"]);
}

#[test]
fn test_merged_name_and_blank_name() {
    let book = Workbook::new("Sheet2")
        .text(2, 2, "Valve")
        .merge("B2:B3")
        .picture(3, 1, png(4, 4, 4))
        .picture(4, 1, png(5, 5, 5));
    let scene = Scene::new(&book);

    run_export(&scene.request(library_options()), FakeHost::new(0).connector()).unwrap();
    assert_eq!(scene.outputs(), vec!["Valve_1.png", "row_4_1.png"]);
}

#[test]
fn test_carry_names_forward() {
    let book = Workbook::new("Sheet2")
        .text(2, 2, "Valve")
        .picture(2, 1, png(4, 4, 4))
        .picture(3, 1, png(5, 5, 5));
    let scene = Scene::new(&book);

    let options = ExportOptions {
        carry_names: true,
        ..library_options()
    };
    run_export(&scene.request(options), FakeHost::new(0).connector()).unwrap();
    assert_eq!(scene.outputs(), vec!["Valve_1.png", "Valve_1_2.png"]);
}

#[test]
fn test_existing_files_are_not_overwritten() {
    let scene = Scene::new(&parts_book());
    fs::write(scene.output.join("Valve_1.png"), b"keep me").unwrap();

    run_export(&scene.request(library_options()), FakeHost::new(0).connector()).unwrap();

    assert_eq!(
        scene.outputs(),
        vec!["Gasket_1.png", "Pump_1.png", "Valve_1.png", "Valve_1_2.png"]
    );
    assert_eq!(fs::read(scene.output.join("Valve_1.png")).unwrap(), b"keep me");
}

#[test]
fn test_start_row_and_skip_rows() {
    let scene = Scene::new(&parts_book());
    let mut request = scene.request(library_options());
    request.options.start_row = 3;
    let job = ExportJob::resolve(&request).unwrap();

    let skip: BTreeSet<u32> = [4].into_iter().collect();
    let report = LibraryBackend::new().export(&job, &skip).unwrap();

    assert_eq!(report.exported, 1);
    assert_eq!(scene.outputs(), vec!["Pump_1.png"]);
}

#[test]
fn test_missing_sheet_exports_nothing() {
    let scene = Scene::new(&parts_book());
    let options = ExportOptions {
        sheet: "Nope".into(),
        ..library_options()
    };

    let job = ExportJob::resolve(&scene.request(options.clone())).unwrap();
    assert!(LibraryBackend::new().export(&job, &BTreeSet::new()).is_err());

    let summary = run_export(&scene.request(options), FakeHost::new(0).connector()).unwrap();
    assert!(summary.library.is_none());
    assert_eq!(summary.total(), 0);
}

#[test]
fn test_non_package_input_is_ignored() {
    let scene = Scene::new(&parts_book());
    let renamed = scene.dir.path().join("book.xls");
    fs::rename(&scene.input, &renamed).unwrap();

    let mut request = scene.request(library_options());
    request.input = renamed;
    let summary = run_export(&request, FakeHost::new(0).connector()).unwrap();

    assert_eq!(summary.library.map(|r| r.exported), Some(0));
    assert!(scene.outputs().is_empty());
}
