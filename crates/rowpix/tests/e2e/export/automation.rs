//! Automation backend against a scripted host.

use std::fs;

use crate::{shape, FakeHost, Scene, Target, Workbook};
use pretty_assertions::assert_eq;
use rowpix::{run_export, Appearance, Engine, ExportOptions, FallbackNaming};

fn automation_options() -> ExportOptions {
    ExportOptions {
        engine: Engine::Automation,
        start_row: 2,
        ..ExportOptions::default()
    }
}

fn scene() -> Scene {
    Scene::new(&Workbook::new("Sheet2"))
}

#[test]
fn test_shapes_exported_per_row() {
    let scene = scene();
    let host = FakeHost::new(4)
        .picture(1, 2, 1)
        .picture(2, 2, 2)
        .picture(3, 3, 1)
        .shape(shape(4, 1, 4, 1))
        .name(2, 2, "Valve")
        .name(3, 2, "Pump");

    let options = ExportOptions {
        cell_fallback: false,
        ..automation_options()
    };
    let summary = run_export(&scene.request(options), host.connector()).unwrap();

    assert_eq!(summary.total(), 3);
    assert_eq!(
        scene.outputs(),
        vec!["Pump_1.png", "Valve_1.png", "Valve_2.png"]
    );

    let calls = host.calls.borrow();
    assert_eq!(calls.connects, 1);
    assert!(calls.closed);
    assert!(calls
        .renders
        .iter()
        .all(|(target, _)| matches!(target, Target::Shape(1..=3))));
}

#[test]
fn test_blank_capture_is_retried_with_other_appearance() {
    let scene = scene();
    let host = FakeHost::new(2)
        .picture(1, 2, 1)
        .name(2, 2, "Valve")
        .sizes(Target::Shape(1), &[100, 0, 9000]);

    let summary = run_export(&scene.request(automation_options()), host.connector()).unwrap();
    assert_eq!(summary.total(), 1);
    assert_eq!(scene.outputs(), vec!["Valve_1.png"]);
    assert_eq!(
        fs::metadata(scene.output.join("Valve_1.png")).unwrap().len(),
        9000
    );

    let appearances: Vec<Appearance> = host.calls.borrow().renders.iter().map(|r| r.1).collect();
    assert_eq!(
        appearances,
        vec![Appearance::Screen, Appearance::Printer, Appearance::Screen]
    );
}

#[test]
fn test_exhausted_capture_leaves_no_file() {
    let scene = scene();
    let host = FakeHost::new(2)
        .picture(1, 2, 1)
        .name(2, 2, "Valve")
        .sizes(Target::Shape(1), &[100, 200]);

    let options = ExportOptions {
        retries: 1,
        ..automation_options()
    };
    let summary = run_export(&scene.request(options), host.connector()).unwrap();

    assert_eq!(summary.total(), 0);
    assert!(scene.outputs().is_empty());
    assert_eq!(host.calls.borrow().renders.len(), 2);
}

#[test]
fn test_render_errors_are_bounded() {
    let scene = scene();
    let mut host = FakeHost::new(2).picture(1, 2, 1);
    host.failing_renders = true;

    let summary = run_export(&scene.request(automation_options()), host.connector()).unwrap();
    assert_eq!(summary.automation.map(|r| r.exported), Some(0));

    let calls = host.calls.borrow();
    assert_eq!(calls.renders.len(), 6);
    assert!(calls.closed);
}

#[test]
fn test_cell_fallback_index_naming() {
    let scene = scene();
    let mut host = FakeHost::new(3)
        .name(2, 2, "Valve")
        .name(3, 2, "Pump")
        .sizes(Target::Cell(2, 1), &[9000]);
    host.default_size = 0;

    run_export(&scene.request(automation_options()), host.connector()).unwrap();

    assert_eq!(scene.outputs(), vec!["Valve_1.png"]);
    let calls = host.calls.borrow();
    let row3 = calls
        .renders
        .iter()
        .filter(|(t, _)| *t == Target::Cell(3, 1))
        .count();
    assert_eq!(row3, 6);
}

#[test]
fn test_cell_fallback_coordinate_naming() {
    let scene = scene();
    let host = FakeHost::new(2).name(2, 2, "Valve");

    let options = ExportOptions {
        image_col: "C".into(),
        fallback_naming: FallbackNaming::Coordinate,
        ..automation_options()
    };
    run_export(&scene.request(options), host.connector()).unwrap();

    assert_eq!(scene.outputs(), vec!["Valve_C2.png"]);
    assert_eq!(host.calls.borrow().renders[0].0, Target::Cell(2, 3));
}

#[test]
fn test_picture_below_last_row_is_reached() {
    let scene = scene();
    let host = FakeHost::new(1).picture(1, 5, 1).name(5, 2, "Bottom");

    let options = ExportOptions {
        cell_fallback: false,
        ..automation_options()
    };
    run_export(&scene.request(options), host.connector()).unwrap();
    assert_eq!(scene.outputs(), vec!["Bottom_1.png"]);
}

#[test]
fn test_unavailable_host_exports_nothing() {
    let scene = scene();
    let mut host = FakeHost::new(2).picture(1, 2, 1);
    host.unavailable = true;

    let summary = run_export(&scene.request(automation_options()), host.connector()).unwrap();
    assert!(summary.automation.is_none());
    assert_eq!(summary.total(), 0);
    assert!(host.calls.borrow().renders.is_empty());
}
