//! Boundary validation through the public API.

use schemgen::layout::PlacementKind;
use schemgen::prelude::*;
use schemgen::routing::{WireRoute, WireSegment};
use schemgen::validation::{EntityPosition, IssueKind};
use std::path::PathBuf;

fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(path).unwrap()
}

fn a4_margin_20() -> BoundaryValidator {
    BoundaryValidator::new(SchematicBounds::new(297.0, 210.0, 20.0))
}

#[test]
fn test_margin_and_page_classification() {
    let validator = a4_margin_20();
    let resistor = PlacementKind::Component(ComponentKind::Resistor);

    let near_corner = validator.validate_component_position("R1", 5.0, 5.0, &resistor);
    assert_eq!(near_corner.severity, Severity::Warning);
    assert_eq!(near_corner.kind, IssueKind::InMargin);

    let off_page = validator.validate_component_position("R2", 350.0, 250.0, &resistor);
    assert_eq!(off_page.severity, Severity::Error);
    assert_eq!(off_page.kind, IssueKind::OffPage);

    for issue in [near_corner, off_page] {
        let p = issue.suggested_position.unwrap();
        assert!(validator
            .validate_component_position("R", p.x, p.y, &resistor)
            .severity
            == Severity::Info);
    }
}

#[test]
fn test_fixture_report() {
    let options = BuildOptions {
        bounds: SchematicBounds::new(297.0, 210.0, 20.0),
        ..Default::default()
    };
    let report = SchemGen::validate(&fixture("out_of_bounds.txt"), &options).unwrap();

    assert!(!report.success);
    assert_eq!(report.total_components, 3);
    assert_eq!(report.validated_components, 1);
    assert_eq!(report.out_of_bounds_components, 2);
    assert!(report.has_errors());
    assert_eq!(
        report.corrected_positions.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["R1", "R2"]
    );

    let text = report.render_text();
    assert!(text.contains("Status: FAIL"));
    assert!(text.contains("ERRORS (1)"));
    assert!(text.contains("WARNINGS (1)"));
}

#[test]
fn test_auto_correct_positions() {
    let validator = a4_margin_20();
    let entities = vec![
        EntityPosition::new("VCC", PlacementKind::Power, Some(Point::new(-10.0, 40.0))),
        EntityPosition::new("U1", PlacementKind::Component(ComponentKind::Ic), Some(Point::new(150.0, 100.0))),
        EntityPosition::new("U2", PlacementKind::Component(ComponentKind::Ic), Some(Point::new(290.0, 100.0))),
    ];
    let (corrected, report) = validator.auto_correct_positions(&entities);

    assert_eq!(report.out_of_bounds_components, 2);
    assert_eq!(corrected[1].position, Some(Point::new(150.0, 100.0)));
    let again = validator.validate_circuit_components(&corrected);
    assert!(again.success);
}

#[test]
fn test_wire_checks() {
    let validator = a4_margin_20();
    let routes = vec![WireRoute {
        net_name: "N".to_string(),
        segments: vec![
            WireSegment::between(Point::new(10.0, 10.0), Point::new(100.0, 10.0)),
            WireSegment::between(Point::new(100.0, 10.0), Point::new(100.0, 300.0)),
        ],
        connected_pins: Vec::new(),
        priority: 1,
    }];
    let issues = validator.validate_routes(&routes);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].subject, "WIRE_END");
    assert_eq!(issues[0].severity, Severity::Error);
}

#[test]
fn test_report_json_shape() {
    let report = SchemGen::validate(&fixture("led_blinker.yaml"), &BuildOptions::default()).unwrap();
    assert!(report.success);
    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["total_components"], serde_json::json!(2));
    assert_eq!(json["issues"][0]["kind"], serde_json::json!("valid"));
}
