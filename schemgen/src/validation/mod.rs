//! Boundary validation and auto-correction.
//!
//! Positions are classified against the page and its usable area:
//! off the page is an error, inside the page but with a body poking into the
//! margin is a warning. Both come with a corrected position found by the
//! layout engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::layout::{power_keys, LayoutEngine, PlacementKind, DEFAULT_COMPONENT_SPACING, DEFAULT_GRID_SPACING};
use crate::model::{Circuit, Point, SchematicBounds};
use crate::routing::WireRoute;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Center outside the page.
    OffPage,
    /// On the page, body reaching into the margin.
    InMargin,
    Valid,
    MissingPosition,
    WireEndpoint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    /// Entity reference, or `WIRE_START` / `WIRE_END`.
    pub subject: String,
    pub message: String,
    pub position: Option<Point>,
    pub suggested_position: Option<Point>,
    pub kind: IssueKind,
}

impl ValidationIssue {
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self.kind, IssueKind::OffPage | IssueKind::InMargin)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub success: bool,
    pub issues: Vec<ValidationIssue>,
    pub total_components: usize,
    pub validated_components: usize,
    pub out_of_bounds_components: usize,
    pub corrected_positions: BTreeMap<String, Point>,
}

impl ValidationReport {
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.severity == severity)
    }

    pub fn has_errors(&self) -> bool {
        self.with_severity(Severity::Error).next().is_some()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Plain-text report.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== BOUNDARY VALIDATION REPORT ===");
        let _ = writeln!(out, "Status: {}", if self.success { "PASS" } else { "FAIL" });
        let _ = writeln!(out, "Total components: {}", self.total_components);
        let _ = writeln!(out, "Validated components: {}", self.validated_components);
        let _ = writeln!(out, "Out of bounds: {}", self.out_of_bounds_components);

        for (severity, title) in [
            (Severity::Error, "ERRORS"),
            (Severity::Warning, "WARNINGS"),
            (Severity::Info, "INFO"),
        ] {
            let issues: Vec<_> = self.with_severity(severity).collect();
            if issues.is_empty() {
                continue;
            }
            let _ = writeln!(out, "\n{} ({}):", title, issues.len());
            for issue in issues {
                let _ = writeln!(out, "  - {}", issue.message);
                if let Some(suggested) = issue.suggested_position {
                    let _ = writeln!(out, "    Suggested: {}", suggested);
                }
            }
        }

        if !self.corrected_positions.is_empty() {
            let _ = writeln!(out, "\nCORRECTED POSITIONS:");
            for (reference, position) in &self.corrected_positions {
                let _ = writeln!(out, "  {}: {}", reference, position);
            }
        }
        out
    }
}

/// A placed entity as seen by the validator.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityPosition {
    pub reference: String,
    pub kind: PlacementKind,
    /// `None` when no usable position is known.
    pub position: Option<Point>,
}

impl EntityPosition {
    pub fn new(reference: impl Into<String>, kind: PlacementKind, position: Option<Point>) -> Self {
        Self {
            reference: reference.into(),
            kind,
            position,
        }
    }

    /// Components, then power symbols (unnamed ones under their `#PWR` key).
    pub fn from_circuit(circuit: &Circuit) -> Vec<EntityPosition> {
        let components = circuit.components.iter().map(|c| {
            EntityPosition::new(
                c.reference.clone(),
                PlacementKind::Component(c.kind.clone()),
                Some(c.position),
            )
        });
        let power = circuit
            .power_symbols
            .iter()
            .zip(power_keys(circuit))
            .map(|(p, key)| EntityPosition::new(key, PlacementKind::Power, Some(p.position)));
        components.chain(power).collect()
    }
}

pub struct BoundaryValidator {
    bounds: SchematicBounds,
    grid_spacing: f64,
    component_spacing: f64,
}

impl Default for BoundaryValidator {
    fn default() -> Self {
        Self::new(SchematicBounds::default())
    }
}

impl BoundaryValidator {
    pub fn new(bounds: SchematicBounds) -> Self {
        Self::with_spacing(bounds, DEFAULT_GRID_SPACING, DEFAULT_COMPONENT_SPACING)
    }

    pub fn with_spacing(bounds: SchematicBounds, grid_spacing: f64, component_spacing: f64) -> Self {
        Self {
            bounds,
            grid_spacing,
            component_spacing,
        }
    }

    fn engine(&self) -> LayoutEngine {
        LayoutEngine::with_spacing(self.bounds, self.grid_spacing, self.component_spacing)
    }

    fn classify(&self, engine: &LayoutEngine, reference: &str, at: Point, kind: &PlacementKind) -> ValidationIssue {
        let (severity, issue_kind, message) = if !self.bounds.page_contains(at.x, at.y) {
            (
                Severity::Error,
                IssueKind::OffPage,
                format!(
                    "Component {} at {} is outside schematic bounds ({}x{}mm)",
                    reference, at, self.bounds.width, self.bounds.height
                ),
            )
        } else if !engine.validate_position(at.x, at.y, kind) {
            (
                Severity::Warning,
                IssueKind::InMargin,
                format!(
                    "Component {} at {} is outside the usable area (margin {}mm)",
                    reference, at, self.bounds.margin
                ),
            )
        } else {
            (
                Severity::Info,
                IssueKind::Valid,
                format!("Component {} position is valid", reference),
            )
        };

        ValidationIssue {
            severity,
            subject: reference.to_string(),
            message,
            position: Some(at),
            suggested_position: None,
            kind: issue_kind,
        }
    }

    /// Classify a single position; out-of-bounds results carry a suggestion.
    pub fn validate_component_position(
        &self,
        reference: &str,
        x: f64,
        y: f64,
        kind: &PlacementKind,
    ) -> ValidationIssue {
        let engine = self.engine();
        let at = Point::new(x, y);
        let mut issue = self.classify(&engine, reference, at, kind);
        if issue.is_out_of_bounds() {
            issue.suggested_position = Some(engine.find_valid_position(reference, kind, Some(at)));
        }
        issue
    }

    /// Validate a set of entities with a fresh engine. In-bounds entities are
    /// reserved first so suggestions never land on them or on each other.
    pub fn validate_circuit_components(&self, entities: &[EntityPosition]) -> ValidationReport {
        let mut engine = self.engine();
        let positions: Vec<Option<Point>> = entities
            .iter()
            .map(|e| e.position.filter(Point::is_finite))
            .collect();

        let mut classified = Vec::with_capacity(entities.len());
        for (entity, position) in entities.iter().zip(&positions) {
            let issue = match position {
                Some(at) => self.classify(&engine, &entity.reference, *at, &entity.kind),
                None => ValidationIssue {
                    severity: Severity::Info,
                    subject: entity.reference.clone(),
                    message: format!("Component {} has no position specified", entity.reference),
                    position: None,
                    suggested_position: None,
                    kind: IssueKind::MissingPosition,
                },
            };
            classified.push(issue);
        }

        for (entity, issue) in entities.iter().zip(&classified) {
            if let (IssueKind::Valid, Some(at)) = (issue.kind, issue.position) {
                engine.reserve(&entity.reference, &entity.kind, at);
            }
        }

        let mut report = ValidationReport {
            total_components: entities.len(),
            ..Default::default()
        };
        for (entity, mut issue) in entities.iter().zip(classified) {
            if issue.is_out_of_bounds() {
                let suggested = engine.place_component(&entity.reference, &entity.kind, issue.position);
                issue.suggested_position = Some(suggested);
                report
                    .corrected_positions
                    .insert(entity.reference.clone(), suggested);
                report.out_of_bounds_components += 1;
            } else if issue.kind == IssueKind::Valid {
                report.validated_components += 1;
            }
            report.issues.push(issue);
        }
        report.success = report.out_of_bounds_components == 0;

        tracing::debug!(
            total = report.total_components,
            out_of_bounds = report.out_of_bounds_components,
            "boundary validation finished"
        );
        report
    }

    pub fn validate_circuit(&self, circuit: &Circuit) -> ValidationReport {
        self.validate_circuit_components(&EntityPosition::from_circuit(circuit))
    }

    /// Errors for wire endpoints off the page.
    pub fn validate_wire_connection(&self, x1: f64, y1: f64, x2: f64, y2: f64) -> Vec<ValidationIssue> {
        [("WIRE_START", Point::new(x1, y1)), ("WIRE_END", Point::new(x2, y2))]
            .into_iter()
            .filter(|(_, p)| !self.bounds.page_contains(p.x, p.y))
            .map(|(subject, p)| ValidationIssue {
                severity: Severity::Error,
                subject: subject.to_string(),
                message: format!("Wire endpoint {} is outside schematic bounds", p),
                position: Some(p),
                suggested_position: None,
                kind: IssueKind::WireEndpoint,
            })
            .collect()
    }

    pub fn validate_routes(&self, routes: &[WireRoute]) -> Vec<ValidationIssue> {
        routes
            .iter()
            .flat_map(|route| route.segments.iter())
            .flat_map(|s| self.validate_wire_connection(s.start.x, s.start.y, s.end.x, s.end.y))
            .collect()
    }

    /// Corrected copies of `entities` plus the report that produced them.
    pub fn auto_correct_positions(&self, entities: &[EntityPosition]) -> (Vec<EntityPosition>, ValidationReport) {
        let report = self.validate_circuit_components(entities);
        let corrected = entities
            .iter()
            .map(|e| {
                let mut e = e.clone();
                if let Some(p) = report.corrected_positions.get(&e.reference) {
                    e.position = Some(*p);
                }
                e
            })
            .collect();
        (corrected, report)
    }

    pub fn auto_correct_circuit(&self, circuit: &Circuit) -> (Circuit, ValidationReport) {
        let report = self.validate_circuit(circuit);
        let keys = power_keys(circuit);
        let mut corrected = circuit.clone();
        for component in corrected.components.iter_mut() {
            if let Some(p) = report.corrected_positions.get(&component.reference) {
                component.position = *p;
            }
        }
        for (power, key) in corrected.power_symbols.iter_mut().zip(&keys) {
            if let Some(p) = report.corrected_positions.get(key) {
                power.position = *p;
            }
        }
        (corrected, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Component, ComponentKind};

    fn a4_margin_20() -> BoundaryValidator {
        BoundaryValidator::new(SchematicBounds::new(297.0, 210.0, 20.0))
    }

    fn resistor() -> PlacementKind {
        PlacementKind::Component(ComponentKind::Resistor)
    }

    #[test]
    fn test_margin_violation_is_warning() {
        let issue = a4_margin_20().validate_component_position("R1", 5.0, 5.0, &resistor());
        assert_eq!(issue.severity, Severity::Warning);
        let suggested = issue.suggested_position.unwrap();
        assert!(suggested.x >= 25.0 && suggested.y >= 22.5);
    }

    #[test]
    fn test_off_page_is_error() {
        let issue = a4_margin_20().validate_component_position("R1", 350.0, 250.0, &resistor());
        assert_eq!(issue.severity, Severity::Error);
        assert!(issue.suggested_position.is_some());
    }

    #[test]
    fn test_valid_position_is_info() {
        let issue = a4_margin_20().validate_component_position("R1", 100.0, 100.0, &resistor());
        assert_eq!(issue.severity, Severity::Info);
        assert_eq!(issue.suggested_position, None);
    }

    #[test]
    fn test_suggestions_do_not_collide() {
        let entities = vec![
            EntityPosition::new("R1", resistor(), Some(Point::new(5.0, 5.0))),
            EntityPosition::new("R2", resistor(), Some(Point::new(6.0, 5.0))),
            EntityPosition::new("R3", resistor(), Some(Point::new(25.0, 23.0))),
            EntityPosition::new("R4", resistor(), None),
            EntityPosition::new("R5", resistor(), Some(Point::new(f64::NAN, 3.0))),
        ];
        let validator = a4_margin_20();
        let report = validator.validate_circuit_components(&entities);

        assert!(!report.success);
        assert_eq!(report.total_components, 5);
        assert_eq!(report.out_of_bounds_components, 2);
        assert_eq!(report.validated_components, 1);
        assert_eq!(report.with_severity(Severity::Info).count(), 3);

        let r1 = report.corrected_positions["R1"];
        let r2 = report.corrected_positions["R2"];
        let kind_size = ComponentKind::Resistor.body_size();
        let b1 = crate::model::ComponentBounds::new("R1", r1.x, r1.y, kind_size);
        let b2 = crate::model::ComponentBounds::new("R2", r2.x, r2.y, kind_size);
        let b3 = crate::model::ComponentBounds::new("R3", 25.0, 23.0, kind_size);
        assert!(!b1.overlaps(&b2));
        assert!(!b1.overlaps(&b3));
        assert!(!b2.overlaps(&b3));
    }

    #[test]
    fn test_wire_endpoints() {
        let validator = a4_margin_20();
        assert!(validator.validate_wire_connection(10.0, 10.0, 100.0, 100.0).is_empty());
        let issues = validator.validate_wire_connection(-1.0, 10.0, 400.0, 100.0);
        let subjects: Vec<&str> = issues.iter().map(|i| i.subject.as_str()).collect();
        assert_eq!(subjects, vec!["WIRE_START", "WIRE_END"]);
    }

    #[test]
    fn test_auto_correct_circuit() {
        let mut circuit = Circuit::new("t");
        circuit.add_component(Component::new("R1", ComponentKind::Resistor, "1k", Point::new(350.0, 250.0)));
        let validator = a4_margin_20();
        let (corrected, report) = validator.auto_correct_circuit(&circuit);
        assert_eq!(report.out_of_bounds_components, 1);
        let fixed = validator.validate_circuit(&corrected);
        assert!(fixed.success);
    }

    #[test]
    fn test_report_rendering() {
        let validator = a4_margin_20();
        let report = validator.validate_circuit_components(&[EntityPosition::new(
            "R1",
            resistor(),
            Some(Point::new(350.0, 250.0)),
        )]);
        let text = report.render_text();
        assert!(text.contains("BOUNDARY VALIDATION REPORT"));
        assert!(text.contains("Status: FAIL"));
        assert!(text.contains("CORRECTED POSITIONS"));

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["success"], serde_json::json!(false));
        assert_eq!(json["issues"][0]["severity"], serde_json::json!("error"));
    }
}
