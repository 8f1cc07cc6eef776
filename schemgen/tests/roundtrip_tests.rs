//! Writing a schematic and reading it back.

use schemgen::parser::sexp::{self, SExpWriter};
use schemgen::parser::schematic::{SchematicDocument, SchematicReader};
use schemgen::prelude::*;
use schemgen::routing::WireRoute;
use schemgen::schematic::{IdSource, SchematicWriter};
use std::path::PathBuf;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn build(name: &str) -> BuildOutput {
    let text = std::fs::read_to_string(fixtures_dir().join(name)).unwrap();
    let options = BuildOptions {
        sequential_ids: true,
        ..Default::default()
    };
    SchemGen::build(&text, &options).unwrap()
}

/// Write a read-back document again, carrying its wires as one route.
fn rewrite(doc: &SchematicDocument) -> String {
    let routes = vec![WireRoute {
        net_name: String::new(),
        segments: doc.wires.clone(),
        connected_pins: Vec::new(),
        priority: 1,
    }];
    SchematicWriter::new(IdSource::Random)
        .write(&doc.circuit, &routes)
        .unwrap()
}

#[test]
fn test_read_write_is_stable() {
    for name in ["led_blinker.yaml", "powered_ic.yaml", "audio_amp.yaml"] {
        let output = build(name);
        let first = SchematicReader::read_str(&output.schematic).unwrap();
        let second = SchematicReader::read_str(&rewrite(&first)).unwrap();
        assert_eq!(first, second, "{} changed on the second pass", name);
    }
}

#[test]
fn test_read_back_matches_build() {
    let output = build("powered_ic.yaml");
    let doc = SchematicReader::read_str(&output.schematic).unwrap();

    assert_eq!(doc.circuit.name, "Timer");
    assert_eq!(doc.circuit.components.len(), output.circuit.components.len());
    for (read, built) in doc.circuit.components.iter().zip(&output.circuit.components) {
        assert_eq!(read.reference, built.reference);
        assert_eq!(read.kind, built.kind);
        assert_eq!(read.value, built.value);
        assert!(read.position.approx_eq(&built.position, 1e-6));
    }
    assert_eq!(doc.circuit.power_symbols.len(), 2);
    assert!(doc.circuit.power_symbol("GND").unwrap().is_ground());
    assert_eq!(doc.wires.len(), output.wire_count());
}

#[test]
fn test_unnamed_power_symbol_gets_reference() {
    let mut circuit = Circuit::new("Rails");
    circuit.add_component(Component::new("R1", ComponentKind::Resistor, "1k", Point::new(50.0, 50.0)));
    circuit.add_power_symbol(PowerSymbol::new("", "+5V", Point::new(50.0, 20.0)));

    let text = SchematicWriter::new(IdSource::sequential()).write(&circuit, &[]).unwrap();
    let doc = SchematicReader::read_str(&text).unwrap();
    let power = &doc.circuit.power_symbols[0];
    assert_eq!(power.reference, "#PWR0001");
    assert_eq!(power.power_type, "+5V");
}

#[test]
fn test_generated_power_reference_skips_taken_names() {
    let mut circuit = Circuit::new("Rails");
    circuit.add_power_symbol(PowerSymbol::new("", "GND", Point::new(50.0, 80.0)));
    circuit.add_power_symbol(PowerSymbol::new("#PWR0001", "VCC", Point::new(50.0, 20.0)));
    circuit.add_power_symbol(PowerSymbol::new("", "+5V", Point::new(90.0, 20.0)));

    let text = SchematicWriter::new(IdSource::sequential()).write(&circuit, &[]).unwrap();
    let doc = SchematicReader::read_str(&text).unwrap();
    let refs: Vec<(&str, &str)> = doc
        .circuit
        .power_symbols
        .iter()
        .map(|p| (p.reference.as_str(), p.power_type.as_str()))
        .collect();
    assert_eq!(refs, vec![("#PWR0002", "GND"), ("#PWR0001", "VCC"), ("#PWR0003", "+5V")]);
}

#[test]
fn test_awkward_text_survives() {
    let mut circuit = Circuit::new("Say \"hi\" (v2)");
    circuit.add_component(Component::new("R1", ComponentKind::Resistor, "10k 1%", Point::new(40.0, 40.0)));
    circuit.add_component(Component::new("C1", ComponentKind::Capacitor, "100", Point::new(80.0, 40.0)));

    let text = SchematicWriter::new(IdSource::sequential()).write(&circuit, &[]).unwrap();
    let doc = SchematicReader::read_str(&text).unwrap();
    assert_eq!(doc.circuit.name, "Say \"hi\" (v2)");
    assert_eq!(doc.circuit.component("R1").unwrap().value, "10k 1%");
    assert_eq!(doc.circuit.component("C1").unwrap().value, "100");
}

#[test]
fn test_text_is_quoted_only_when_needed() {
    let output = build("led_blinker.yaml");
    let text = &output.schematic;

    assert!(text.contains("(lib_id Device:R)"));
    assert!(!text.contains("(lib_id \"Device:R\")"));
    assert!(text.contains("(title \"LED Blinker\")"));
    assert!(text.contains("(date \"\")"));
    assert!(text.contains("(property Reference R1"));
    // would read back as a number if bare
    assert!(text.contains("(property Value \"220\""));
    assert!(text.contains("(pin \"1\""));
}

#[test]
fn test_tree_round_trips_through_text() {
    let output = build("audio_amp.yaml");
    let tree = sexp::parse(&output.schematic).unwrap();
    let rewritten = SExpWriter::new().write(&tree).unwrap();
    assert_eq!(rewritten, output.schematic);
    assert_eq!(sexp::parse(&rewritten).unwrap(), tree);
}

#[test]
fn test_read_schematic_file() {
    let output = build("led_blinker.yaml");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("led.kicad_sch");
    std::fs::write(&path, &output.schematic).unwrap();

    let doc = schemgen::read_schematic(&path).unwrap();
    assert_eq!(doc.circuit.components.len(), 2);
    assert_eq!(doc.wires.len(), 1);
    assert!(schemgen::read_schematic(&dir.path().join("missing.kicad_sch")).is_err());
}
