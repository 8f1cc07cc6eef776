//! Reader for schematics produced by the writer.
//!
//! Rebuilds components, power symbols and wire segments. Connections are not
//! reconstructed; wires are returned as geometry only.

use std::path::Path;
use thiserror::Error;

use super::sexp::{self, SExp, SExpError};
use crate::model::{Circuit, Component, ComponentKind, Point, PowerSymbol};
use crate::parser::dsl::DEFAULT_CIRCUIT_NAME;
use crate::routing::WireSegment;
use crate::schematic::from_file_units;

#[derive(Debug, Error)]
pub enum SchematicReadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] SExpError),
    #[error("Not a schematic: root is '{0}'")]
    NotASchematic(String),
    #[error("Symbol instance is missing {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchematicDocument {
    pub circuit: Circuit,
    pub wires: Vec<WireSegment>,
}

pub struct SchematicReader;

impl SchematicReader {
    pub fn read_file(path: &Path) -> Result<SchematicDocument, SchematicReadError> {
        let text = std::fs::read_to_string(path)?;
        Self::read_str(&text)
    }

    pub fn read_str(text: &str) -> Result<SchematicDocument, SchematicReadError> {
        let root = sexp::parse(text)?;
        Self::from_tree(&root)
    }

    pub fn from_tree(root: &SExp) -> Result<SchematicDocument, SchematicReadError> {
        match root.head() {
            Some("kicad_sch") => {}
            other => return Err(SchematicReadError::NotASchematic(other.unwrap_or("").to_string())),
        }

        let name = root
            .find("title_block")
            .and_then(|t| t.value_of("title"))
            .and_then(SExp::as_text)
            .unwrap_or(DEFAULT_CIRCUIT_NAME);
        let mut circuit = Circuit::new(name);

        let children = root.keyed_children();
        for instance in children.get("symbol").into_iter().flatten() {
            read_instance(instance, &mut circuit)?;
        }

        let wires = children
            .get("wire")
            .into_iter()
            .flatten()
            .filter_map(|w| read_wire(w))
            .collect();

        tracing::debug!(
            components = circuit.components.len(),
            power = circuit.power_symbols.len(),
            "read schematic"
        );
        Ok(SchematicDocument { circuit, wires })
    }
}

fn property<'a>(instance: &'a SExp, name: &str) -> Option<&'a str> {
    instance
        .find_all("property")
        .into_iter()
        .find(|p| p.arg(1).and_then(SExp::as_text) == Some(name))
        .and_then(|p| p.arg(2))
        .and_then(SExp::as_text)
}

fn point_of(node: &SExp) -> Option<Point> {
    let x = node.arg(1)?.as_number()?;
    let y = node.arg(2)?.as_number()?;
    Some(Point::new(from_file_units(x), from_file_units(y)))
}

fn read_instance(instance: &SExp, circuit: &mut Circuit) -> Result<(), SchematicReadError> {
    let lib_id = instance
        .value_of("lib_id")
        .and_then(SExp::as_text)
        .ok_or(SchematicReadError::MissingField("lib_id"))?;
    let position = instance
        .find("at")
        .and_then(point_of)
        .ok_or(SchematicReadError::MissingField("at"))?;
    let reference = property(instance, "Reference").ok_or(SchematicReadError::MissingField("Reference"))?;
    let value = property(instance, "Value").unwrap_or("");

    let (library, symbol) = lib_id.split_once(':').unwrap_or(("", lib_id));
    let added = if library == "power" {
        let power_type = if value.is_empty() { symbol } else { value };
        circuit.add_power_symbol(PowerSymbol::new(reference, power_type, position))
    } else {
        let kind = ComponentKind::from_symbol(library, symbol);
        circuit.add_component(Component::new(reference, kind, value, position))
    };
    if !added {
        tracing::warn!(reference, "duplicate reference in schematic, skipped");
    }
    Ok(())
}

fn read_wire(wire: &SExp) -> Option<WireSegment> {
    let points: Vec<Point> = wire.find("pts")?.find_all("xy").into_iter().filter_map(point_of).collect();
    match points.as_slice() {
        [start, end, ..] => Some(WireSegment::between(*start, *end)),
        _ => None,
    }
}
