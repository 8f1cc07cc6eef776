//! Circuit description language.
//!
//! Two surface forms share one entry grammar:
//!
//! ```text
//! circuit "LED Blinker":            circuit: LED Blinker
//!   components:                     components:
//!     - R1: resistor 220 at (20, 30)  R1 resistor 220 (20, 30)
//!   power:                          power:
//!     - VCC: VCC at (10, 10)          VCC VCC (10, 10)
//!   connections:                    connections:
//!     - R1.2 -> LED1.anode            R1.2 -> LED1.anode
//! ```
//!
//! The block form is YAML and goes through `serde_yaml`. The line form is a
//! flat list of section headers and entries. A bad entry is skipped; only a
//! broken document is an error.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::str::FromStr;
use thiserror::Error;

use crate::model::{Circuit, Component, ComponentKind, Connection, PinRef, Point, PowerSymbol};

pub const DEFAULT_CIRCUIT_NAME: &str = "Untitled Circuit";

/// Connection arrows, in lookup order.
const ARROWS: [&str; 3] = ["→", "->", "—"];

#[derive(Debug, Error)]
pub enum DslError {
    #[error("Malformed block description: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Circuit description is empty")]
    Empty,
    #[error("Invalid circuit structure: {0}")]
    Structure(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Pick by looking at the first meaningful line.
    #[default]
    Auto,
    /// YAML-shaped nested form.
    Block,
    /// Flat `circuit:` / section / entry lines.
    Line,
}

impl Dialect {
    /// `Line` when the first meaningful line is a `circuit:` header, else `Block`.
    pub fn detect(text: &str) -> Dialect {
        let first = text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && !line.starts_with('#'));
        match first.and_then(|line| line.split_once(':')) {
            Some((key, _)) if key.trim().eq_ignore_ascii_case("circuit") => Dialect::Line,
            _ => Dialect::Block,
        }
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Dialect::Auto),
            "block" | "yaml" => Ok(Dialect::Block),
            "line" | "simple" => Ok(Dialect::Line),
            other => Err(format!("unknown dialect '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Components,
    Power,
    Connections,
}

impl Section {
    fn from_header(header: &str) -> Option<Section> {
        match header.trim().trim_end_matches(':').trim().to_lowercase().as_str() {
            "components" => Some(Section::Components),
            "power" => Some(Section::Power),
            "connections" => Some(Section::Connections),
            _ => None,
        }
    }
}

/// Entry point for turning description text into a [`Circuit`].
pub struct DslParser;

impl DslParser {
    pub fn parse(text: &str, dialect: Dialect) -> Result<Circuit, DslError> {
        let dialect = match dialect {
            Dialect::Auto => Dialect::detect(text),
            explicit => explicit,
        };
        tracing::debug!(?dialect, "parsing circuit description");
        let circuit = match dialect {
            Dialect::Line => Self::parse_lines(text)?,
            _ => Self::parse_block(text)?,
        };
        tracing::debug!(
            name = %circuit.name,
            components = circuit.components.len(),
            power = circuit.power_symbols.len(),
            connections = circuit.connections.len(),
            "parsed circuit"
        );
        Ok(circuit)
    }

    pub fn parse_block(text: &str) -> Result<Circuit, DslError> {
        if is_blank(text) {
            return Err(DslError::Empty);
        }
        let document: Value = serde_yaml::from_str(text)?;
        let root = match document {
            Value::Mapping(mapping) => mapping,
            Value::Null => return Err(DslError::Empty),
            _ => {
                return Err(DslError::Structure(
                    "top level must be a mapping with a circuit header".to_string(),
                ))
            }
        };

        let (header, body) = root.into_iter().next().ok_or(DslError::Empty)?;
        let mut circuit = Circuit::new(circuit_name(&scalar_text(&header).unwrap_or_default()));

        let sections = match body {
            Value::Mapping(sections) => sections,
            Value::Null => return Ok(circuit),
            _ => {
                return Err(DslError::Structure(format!(
                    "body of '{}' must be a mapping of sections",
                    circuit.name
                )))
            }
        };

        for (key, items) in sections {
            let Some(section) = scalar_text(&key).as_deref().and_then(Section::from_header) else {
                tracing::debug!(key = ?key, "ignoring unknown section");
                continue;
            };
            let Value::Sequence(items) = items else {
                continue;
            };
            for item in &items {
                match block_entry_text(item) {
                    Some(entry) => add_entry(&mut circuit, section, &entry),
                    None => tracing::debug!(item = ?item, "skipping non-text entry"),
                }
            }
        }

        Ok(circuit)
    }

    pub fn parse_lines(text: &str) -> Result<Circuit, DslError> {
        if is_blank(text) {
            return Err(DslError::Empty);
        }
        let mut circuit = Circuit::new(DEFAULT_CIRCUIT_NAME);
        let mut section = None;

        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, rest)) = line.split_once(':') {
                if key.trim().eq_ignore_ascii_case("circuit") {
                    circuit.name = circuit_name(rest);
                    continue;
                }
            }

            if let Some(next) = Section::from_header(line).filter(|_| line.ends_with(':')) {
                section = Some(next);
                continue;
            }

            let entry = line.strip_prefix("- ").unwrap_or(line);
            match section {
                Some(section) => add_entry(&mut circuit, section, entry),
                None => tracing::debug!(line, "entry outside of any section"),
            }
        }

        Ok(circuit)
    }
}

fn is_blank(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#'))
}

fn add_entry(circuit: &mut Circuit, section: Section, entry: &str) {
    match section {
        Section::Components => match parse_component_entry(entry) {
            Some(component) => {
                let reference = component.reference.clone();
                if !circuit.add_component(component) {
                    tracing::warn!(reference = %reference, "duplicate reference, entry skipped");
                }
            }
            None => tracing::debug!(entry, "malformed component entry skipped"),
        },
        Section::Power => match parse_power_entry(entry) {
            Some(power) => {
                let reference = power.reference.clone();
                if !circuit.add_power_symbol(power) {
                    tracing::warn!(reference = %reference, "duplicate reference, entry skipped");
                }
            }
            None => tracing::debug!(entry, "malformed power entry skipped"),
        },
        Section::Connections => match parse_connection_entry(entry) {
            Some(connection) => circuit.add_connection(connection),
            None => tracing::debug!(entry, "malformed connection entry skipped"),
        },
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `- R1: resistor ...` arrives as a one-entry mapping.
fn block_entry_text(item: &Value) -> Option<String> {
    match item {
        Value::Mapping(map) if map.len() == 1 => {
            let (key, value) = map.iter().next()?;
            Some(format!("{}: {}", scalar_text(key)?, scalar_text(value)?))
        }
        other => scalar_text(other),
    }
}

/// Name from a header: `circuit "LED Blinker"`, `circuit Name`, `"Name"` or `Name`.
fn circuit_name(header: &str) -> String {
    let header = header.trim();
    let rest = match (header.get(..7), header.get(7..)) {
        (Some(prefix), Some(rest))
            if prefix.eq_ignore_ascii_case("circuit")
                && (rest.is_empty() || rest.starts_with(|c: char| c.is_whitespace() || c == '"')) =>
        {
            rest
        }
        _ => header,
    };
    let name = rest.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if name.is_empty() {
        DEFAULT_CIRCUIT_NAME.to_string()
    } else {
        name.to_string()
    }
}

/// Splits `... (X, Y)` into the text before the coordinates and the point.
fn split_position(entry: &str) -> Option<(&str, Point)> {
    let entry = entry.trim();
    let inner = entry.strip_suffix(')')?;
    let open = inner.rfind('(')?;
    let (x, y) = inner[open + 1..].split_once(',')?;
    let point = Point::new(x.trim().parse().ok()?, y.trim().parse().ok()?);
    if !point.is_finite() {
        return None;
    }
    Some((&entry[..open], point))
}

/// `REF[:] WORD...` with an optional trailing `at`. Returns the reference and
/// the remaining words.
fn split_head(head: &str) -> Option<(String, Vec<String>)> {
    let mut words: Vec<&str> = head.split_whitespace().collect();
    if words.last().map_or(false, |w| w.eq_ignore_ascii_case("at")) {
        words.pop();
    }
    let (first, rest) = words.split_first()?;

    let mut tail: Vec<String> = Vec::with_capacity(rest.len() + 1);
    let reference = match first.split_once(':') {
        Some((reference, attached)) => {
            if !attached.is_empty() {
                tail.push(attached.to_string());
            }
            reference
        }
        None => first,
    };
    if reference.is_empty() {
        return None;
    }
    tail.extend(rest.iter().map(|w| w.to_string()));
    Some((reference.to_string(), tail))
}

/// `REF[:] TYPE [VALUE...] [at] (X, Y)`
pub fn parse_component_entry(entry: &str) -> Option<Component> {
    let (head, position) = split_position(entry)?;
    let (reference, words) = split_head(head)?;
    let (kind, value) = words.split_first()?;
    Some(Component::new(
        reference,
        ComponentKind::from_tag(kind),
        value.join(" "),
        position,
    ))
}

/// `REF[:] POWER_TYPE [at] (X, Y)`
pub fn parse_power_entry(entry: &str) -> Option<PowerSymbol> {
    let (head, position) = split_position(entry)?;
    let (reference, words) = split_head(head)?;
    if words.is_empty() {
        return None;
    }
    Some(PowerSymbol::new(reference, words.join(" "), position))
}

/// `A[.pin] ARROW B[.pin]`
pub fn parse_connection_entry(entry: &str) -> Option<Connection> {
    let (from, to) = ARROWS.iter().find_map(|arrow| entry.split_once(arrow))?;
    Some(Connection::new(parse_pin_ref(from)?, parse_pin_ref(to)?))
}

fn parse_pin_ref(text: &str) -> Option<PinRef> {
    let text = text.trim();
    let (component, pin) = match text.split_once('.') {
        Some((component, pin)) => {
            let pin = pin.trim();
            (component.trim(), (!pin.is_empty()).then(|| pin.to_string()))
        }
        None => (text, None),
    };
    if component.is_empty() || component.contains(char::is_whitespace) {
        return None;
    }
    Some(PinRef::new(component, pin))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: &str = r#"
circuit "LED Blinker":
  components:
    - R1: resistor 220Ω at (20, 30)
    - LED1: led red at (50, 30)
  power:
    - VCC: VCC at (10, 10)
  connections:
    - VCC → R1.1
    - R1.2 -> LED1.anode
"#;

    const LINES: &str = "\
# a comment
circuit: \"LED Blinker\"
components:
R1 resistor 220Ω (20, 30)
LED1 led red (50, 30)
power:
VCC VCC (10, 10)
connections:
VCC → R1.1
R1.2 -> LED1.anode
";

    #[test]
    fn test_block_dialect() {
        let circuit = DslParser::parse(BLOCK, Dialect::Auto).unwrap();
        assert_eq!(circuit.name, "LED Blinker");
        assert_eq!(circuit.components.len(), 2);
        assert_eq!(circuit.components[0].reference, "R1");
        assert_eq!(circuit.components[0].kind, ComponentKind::Resistor);
        assert_eq!(circuit.components[0].value, "220Ω");
        assert_eq!(circuit.components[1].position, Point::new(50.0, 30.0));
        assert_eq!(circuit.power_symbols[0].power_type, "VCC");
        assert_eq!(circuit.connections.len(), 2);
        assert_eq!(circuit.connections[0].from, PinRef::whole("VCC"));
        assert_eq!(circuit.connections[1].to, PinRef::with_pin("LED1", "anode"));
    }

    #[test]
    fn test_both_dialects_agree() {
        assert_eq!(Dialect::detect(LINES), Dialect::Line);
        assert_eq!(Dialect::detect(BLOCK), Dialect::Block);
        let block = DslParser::parse(BLOCK, Dialect::Auto).unwrap();
        let lines = DslParser::parse(LINES, Dialect::Auto).unwrap();
        assert_eq!(block, lines);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let a = DslParser::parse(BLOCK, Dialect::Block).unwrap();
        let b = DslParser::parse(BLOCK, Dialect::Block).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_component_entry_forms() {
        let c = parse_component_entry("U1: IC NE555 timer at (100.5, 80)").unwrap();
        assert_eq!(c.reference, "U1");
        assert_eq!(c.kind, ComponentKind::Ic);
        assert_eq!(c.value, "NE555 timer");
        assert_eq!(c.position, Point::new(100.5, 80.0));

        let bare = parse_component_entry("C1 capacitor (10,20)").unwrap();
        assert_eq!(bare.value, "");

        assert!(parse_component_entry("R9 resistor 1k").is_none());
        assert!(parse_component_entry("R9 (1, 2)").is_none());
        assert!(parse_component_entry("R9 resistor (x, 2)").is_none());
    }

    #[test]
    fn test_connection_arrows() {
        let arrow = parse_connection_entry("A.1 → B.2").unwrap();
        let ascii = parse_connection_entry("A.1 -> B.2").unwrap();
        let dash = parse_connection_entry("A.1 — B.2").unwrap();
        assert_eq!(arrow, ascii);
        assert_eq!(ascii, dash);
        assert!(parse_connection_entry("A.1 to B.2").is_none());
        assert!(parse_connection_entry(" -> B.2").is_none());
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let text = "circuit: t\ncomponents:\nR1 resistor 1k (1, 2)\nthis is junk\nR2 resistor 1k (3, 4)\n";
        let circuit = DslParser::parse(text, Dialect::Line).unwrap();
        assert_eq!(circuit.components.len(), 2);
    }

    #[test]
    fn test_duplicate_reference_keeps_first() {
        let text = "circuit: t\ncomponents:\nR1 resistor 1k (1, 2)\nR1 capacitor 1u (3, 4)\n";
        let circuit = DslParser::parse(text, Dialect::Line).unwrap();
        assert_eq!(circuit.components.len(), 1);
        assert_eq!(circuit.components[0].kind, ComponentKind::Resistor);
    }

    #[test]
    fn test_broken_documents_are_fatal() {
        assert!(matches!(DslParser::parse("", Dialect::Auto), Err(DslError::Empty)));
        assert!(matches!(
            DslParser::parse("- just\n- a list\n", Dialect::Block),
            Err(DslError::Structure(_))
        ));
        assert!(matches!(
            DslParser::parse("circuit x:\n  components: [\n", Dialect::Block),
            Err(DslError::Yaml(_))
        ));
        assert!(matches!(
            DslParser::parse("circuit x: 42\n", Dialect::Block),
            Err(DslError::Structure(_))
        ));
    }

    #[test]
    fn test_circuit_names() {
        assert_eq!(circuit_name("circuit \"Amp\""), "Amp");
        assert_eq!(circuit_name("circuit Amp"), "Amp");
        assert_eq!(circuit_name("Amp"), "Amp");
        assert_eq!(circuit_name("circuit"), DEFAULT_CIRCUIT_NAME);
    }
}
