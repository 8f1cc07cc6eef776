//! SchemGen - circuit descriptions to KiCad schematics
//!
//! This library turns a small text description of a circuit (components,
//! power symbols and pin-to-pin connections) into a KiCad schematic file:
//! components are placed inside the page margins, connections are checked
//! against pin directions, nets are routed as grid wires, and the result is
//! written as a typed S-expression document.
//!
//! # Quick Start
//!
//! ```no_run
//! use schemgen::{BuildOptions, SchemGen};
//!
//! let text = "circuit: LED\ncomponents:\n  - R1: resistor 220 at (20, 30)\n  - LED1: led red at (50, 30)\nconnections:\n  - R1.2 -> LED1.anode\n";
//! let output = SchemGen::build(text, &BuildOptions::default()).unwrap();
//!
//! std::fs::write("led.kicad_sch", &output.schematic).unwrap();
//! for diagnostic in &output.diagnostics {
//!     println!("{}", diagnostic);
//! }
//! ```
//!
//! # Features
//!
//! - **Two description dialects**: YAML-shaped blocks and flat lines
//! - **Layout**: grid, row, column, circular and per-kind zone strategies
//! - **Connectivity**: pin tables, direction checks, nets, optional wiring inference
//! - **Routing**: direct, Manhattan and obstacle-avoiding wires
//! - **Round trip**: read generated schematics back into a circuit

pub mod connectivity;
pub mod core;
pub mod layout;
pub mod model;
pub mod parser;
pub mod routing;
pub mod schematic;
pub mod validation;

// Re-export main types
pub use crate::core::{BuildOptions, BuildOutput, Diagnostic, LayoutOutput, SchemGen, SchemGenError};
pub use layout::{LayoutEngine, LayoutStrategy};
pub use model::{Circuit, Component, ComponentKind, Connection, PinRef, Point, PowerSymbol, SchematicBounds};
pub use parser::dsl::{Dialect, DslParser};
pub use parser::schematic::{SchematicDocument, SchematicReader};
pub use routing::{RouteStrategy, WireRouter};
pub use validation::{BoundaryValidator, Severity, ValidationReport};

/// Parse a circuit description (convenience wrapper).
pub fn parse_circuit(text: &str, dialect: Dialect) -> Result<Circuit, SchemGenError> {
    Ok(DslParser::parse(text, dialect)?)
}

/// Read a schematic file produced by [`SchemGen::build`] (convenience wrapper).
pub fn read_schematic(path: &std::path::Path) -> Result<SchematicDocument, SchemGenError> {
    Ok(SchematicReader::read_file(path)?)
}

/// Prelude for common imports
pub mod prelude {
    pub use crate::connectivity::{ConnectivityModel, Net, NetKind};
    pub use crate::core::{BuildOptions, BuildOutput, Diagnostic, SchemGen, SchemGenError};
    pub use crate::layout::{LayoutEngine, LayoutStrategy};
    pub use crate::model::{Circuit, Component, ComponentKind, PinRef, Point, PowerSymbol, SchematicBounds};
    pub use crate::parser::dsl::Dialect;
    pub use crate::routing::RouteStrategy;
    pub use crate::validation::{BoundaryValidator, Severity, ValidationReport};
}
