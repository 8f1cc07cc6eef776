//! Build pipeline shared by the library API and the CLI.
//!
//! Every call constructs its own layout engine, connectivity model, router
//! and id source, so builds never share state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::connectivity::{
    infer_connections, ConnectivityError, ConnectivityModel, ConnectivityStatistics, Net,
};
use crate::layout::{
    LayoutEngine, LayoutStatistics, LayoutStrategy, Placement, DEFAULT_COMPONENT_SPACING,
    DEFAULT_GRID_SPACING,
};
use crate::model::{Circuit, Connection, Point, SchematicBounds};
use crate::parser::dsl::{Dialect, DslError, DslParser};
use crate::parser::schematic::SchematicReadError;
use crate::parser::sexp::SExpError;
use crate::routing::{RouteStrategy, RoutingStatistics, WireRoute, WireRouter};
use crate::schematic::{IdSource, SchematicWriter};
use crate::validation::{BoundaryValidator, Severity, ValidationReport};

#[derive(Debug, thiserror::Error)]
pub enum SchemGenError {
    #[error("DSL error: {0}")]
    Dsl(#[from] DslError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] SExpError),
    #[error("Schematic read error: {0}")]
    Read(#[from] SchematicReadError),
    #[error("Invalid options: {0}")]
    Options(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Options for a build. Every field has a default, so a partial JSON
/// object is a valid options file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    pub dialect: Dialect,
    /// `None` keeps described positions where they are valid.
    pub layout_strategy: Option<LayoutStrategy>,
    pub routing_strategy: RouteStrategy,
    /// Guess wiring when the description has no connections.
    pub infer_wiring: bool,
    pub bounds: SchematicBounds,
    pub grid_spacing: f64,
    pub component_spacing: f64,
    /// Deterministic UUIDs instead of random ones.
    pub sequential_ids: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::Auto,
            layout_strategy: None,
            routing_strategy: RouteStrategy::Manhattan,
            infer_wiring: false,
            bounds: SchematicBounds::default(),
            grid_spacing: DEFAULT_GRID_SPACING,
            component_spacing: DEFAULT_COMPONENT_SPACING,
            sequential_ids: false,
        }
    }
}

impl BuildOptions {
    pub fn from_json_file(path: &Path) -> Result<Self, SchemGenError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn id_source(&self) -> IdSource {
        if self.sequential_ids {
            IdSource::sequential()
        } else {
            IdSource::Random
        }
    }

    fn validator(&self) -> BoundaryValidator {
        BoundaryValidator::with_spacing(self.bounds, self.grid_spacing, self.component_spacing)
    }

    fn engine(&self) -> LayoutEngine {
        LayoutEngine::with_spacing(self.bounds, self.grid_spacing, self.component_spacing)
    }
}

/// Non-fatal findings collected during a build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Described position was outside the usable area and got moved.
    BoundaryViolation {
        reference: String,
        severity: Severity,
        described: Point,
        placed: Point,
    },
    /// Connection dropped because an endpoint does not exist.
    UnknownPinReference { connection: String, reason: String },
    /// Connection dropped because the pin directions clash.
    IncompatiblePins { from: String, to: String },
    /// Route drawn as a straight wire after detours ran out.
    RoutingFailure { net: String, start: Point, end: Point, attempts: usize },
    /// Wire endpoint off the page.
    WireOutOfBounds { subject: String, position: Option<Point> },
    ConnectivityWarning { reference: String, message: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::BoundaryViolation {
                reference,
                severity,
                described,
                placed,
            } => write!(
                f,
                "{} at {} was out of bounds ({:?}), placed at {}",
                reference, described, severity, placed
            ),
            Diagnostic::UnknownPinReference { connection, reason } => {
                write!(f, "Dropped connection {}: {}", connection, reason)
            }
            Diagnostic::IncompatiblePins { from, to } => {
                write!(f, "Dropped connection {} -> {}: incompatible pins", from, to)
            }
            Diagnostic::RoutingFailure { net, start, end, attempts } => write!(
                f,
                "Net {} routed directly from {} to {} after {} detour attempts",
                net, start, end, attempts
            ),
            Diagnostic::WireOutOfBounds { subject, position } => match position {
                Some(p) => write!(f, "{} at {} is off the page", subject, p),
                None => write!(f, "{} is off the page", subject),
            },
            Diagnostic::ConnectivityWarning { message, .. } => write!(f, "{}", message),
        }
    }
}

/// Everything a build produces.
#[derive(Debug, Clone, Serialize)]
pub struct BuildOutput {
    /// The circuit with final positions.
    pub circuit: Circuit,
    pub schematic: String,
    pub nets: Vec<Net>,
    pub routes: Vec<WireRoute>,
    /// Boundary check of the described positions.
    pub validation: ValidationReport,
    pub layout_stats: LayoutStatistics,
    pub routing_stats: RoutingStatistics,
    pub connectivity_stats: ConnectivityStatistics,
    pub diagnostics: Vec<Diagnostic>,
}

impl BuildOutput {
    pub fn wire_count(&self) -> usize {
        self.routes.iter().map(|r| r.segments.len()).sum()
    }

    pub fn has_boundary_errors(&self) -> bool {
        self.validation.has_errors()
    }
}

/// Result of a layout-only run.
#[derive(Debug, Clone, Serialize)]
pub struct LayoutOutput {
    pub circuit: Circuit,
    pub placements: Vec<Placement>,
    pub statistics: LayoutStatistics,
}

/// Pipeline API used by both the library and the CLI.
pub struct SchemGen;

impl SchemGen {
    /// Description text to schematic text plus diagnostics.
    pub fn build(text: &str, options: &BuildOptions) -> Result<BuildOutput, SchemGenError> {
        let mut circuit = DslParser::parse(text, options.dialect)?;
        let mut diagnostics = Vec::new();

        let validation = options.validator().validate_circuit(&circuit);

        let mut engine = options.engine();
        let placements = engine.layout_circuit(&mut circuit, options.layout_strategy);
        let layout_stats = engine.statistics();

        let placed: BTreeMap<&str, Point> = placements
            .iter()
            .map(|p| (p.reference.as_str(), p.position))
            .collect();
        for issue in validation.issues.iter().filter(|i| i.is_out_of_bounds()) {
            if let (Some(described), Some(&at)) = (issue.position, placed.get(issue.subject.as_str())) {
                diagnostics.push(Diagnostic::BoundaryViolation {
                    reference: issue.subject.clone(),
                    severity: issue.severity,
                    described,
                    placed: at,
                });
            }
        }

        let mut model = ConnectivityModel::from_circuit(&circuit);
        let connections: Vec<(Connection, Option<String>)> =
            if circuit.connections.is_empty() && options.infer_wiring {
                infer_connections(&circuit)
                    .into_iter()
                    .map(|c| (c.connection, Some(c.net_name)))
                    .collect()
            } else {
                circuit.connections.iter().cloned().map(|c| (c, None)).collect()
            };

        let mut inferred_names: BTreeMap<String, String> = BTreeMap::new();
        for (connection, net_name) in &connections {
            match model.add_connection(&connection.from, &connection.to) {
                Ok((a, b)) => {
                    if let Some(name) = net_name {
                        inferred_names.insert(a.key(), name.clone());
                        inferred_names.insert(b.key(), name.clone());
                    }
                }
                Err(ConnectivityError::IncompatiblePins { from, to }) => {
                    tracing::warn!(%from, %to, "incompatible pins, connection dropped");
                    diagnostics.push(Diagnostic::IncompatiblePins { from, to });
                }
                Err(e) => {
                    tracing::warn!(from = %connection.from, to = %connection.to, "{}", e);
                    diagnostics.push(Diagnostic::UnknownPinReference {
                        connection: format!("{} -> {}", connection.from, connection.to),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let mut nets = model.nets();
        if !inferred_names.is_empty() {
            name_inferred_nets(&mut nets, &inferred_names);
        }
        nets.sort_by_key(|net| std::cmp::Reverse(net.kind.priority()));

        let mut router = WireRouter::new();
        router.add_component_obstacles(engine.placed());
        let mut routes = Vec::with_capacity(nets.len());
        for net in &nets {
            let pins = model.pins_of(net);
            let (route, failures) =
                router.route_multi_point_net(&net.name, &pins, options.routing_strategy, net.kind.priority());
            diagnostics.extend(failures.into_iter().map(|f| Diagnostic::RoutingFailure {
                net: f.net_name,
                start: f.start,
                end: f.end,
                attempts: f.attempts,
            }));
            routes.push(route);
        }
        let routing_stats = router.statistics();

        diagnostics.extend(
            options
                .validator()
                .validate_routes(&routes)
                .into_iter()
                .map(|issue| Diagnostic::WireOutOfBounds {
                    subject: issue.subject,
                    position: issue.position,
                }),
        );
        diagnostics.extend(model.check().into_iter().map(|issue| Diagnostic::ConnectivityWarning {
            reference: issue.reference,
            message: issue.message,
        }));

        let schematic = SchematicWriter::new(options.id_source()).write(&circuit, &routes)?;

        tracing::info!(
            circuit = %circuit.name,
            components = circuit.components.len(),
            power = circuit.power_symbols.len(),
            nets = nets.len(),
            wires = routing_stats.total_segments,
            diagnostics = diagnostics.len(),
            "built schematic"
        );

        Ok(BuildOutput {
            circuit,
            schematic,
            connectivity_stats: model.statistics(),
            nets,
            routes,
            validation,
            layout_stats,
            routing_stats,
            diagnostics,
        })
    }

    pub fn build_file(path: &Path, options: &BuildOptions) -> Result<BuildOutput, SchemGenError> {
        let text = std::fs::read_to_string(path)?;
        Self::build(&text, options)
    }

    /// Parse and check described positions without building anything.
    pub fn validate(text: &str, options: &BuildOptions) -> Result<ValidationReport, SchemGenError> {
        let circuit = DslParser::parse(text, options.dialect)?;
        Ok(options.validator().validate_circuit(&circuit))
    }

    /// Parse and place, nothing else.
    pub fn layout(text: &str, options: &BuildOptions) -> Result<LayoutOutput, SchemGenError> {
        let mut circuit = DslParser::parse(text, options.dialect)?;
        let mut engine = options.engine();
        let placements = engine.layout_circuit(&mut circuit, options.layout_strategy);
        Ok(LayoutOutput {
            circuit,
            placements,
            statistics: engine.statistics(),
        })
    }
}

/// Give unnamed nets the name their inferred connections carried.
fn name_inferred_nets(nets: &mut [Net], names: &BTreeMap<String, String>) {
    for net in nets.iter_mut().filter(|n| n.name.starts_with("Net-(")) {
        if let Some(name) = net.pins.iter().find_map(|key| names.get(key)) {
            net.name = name.clone();
        }
    }
}
