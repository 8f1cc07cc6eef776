//! Circuit data model shared by every stage of the pipeline.
//!
//! A [`Circuit`] is what the DSL parser produces and what the layout engine,
//! connectivity model, router and schematic writer consume. Records are plain
//! data; positions are only changed by the layout engine and the boundary
//! validator.

pub mod geometry;
pub mod kind;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use geometry::{ComponentBounds, SchematicBounds};
pub use kind::ComponentKind;

/// A point on the page in mm.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Equal within `tolerance` on both axes.
    pub fn approx_eq(&self, other: &Point, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub reference: String,
    pub kind: ComponentKind,
    pub value: String,
    pub position: Point,
    pub library: String,
    pub symbol: String,
}

impl Component {
    pub fn new(
        reference: impl Into<String>,
        kind: ComponentKind,
        value: impl Into<String>,
        position: Point,
    ) -> Self {
        let (library, symbol) = kind.symbol();
        Self {
            reference: reference.into(),
            kind,
            value: value.into(),
            position,
            library: library.to_string(),
            symbol: symbol.to_string(),
        }
    }

    /// `library:symbol`
    pub fn lib_id(&self) -> String {
        format!("{}:{}", self.library, self.symbol)
    }

    pub fn bounds(&self) -> ComponentBounds {
        ComponentBounds::new(
            self.reference.clone(),
            self.position.x,
            self.position.y,
            self.kind.body_size(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerSymbol {
    /// May be empty; the writer then assigns a `#PWR` reference.
    pub reference: String,
    pub power_type: String,
    pub position: Point,
}

impl PowerSymbol {
    pub fn new(reference: impl Into<String>, power_type: impl Into<String>, position: Point) -> Self {
        Self {
            reference: reference.into(),
            power_type: power_type.into(),
            position,
        }
    }

    /// Ground-like rails (GND, VSS, AGND, ...).
    pub fn is_ground(&self) -> bool {
        is_ground_net(&self.power_type)
    }

    pub fn lib_id(&self) -> String {
        format!("power:{}", self.power_type)
    }
}

/// True for rail names conventionally used for ground.
pub fn is_ground_net(name: &str) -> bool {
    let upper = name.trim().to_uppercase();
    upper.starts_with("GND")
        || upper.ends_with("GND")
        || upper == "VSS"
        || upper == "VEE"
        || upper == "0V"
}

/// One end of a connection. A missing pin means the whole component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PinRef {
    pub component: String,
    pub pin: Option<String>,
}

impl PinRef {
    pub fn new(component: impl Into<String>, pin: Option<String>) -> Self {
        Self {
            component: component.into(),
            pin,
        }
    }

    pub fn with_pin(component: impl Into<String>, pin: impl Into<String>) -> Self {
        Self::new(component, Some(pin.into()))
    }

    pub fn whole(component: impl Into<String>) -> Self {
        Self::new(component, None)
    }
}

impl fmt::Display for PinRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pin {
            Some(pin) => write!(f, "{}.{}", self.component, pin),
            None => write!(f, "{}", self.component),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub from: PinRef,
    pub to: PinRef,
}

impl Connection {
    pub fn new(from: PinRef, to: PinRef) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Something placed on the page, either a component or a power symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntityRef<'a> {
    Component(&'a Component),
    Power(&'a PowerSymbol),
}

impl EntityRef<'_> {
    pub fn reference(&self) -> &str {
        match self {
            EntityRef::Component(c) => &c.reference,
            EntityRef::Power(p) => &p.reference,
        }
    }

    pub fn position(&self) -> Point {
        match self {
            EntityRef::Component(c) => c.position,
            EntityRef::Power(p) => p.position,
        }
    }

    pub fn body_size(&self) -> (f64, f64) {
        match self {
            EntityRef::Component(c) => c.kind.body_size(),
            EntityRef::Power(_) => kind::POWER_SYMBOL_SIZE,
        }
    }
}

/// Parsed circuit. Order of every list follows the source text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Circuit {
    pub name: String,
    pub components: Vec<Component>,
    pub power_symbols: Vec<PowerSymbol>,
    pub connections: Vec<Connection>,
}

impl Circuit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Whether a component or power symbol already uses `reference`.
    pub fn contains_reference(&self, reference: &str) -> bool {
        !reference.is_empty() && self.entity(reference).is_some()
    }

    /// Adds the component unless its reference is taken. Returns whether it was added.
    pub fn add_component(&mut self, component: Component) -> bool {
        if self.contains_reference(&component.reference) {
            return false;
        }
        self.components.push(component);
        true
    }

    /// Adds the power symbol unless its reference is taken. Empty references are always accepted.
    pub fn add_power_symbol(&mut self, power: PowerSymbol) -> bool {
        if self.contains_reference(&power.reference) {
            return false;
        }
        self.power_symbols.push(power);
        true
    }

    pub fn add_connection(&mut self, connection: Connection) {
        self.connections.push(connection);
    }

    pub fn component(&self, reference: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.reference == reference)
    }

    pub fn power_symbol(&self, reference: &str) -> Option<&PowerSymbol> {
        self.power_symbols.iter().find(|p| p.reference == reference)
    }

    pub fn entity(&self, reference: &str) -> Option<EntityRef<'_>> {
        self.component(reference)
            .map(EntityRef::Component)
            .or_else(|| self.power_symbol(reference).map(EntityRef::Power))
    }

    /// Components first, then power symbols.
    pub fn entities(&self) -> impl Iterator<Item = EntityRef<'_>> {
        self.components
            .iter()
            .map(EntityRef::Component)
            .chain(self.power_symbols.iter().map(EntityRef::Power))
    }

    pub fn components_of_kind(&self, kind: ComponentKind) -> impl Iterator<Item = &Component> + '_ {
        self.components.iter().filter(move |c| c.kind == kind)
    }
}
