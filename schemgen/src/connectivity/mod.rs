//! Pin geometry and the electrical connection graph.
//!
//! The [`ConnectivityModel`] knows every pin of every placed entity, checks
//! connections against pin directions, and groups connected pins into nets.

pub mod inference;
pub mod pins;

use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::layout::power_keys;
use crate::model::{is_ground_net, Circuit, ComponentKind, PinRef, Point};
use crate::validation::Severity;

pub use inference::{infer_connections, InferredConnection, NetKind};
pub use pins::{can_connect, pins_for_kind, power_symbol_pin, ComponentPin, PinDirection, PinInfo, PinType};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConnectivityError {
    #[error("Unknown component '{0}'")]
    UnknownComponent(String),
    #[error("Component '{component}' has no pin '{pin}'")]
    UnknownPin { component: String, pin: String },
    #[error("Pins {from} and {to} cannot be connected")]
    IncompatiblePins { from: String, to: String },
}

#[derive(Debug, Clone, PartialEq)]
struct Entity {
    /// Set for power symbols.
    power_type: Option<String>,
    kind: Option<ComponentKind>,
    pins: Vec<ComponentPin>,
}

/// A set of electrically connected pins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Net {
    pub name: String,
    /// `REF.NUMBER` keys in order of first connection.
    pub pins: Vec<String>,
    pub kind: NetKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityStatistics {
    pub total_components: usize,
    pub total_pins: usize,
    pub connected_pins: usize,
    pub total_connections: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityIssue {
    pub severity: Severity,
    pub reference: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConnectivityModel {
    entities: BTreeMap<String, Entity>,
    adjacency: BTreeMap<String, BTreeSet<String>>,
    accepted: Vec<(ComponentPin, ComponentPin)>,
}

impl ConnectivityModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every component and power symbol of a placed circuit.
    pub fn from_circuit(circuit: &Circuit) -> Self {
        let mut model = Self::new();
        for component in &circuit.components {
            model.add_component(&component.reference, &component.kind, component.position, 0.0);
        }
        for (power, key) in circuit.power_symbols.iter().zip(power_keys(circuit)) {
            model.add_power_symbol(&key, &power.power_type, power.position);
        }
        model
    }

    pub fn add_component(&mut self, reference: &str, kind: &ComponentKind, position: Point, rotation: f64) {
        let pins = pins_for_kind(kind)
            .into_iter()
            .map(|pin| ComponentPin {
                component: reference.to_string(),
                pin,
                component_position: position,
                rotation,
            })
            .collect();
        self.entities.insert(
            reference.to_string(),
            Entity {
                power_type: None,
                kind: Some(kind.clone()),
                pins,
            },
        );
    }

    pub fn add_power_symbol(&mut self, reference: &str, power_type: &str, position: Point) {
        let pin = ComponentPin {
            component: reference.to_string(),
            pin: power_symbol_pin(power_type, is_ground_net(power_type)),
            component_position: position,
            rotation: 0.0,
        };
        self.entities.insert(
            reference.to_string(),
            Entity {
                power_type: Some(power_type.to_string()),
                kind: None,
                pins: vec![pin],
            },
        );
    }

    pub fn pins(&self, reference: &str) -> Option<&[ComponentPin]> {
        self.entities.get(reference).map(|e| e.pins.as_slice())
    }

    pub fn is_power_symbol(&self, reference: &str) -> bool {
        self.entities
            .get(reference)
            .map_or(false, |e| e.power_type.is_some())
    }

    /// Look up one pin by number, name or alias.
    pub fn pin(&self, reference: &str, token: &str) -> Result<&ComponentPin, ConnectivityError> {
        let entity = self
            .entities
            .get(reference)
            .ok_or_else(|| ConnectivityError::UnknownComponent(reference.to_string()))?;
        entity
            .pins
            .iter()
            .find(|p| p.pin.number == token)
            .or_else(|| entity.pins.iter().find(|p| p.pin.matches(token)))
            .ok_or_else(|| ConnectivityError::UnknownPin {
                component: reference.to_string(),
                pin: token.to_string(),
            })
    }

    /// Resolve an endpoint. A whole-component endpoint facing a power symbol
    /// picks the matching supply pin, otherwise the first pin.
    fn resolve(&self, end: &PinRef, other: &PinRef) -> Result<ComponentPin, ConnectivityError> {
        if let Some(token) = &end.pin {
            return self.pin(&end.component, token).cloned();
        }

        let entity = self
            .entities
            .get(&end.component)
            .ok_or_else(|| ConnectivityError::UnknownComponent(end.component.clone()))?;
        let wanted = self
            .entities
            .get(&other.component)
            .and_then(|o| o.power_type.as_deref())
            .map(|rail| {
                if is_ground_net(rail) {
                    PinType::Ground
                } else {
                    PinType::Power
                }
            });

        entity
            .pins
            .iter()
            .find(|p| Some(p.pin.pin_type) == wanted)
            .or_else(|| entity.pins.first())
            .cloned()
            .ok_or_else(|| ConnectivityError::UnknownPin {
                component: end.component.clone(),
                pin: String::new(),
            })
    }

    /// Check and record a connection. Rejected connections leave the graph untouched.
    pub fn add_connection(
        &mut self,
        from: &PinRef,
        to: &PinRef,
    ) -> Result<(ComponentPin, ComponentPin), ConnectivityError> {
        let a = self.resolve(from, to)?;
        let b = self.resolve(to, from)?;

        if !can_connect(&a.pin, &b.pin) {
            return Err(ConnectivityError::IncompatiblePins {
                from: a.key(),
                to: b.key(),
            });
        }

        let (ka, kb) = (a.key(), b.key());
        self.adjacency.entry(ka.clone()).or_default().insert(kb.clone());
        self.adjacency.entry(kb).or_default().insert(ka);
        self.accepted.push((a.clone(), b.clone()));
        Ok((a, b))
    }

    /// Explicit `ref.pin` to `ref.pin` form.
    pub fn connect_pins(
        &mut self,
        ref1: &str,
        pin1: &str,
        ref2: &str,
        pin2: &str,
    ) -> Result<(ComponentPin, ComponentPin), ConnectivityError> {
        self.add_connection(&PinRef::with_pin(ref1, pin1), &PinRef::with_pin(ref2, pin2))
    }

    /// Pins directly connected to `key` (`REF.NUMBER`).
    pub fn connections_of(&self, key: &str) -> Vec<&str> {
        self.adjacency
            .get(key)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn are_connected(&self, a: &str, b: &str) -> bool {
        self.adjacency.get(a).map_or(false, |set| set.contains(b))
    }

    /// Accepted connections in insertion order.
    pub fn connections(&self) -> &[(ComponentPin, ComponentPin)] {
        &self.accepted
    }

    /// Connected groups of pins, ordered by first connection.
    pub fn nets(&self) -> Vec<Net> {
        let mut order: Vec<&ComponentPin> = Vec::new();
        let mut seen = BTreeSet::new();
        for (a, b) in &self.accepted {
            for pin in [a, b] {
                if seen.insert(pin.key()) {
                    order.push(pin);
                }
            }
        }

        let index: BTreeMap<String, usize> = order
            .iter()
            .enumerate()
            .map(|(i, pin)| (pin.key(), i))
            .collect();
        let mut sets = UnionFind::<usize>::new(order.len());
        for (a, b) in &self.accepted {
            if let (Some(&ia), Some(&ib)) = (index.get(&a.key()), index.get(&b.key())) {
                sets.union(ia, ib);
            }
        }

        let mut groups: Vec<(usize, Vec<&ComponentPin>)> = Vec::new();
        for (i, &pin) in order.iter().enumerate() {
            let root = sets.find(i);
            match groups.iter_mut().find(|(r, _)| *r == root) {
                Some((_, members)) => members.push(pin),
                None => groups.push((root, vec![pin])),
            }
        }

        groups
            .into_iter()
            .map(|(_, members)| self.describe_net(&members))
            .collect()
    }

    fn describe_net(&self, members: &[&ComponentPin]) -> Net {
        let rail = members.iter().find_map(|pin| {
            self.entities
                .get(&pin.component)
                .and_then(|e| e.power_type.clone())
        });
        let grounded = members.iter().any(|p| p.pin.pin_type == PinType::Ground);

        let (name, kind) = match rail {
            Some(rail) => {
                let kind = if is_ground_net(&rail) {
                    NetKind::Ground
                } else {
                    NetKind::Power
                };
                (rail, kind)
            }
            None => {
                let first = members[0];
                let name = format!("Net-({}-{})", first.component, first.pin.number);
                let kind = if grounded {
                    NetKind::Ground
                } else if members.iter().any(|p| p.pin.pin_type == PinType::Power) {
                    NetKind::Power
                } else {
                    NetKind::Signal
                };
                (name, kind)
            }
        };

        Net {
            name,
            pins: members.iter().map(|p| p.key()).collect(),
            kind,
        }
    }

    /// Pins of `net` in net order.
    pub fn pins_of(&self, net: &Net) -> Vec<ComponentPin> {
        net.pins
            .iter()
            .filter_map(|key| {
                self.entities
                    .values()
                    .flat_map(|e| e.pins.iter())
                    .find(|p| &p.key() == key)
                    .cloned()
            })
            .collect()
    }

    /// Name of the net containing `key`, if it is connected at all.
    pub fn net_name_of(&self, key: &str) -> Option<String> {
        self.nets()
            .into_iter()
            .find(|net| net.pins.iter().any(|p| p == key))
            .map(|net| net.name)
    }

    pub fn statistics(&self) -> ConnectivityStatistics {
        ConnectivityStatistics {
            total_components: self.entities.values().filter(|e| e.kind.is_some()).count(),
            total_pins: self.entities.values().map(|e| e.pins.len()).sum(),
            connected_pins: self.adjacency.len(),
            total_connections: self.accepted.len(),
        }
    }

    /// Isolated components, and supply consumers missing a power or ground connection.
    pub fn check(&self) -> Vec<ConnectivityIssue> {
        let mut issues = Vec::new();
        for (reference, entity) in &self.entities {
            let Some(kind) = &entity.kind else {
                continue;
            };
            let connected: Vec<&ComponentPin> = entity
                .pins
                .iter()
                .filter(|p| self.adjacency.contains_key(&p.key()))
                .collect();

            if connected.is_empty() {
                issues.push(ConnectivityIssue {
                    severity: Severity::Warning,
                    reference: reference.clone(),
                    message: format!("{} has no connections", reference),
                });
                continue;
            }

            if kind.is_power_consumer() {
                for (pin_type, label) in [(PinType::Power, "power"), (PinType::Ground, "ground")] {
                    if !connected.iter().any(|p| p.pin.pin_type == pin_type) {
                        issues.push(ConnectivityIssue {
                            severity: Severity::Warning,
                            reference: reference.clone(),
                            message: format!("{} has no {} connection", reference, label),
                        });
                    }
                }
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Component, PowerSymbol};

    fn sample() -> ConnectivityModel {
        let mut circuit = Circuit::new("t");
        circuit.add_component(Component::new("R1", ComponentKind::Resistor, "220", Point::new(20.0, 30.0)));
        circuit.add_component(Component::new("LED1", ComponentKind::Led, "red", Point::new(50.0, 30.0)));
        circuit.add_component(Component::new("U1", ComponentKind::Ic, "NE555", Point::new(100.0, 80.0)));
        circuit.add_power_symbol(PowerSymbol::new("VCC", "VCC", Point::new(10.0, 10.0)));
        circuit.add_power_symbol(PowerSymbol::new("GND", "GND", Point::new(10.0, 60.0)));
        ConnectivityModel::from_circuit(&circuit)
    }

    #[test]
    fn test_symmetric_adjacency() {
        let mut model = sample();
        model.connect_pins("R1", "2", "LED1", "anode").unwrap();
        assert!(model.are_connected("R1.2", "LED1.2"));
        assert!(model.are_connected("LED1.2", "R1.2"));
        assert_eq!(model.connections_of("LED1.2"), vec!["R1.2"]);
    }

    #[test]
    fn test_unknown_references() {
        let mut model = sample();
        assert_eq!(
            model.connect_pins("R9", "1", "R1", "1"),
            Err(ConnectivityError::UnknownComponent("R9".to_string()))
        );
        assert!(matches!(
            model.connect_pins("R1", "7", "LED1", "1"),
            Err(ConnectivityError::UnknownPin { .. })
        ));
        assert!(model.connections().is_empty());
    }

    #[test]
    fn test_whole_component_picks_supply_pin() {
        let mut model = sample();
        let (_, vcc_pin) = model
            .add_connection(&PinRef::whole("VCC"), &PinRef::whole("U1"))
            .unwrap();
        assert_eq!(vcc_pin.pin.name, "VCC");
        let (gnd_pin, _) = model
            .add_connection(&PinRef::whole("U1"), &PinRef::whole("GND"))
            .unwrap();
        assert_eq!(gnd_pin.pin.name, "GND");
    }

    #[test]
    fn test_incompatible_pins_are_rejected() {
        let mut circuit = Circuit::new("t");
        circuit.add_component(Component::new("Q1", ComponentKind::TransistorNpn, "", Point::new(50.0, 50.0)));
        circuit.add_power_symbol(PowerSymbol::new("VCC", "VCC", Point::new(10.0, 10.0)));
        let mut model = ConnectivityModel::from_circuit(&circuit);
        let result = model.connect_pins("VCC", "1", "Q1", "base");
        assert!(matches!(result, Err(ConnectivityError::IncompatiblePins { .. })));
        assert!(model.connections().is_empty());
    }

    #[test]
    fn test_nets_group_connected_pins() {
        let mut model = sample();
        model.add_connection(&PinRef::whole("VCC"), &PinRef::with_pin("R1", "1")).unwrap();
        model.connect_pins("R1", "2", "LED1", "A").unwrap();
        model.connect_pins("LED1", "K", "GND", "1").unwrap();
        model.add_connection(&PinRef::whole("VCC"), &PinRef::whole("U1")).unwrap();

        let nets = model.nets();
        assert_eq!(nets.len(), 3);
        assert_eq!(nets[0].name, "VCC");
        assert_eq!(nets[0].kind, NetKind::Power);
        assert_eq!(nets[0].pins, vec!["VCC.1", "R1.1", "U1.3"]);
        assert_eq!(nets[1].name, "Net-(R1-2)");
        assert_eq!(nets[1].kind, NetKind::Signal);
        assert_eq!(nets[2].name, "GND");
        assert_eq!(model.net_name_of("U1.3").as_deref(), Some("VCC"));
    }

    #[test]
    fn test_check_reports_isolated_and_unpowered_parts() {
        let mut model = sample();
        model.connect_pins("R1", "2", "LED1", "A").unwrap();
        model.connect_pins("U1", "1", "R1", "1").unwrap();
        let issues = model.check();
        let messages: Vec<&str> = issues.iter().map(|i| i.message.as_str()).collect();
        assert!(messages.contains(&"U1 has no power connection"));
        assert!(messages.contains(&"U1 has no ground connection"));
        assert!(!messages.iter().any(|m| m.starts_with("R1")));
    }

    #[test]
    fn test_statistics() {
        let mut model = sample();
        model.connect_pins("R1", "2", "LED1", "A").unwrap();
        let stats = model.statistics();
        assert_eq!(stats.total_components, 3);
        assert_eq!(stats.total_pins, 2 + 2 + 4 + 1 + 1);
        assert_eq!(stats.connected_pins, 2);
        assert_eq!(stats.total_connections, 1);
    }
}
