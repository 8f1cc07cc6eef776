//! Best-effort wiring for circuits described without connections.
//!
//! These are guesses from component kinds only: supply rails to every part
//! that draws current, resistor/LED pairs, and a connector → amplifier →
//! speaker audio chain. Nothing here runs when the description lists its own
//! connections.

use serde::{Deserialize, Serialize};

use crate::model::{Circuit, Component, ComponentKind, Connection, PinRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetKind {
    Power,
    Ground,
    Signal,
}

impl NetKind {
    /// Routing priority; supply nets go first.
    pub fn priority(&self) -> u8 {
        match self {
            NetKind::Power | NetKind::Ground => 2,
            NetKind::Signal => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredConnection {
    pub connection: Connection,
    pub net_name: String,
    pub kind: NetKind,
}

impl InferredConnection {
    fn new(from: PinRef, to: PinRef, net_name: impl Into<String>, kind: NetKind) -> Self {
        Self {
            connection: Connection::new(from, to),
            net_name: net_name.into(),
            kind,
        }
    }
}

/// Guess connections for `circuit`. Empty when it already has any.
pub fn infer_connections(circuit: &Circuit) -> Vec<InferredConnection> {
    if !circuit.connections.is_empty() {
        return Vec::new();
    }

    let mut inferred = Vec::new();
    supply_rails(circuit, &mut inferred);
    led_chains(circuit, &mut inferred);
    audio_chain(circuit, &mut inferred);

    tracing::debug!(count = inferred.len(), "inferred connections");
    inferred
}

fn consumers(circuit: &Circuit) -> Vec<&Component> {
    circuit
        .components
        .iter()
        .filter(|c| c.kind.is_power_consumer())
        .collect()
}

fn supply_rails(circuit: &Circuit, out: &mut Vec<InferredConnection>) {
    let consumers = consumers(circuit);
    if consumers.is_empty() {
        return;
    }

    for battery in circuit.components_of_kind(ComponentKind::Battery) {
        for part in &consumers {
            out.push(InferredConnection::new(
                PinRef::with_pin(&battery.reference, "+"),
                PinRef::with_pin(&part.reference, "VCC"),
                "VCC",
                NetKind::Power,
            ));
            out.push(InferredConnection::new(
                PinRef::with_pin(&battery.reference, "-"),
                PinRef::with_pin(&part.reference, "GND"),
                "GND",
                NetKind::Ground,
            ));
        }
    }

    for power in circuit.power_symbols.iter().filter(|p| !p.reference.is_empty()) {
        let kind = if power.is_ground() {
            NetKind::Ground
        } else {
            NetKind::Power
        };
        for part in &consumers {
            out.push(InferredConnection::new(
                PinRef::whole(&power.reference),
                PinRef::whole(&part.reference),
                power.power_type.clone(),
                kind,
            ));
        }
    }
}

fn led_chains(circuit: &Circuit, out: &mut Vec<InferredConnection>) {
    let resistors = circuit.components_of_kind(ComponentKind::Resistor);
    let leds = circuit.components_of_kind(ComponentKind::Led);
    for (i, (resistor, led)) in resistors.zip(leds).enumerate() {
        out.push(InferredConnection::new(
            PinRef::with_pin(&resistor.reference, "2"),
            PinRef::with_pin(&led.reference, "A"),
            format!("LED_NET{}", i + 1),
            NetKind::Signal,
        ));
    }
}

fn audio_chain(circuit: &Circuit, out: &mut Vec<InferredConnection>) {
    let Some(amplifier) = circuit.components_of_kind(ComponentKind::Amplifier).next() else {
        return;
    };
    if let Some(connector) = circuit.components_of_kind(ComponentKind::Connector).next() {
        out.push(InferredConnection::new(
            PinRef::with_pin(&connector.reference, "1"),
            PinRef::with_pin(&amplifier.reference, "IN"),
            "AUDIO_IN",
            NetKind::Signal,
        ));
    }
    if let Some(speaker) = circuit.components_of_kind(ComponentKind::Speaker).next() {
        out.push(InferredConnection::new(
            PinRef::with_pin(&amplifier.reference, "OUT"),
            PinRef::with_pin(&speaker.reference, "1"),
            "AUDIO_OUT",
            NetKind::Signal,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Point, PowerSymbol};

    fn part(reference: &str, kind: ComponentKind) -> Component {
        Component::new(reference, kind, "", Point::new(50.0, 50.0))
    }

    #[test]
    fn test_battery_feeds_every_consumer() {
        let mut circuit = Circuit::new("t");
        circuit.add_component(part("BT1", ComponentKind::Battery));
        circuit.add_component(part("U1", ComponentKind::Ic));
        circuit.add_component(part("U2", ComponentKind::Microcontroller));

        let inferred = infer_connections(&circuit);
        assert_eq!(inferred.len(), 4);
        assert_eq!(inferred.iter().filter(|c| c.net_name == "VCC").count(), 2);
        assert_eq!(inferred.iter().filter(|c| c.kind == NetKind::Ground).count(), 2);
    }

    #[test]
    fn test_led_pairs() {
        let mut circuit = Circuit::new("t");
        circuit.add_component(part("R1", ComponentKind::Resistor));
        circuit.add_component(part("R2", ComponentKind::Resistor));
        circuit.add_component(part("D1", ComponentKind::Led));
        circuit.add_component(part("D2", ComponentKind::Led));

        let inferred = infer_connections(&circuit);
        assert_eq!(inferred.len(), 2);
        assert!(inferred.iter().all(|c| c.net_name.starts_with("LED_NET")));
        assert_eq!(inferred[1].connection.to, PinRef::with_pin("D2", "A"));
    }

    #[test]
    fn test_audio_chain() {
        let mut circuit = Circuit::new("t");
        circuit.add_component(part("J1", ComponentKind::Connector));
        circuit.add_component(part("U1", ComponentKind::Amplifier));
        circuit.add_component(part("LS1", ComponentKind::Speaker));
        circuit.add_power_symbol(PowerSymbol::new("GND", "GND", Point::new(10.0, 10.0)));

        let inferred = infer_connections(&circuit);
        let names: Vec<&str> = inferred.iter().map(|c| c.net_name.as_str()).collect();
        assert_eq!(names, vec!["GND", "AUDIO_IN", "AUDIO_OUT"]);
    }

    #[test]
    fn test_explicit_connections_disable_inference() {
        let mut circuit = Circuit::new("t");
        circuit.add_component(part("R1", ComponentKind::Resistor));
        circuit.add_component(part("D1", ComponentKind::Led));
        circuit.add_connection(Connection::new(PinRef::whole("R1"), PinRef::whole("D1")));
        assert!(infer_connections(&circuit).is_empty());
    }
}
