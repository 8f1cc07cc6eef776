//! Component type table.
//!
//! Maps the type tag written in a circuit description to the KiCad symbol it
//! is drawn with and the nominal body size used for placement.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Body size used for power symbols (width, height in mm).
pub const POWER_SYMBOL_SIZE: (f64, f64) = (5.0, 5.0);

/// Body size used for unrecognised component types.
pub const DEFAULT_BODY_SIZE: (f64, f64) = (10.0, 8.0);

/// Type tag of a component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Resistor,
    Capacitor,
    Inductor,
    Led,
    Diode,
    TransistorNpn,
    TransistorPnp,
    Ic,
    Microcontroller,
    Switch,
    Connector,
    Battery,
    Amplifier,
    Speaker,
    /// Any other tag, kept lowercased. Drawn as a generic two-pin part.
    Other(String),
}

impl ComponentKind {
    /// Resolve a type tag case-insensitively.
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.trim().to_lowercase();
        match tag.as_str() {
            "resistor" => ComponentKind::Resistor,
            "capacitor" => ComponentKind::Capacitor,
            "inductor" => ComponentKind::Inductor,
            "led" => ComponentKind::Led,
            "diode" => ComponentKind::Diode,
            "transistor_npn" | "npn" => ComponentKind::TransistorNpn,
            "transistor_pnp" | "pnp" => ComponentKind::TransistorPnp,
            "ic" => ComponentKind::Ic,
            "microcontroller" | "mcu" => ComponentKind::Microcontroller,
            "switch" => ComponentKind::Switch,
            "connector" => ComponentKind::Connector,
            "battery" => ComponentKind::Battery,
            "amplifier" => ComponentKind::Amplifier,
            "speaker" => ComponentKind::Speaker,
            _ => ComponentKind::Other(tag),
        }
    }

    /// The tag as it appears in circuit descriptions.
    pub fn tag(&self) -> &str {
        match self {
            ComponentKind::Resistor => "resistor",
            ComponentKind::Capacitor => "capacitor",
            ComponentKind::Inductor => "inductor",
            ComponentKind::Led => "led",
            ComponentKind::Diode => "diode",
            ComponentKind::TransistorNpn => "transistor_npn",
            ComponentKind::TransistorPnp => "transistor_pnp",
            ComponentKind::Ic => "ic",
            ComponentKind::Microcontroller => "microcontroller",
            ComponentKind::Switch => "switch",
            ComponentKind::Connector => "connector",
            ComponentKind::Battery => "battery",
            ComponentKind::Amplifier => "amplifier",
            ComponentKind::Speaker => "speaker",
            ComponentKind::Other(tag) => tag,
        }
    }

    /// (library, symbol) pair this kind is drawn with.
    pub fn symbol(&self) -> (&'static str, &'static str) {
        match self {
            ComponentKind::Resistor => ("Device", "R"),
            ComponentKind::Capacitor => ("Device", "C"),
            ComponentKind::Inductor => ("Device", "L"),
            ComponentKind::Led => ("Device", "LED"),
            ComponentKind::Diode => ("Device", "D"),
            ComponentKind::TransistorNpn => ("Device", "Q_NPN_CBE"),
            ComponentKind::TransistorPnp => ("Device", "Q_PNP_CBE"),
            ComponentKind::Ic => ("Device", "U"),
            ComponentKind::Microcontroller => ("MCU", "Microcontroller"),
            ComponentKind::Switch => ("Switch", "SW_Push"),
            ComponentKind::Connector => ("Connector", "Conn_01x02"),
            ComponentKind::Battery => ("Device", "Battery"),
            ComponentKind::Amplifier => ("Amplifier_Audio", "Amplifier"),
            ComponentKind::Speaker => ("Device", "Speaker"),
            ComponentKind::Other(_) => ("Device", "R"),
        }
    }

    /// Inverse of [`ComponentKind::symbol`]. Unknown symbols fall back to
    /// `Other` built from the symbol name.
    pub fn from_symbol(library: &str, name: &str) -> Self {
        ALL_KNOWN
            .iter()
            .find(|kind| kind.symbol() == (library, name))
            .cloned()
            .unwrap_or_else(|| ComponentKind::Other(name.to_lowercase()))
    }

    /// Nominal body (width, height) in mm.
    pub fn body_size(&self) -> (f64, f64) {
        match self {
            ComponentKind::Resistor => (10.0, 5.0),
            ComponentKind::Capacitor => (8.0, 6.0),
            ComponentKind::Inductor => (12.0, 8.0),
            ComponentKind::Led => (6.0, 8.0),
            ComponentKind::Diode => (8.0, 6.0),
            ComponentKind::TransistorNpn | ComponentKind::TransistorPnp => (10.0, 12.0),
            ComponentKind::Ic => (20.0, 15.0),
            ComponentKind::Microcontroller => (20.0, 25.0),
            ComponentKind::Switch => (12.0, 8.0),
            ComponentKind::Connector => (15.0, 10.0),
            ComponentKind::Battery => (8.0, 10.0),
            ComponentKind::Amplifier => (15.0, 12.0),
            ComponentKind::Speaker => (10.0, 10.0),
            ComponentKind::Other(_) => DEFAULT_BODY_SIZE,
        }
    }

    /// Parts that draw supply current and want VCC/GND rails.
    pub fn is_power_consumer(&self) -> bool {
        matches!(
            self,
            ComponentKind::Ic | ComponentKind::Microcontroller | ComponentKind::Amplifier
        )
    }

    /// Reference prefix conventionally used for this kind.
    pub fn reference_prefix(&self) -> &'static str {
        match self {
            ComponentKind::Resistor => "R",
            ComponentKind::Capacitor => "C",
            ComponentKind::Inductor => "L",
            ComponentKind::Led | ComponentKind::Diode => "D",
            ComponentKind::TransistorNpn | ComponentKind::TransistorPnp => "Q",
            ComponentKind::Ic | ComponentKind::Microcontroller | ComponentKind::Amplifier => "U",
            ComponentKind::Switch => "SW",
            ComponentKind::Connector => "J",
            ComponentKind::Battery => "BT",
            ComponentKind::Speaker => "LS",
            ComponentKind::Other(_) => "X",
        }
    }
}

const ALL_KNOWN: [ComponentKind; 14] = [
    ComponentKind::Resistor,
    ComponentKind::Capacitor,
    ComponentKind::Inductor,
    ComponentKind::Led,
    ComponentKind::Diode,
    ComponentKind::TransistorNpn,
    ComponentKind::TransistorPnp,
    ComponentKind::Ic,
    ComponentKind::Microcontroller,
    ComponentKind::Switch,
    ComponentKind::Connector,
    ComponentKind::Battery,
    ComponentKind::Amplifier,
    ComponentKind::Speaker,
];

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_case_insensitive() {
        assert_eq!(ComponentKind::from_tag("LED"), ComponentKind::Led);
        assert_eq!(ComponentKind::from_tag(" Resistor "), ComponentKind::Resistor);
        assert_eq!(
            ComponentKind::from_tag("Flux_Capacitor"),
            ComponentKind::Other("flux_capacitor".to_string())
        );
    }

    #[test]
    fn test_unknown_kind_uses_generic_symbol() {
        let kind = ComponentKind::from_tag("widget");
        assert_eq!(kind.symbol(), ("Device", "R"));
        assert_eq!(kind.body_size(), DEFAULT_BODY_SIZE);
    }

    #[test]
    fn test_symbol_lookup_is_invertible_for_known_kinds() {
        for kind in ALL_KNOWN.iter() {
            let (lib, name) = kind.symbol();
            assert_eq!(&ComponentKind::from_symbol(lib, name), kind);
        }
    }
}
