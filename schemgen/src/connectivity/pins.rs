//! Per-kind pin layouts and pin geometry.

use serde::{Deserialize, Serialize};

use crate::model::{ComponentKind, Point};

/// Pin stub length used by every built-in symbol, in mm.
pub const PIN_LENGTH: f64 = 2.54;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinDirection {
    Input,
    Output,
    Bidirectional,
    Passive,
    PowerIn,
    PowerOut,
    OpenCollector,
    OpenEmitter,
    NoConnect,
}

impl PinDirection {
    /// Electrical type keyword used in symbol definitions.
    pub fn keyword(&self) -> &'static str {
        match self {
            PinDirection::Input => "input",
            PinDirection::Output => "output",
            PinDirection::Bidirectional => "bidirectional",
            PinDirection::Passive => "passive",
            PinDirection::PowerIn => "power_in",
            PinDirection::PowerOut => "power_out",
            PinDirection::OpenCollector => "open_collector",
            PinDirection::OpenEmitter => "open_emitter",
            PinDirection::NoConnect => "no_connect",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinType {
    Electrical,
    Power,
    Ground,
    Signal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinInfo {
    pub number: String,
    pub name: String,
    pub direction: PinDirection,
    pub pin_type: PinType,
    /// Pin root relative to the component center.
    pub offset: Point,
    pub length: f64,
    /// Direction the stub extends in, degrees, 0 pointing right.
    pub angle: f64,
}

impl PinInfo {
    fn new(
        number: &str,
        name: &str,
        direction: PinDirection,
        pin_type: PinType,
        offset: (f64, f64),
        angle: f64,
    ) -> Self {
        Self {
            number: number.to_string(),
            name: name.to_string(),
            direction,
            pin_type,
            offset: Point::new(offset.0, offset.1),
            length: PIN_LENGTH,
            angle,
        }
    }

    fn passive(number: &str, name: &str, offset: (f64, f64), angle: f64) -> Self {
        Self::new(number, name, PinDirection::Passive, PinType::Electrical, offset, angle)
    }

    /// Matches a pin token from a description: number, name or long alias.
    pub fn matches(&self, token: &str) -> bool {
        let token = token.trim();
        if token == self.number || token.eq_ignore_ascii_case(&self.name) {
            return true;
        }
        let alias = match token.to_lowercase().as_str() {
            "anode" => "A",
            "cathode" => "K",
            "base" => "B",
            "collector" => "C",
            "emitter" => "E",
            "positive" | "pos" => "+",
            "negative" | "neg" => "-",
            "input" => "IN",
            "output" => "OUT",
            "vdd" | "vcc" => "VCC",
            "vss" | "gnd" | "ground" => "GND",
            _ => return false,
        };
        self.name.eq_ignore_ascii_case(alias)
    }
}

fn two_terminal(first: &str, second: &str) -> Vec<PinInfo> {
    vec![
        PinInfo::passive("1", first, (-2.54, 0.0), 180.0),
        PinInfo::passive("2", second, (2.54, 0.0), 0.0),
    ]
}

/// Fixed pin layout for a component kind. Unknown kinds use the resistor layout.
pub fn pins_for_kind(kind: &ComponentKind) -> Vec<PinInfo> {
    use PinDirection::*;
    match kind {
        ComponentKind::Led | ComponentKind::Diode => two_terminal("K", "A"),
        ComponentKind::TransistorNpn | ComponentKind::TransistorPnp => vec![
            PinInfo::new("1", "B", Input, PinType::Signal, (-5.08, 0.0), 180.0),
            PinInfo::passive("2", "C", (0.0, 2.54), 90.0),
            PinInfo::passive("3", "E", (0.0, -2.54), 270.0),
        ],
        ComponentKind::Ic => vec![
            PinInfo::new("1", "Pin1", Bidirectional, PinType::Signal, (-7.62, -2.54), 180.0),
            PinInfo::new("2", "Pin2", Bidirectional, PinType::Signal, (-7.62, 2.54), 180.0),
            PinInfo::new("3", "VCC", PowerIn, PinType::Power, (7.62, 2.54), 0.0),
            PinInfo::new("4", "GND", PowerIn, PinType::Ground, (7.62, -2.54), 0.0),
        ],
        ComponentKind::Microcontroller => {
            let mut pins = vec![
                PinInfo::new("1", "VCC", PowerIn, PinType::Power, (0.0, -12.7), 270.0),
                PinInfo::new("2", "GND", PowerIn, PinType::Ground, (0.0, 12.7), 90.0),
            ];
            for (i, y) in [-5.08, 0.0, 5.08].iter().enumerate() {
                pins.push(PinInfo::new(
                    &(3 + i).to_string(),
                    &format!("PA{}", i),
                    Bidirectional,
                    PinType::Signal,
                    (-10.16, *y),
                    180.0,
                ));
            }
            for (i, y) in [-5.08, 0.0, 5.08].iter().enumerate() {
                pins.push(PinInfo::new(
                    &(6 + i).to_string(),
                    &format!("PB{}", i),
                    Bidirectional,
                    PinType::Signal,
                    (10.16, *y),
                    0.0,
                ));
            }
            pins
        }
        ComponentKind::Amplifier => vec![
            PinInfo::new("1", "IN", Input, PinType::Signal, (-7.62, 0.0), 180.0),
            PinInfo::new("2", "OUT", Output, PinType::Signal, (7.62, 0.0), 0.0),
            PinInfo::new("3", "VCC", PowerIn, PinType::Power, (0.0, -6.35), 270.0),
            PinInfo::new("4", "GND", PowerIn, PinType::Ground, (0.0, 6.35), 90.0),
        ],
        ComponentKind::Battery => vec![
            PinInfo::new("1", "+", PowerOut, PinType::Power, (0.0, -5.08), 270.0),
            PinInfo::new("2", "-", PowerOut, PinType::Ground, (0.0, 5.08), 90.0),
        ],
        _ => two_terminal("~", "~"),
    }
}

/// The single pin of a power symbol, sitting on the symbol origin.
pub fn power_symbol_pin(power_type: &str, ground: bool) -> PinInfo {
    PinInfo {
        number: "1".to_string(),
        name: power_type.to_string(),
        direction: PinDirection::PowerIn,
        pin_type: if ground { PinType::Ground } else { PinType::Power },
        offset: Point::default(),
        length: 0.0,
        angle: 0.0,
    }
}

/// Pin-direction compatibility used before accepting a connection.
pub fn can_connect(a: &PinInfo, b: &PinInfo) -> bool {
    use PinDirection::*;
    let feeds_power = |d: PinDirection| matches!(d, PowerIn | Passive);
    let takes_output = |d: PinDirection| matches!(d, Input | Bidirectional | Passive);

    if a.pin_type == PinType::Power {
        return feeds_power(b.direction);
    }
    if b.pin_type == PinType::Power {
        return feeds_power(a.direction);
    }
    if a.pin_type == PinType::Ground || b.pin_type == PinType::Ground {
        return true;
    }
    if a.direction == Output {
        return takes_output(b.direction);
    }
    if b.direction == Output {
        return takes_output(a.direction);
    }
    if a.direction == Passive || b.direction == Passive {
        return true;
    }
    a.direction == Bidirectional || b.direction == Bidirectional
}

fn round_micro(v: f64) -> f64 {
    (v * 1e6).round() / 1e6
}

/// A pin of a placed component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentPin {
    pub component: String,
    pub pin: PinInfo,
    pub component_position: Point,
    /// Component rotation in degrees.
    pub rotation: f64,
}

impl ComponentPin {
    /// `REF.NUMBER`, the key used in the adjacency map.
    pub fn key(&self) -> String {
        format!("{}.{}", self.component, self.pin.number)
    }

    /// Where a wire attaches: rotated offset plus the stub along its angle.
    pub fn connection_point(&self) -> Point {
        let rotation = self.rotation.to_radians();
        let (sin_r, cos_r) = rotation.sin_cos();
        let offset = self.pin.offset;
        let root_x = offset.x * cos_r - offset.y * sin_r;
        let root_y = offset.x * sin_r + offset.y * cos_r;

        let (sin_a, cos_a) = (self.pin.angle + self.rotation).to_radians().sin_cos();
        Point::new(
            round_micro(self.component_position.x + root_x + self.pin.length * cos_a),
            round_micro(self.component_position.y + root_y + self.pin.length * sin_a),
        )
    }

    /// Absolute stub angle, normalised to [0, 360).
    pub fn absolute_angle(&self) -> f64 {
        (self.pin.angle + self.rotation).rem_euclid(360.0)
    }
}
