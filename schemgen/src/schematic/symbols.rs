//! Library symbol definitions for the `lib_symbols` section.
//!
//! Definitions are derived from the pin table, so a symbol's pins always sit
//! where the connectivity model expects them. Coordinates are symbol-local mm.

use crate::connectivity::{pins_for_kind, power_symbol_pin, PinInfo};
use crate::model::{is_ground_net, ComponentKind};
use crate::parser::sexp::SExp;

pub(crate) const FONT_SIZE: f64 = 1.27;
const MIN_HALF_BODY: f64 = 1.27;

pub(crate) fn effects(hidden: bool) -> SExp {
    let mut items = vec![SExp::keyed(
        "font",
        vec![SExp::keyed("size", vec![SExp::number(FONT_SIZE), SExp::number(FONT_SIZE)])],
    )];
    if hidden {
        items.push(SExp::keyed("hide", vec![SExp::yes_no(true)]));
    }
    SExp::keyed("effects", items)
}

pub(crate) fn at(x: f64, y: f64, angle: f64) -> SExp {
    SExp::keyed("at", vec![SExp::number(x), SExp::number(y), SExp::number(angle)])
}

fn property(name: &str, value: &str, x: f64, y: f64, hidden: bool) -> SExp {
    SExp::keyed(
        "property",
        vec![
            SExp::text(name),
            SExp::text(value),
            at(x, y, 0.0),
            effects(hidden),
        ],
    )
}

fn flags() -> Vec<SExp> {
    vec![
        SExp::keyed("exclude_from_sim", vec![SExp::yes_no(false)]),
        SExp::keyed("in_bom", vec![SExp::yes_no(true)]),
        SExp::keyed("on_board", vec![SExp::yes_no(true)]),
    ]
}

fn round4(v: f64) -> f64 {
    (v * 1e4).round() / 1e4
}

/// Pin definition: `at` is the wire end, the angle points back at the body.
fn pin(info: &PinInfo) -> SExp {
    let (sin_a, cos_a) = info.angle.to_radians().sin_cos();
    let end_x = round4(info.offset.x + info.length * cos_a);
    let end_y = round4(info.offset.y + info.length * sin_a);
    SExp::keyed(
        "pin",
        vec![
            SExp::symbol(info.direction.keyword()),
            SExp::symbol("line"),
            at(end_x, end_y, (info.angle + 180.0).rem_euclid(360.0)),
            SExp::keyed("length", vec![SExp::number(info.length)]),
            SExp::keyed("name", vec![SExp::text(&info.name), effects(false)]),
            SExp::keyed("number", vec![SExp::text(&info.number), effects(false)]),
        ],
    )
}

fn body_rectangle(pins: &[PinInfo]) -> SExp {
    let half_w = pins
        .iter()
        .map(|p| p.offset.x.abs())
        .fold(MIN_HALF_BODY, f64::max);
    let half_h = pins
        .iter()
        .map(|p| p.offset.y.abs())
        .fold(MIN_HALF_BODY, f64::max);
    SExp::keyed(
        "rectangle",
        vec![
            SExp::keyed("start", vec![SExp::number(-half_w), SExp::number(-half_h)]),
            SExp::keyed("end", vec![SExp::number(half_w), SExp::number(half_h)]),
            SExp::keyed(
                "stroke",
                vec![
                    SExp::keyed("width", vec![SExp::number(0.254)]),
                    SExp::keyed("type", vec![SExp::symbol("default")]),
                ],
            ),
            SExp::keyed("fill", vec![SExp::keyed("type", vec![SExp::symbol("none")])]),
        ],
    )
}

fn polyline(points: &[(f64, f64)]) -> SExp {
    let pts = points
        .iter()
        .map(|(x, y)| SExp::keyed("xy", vec![SExp::number(*x), SExp::number(*y)]))
        .collect();
    SExp::keyed("polyline", vec![SExp::keyed("pts", pts)])
}

/// Definition for a component kind under `lib_id`.
pub fn component_symbol(lib_id: &str, kind: &ComponentKind) -> SExp {
    let pins = pins_for_kind(kind);
    let name = lib_id.rsplit(':').next().unwrap_or(lib_id);
    let prefix = kind.reference_prefix();

    let mut items = vec![
        SExp::text(lib_id),
        SExp::keyed("pin_names", vec![SExp::keyed("offset", vec![SExp::number(0.0)])]),
    ];
    items.extend(flags());
    items.push(property("Reference", prefix, 2.54, 0.0, false));
    items.push(property("Value", name, -2.54, 0.0, false));
    items.push(property("Footprint", "", 0.0, 0.0, true));
    items.push(property("Datasheet", "~", 0.0, 0.0, true));
    items.push(SExp::keyed(
        "symbol",
        vec![SExp::text(format!("{}_0_1", name)), body_rectangle(&pins)],
    ));

    let mut unit = vec![SExp::text(format!("{}_1_1", name))];
    unit.extend(pins.iter().map(pin));
    items.push(SExp::keyed("symbol", unit));

    SExp::keyed("symbol", items)
}

/// Definition for `power:<power_type>`. Ground rails are drawn as a bar below
/// the pin, supply rails as an arrow above it.
pub fn power_symbol(power_type: &str) -> SExp {
    let ground = is_ground_net(power_type);
    let graphics = if ground {
        vec![
            polyline(&[(0.0, 0.0), (0.0, 1.27)]),
            polyline(&[(-1.27, 1.27), (1.27, 1.27), (0.0, 2.54), (-1.27, 1.27)]),
        ]
    } else {
        vec![
            polyline(&[(-0.762, -1.27), (0.0, -2.54)]),
            polyline(&[(0.0, 0.0), (0.0, -2.54)]),
            polyline(&[(0.0, -2.54), (0.762, -1.27)]),
        ]
    };

    let mut items = vec![
        SExp::text(format!("power:{}", power_type)),
        SExp::keyed("power", vec![]),
        SExp::keyed(
            "pin_names",
            vec![
                SExp::keyed("offset", vec![SExp::number(0.0)]),
                SExp::keyed("hide", vec![SExp::yes_no(true)]),
            ],
        ),
    ];
    items.extend(flags());
    items.push(property("Reference", "#PWR", 0.0, -3.81, true));
    items.push(property("Value", power_type, 0.0, 3.556, false));
    items.push(property("Footprint", "", 0.0, 0.0, true));
    items.push(property("Datasheet", "", 0.0, 0.0, true));

    let mut body = vec![SExp::text(format!("{}_0_1", power_type))];
    body.extend(graphics);
    items.push(SExp::keyed("symbol", body));
    items.push(SExp::keyed(
        "symbol",
        vec![
            SExp::text(format!("{}_1_1", power_type)),
            pin(&power_symbol_pin(power_type, ground)),
        ],
    ));

    SExp::keyed("symbol", items)
}
