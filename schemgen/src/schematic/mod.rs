//! KiCad schematic document builder.
//!
//! [`SchematicWriter`] turns a placed [`Circuit`] and its routed wires into a
//! typed [`SExp`] tree and writes it through the checked [`SExpWriter`].

pub mod symbols;

use std::collections::BTreeMap;
use uuid::Uuid;

use crate::connectivity::pins_for_kind;
use crate::layout::power_keys;
use crate::model::{Circuit, ComponentKind, Point};
use crate::parser::sexp::{SExp, SExpError, SExpWriter};
use crate::routing::WireRoute;
use symbols::{at, effects};

/// File format version written into every document.
pub const FORMAT_VERSION: f64 = 20241201.0;
pub const GENERATOR: &str = "schemgen";
/// Coordinates are written in tenths of a millimetre.
pub const FILE_UNITS_PER_MM: f64 = 10.0;

/// mm to file units, rounded to four decimals.
pub fn to_file_units(mm: f64) -> f64 {
    (mm * FILE_UNITS_PER_MM * 1e4).round() / 1e4
}

pub fn from_file_units(value: f64) -> f64 {
    value / FILE_UNITS_PER_MM
}

/// Where UUIDs come from. Sequential ids make output reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IdSource {
    #[default]
    Random,
    Sequential(u128),
}

impl IdSource {
    pub fn sequential() -> Self {
        IdSource::Sequential(1)
    }

    pub fn next_id(&mut self) -> Uuid {
        match self {
            IdSource::Random => Uuid::new_v4(),
            IdSource::Sequential(next) => {
                let id = Uuid::from_u128(*next);
                *next += 1;
                id
            }
        }
    }
}

pub struct SchematicWriter {
    ids: IdSource,
}

impl SchematicWriter {
    pub fn new(ids: IdSource) -> Self {
        Self { ids }
    }

    fn uuid(&mut self) -> SExp {
        SExp::keyed("uuid", vec![SExp::text(self.ids.next_id().to_string())])
    }

    /// Build and write the document.
    pub fn write(&mut self, circuit: &Circuit, routes: &[WireRoute]) -> Result<String, SExpError> {
        let document = self.document(circuit, routes);
        SExpWriter::new().write(&document)
    }

    /// Document tree in file order: header, library symbols, component
    /// instances, power instances, wires, sheet instances.
    pub fn document(&mut self, circuit: &Circuit, routes: &[WireRoute]) -> SExp {
        let mut items = vec![
            SExp::keyed("version", vec![SExp::number(FORMAT_VERSION)]),
            SExp::keyed("generator", vec![SExp::symbol(GENERATOR)]),
            SExp::keyed(
                "generator_version",
                vec![SExp::text(env!("CARGO_PKG_VERSION"))],
            ),
            self.uuid(),
            SExp::keyed("paper", vec![SExp::text("A4")]),
            SExp::keyed(
                "title_block",
                vec![
                    SExp::keyed("title", vec![SExp::text(&circuit.name)]),
                    SExp::keyed("date", vec![SExp::text("")]),
                    SExp::keyed("rev", vec![SExp::text("")]),
                    SExp::keyed("company", vec![SExp::text("")]),
                ],
            ),
            lib_symbols(circuit),
        ];

        for component in &circuit.components {
            let pins: Vec<String> = pins_for_kind(&component.kind)
                .into_iter()
                .map(|p| p.number)
                .collect();
            let instance = self.instance(
                &component.lib_id(),
                component.position,
                &component.reference,
                &component.value,
                "~",
                &pins,
            );
            items.push(instance);
        }

        for (power, reference) in circuit.power_symbols.iter().zip(power_keys(circuit)) {
            let instance = self.instance(
                &power.lib_id(),
                power.position,
                &reference,
                &power.power_type,
                "",
                &["1".to_string()],
            );
            items.push(instance);
        }

        for route in routes {
            for segment in &route.segments {
                let wire = self.wire(segment.start, segment.end);
                items.push(wire);
            }
        }

        items.push(SExp::keyed(
            "sheet_instances",
            vec![SExp::keyed(
                "path",
                vec![
                    SExp::text("/"),
                    SExp::keyed("page", vec![SExp::text("1")]),
                ],
            )],
        ));

        SExp::keyed("kicad_sch", items)
    }

    fn instance(
        &mut self,
        lib_id: &str,
        position: Point,
        reference: &str,
        value: &str,
        datasheet: &str,
        pins: &[String],
    ) -> SExp {
        let x = to_file_units(position.x);
        let y = to_file_units(position.y);
        let label = to_file_units(2.54);
        let offset = to_file_units(1.27);

        let mut items = vec![
            SExp::keyed("lib_id", vec![SExp::text(lib_id)]),
            at(x, y, 0.0),
            SExp::keyed("unit", vec![SExp::number(1.0)]),
            SExp::keyed("exclude_from_sim", vec![SExp::yes_no(false)]),
            SExp::keyed("in_bom", vec![SExp::yes_no(true)]),
            SExp::keyed("on_board", vec![SExp::yes_no(true)]),
            SExp::keyed("dnp", vec![SExp::yes_no(false)]),
            self.uuid(),
            instance_property("Reference", reference, x + label, y - offset, false),
            instance_property("Value", value, x + label, y + offset, false),
            instance_property("Footprint", "", x, y, true),
            instance_property("Datasheet", datasheet, x, y, true),
        ];
        for number in pins {
            let uuid = self.uuid();
            items.push(SExp::keyed("pin", vec![SExp::text(number), uuid]));
        }
        SExp::keyed("symbol", items)
    }

    fn wire(&mut self, start: Point, end: Point) -> SExp {
        let xy = |p: Point| {
            SExp::keyed(
                "xy",
                vec![SExp::number(to_file_units(p.x)), SExp::number(to_file_units(p.y))],
            )
        };
        SExp::keyed(
            "wire",
            vec![
                SExp::keyed("pts", vec![xy(start), xy(end)]),
                SExp::keyed(
                    "stroke",
                    vec![
                        SExp::keyed("width", vec![SExp::number(0.0)]),
                        SExp::keyed("type", vec![SExp::symbol("default")]),
                    ],
                ),
                self.uuid(),
            ],
        )
    }
}

fn instance_property(name: &str, value: &str, x: f64, y: f64, hidden: bool) -> SExp {
    SExp::keyed(
        "property",
        vec![SExp::text(name), SExp::text(value), at(x, y, 0.0), effects(hidden)],
    )
}

/// One definition per distinct lib id in use, sorted by lib id.
fn lib_symbols(circuit: &Circuit) -> SExp {
    let mut used: BTreeMap<String, Option<&ComponentKind>> = BTreeMap::new();
    for component in &circuit.components {
        used.entry(component.lib_id()).or_insert(Some(&component.kind));
    }
    for power in &circuit.power_symbols {
        used.entry(power.lib_id()).or_insert(None);
    }

    let definitions = used
        .iter()
        .map(|(lib_id, kind)| match kind {
            Some(kind) => symbols::component_symbol(lib_id, kind),
            None => symbols::power_symbol(lib_id.trim_start_matches("power:")),
        })
        .collect();
    SExp::keyed("lib_symbols", definitions)
}
