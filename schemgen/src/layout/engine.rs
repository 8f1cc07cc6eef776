use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::{LayoutStatistics, LayoutStrategy, DEFAULT_COMPONENT_SPACING, DEFAULT_GRID_SPACING};
use crate::model::kind::POWER_SYMBOL_SIZE;
use crate::model::{Circuit, ComponentBounds, ComponentKind, Point, SchematicBounds};

/// Margin used inside hierarchical zones.
const ZONE_MARGIN: f64 = 5.0;
/// Extra vertical room between bodies in column layout.
const COLUMN_GAP: f64 = 5.0;

/// What is being placed; decides the body size and the hierarchical group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlacementKind {
    Component(ComponentKind),
    Power,
}

impl PlacementKind {
    pub fn size(&self) -> (f64, f64) {
        match self {
            PlacementKind::Component(kind) => kind.body_size(),
            PlacementKind::Power => POWER_SYMBOL_SIZE,
        }
    }

    pub fn group(&self) -> &str {
        match self {
            PlacementKind::Component(kind) => kind.tag(),
            PlacementKind::Power => "power",
        }
    }
}

impl From<ComponentKind> for PlacementKind {
    fn from(kind: ComponentKind) -> Self {
        PlacementKind::Component(kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutItem {
    pub reference: String,
    pub kind: PlacementKind,
}

impl LayoutItem {
    pub fn new(reference: impl Into<String>, kind: impl Into<PlacementKind>) -> Self {
        Self {
            reference: reference.into(),
            kind: kind.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub reference: String,
    pub position: Point,
}

/// Build-scoped placement state.
#[derive(Debug, Clone)]
pub struct LayoutEngine {
    bounds: SchematicBounds,
    grid_spacing: f64,
    component_spacing: f64,
    placed: Vec<ComponentBounds>,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(SchematicBounds::default())
    }
}

impl LayoutEngine {
    pub fn new(bounds: SchematicBounds) -> Self {
        Self::with_spacing(bounds, DEFAULT_GRID_SPACING, DEFAULT_COMPONENT_SPACING)
    }

    /// Non-positive spacings fall back to the defaults.
    pub fn with_spacing(bounds: SchematicBounds, grid_spacing: f64, component_spacing: f64) -> Self {
        let positive_or = |value: f64, fallback: f64| {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                fallback
            }
        };
        Self {
            bounds,
            grid_spacing: positive_or(grid_spacing, DEFAULT_GRID_SPACING),
            component_spacing: positive_or(component_spacing, DEFAULT_COMPONENT_SPACING),
            placed: Vec::new(),
        }
    }

    pub fn bounds(&self) -> &SchematicBounds {
        &self.bounds
    }

    pub fn grid_spacing(&self) -> f64 {
        self.grid_spacing
    }

    pub fn placed(&self) -> &[ComponentBounds] {
        &self.placed
    }

    /// Forget every placement.
    pub fn reset(&mut self) {
        self.placed.clear();
    }

    pub fn snap_to_grid(&self, x: f64, y: f64) -> Point {
        let g = self.grid_spacing;
        Point::new((x / g).round() * g, (y / g).round() * g)
    }

    /// Body centered at (x, y) fits in the usable area.
    pub fn validate_position(&self, x: f64, y: f64, kind: &PlacementKind) -> bool {
        x.is_finite()
            && y.is_finite()
            && self
                .bounds
                .usable_contains(&ComponentBounds::new("", x, y, kind.size()))
    }

    fn collides(&self, reference: &str, candidate: &ComponentBounds) -> bool {
        self.placed
            .iter()
            .filter(|p| p.reference != reference)
            .any(|p| p.overlaps(candidate))
    }

    fn acceptable(&self, reference: &str, kind: &PlacementKind, at: Point) -> bool {
        self.validate_position(at.x, at.y, kind)
            && !self.collides(reference, &ComponentBounds::new(reference, at.x, at.y, kind.size()))
    }

    /// Row-major scan from the top-left of the usable area.
    fn scan(&self, reference: &str, kind: &PlacementKind) -> Option<Point> {
        let (w, h) = kind.size();
        let b = &self.bounds;
        let step = self.component_spacing;

        let mut y = b.min_y() + h / 2.0;
        while y + h / 2.0 <= b.max_y() + 1e-9 {
            let mut x = b.min_x() + w / 2.0;
            while x + w / 2.0 <= b.max_x() + 1e-9 {
                let candidate = self.snap_to_grid(x, y);
                if self.acceptable(reference, kind, candidate) {
                    return Some(candidate);
                }
                x += step;
            }
            y += step;
        }
        None
    }

    /// Where `place_component` would put this entity, without recording it.
    pub fn find_valid_position(
        &self,
        reference: &str,
        kind: &PlacementKind,
        preferred: Option<Point>,
    ) -> Point {
        if let Some(p) = preferred.filter(Point::is_finite) {
            let snapped = self.snap_to_grid(p.x, p.y);
            if self.acceptable(reference, kind, snapped) {
                return snapped;
            }
        }

        if let Some(found) = self.scan(reference, kind) {
            return found;
        }

        let (w, h) = kind.size();
        tracing::warn!(
            reference,
            "no free position left, falling back to the top-left corner"
        );
        Point::new(self.bounds.min_x() + w / 2.0, self.bounds.min_y() + h / 2.0)
    }

    /// Choose a position and record it. Placing a reference again replaces
    /// its earlier record.
    pub fn place_component(
        &mut self,
        reference: &str,
        kind: &PlacementKind,
        preferred: Option<Point>,
    ) -> Point {
        let position = self.find_valid_position(reference, kind, preferred);
        if let Some(p) = preferred {
            if !p.approx_eq(&position, 1e-9) {
                tracing::debug!(reference, from = %p, to = %position, "moved component");
            }
        }
        self.reserve(reference, kind, position);
        position
    }

    /// Record a position as-is.
    pub fn reserve(&mut self, reference: &str, kind: &PlacementKind, position: Point) {
        self.placed.retain(|p| p.reference != reference);
        self.placed.push(ComponentBounds::new(
            reference,
            position.x,
            position.y,
            kind.size(),
        ));
    }

    /// Arrange `items` with `strategy`, recording each result.
    pub fn auto_layout(&mut self, items: &[LayoutItem], strategy: LayoutStrategy) -> Vec<Placement> {
        if items.is_empty() {
            return Vec::new();
        }
        if strategy == LayoutStrategy::Hierarchical {
            return self.layout_hierarchical(items);
        }

        let candidates = match strategy {
            LayoutStrategy::Grid => self.grid_candidates(items),
            LayoutStrategy::Row => self.row_candidates(items),
            LayoutStrategy::Column => self.column_candidates(items),
            LayoutStrategy::Circular => self.circular_candidates(items),
            LayoutStrategy::Hierarchical => Vec::new(),
        };

        items
            .iter()
            .zip(candidates)
            .map(|(item, candidate)| Placement {
                reference: item.reference.clone(),
                position: self.place_component(&item.reference, &item.kind, Some(candidate)),
            })
            .collect()
    }

    fn largest_body(items: &[LayoutItem]) -> (f64, f64) {
        items.iter().fold((0.0, 0.0), |(w, h), item| {
            let (iw, ih) = item.kind.size();
            (f64::max(w, iw), f64::max(h, ih))
        })
    }

    /// Evenly spread `count` centers over `[start, start + extent]`.
    fn spread(count: usize, extent: f64, min_step: f64) -> f64 {
        let step = if count > 1 {
            extent / (count - 1) as f64
        } else {
            extent / 2.0
        };
        step.max(min_step)
    }

    fn grid_candidates(&self, items: &[LayoutItem]) -> Vec<Point> {
        let n = items.len();
        let cols = (n as f64).sqrt().ceil().max(1.0) as usize;
        let rows = (n + cols - 1) / cols;
        let (max_w, max_h) = Self::largest_body(items);
        let b = &self.bounds;

        let start_x = b.min_x() + max_w / 2.0;
        let start_y = b.min_y() + max_h / 2.0;
        let col_step = Self::spread(cols, b.usable_width() - max_w, self.component_spacing);
        let row_step = Self::spread(rows, b.usable_height() - max_h, self.component_spacing);

        (0..n)
            .map(|i| {
                let (row, col) = (i / cols, i % cols);
                Point::new(
                    start_x + col as f64 * col_step,
                    start_y + row as f64 * row_step,
                )
            })
            .collect()
    }

    fn row_candidates(&self, items: &[LayoutItem]) -> Vec<Point> {
        let (max_w, _) = Self::largest_body(items);
        let b = &self.bounds;
        let y = b.center().y;
        let start_x = b.min_x() + max_w / 2.0;
        let step = Self::spread(items.len(), b.usable_width() - max_w, self.component_spacing);
        (0..items.len())
            .map(|i| Point::new(start_x + i as f64 * step, y))
            .collect()
    }

    fn column_candidates(&self, items: &[LayoutItem]) -> Vec<Point> {
        let (_, max_h) = Self::largest_body(items);
        let b = &self.bounds;
        let x = b.center().x;
        let start_y = b.min_y() + max_h / 2.0;
        let min_step = self.component_spacing.max(max_h + COLUMN_GAP);
        let step = Self::spread(items.len(), b.usable_height() - max_h, min_step);
        (0..items.len())
            .map(|i| Point::new(x, start_y + i as f64 * step))
            .collect()
    }

    fn circular_candidates(&self, items: &[LayoutItem]) -> Vec<Point> {
        let b = &self.bounds;
        let center = b.center();
        let radius = b.usable_width().min(b.usable_height()) / 3.0;
        let n = items.len() as f64;
        (0..items.len())
            .map(|i| {
                let angle = i as f64 * 2.0 * PI / n;
                Point::new(
                    center.x + radius * angle.cos(),
                    center.y + radius * angle.sin(),
                )
            })
            .collect()
    }

    fn layout_hierarchical(&mut self, items: &[LayoutItem]) -> Vec<Placement> {
        let mut groups: Vec<(&str, Vec<LayoutItem>)> = Vec::new();
        for item in items {
            let group = item.kind.group();
            match groups.iter_mut().find(|(name, _)| *name == group) {
                Some((_, members)) => members.push(item.clone()),
                None => groups.push((group, vec![item.clone()])),
            }
        }

        let zone_cols = (groups.len() as f64).sqrt().ceil().max(1.0) as usize;
        let zone_rows = (groups.len() + zone_cols - 1) / zone_cols;
        let zone_w = self.bounds.usable_width() / zone_cols as f64;
        let zone_h = self.bounds.usable_height() / zone_rows as f64;

        let mut placements = Vec::with_capacity(items.len());
        for (index, (group, members)) in groups.iter().enumerate() {
            let origin = Point::new(
                self.bounds.min_x() + (index % zone_cols) as f64 * zone_w,
                self.bounds.min_y() + (index / zone_cols) as f64 * zone_h,
            );
            tracing::debug!(group, zone = index, "laying out zone");

            let mut zone = LayoutEngine::with_spacing(
                SchematicBounds::new(zone_w, zone_h, ZONE_MARGIN),
                self.grid_spacing,
                self.component_spacing,
            );
            for local in zone.auto_layout(members, LayoutStrategy::Grid) {
                let kind = members
                    .iter()
                    .find(|m| m.reference == local.reference)
                    .map(|m| m.kind.clone())
                    .unwrap_or(PlacementKind::Power);
                let preferred = Point::new(origin.x + local.position.x, origin.y + local.position.y);
                placements.push(Placement {
                    position: self.place_component(&local.reference, &kind, Some(preferred)),
                    reference: local.reference,
                });
            }
        }
        placements
    }

    /// Place every entity of `circuit` and write the positions back.
    ///
    /// Without a strategy each entity keeps its described position when that
    /// is valid. With one, components are arranged by the strategy and power
    /// symbols are placed individually afterwards.
    pub fn layout_circuit(
        &mut self,
        circuit: &mut Circuit,
        strategy: Option<LayoutStrategy>,
    ) -> Vec<Placement> {
        let mut placements = Vec::new();

        match strategy {
            Some(strategy) => {
                let items: Vec<LayoutItem> = circuit
                    .components
                    .iter()
                    .map(|c| LayoutItem::new(c.reference.clone(), c.kind.clone()))
                    .collect();
                for placement in self.auto_layout(&items, strategy) {
                    if let Some(c) = circuit
                        .components
                        .iter_mut()
                        .find(|c| c.reference == placement.reference)
                    {
                        c.position = placement.position;
                    }
                    placements.push(placement);
                }
            }
            None => {
                for component in circuit.components.iter_mut() {
                    let kind = PlacementKind::Component(component.kind.clone());
                    component.position =
                        self.place_component(&component.reference, &kind, Some(component.position));
                    placements.push(Placement {
                        reference: component.reference.clone(),
                        position: component.position,
                    });
                }
            }
        }

        let keys = power_keys(circuit);
        for (power, key) in circuit.power_symbols.iter_mut().zip(keys) {
            power.position = self.place_component(&key, &PlacementKind::Power, Some(power.position));
            placements.push(Placement {
                reference: key,
                position: power.position,
            });
        }

        placements
    }

    pub fn statistics(&self) -> LayoutStatistics {
        let n = self.placed.len();
        if n == 0 {
            return LayoutStatistics::default();
        }

        let usable = self.bounds.usable_area();
        let body_area: f64 = self.placed.iter().map(ComponentBounds::area).sum();

        let mut total_distance = 0.0;
        let mut pairs = 0usize;
        for (i, a) in self.placed.iter().enumerate() {
            for b in &self.placed[i + 1..] {
                total_distance += a.center().distance_to(&b.center());
                pairs += 1;
            }
        }

        LayoutStatistics {
            total_components: n,
            area_utilization: if usable > 0.0 { body_area / usable } else { 0.0 },
            average_spacing: if pairs > 0 {
                total_distance / pairs as f64
            } else {
                0.0
            },
            bounds_violations: self
                .placed
                .iter()
                .filter(|p| !self.bounds.usable_contains(p))
                .count(),
        }
    }
}

/// Keys for the circuit's power symbols, in order. Unnamed ones get the next
/// `#PWR0NNN` reference that no other entity already uses; the writer emits the
/// same references.
pub(crate) fn power_keys(circuit: &Circuit) -> Vec<String> {
    let mut next = 0usize;
    circuit
        .power_symbols
        .iter()
        .map(|power| {
            if !power.reference.is_empty() {
                return power.reference.clone();
            }
            loop {
                next += 1;
                let key = format!("#PWR0{:03}", next);
                if !circuit.contains_reference(&key) {
                    break key;
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Component, PowerSymbol};

    fn resistor() -> PlacementKind {
        PlacementKind::Component(ComponentKind::Resistor)
    }

    fn assert_no_overlaps(engine: &LayoutEngine) {
        let placed = engine.placed();
        for (i, a) in placed.iter().enumerate() {
            for b in &placed[i + 1..] {
                assert!(!a.overlaps(b), "{} overlaps {}", a.reference, b.reference);
            }
        }
    }

    fn assert_inside(engine: &LayoutEngine) {
        for p in engine.placed() {
            assert!(engine.bounds().usable_contains(p), "{} out of bounds", p.reference);
        }
    }

    #[test]
    fn test_valid_preferred_position_is_kept() {
        let mut engine = LayoutEngine::default();
        let pos = engine.place_component("R1", &resistor(), Some(Point::new(50.0, 50.0)));
        assert_eq!(pos, Point::new(50.0, 50.0));
    }

    #[test]
    fn test_preferred_position_is_snapped() {
        let mut engine = LayoutEngine::with_spacing(SchematicBounds::default(), 2.54, 10.16);
        let pos = engine.place_component("R1", &resistor(), Some(Point::new(50.0, 50.0)));
        assert!((pos.x - 50.8).abs() < 1e-9);
        assert!((pos.y - 50.8).abs() < 1e-9);
    }

    #[test]
    fn test_collision_moves_second_component() {
        let mut engine = LayoutEngine::default();
        let a = engine.place_component("R1", &resistor(), Some(Point::new(50.0, 50.0)));
        let b = engine.place_component("R2", &resistor(), Some(Point::new(52.0, 50.0)));
        assert_ne!(a, b);
        assert_no_overlaps(&engine);
    }

    #[test]
    fn test_out_of_bounds_preference_is_corrected() {
        let mut engine = LayoutEngine::new(SchematicBounds::new(297.0, 210.0, 20.0));
        let pos = engine.place_component("R1", &resistor(), Some(Point::new(5.0, 5.0)));
        assert!(engine.validate_position(pos.x, pos.y, &resistor()));
    }

    #[test]
    fn test_find_valid_position_does_not_record() {
        let engine = LayoutEngine::default();
        let _ = engine.find_valid_position("R1", &resistor(), None);
        assert!(engine.placed().is_empty());
    }

    #[test]
    fn test_replacing_a_reference_drops_old_record() {
        let mut engine = LayoutEngine::default();
        engine.place_component("R1", &resistor(), Some(Point::new(50.0, 50.0)));
        engine.place_component("R1", &resistor(), Some(Point::new(100.0, 50.0)));
        assert_eq!(engine.placed().len(), 1);
    }

    #[test]
    fn test_full_page_falls_back_to_corner() {
        let mut engine = LayoutEngine::new(SchematicBounds::new(30.0, 20.0, 2.0));
        engine.place_component("R1", &resistor(), None);
        engine.place_component("R2", &resistor(), None);
        let third = engine.place_component("R3", &resistor(), None);
        assert_eq!(third, Point::new(7.0, 4.5));
    }

    #[test]
    fn test_every_strategy_keeps_invariants() {
        let items: Vec<LayoutItem> = (0..9)
            .map(|i| {
                let kind = match i % 3 {
                    0 => ComponentKind::Resistor,
                    1 => ComponentKind::Capacitor,
                    _ => ComponentKind::Led,
                };
                LayoutItem::new(format!("X{}", i), kind)
            })
            .collect();

        for strategy in [
            LayoutStrategy::Grid,
            LayoutStrategy::Row,
            LayoutStrategy::Column,
            LayoutStrategy::Circular,
            LayoutStrategy::Hierarchical,
        ] {
            let mut engine = LayoutEngine::default();
            let placements = engine.auto_layout(&items, strategy);
            assert_eq!(placements.len(), items.len(), "{:?}", strategy);
            assert_no_overlaps(&engine);
            assert_inside(&engine);
        }
    }

    #[test]
    fn test_hierarchical_groups_by_kind() {
        let items = vec![
            LayoutItem::new("R1", ComponentKind::Resistor),
            LayoutItem::new("C1", ComponentKind::Capacitor),
            LayoutItem::new("R2", ComponentKind::Resistor),
        ];
        let mut engine = LayoutEngine::default();
        let placements = engine.auto_layout(&items, LayoutStrategy::Hierarchical);
        let order: Vec<&str> = placements.iter().map(|p| p.reference.as_str()).collect();
        assert_eq!(order, vec!["R1", "R2", "C1"]);
        // resistors share the left zone
        let mid = engine.bounds().center().x;
        assert!(placements[0].position.x < mid);
        assert!(placements[1].position.x < mid);
        assert!(placements[2].position.x >= mid);
    }

    #[test]
    fn test_layout_circuit_writes_positions_back() {
        let mut circuit = Circuit::new("t");
        circuit.add_component(Component::new(
            "R1",
            ComponentKind::Resistor,
            "1k",
            Point::new(-40.0, 30.0),
        ));
        circuit.add_power_symbol(PowerSymbol::new("", "GND", Point::new(60.0, 60.0)));

        let mut engine = LayoutEngine::default();
        let placements = engine.layout_circuit(&mut circuit, None);
        assert_eq!(placements.len(), 2);
        assert!(engine.validate_position(
            circuit.components[0].position.x,
            circuit.components[0].position.y,
            &resistor()
        ));
        assert_eq!(circuit.power_symbols[0].position, Point::new(60.0, 60.0));
        assert_eq!(placements[1].reference, "#PWR0001");
    }

    #[test]
    fn test_power_keys_avoid_explicit_references() {
        let mut circuit = Circuit::new("t");
        circuit.add_power_symbol(PowerSymbol::new("#PWR0001", "VCC", Point::new(20.0, 20.0)));
        circuit.add_power_symbol(PowerSymbol::new("", "GND", Point::new(40.0, 20.0)));
        circuit.add_power_symbol(PowerSymbol::new("", "GND", Point::new(60.0, 20.0)));
        assert_eq!(power_keys(&circuit), vec!["#PWR0001", "#PWR0002", "#PWR0003"]);
    }

    #[test]
    fn test_statistics() {
        let mut engine = LayoutEngine::default();
        engine.place_component("R1", &resistor(), Some(Point::new(50.0, 50.0)));
        engine.place_component("R2", &resistor(), Some(Point::new(80.0, 50.0)));
        let stats = engine.statistics();
        assert_eq!(stats.total_components, 2);
        assert!((stats.average_spacing - 30.0).abs() < 1e-9);
        assert_eq!(stats.bounds_violations, 0);
        assert!(stats.area_utilization > 0.0);
    }
}
