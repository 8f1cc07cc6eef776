//! Wire routing between pins.
//!
//! Routes are made of axis-aligned segments (except the `Direct` strategy).
//! `Optimized` routing replaces any segment that crosses a component body
//! with a three-segment detour. Multi-pin nets are wired as a star around
//! their first pin, which is simple rather than shortest.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::connectivity::ComponentPin;
use crate::model::{ComponentBounds, Point};

/// Routing grid, in mm (0.1 inch).
pub const ROUTING_GRID: f64 = 2.54;
/// Extra room added around component bodies.
pub const OBSTACLE_CLEARANCE: f64 = 1.0;
/// Distance kept from an obstacle when detouring.
pub const DETOUR_OFFSET: f64 = 2.54;
pub const MAX_DETOUR_ATTEMPTS: usize = 16;

const ALIGN_TOLERANCE: f64 = 0.1;
const JOIN_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteStrategy {
    /// One straight segment.
    Direct,
    /// One bend, no obstacle checks.
    #[default]
    Manhattan,
    /// Manhattan plus detours around component bodies.
    Optimized,
}

impl FromStr for RouteStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "direct" => Ok(RouteStrategy::Direct),
            "manhattan" => Ok(RouteStrategy::Manhattan),
            "optimized" => Ok(RouteStrategy::Optimized),
            other => Err(format!("unknown routing strategy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireSegment {
    pub start: Point,
    pub end: Point,
    pub orientation: Orientation,
}

impl WireSegment {
    pub fn new(start: Point, end: Point, orientation: Orientation) -> Self {
        Self {
            start,
            end,
            orientation,
        }
    }

    /// Orientation taken from the dominant axis.
    pub fn between(start: Point, end: Point) -> Self {
        let orientation = if (end.x - start.x).abs() >= (end.y - start.y).abs() {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        };
        Self::new(start, end, orientation)
    }

    pub fn length(&self) -> f64 {
        self.start.distance_to(&self.end)
    }

    pub fn midpoint(&self) -> Point {
        Point::new(
            (self.start.x + self.end.x) / 2.0,
            (self.start.y + self.end.y) / 2.0,
        )
    }

    fn min_x(&self) -> f64 {
        self.start.x.min(self.end.x)
    }

    fn max_x(&self) -> f64 {
        self.start.x.max(self.end.x)
    }

    fn min_y(&self) -> f64 {
        self.start.y.min(self.end.y)
    }

    fn max_y(&self) -> f64 {
        self.start.y.max(self.end.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRoute {
    pub net_name: String,
    pub segments: Vec<WireSegment>,
    /// `REF.NUMBER` keys of the pins this route joins.
    pub connected_pins: Vec<String>,
    pub priority: u8,
}

impl WireRoute {
    pub fn total_length(&self) -> f64 {
        self.segments.iter().map(WireSegment::length).sum()
    }
}

/// Keep-out rectangle around a component body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingObstacle {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub owner: String,
}

impl RoutingObstacle {
    pub fn from_bounds(bounds: &ComponentBounds, clearance: f64) -> Self {
        Self {
            min_x: bounds.left() - clearance,
            min_y: bounds.top() - clearance,
            max_x: bounds.right() + clearance,
            max_y: bounds.bottom() + clearance,
            owner: bounds.reference.clone(),
        }
    }

    /// Segment passes through the interior; running along an edge is fine.
    pub fn blocks(&self, segment: &WireSegment) -> bool {
        segment.min_x() < self.max_x
            && segment.max_x() > self.min_x
            && segment.min_y() < self.max_y
            && segment.max_y() > self.min_y
    }
}

/// A route that could not avoid every obstacle and was drawn straight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingFailure {
    pub net_name: String,
    pub start: Point,
    pub end: Point,
    pub attempts: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingStatistics {
    pub total_routes: usize,
    pub total_length: f64,
    pub average_length: f64,
    pub total_segments: usize,
    pub routes_by_priority: BTreeMap<u8, usize>,
}

/// Stub angle counts as horizontal within 45 degrees of 0 or 180.
fn points_horizontally(angle: Option<f64>) -> bool {
    match angle {
        Some(a) => {
            let a = a.rem_euclid(360.0);
            a <= 45.0 || a >= 315.0 || (135.0..=225.0).contains(&a)
        }
        None => false,
    }
}

/// Join consecutive collinear segments of the same orientation that meet end to start.
pub fn merge_segments(segments: Vec<WireSegment>) -> Vec<WireSegment> {
    let mut merged: Vec<WireSegment> = Vec::with_capacity(segments.len());
    for segment in segments {
        if segment.length() <= JOIN_TOLERANCE {
            continue;
        }
        if let Some(last) = merged.last_mut() {
            let collinear = match segment.orientation {
                Orientation::Horizontal => (last.start.y - segment.start.y).abs() <= ALIGN_TOLERANCE,
                Orientation::Vertical => (last.start.x - segment.start.x).abs() <= ALIGN_TOLERANCE,
            };
            if last.orientation == segment.orientation
                && last.end.approx_eq(&segment.start, JOIN_TOLERANCE)
                && collinear
            {
                last.end = segment.end;
                continue;
            }
        }
        merged.push(segment);
    }
    merged
}

/// Build-scoped router holding obstacles and the routes produced so far.
#[derive(Debug, Clone, Default)]
pub struct WireRouter {
    obstacles: Vec<RoutingObstacle>,
    routes: Vec<WireRoute>,
}

impl WireRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_obstacle(&mut self, obstacle: RoutingObstacle) {
        self.obstacles.push(obstacle);
    }

    /// Register placed bodies, grown by [`OBSTACLE_CLEARANCE`].
    pub fn add_component_obstacles(&mut self, placed: &[ComponentBounds]) {
        for bounds in placed {
            self.add_obstacle(RoutingObstacle::from_bounds(bounds, OBSTACLE_CLEARANCE));
        }
    }

    pub fn obstacles(&self) -> &[RoutingObstacle] {
        &self.obstacles
    }

    pub fn routes(&self) -> &[WireRoute] {
        &self.routes
    }

    pub fn snap_to_grid(&self, point: Point) -> Point {
        Point::new(
            (point.x / ROUTING_GRID).round() * ROUTING_GRID,
            (point.y / ROUTING_GRID).round() * ROUTING_GRID,
        )
    }

    /// One-bend path. The bend side follows the pin stubs when they point horizontally.
    pub fn manhattan(
        start: Point,
        end: Point,
        start_angle: Option<f64>,
        end_angle: Option<f64>,
    ) -> Vec<WireSegment> {
        let dx = end.x - start.x;
        let dy = end.y - start.y;

        if dx.abs() <= JOIN_TOLERANCE && dy.abs() <= JOIN_TOLERANCE {
            return Vec::new();
        }
        if dy.abs() <= JOIN_TOLERANCE {
            return vec![WireSegment::new(start, end, Orientation::Horizontal)];
        }
        if dx.abs() <= JOIN_TOLERANCE {
            return vec![WireSegment::new(start, end, Orientation::Vertical)];
        }

        // Nearly aligned: long run first, then a short jog onto the pin.
        let horizontal_first = if dy.abs() <= ALIGN_TOLERANCE {
            true
        } else if dx.abs() <= ALIGN_TOLERANCE {
            false
        } else if points_horizontally(start_angle) {
            true
        } else if points_horizontally(end_angle) {
            false
        } else {
            dx.abs() >= dy.abs()
        };

        if horizontal_first {
            let corner = Point::new(end.x, start.y);
            vec![
                WireSegment::new(start, corner, Orientation::Horizontal),
                WireSegment::new(corner, end, Orientation::Vertical),
            ]
        } else {
            let corner = Point::new(start.x, end.y);
            vec![
                WireSegment::new(start, corner, Orientation::Vertical),
                WireSegment::new(corner, end, Orientation::Horizontal),
            ]
        }
    }

    fn blocking<'a>(&'a self, segment: &WireSegment, ignore: &[&str]) -> Option<&'a RoutingObstacle> {
        self.obstacles
            .iter()
            .filter(|o| !ignore.contains(&o.owner.as_str()))
            .find(|o| o.blocks(segment))
    }

    fn detour(&self, segment: &WireSegment, obstacle: &RoutingObstacle, ignore: &[&str]) -> Vec<WireSegment> {
        let (s, e) = (segment.start, segment.end);
        match segment.orientation {
            Orientation::Horizontal => {
                let above = obstacle.min_y - DETOUR_OFFSET;
                let below = obstacle.max_y + DETOUR_OFFSET;
                let mut sides = [above, below];
                if (below - s.y).abs() < (s.y - above).abs() {
                    sides.swap(0, 1);
                }
                let y = sides
                    .iter()
                    .copied()
                    .find(|&y| {
                        let middle = WireSegment::new(Point::new(s.x, y), Point::new(e.x, y), Orientation::Horizontal);
                        self.blocking(&middle, ignore).is_none()
                    })
                    .unwrap_or(sides[0]);
                vec![
                    WireSegment::new(s, Point::new(s.x, y), Orientation::Vertical),
                    WireSegment::new(Point::new(s.x, y), Point::new(e.x, y), Orientation::Horizontal),
                    WireSegment::new(Point::new(e.x, y), e, Orientation::Vertical),
                ]
            }
            Orientation::Vertical => {
                let left = obstacle.min_x - DETOUR_OFFSET;
                let right = obstacle.max_x + DETOUR_OFFSET;
                let mut sides = [left, right];
                if (right - s.x).abs() < (s.x - left).abs() {
                    sides.swap(0, 1);
                }
                let x = sides
                    .iter()
                    .copied()
                    .find(|&x| {
                        let middle = WireSegment::new(Point::new(x, s.y), Point::new(x, e.y), Orientation::Vertical);
                        self.blocking(&middle, ignore).is_none()
                    })
                    .unwrap_or(sides[0]);
                vec![
                    WireSegment::new(s, Point::new(x, s.y), Orientation::Horizontal),
                    WireSegment::new(Point::new(x, s.y), Point::new(x, e.y), Orientation::Vertical),
                    WireSegment::new(Point::new(x, e.y), e, Orientation::Horizontal),
                ]
            }
        }
    }

    /// Rework `segments` until no obstacle is crossed. `None` when the attempt
    /// budget runs out.
    fn avoid_obstacles(&self, mut segments: Vec<WireSegment>, ignore: &[&str]) -> Option<Vec<WireSegment>> {
        for _ in 0..=MAX_DETOUR_ATTEMPTS {
            let hit = segments
                .iter()
                .enumerate()
                .find_map(|(i, seg)| self.blocking(seg, ignore).map(|o| (i, o)));
            let Some((index, obstacle)) = hit else {
                return Some(segments);
            };
            let replacement = self.detour(&segments[index], obstacle, ignore);
            segments.splice(index..=index, replacement);
            segments.retain(|s| s.length() > JOIN_TOLERANCE);
        }
        None
    }

    /// Path between two points. Obstacles owned by `ignore` are not avoided.
    pub fn route_points(
        &self,
        start: Point,
        end: Point,
        strategy: RouteStrategy,
        start_angle: Option<f64>,
        end_angle: Option<f64>,
        ignore: &[&str],
    ) -> Result<Vec<WireSegment>, Vec<WireSegment>> {
        let segments = match strategy {
            RouteStrategy::Direct => {
                if start.approx_eq(&end, JOIN_TOLERANCE) {
                    Vec::new()
                } else {
                    vec![WireSegment::between(start, end)]
                }
            }
            RouteStrategy::Manhattan => Self::manhattan(start, end, start_angle, end_angle),
            RouteStrategy::Optimized => {
                let base = Self::manhattan(start, end, start_angle, end_angle);
                match self.avoid_obstacles(base, ignore) {
                    Some(clear) => clear,
                    None => return Err(vec![WireSegment::between(start, end)]),
                }
            }
        };
        Ok(merge_segments(segments))
    }

    /// Route one pin pair and keep the route. A failure to clear obstacles
    /// still produces a (straight) route alongside the failure record.
    pub fn route_connection(
        &mut self,
        from: &ComponentPin,
        to: &ComponentPin,
        net_name: &str,
        strategy: RouteStrategy,
        priority: u8,
    ) -> (WireRoute, Option<RoutingFailure>) {
        let start = from.connection_point();
        let end = to.connection_point();
        let ignore = [from.component.as_str(), to.component.as_str()];

        let (segments, failure) = match self.route_points(
            start,
            end,
            strategy,
            Some(from.absolute_angle()),
            Some(to.absolute_angle()),
            &ignore,
        ) {
            Ok(segments) => (segments, None),
            Err(fallback) => {
                tracing::warn!(net = net_name, "could not route around obstacles, drawing a direct wire");
                (
                    fallback,
                    Some(RoutingFailure {
                        net_name: net_name.to_string(),
                        start,
                        end,
                        attempts: MAX_DETOUR_ATTEMPTS,
                    }),
                )
            }
        };

        let route = WireRoute {
            net_name: net_name.to_string(),
            segments,
            connected_pins: vec![from.key(), to.key()],
            priority,
        };
        self.routes.push(route.clone());
        (route, failure)
    }

    /// Star-wire a net from its first pin to every other pin.
    pub fn route_multi_point_net(
        &mut self,
        net_name: &str,
        pins: &[ComponentPin],
        strategy: RouteStrategy,
        priority: u8,
    ) -> (WireRoute, Vec<RoutingFailure>) {
        let mut segments = Vec::new();
        let mut failures = Vec::new();

        if let Some((hub, rest)) = pins.split_first() {
            let hub_point = hub.connection_point();
            for pin in rest {
                let end = pin.connection_point();
                let ignore = [hub.component.as_str(), pin.component.as_str()];
                match self.route_points(
                    hub_point,
                    end,
                    strategy,
                    Some(hub.absolute_angle()),
                    Some(pin.absolute_angle()),
                    &ignore,
                ) {
                    Ok(branch) => segments.extend(branch),
                    Err(fallback) => {
                        tracing::warn!(net = net_name, pin = %pin.key(), "star branch drawn directly");
                        failures.push(RoutingFailure {
                            net_name: net_name.to_string(),
                            start: hub_point,
                            end,
                            attempts: MAX_DETOUR_ATTEMPTS,
                        });
                        segments.extend(fallback);
                    }
                }
            }
        }

        let route = WireRoute {
            net_name: net_name.to_string(),
            segments,
            connected_pins: pins.iter().map(ComponentPin::key).collect(),
            priority,
        };
        self.routes.push(route.clone());
        (route, failures)
    }

    pub fn statistics(&self) -> RoutingStatistics {
        let total_routes = self.routes.len();
        let total_length: f64 = self.routes.iter().map(WireRoute::total_length).sum();
        let mut routes_by_priority = BTreeMap::new();
        for route in &self.routes {
            *routes_by_priority.entry(route.priority).or_insert(0) += 1;
        }
        RoutingStatistics {
            total_routes,
            total_length,
            average_length: if total_routes > 0 {
                total_length / total_routes as f64
            } else {
                0.0
            },
            total_segments: self.routes.iter().map(|r| r.segments.len()).sum(),
            routes_by_priority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::pins_for_kind;
    use crate::model::ComponentKind;

    fn pin(component: &str, kind: ComponentKind, number: &str, at: Point) -> ComponentPin {
        ComponentPin {
            component: component.to_string(),
            pin: pins_for_kind(&kind)
                .into_iter()
                .find(|p| p.number == number)
                .unwrap(),
            component_position: at,
            rotation: 0.0,
        }
    }

    #[test]
    fn test_manhattan_horizontal_first_from_horizontal_pin() {
        let segments =
            WireRouter::manhattan(Point::new(10.0, 10.0), Point::new(20.0, 15.0), Some(0.0), None);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start, Point::new(10.0, 10.0));
        assert_eq!(segments[0].end, Point::new(20.0, 10.0));
        assert_eq!(segments[0].orientation, Orientation::Horizontal);
        assert_eq!(segments[1].start, Point::new(20.0, 10.0));
        assert_eq!(segments[1].end, Point::new(20.0, 15.0));
        assert_eq!(segments[1].orientation, Orientation::Vertical);
    }

    #[test]
    fn test_manhattan_vertical_first_towards_horizontal_end_pin() {
        let segments =
            WireRouter::manhattan(Point::new(10.0, 10.0), Point::new(20.0, 15.0), Some(90.0), Some(180.0));
        assert_eq!(segments[0].orientation, Orientation::Vertical);
        assert_eq!(segments[0].end, Point::new(10.0, 15.0));
    }

    #[test]
    fn test_manhattan_falls_back_to_larger_delta() {
        let segments =
            WireRouter::manhattan(Point::new(0.0, 0.0), Point::new(3.0, 30.0), Some(90.0), Some(270.0));
        assert_eq!(segments[0].orientation, Orientation::Vertical);
    }

    #[test]
    fn test_aligned_points_give_one_segment() {
        let segments =
            WireRouter::manhattan(Point::new(0.0, 5.0), Point::new(30.0, 5.0), Some(90.0), None);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].orientation, Orientation::Horizontal);
    }

    #[test]
    fn test_nearly_aligned_points_end_with_a_jog() {
        let segments =
            WireRouter::manhattan(Point::new(0.0, 5.0), Point::new(30.0, 5.05), Some(90.0), None);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].orientation, Orientation::Horizontal);
        assert_eq!(segments[0].end, Point::new(30.0, 5.0));
        assert_eq!(segments[1].orientation, Orientation::Vertical);
        assert_eq!(segments[1].end, Point::new(30.0, 5.05));
        for segment in &segments {
            match segment.orientation {
                Orientation::Horizontal => assert_eq!(segment.start.y, segment.end.y),
                Orientation::Vertical => assert_eq!(segment.start.x, segment.end.x),
            }
        }

        let segments =
            WireRouter::manhattan(Point::new(10.0, 0.0), Point::new(10.08, 40.0), Some(0.0), None);
        assert_eq!(segments[0].orientation, Orientation::Vertical);
        assert_eq!(segments[0].end, Point::new(10.0, 40.0));
    }

    #[test]
    fn test_direct_is_single_segment() {
        let router = WireRouter::new();
        let segments = router
            .route_points(Point::new(0.0, 0.0), Point::new(10.0, 20.0), RouteStrategy::Direct, None, None, &[])
            .unwrap();
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn test_optimized_detours_around_obstacle() {
        let mut router = WireRouter::new();
        router.add_component_obstacles(&[ComponentBounds::new("U1", 50.0, 50.0, (20.0, 15.0))]);
        let segments = router
            .route_points(
                Point::new(20.0, 50.0),
                Point::new(80.0, 50.0),
                RouteStrategy::Optimized,
                Some(0.0),
                Some(180.0),
                &[],
            )
            .unwrap();
        assert_eq!(segments.len(), 3);
        for segment in &segments {
            assert!(router.obstacles().iter().all(|o| !o.blocks(segment)));
        }
        assert_eq!(segments.first().unwrap().start, Point::new(20.0, 50.0));
        assert_eq!(segments.last().unwrap().end, Point::new(80.0, 50.0));
    }

    #[test]
    fn test_own_component_is_not_an_obstacle() {
        let mut router = WireRouter::new();
        router.add_component_obstacles(&[ComponentBounds::new("LED1", 50.0, 30.0, (6.0, 8.0))]);
        let segments = router
            .route_points(
                Point::new(25.08, 30.0),
                Point::new(55.08, 30.0),
                RouteStrategy::Optimized,
                Some(0.0),
                Some(0.0),
                &["R1", "LED1"],
            )
            .unwrap();
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn test_unavoidable_obstacle_falls_back_to_direct() {
        let mut router = WireRouter::new();
        // the start point sits inside a foreign body
        router.add_obstacle(RoutingObstacle {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 100.0,
            max_y: 100.0,
            owner: "U9".to_string(),
        });
        let result = router.route_points(
            Point::new(10.0, 50.0),
            Point::new(90.0, 50.0),
            RouteStrategy::Optimized,
            Some(0.0),
            None,
            &[],
        );
        let fallback = result.unwrap_err();
        assert_eq!(fallback.len(), 1);
    }

    #[test]
    fn test_merge_joins_collinear_segments() {
        let merged = merge_segments(vec![
            WireSegment::new(Point::new(0.0, 0.0), Point::new(5.0, 0.0), Orientation::Horizontal),
            WireSegment::new(Point::new(5.0, 0.0), Point::new(12.0, 0.0), Orientation::Horizontal),
            WireSegment::new(Point::new(12.0, 0.0), Point::new(12.0, 7.0), Orientation::Vertical),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].end, Point::new(12.0, 0.0));
    }

    #[test]
    fn test_route_connection_between_pins() {
        let mut router = WireRouter::new();
        let r = pin("R1", ComponentKind::Resistor, "2", Point::new(20.0, 30.0));
        let d = pin("LED1", ComponentKind::Led, "2", Point::new(50.0, 30.0));
        let (route, failure) = router.route_connection(&r, &d, "Net-(R1-2)", RouteStrategy::Manhattan, 1);
        assert!(failure.is_none());
        assert_eq!(route.segments.len(), 1);
        assert_eq!(route.connected_pins, vec!["R1.2", "LED1.2"]);
        assert!((route.total_length() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_star_net_and_statistics() {
        let mut router = WireRouter::new();
        let pins = vec![
            pin("U1", ComponentKind::Ic, "3", Point::new(100.0, 50.0)),
            pin("R1", ComponentKind::Resistor, "1", Point::new(150.0, 80.0)),
            pin("R2", ComponentKind::Resistor, "1", Point::new(150.0, 20.0)),
        ];
        let (route, failures) = router.route_multi_point_net("VCC", &pins, RouteStrategy::Manhattan, 2);
        assert!(failures.is_empty());
        assert_eq!(route.connected_pins.len(), 3);
        assert_eq!(route.segments.len(), 4);

        let stats = router.statistics();
        assert_eq!(stats.total_routes, 1);
        assert_eq!(stats.total_segments, 4);
        assert_eq!(stats.routes_by_priority.get(&2), Some(&1));
    }

    #[test]
    fn test_snap_to_routing_grid() {
        let router = WireRouter::new();
        let snapped = router.snap_to_grid(Point::new(3.0, 6.0));
        assert!((snapped.x - 2.54).abs() < 1e-9);
        assert!((snapped.y - 5.08).abs() < 1e-9);
    }
}
