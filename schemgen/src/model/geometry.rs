//! Page and body rectangles.

use serde::{Deserialize, Serialize};

use super::Point;

/// A4 landscape page width in mm.
pub const A4_WIDTH: f64 = 297.0;
/// A4 landscape page height in mm.
pub const A4_HEIGHT: f64 = 210.0;
/// Margin kept free around the drawing area unless configured otherwise.
pub const DEFAULT_MARGIN: f64 = 10.0;

const EPSILON: f64 = 1e-9;

/// Drawable page with a symmetric margin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchematicBounds {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
}

impl Default for SchematicBounds {
    fn default() -> Self {
        Self {
            width: A4_WIDTH,
            height: A4_HEIGHT,
            margin: DEFAULT_MARGIN,
        }
    }
}

impl SchematicBounds {
    pub fn new(width: f64, height: f64, margin: f64) -> Self {
        Self {
            width,
            height,
            margin,
        }
    }

    pub fn min_x(&self) -> f64 {
        self.margin
    }

    pub fn max_x(&self) -> f64 {
        self.width - self.margin
    }

    pub fn min_y(&self) -> f64 {
        self.margin
    }

    pub fn max_y(&self) -> f64 {
        self.height - self.margin
    }

    pub fn usable_width(&self) -> f64 {
        self.max_x() - self.min_x()
    }

    pub fn usable_height(&self) -> f64 {
        self.max_y() - self.min_y()
    }

    pub fn usable_area(&self) -> f64 {
        self.usable_width() * self.usable_height()
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x() + self.max_x()) / 2.0,
            (self.min_y() + self.max_y()) / 2.0,
        )
    }

    /// Point lies on the page (margin ignored).
    pub fn page_contains(&self, x: f64, y: f64) -> bool {
        (0.0..=self.width).contains(&x) && (0.0..=self.height).contains(&y)
    }

    /// Rectangle lies entirely inside the usable area.
    pub fn usable_contains(&self, bounds: &ComponentBounds) -> bool {
        bounds.left() >= self.min_x() - EPSILON
            && bounds.right() <= self.max_x() + EPSILON
            && bounds.top() >= self.min_y() - EPSILON
            && bounds.bottom() <= self.max_y() + EPSILON
    }
}

/// Body rectangle of a placed entity, centered on its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentBounds {
    pub reference: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ComponentBounds {
    pub fn new(reference: impl Into<String>, x: f64, y: f64, size: (f64, f64)) -> Self {
        Self {
            reference: reference.into(),
            x,
            y,
            width: size.0,
            height: size.1,
        }
    }

    pub fn left(&self) -> f64 {
        self.x - self.width / 2.0
    }

    pub fn right(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn top(&self) -> f64 {
        self.y - self.height / 2.0
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height / 2.0
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Touching edges count as an overlap.
    pub fn overlaps(&self, other: &ComponentBounds) -> bool {
        !(self.right() < other.left()
            || self.left() > other.right()
            || self.bottom() < other.top()
            || self.top() > other.bottom())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_rectangle() {
        let bounds = SchematicBounds::new(297.0, 210.0, 20.0);
        assert_eq!(bounds.min_x(), 20.0);
        assert_eq!(bounds.max_x(), 277.0);
        assert_eq!(bounds.max_y(), 190.0);
        assert!(bounds.page_contains(5.0, 5.0));
        assert!(!bounds.page_contains(350.0, 250.0));
    }

    #[test]
    fn test_overlap_counts_touching_edges() {
        let a = ComponentBounds::new("R1", 10.0, 10.0, (10.0, 5.0));
        let b = ComponentBounds::new("R2", 20.0, 10.0, (10.0, 5.0));
        let c = ComponentBounds::new("R3", 30.1, 10.0, (10.0, 5.0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
