//! Component placement.
//!
//! The [`LayoutEngine`] assigns every component and power symbol a
//! grid-snapped position whose body rectangle lies inside the usable page
//! area and does not overlap anything placed before it in the same build.

mod engine;

pub use engine::{LayoutEngine, LayoutItem, Placement, PlacementKind};
pub(crate) use engine::power_keys;

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Default grid for component positions, in mm.
pub const DEFAULT_GRID_SPACING: f64 = 1.0;
/// Default minimum distance between scan candidates, in mm (0.4 inch).
pub const DEFAULT_COMPONENT_SPACING: f64 = 10.16;

/// How automatic layout arranges a set of components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutStrategy {
    Grid,
    Row,
    Column,
    Circular,
    /// One zone per component kind.
    Hierarchical,
}

impl FromStr for LayoutStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "grid" => Ok(LayoutStrategy::Grid),
            "row" => Ok(LayoutStrategy::Row),
            "column" => Ok(LayoutStrategy::Column),
            "circular" => Ok(LayoutStrategy::Circular),
            "hierarchical" => Ok(LayoutStrategy::Hierarchical),
            other => Err(format!("unknown layout strategy '{}'", other)),
        }
    }
}

/// Summary of what an engine has placed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutStatistics {
    pub total_components: usize,
    /// Summed body area over usable page area.
    pub area_utilization: f64,
    /// Mean distance between every pair of placed centers.
    pub average_spacing: f64,
    pub bounds_violations: usize,
}
