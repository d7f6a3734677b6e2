//! Position-dependent scalar fields supplied by the environment.
//!
//! They scale branching probabilities and elongation, e.g. to model soil
//! strength reducing root growth in some layers.

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// A scalar field over space.
pub trait SoilLookUp {
    fn value(&self, pos: DVec3) -> f64;
}

/// Uniform field.
impl SoilLookUp for f64 {
    fn value(&self, _pos: DVec3) -> f64 {
        *self
    }
}

/// Piecewise constant field over equidistant depth layers.
///
/// Layer `i` covers `z` from `top - i·h` down to `top - (i+1)·h`, with
/// `h = (top - bottom) / data.len()`. Positions above the first layer use the
/// first value, positions below the last layer use the last value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DepthGrid {
    pub top: f64,
    pub bottom: f64,
    pub data: Vec<f64>,
}

impl DepthGrid {
    pub fn new(top: f64, bottom: f64, data: Vec<f64>) -> Self {
        Self { top, bottom, data }
    }

    /// A grid with `layers` layers all set to `value`.
    pub fn uniform(top: f64, bottom: f64, layers: usize, value: f64) -> Self {
        Self::new(top, bottom, vec![value; layers])
    }

    fn layer(&self, z: f64) -> Option<usize> {
        let n = self.data.len();
        if n == 0 {
            return None;
        }
        let h = (self.top - self.bottom) / n as f64;
        if h <= 0.0 {
            return Some(0);
        }
        let i = ((self.top - z) / h).floor();
        Some(i.clamp(0.0, (n - 1) as f64) as usize)
    }
}

impl SoilLookUp for DepthGrid {
    fn value(&self, pos: DVec3) -> f64 {
        self.layer(pos.z).map_or(1.0, |i| self.data[i])
    }
}
