use crate::types::{OrganKind, SubType};
use serde::{Deserialize, Serialize};

/// Run settings and the organs a tree starts from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Step size [day].
    pub dt: f64,
    /// Simulated time span [day].
    pub sim_time: f64,
    pub seed: u64,
    pub base_organs: Vec<BaseOrgan>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dt: 1.0,
            sim_time: 30.0,
            seed: 1,
            base_organs: vec![BaseOrgan::default()],
        }
    }
}

impl Config {
    /// Number of steps needed to cover `sim_time`; the last one may be shorter.
    pub fn steps(&self) -> usize {
        if self.dt <= 0.0 || self.sim_time <= 0.0 {
            return 0;
        }
        (self.sim_time / self.dt).ceil() as usize
    }

    /// Size of step `i` (0-based), so that the steps add up to `sim_time`.
    pub fn step_size(&self, i: usize) -> f64 {
        let start = i as f64 * self.dt;
        self.dt.min(self.sim_time - start).max(0.0)
    }
}

/// A parentless organ created when the tree is initialized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseOrgan {
    pub kind: OrganKind,
    pub subtype: SubType,
    /// Position of the first node [cm].
    pub position: [f64; 3],
    /// Initial growth direction.
    pub heading: [f64; 3],
    /// Emergence delay [day].
    pub delay: f64,
}

impl Default for BaseOrgan {
    fn default() -> Self {
        Self {
            kind: OrganKind::Root,
            subtype: 1,
            position: [0.0, 0.0, -3.0],
            heading: [0.0, 0.0, -1.0],
            delay: 0.0,
        }
    }
}
