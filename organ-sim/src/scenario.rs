//! Scenario files: a run configuration plus the organ type parameters of one
//! plant, stored as RON.

use anyhow::{Context, Result};
use organ_core::config::Config;
use organ_core::parameter::{OrganRandomParameter, ParameterSet};
use organ_core::soil::DepthGrid;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Scenario used when no file is given on the command line.
pub const BUNDLED: &str = include_str!("../scenarios/maize.ron");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub config: Config,
    pub parameters: Vec<OrganRandomParameter>,
    /// Scales lateral emergence probabilities by depth.
    #[serde(default)]
    pub branching_scale: Option<DepthGrid>,
    /// Scales elongation by depth.
    #[serde(default)]
    pub elongation_scale: Option<DepthGrid>,
}

impl Scenario {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse RON scenario: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let scenario = ron::from_str(content)?;
        Ok(scenario)
    }

    pub fn bundled() -> Result<Self> {
        Self::parse(BUNDLED).context("Failed to parse bundled scenario")
    }

    pub fn parameter_set(&self) -> ParameterSet {
        self.parameters.iter().cloned().collect()
    }
}
