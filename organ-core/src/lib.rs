//! Growth and geometry engine for branching plant organ systems.
//!
//! Main components:
//! - [`tree`]: the organ arena, node bookkeeping and queries.
//! - [`organ`]: one organ with its polyline geometry and state.
//! - [`parameter`]: statistical organ type parameters and their realization.
//! - [`growth`]: analytical growth functions (age to length and back).
//! - [`tropism`]: directional growth policies.
//! - [`segments`]: discretization of growth into segments.
//! - [`coordinates`]: relative and absolute node coordinates.
//! - [`phases`]: simulation of one time step.
//! - [`soil`]: position dependent scale fields.
//! - [`config`]: run settings and base organs.
//! - [`error`], [`types`]: shared errors, ids and enums.

pub mod config;
pub mod coordinates;
pub mod error;
pub mod growth;
pub mod organ;
pub mod parameter;
pub mod phases;
pub mod segments;
pub mod soil;
pub mod tree;
pub mod tropism;
pub mod types;

pub use error::{Error, Result};
