use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for an organ in a [`crate::tree::OrganTree`].
///
/// This is an index into the tree's organ arena. Ids are handed out in
/// creation order and never reused within one tree.
pub type OrganId = usize;

/// Global identifier of a geometric node, unique across the whole tree.
pub type NodeId = usize;

/// Sub type of an organ kind (e.g. taproot, first order lateral).
pub type SubType = i32;

/// Coarse classification of organs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrganKind {
    #[default]
    Root,
    Stem,
    Leaf,
}

impl OrganKind {
    /// Numeric organ type code used by parameter files.
    pub fn code(self) -> i32 {
        match self {
            OrganKind::Root => 2,
            OrganKind::Stem => 3,
            OrganKind::Leaf => 4,
        }
    }

    /// Roots keep their nodes in world coordinates while growing; stems and
    /// leaves store each node as the offset from its predecessor.
    pub fn stores_absolute(self) -> bool {
        matches!(self, OrganKind::Root)
    }
}

impl fmt::Display for OrganKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrganKind::Root => "root",
            OrganKind::Stem => "stem",
            OrganKind::Leaf => "leaf",
        };
        f.write_str(name)
    }
}

/// Which representation the relative-storing organs of a tree are in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordinateForm {
    /// Every node holds its world-space position.
    Absolute,
    /// Stem and leaf nodes hold the vector from their predecessor; node 0 is zero.
    Relative,
}
