use crate::types::{OrganId, OrganKind, SubType};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("growth function code {0} is not implemented")]
    UnknownGrowthFunction(i32),

    #[error("tropism code {0} is not implemented")]
    UnknownTropism(i32),

    #[error("negative length {0} encountered")]
    NegativeLength(f64),

    #[error("negative organ age {0} encountered")]
    NegativeAge(f64),

    #[error("no type parameter for {kind} sub type {subtype}")]
    MissingParameter { kind: OrganKind, subtype: SubType },

    #[error("organ {0} does not exist")]
    UnknownOrgan(OrganId),

    #[error("node index {index} out of range for organ {organ} with {len} nodes")]
    NodeIndexOutOfRange {
        organ: OrganId,
        index: usize,
        len: usize,
    },

    #[error("organ {organ} has no branch {branch}")]
    InvalidBranch { organ: OrganId, branch: usize },
}
