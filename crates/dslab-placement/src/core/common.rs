use std::fmt::{Display, Formatter};

use serde::Serialize;

/// Value written to exported history instead of a host (VM) id when the entity was not placed (bound).
pub const UNPLACED: i64 = -1;

/// Converts an optional id into the exported form with [`UNPLACED`] sentinel.
pub fn id_or_sentinel(id: Option<u32>) -> i64 {
    id.map(|id| id as i64).unwrap_or(UNPLACED)
}

/// Outcome of an admission attempt. The resource variants name the first check that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AllocationVerdict {
    Success,
    NotEnoughStorage,
    NotEnoughRam,
    NotEnoughBw,
    NotEnoughMips,
}

impl AllocationVerdict {
    pub fn is_success(&self) -> bool {
        *self == AllocationVerdict::Success
    }
}

impl Display for AllocationVerdict {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            AllocationVerdict::Success => write!(f, "success"),
            AllocationVerdict::NotEnoughStorage => write!(f, "not enough storage"),
            AllocationVerdict::NotEnoughRam => write!(f, "not enough RAM"),
            AllocationVerdict::NotEnoughBw => write!(f, "not enough bandwidth"),
            AllocationVerdict::NotEnoughMips => write!(f, "not enough MIPS"),
        }
    }
}
