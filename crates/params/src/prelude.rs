//! Re-exports of the commonly used parameter types.

pub use crate::{
    checkpoint::CheckpointParams,
    errors::{ParamsError, TermsViolation},
    staking::StakingParams,
    versioned::{ParamsProvider, VersionedParams},
};
