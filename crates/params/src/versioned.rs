//! A registry of immutable, versioned parameter snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use staking_primitives::types::ParamsVersion;

use crate::{checkpoint::CheckpointParams, errors::ParamsError, staking::StakingParams};

/// Source of the parameters that were in effect for a given version.
pub trait ParamsProvider: Send + Sync {
    /// Returns the staking parameters registered under `version`, if any.
    fn staking_params(&self, version: ParamsVersion) -> Option<&StakingParams>;

    /// Returns the checkpoint parameters.
    fn checkpoint_params(&self) -> &CheckpointParams;
}

/// All known versions of the staking parameters along with the checkpoint parameters.
///
/// Registered versions can never be altered. Registering a version again is only accepted if the
/// contents are identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawVersionedParams", into = "RawVersionedParams")]
pub struct VersionedParams {
    checkpoint: CheckpointParams,
    staking: BTreeMap<ParamsVersion, StakingParams>,
}

impl VersionedParams {
    /// Creates a registry with no staking parameters.
    pub const fn new(checkpoint: CheckpointParams) -> Self {
        Self {
            checkpoint,
            staking: BTreeMap::new(),
        }
    }

    /// Registers a new version of the staking parameters.
    pub fn register(&mut self, params: StakingParams) -> Result<(), ParamsError> {
        params.validate()?;

        match self.staking.get(&params.version) {
            Some(existing) if *existing == params => Ok(()),
            Some(_) => Err(ParamsError::VersionConflict(params.version)),
            None => {
                self.staking.insert(params.version, params);
                Ok(())
            }
        }
    }

    /// Builder-style variant of [`Self::register`].
    pub fn with_staking_params(mut self, params: StakingParams) -> Result<Self, ParamsError> {
        self.register(params)?;
        Ok(self)
    }

    /// The most recent version that has been registered.
    pub fn latest_version(&self) -> Option<ParamsVersion> {
        self.staking.keys().next_back().copied()
    }

    /// Iterates over all registered staking parameters in version order.
    pub fn versions(&self) -> impl Iterator<Item = &StakingParams> {
        self.staking.values()
    }
}

impl ParamsProvider for VersionedParams {
    fn staking_params(&self, version: ParamsVersion) -> Option<&StakingParams> {
        self.staking.get(&version)
    }

    fn checkpoint_params(&self) -> &CheckpointParams {
        &self.checkpoint
    }
}

/// The on-disk representation of [`VersionedParams`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawVersionedParams {
    checkpoint: CheckpointParams,

    #[serde(default)]
    staking: Vec<StakingParams>,
}

impl TryFrom<RawVersionedParams> for VersionedParams {
    type Error = ParamsError;

    fn try_from(raw: RawVersionedParams) -> Result<Self, Self::Error> {
        raw.staking
            .into_iter()
            .try_fold(VersionedParams::new(raw.checkpoint), |acc, params| {
                acc.with_staking_params(params)
            })
    }
}

impl From<VersionedParams> for RawVersionedParams {
    fn from(params: VersionedParams) -> Self {
        Self {
            checkpoint: params.checkpoint,
            staking: params.staking.into_values().collect(),
        }
    }
}
