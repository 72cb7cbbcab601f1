//! Aliases shared across the workspace.

/// A height on the Bitcoin chain.
pub type BitcoinBlockHeight = u64;

/// The version of the staking parameters that governs a delegation.
///
/// Parameter versions are immutable snapshots; a delegation is bound to the version that was in
/// effect when it was created.
pub type ParamsVersion = u32;

/// The number of blocks in a relative timelock (staking time, unbonding time).
pub type TimelockBlocks = u32;
