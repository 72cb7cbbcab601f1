//! This crate contains the versioned parameters, set by the consensus chain, that govern how BTC
//! delegations are validated: the covenant committee and its quorum, the accepted staking
//! amounts and the timelock bounds.
//!
//! Parameters are immutable snapshots indexed by version. A delegation is bound to the version in
//! effect when it was created so that a later parameter change never alters decisions already
//! taken for it.

mod default;
pub mod checkpoint;
pub mod errors;
pub mod prelude;
pub mod staking;
pub mod versioned;
