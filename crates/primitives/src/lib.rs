//! This crate contains the types shared by every component that observes or mutates BTC staking
//! delegations: the delegation states and substates, the delegation record itself and the
//! timelock markers that schedule expiry work.
//!
//! It lies at the bottom of the crate-hierarchy in this workspace i.e., it does not depend on any
//! other crate in this workspace.

pub mod delegation;
pub mod state;
pub mod timelock;
pub mod types;
