//! This crate implements the lifecycle of BTC staking delegations.
//!
//! Chain pollers hand [`event::DelegationEvent`]s to the [`engine::DelegationEngine`], which checks
//! them against the transition table in [`transition`] and writes the result to the store with a
//! conditional update. Covenant signatures are collected by the [`quorum::CovenantQuorumTracker`]
//! and expired timelocks are swept by the [`expiry::ExpiryScanner`], both of which feed back into
//! the engine.

pub mod chain;
pub mod config;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod expiry;
pub mod poller;
pub mod quorum;
pub mod transition;
