//! This crate provides test-utilities for the staking indexer.
//!
//! These utilities are mostly used to generate arbitrary values for testing purposes, where
//! implementing `Arbitrary` is not feasible due to the orphan rule (without using newtypes for
//! everything).

pub mod bitcoin;
pub mod prelude;
pub mod staking;
