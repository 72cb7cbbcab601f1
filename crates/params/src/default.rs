//! Default values for the checkpoint parameters.

/// Default number of confirmations after which a Bitcoin transaction is considered final.
pub(crate) const BTC_CONFIRMATION_DEPTH: u64 = 10;

/// Default number of Bitcoin blocks after which a submitted checkpoint is considered finalized.
pub(crate) const CHECKPOINT_FINALIZATION_TIMEOUT: u64 = 300;
