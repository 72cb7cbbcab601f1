//! Parameters of the checkpointing module of the consensus chain.

use serde::{Deserialize, Serialize};

use crate::default::{BTC_CONFIRMATION_DEPTH, CHECKPOINT_FINALIZATION_TIMEOUT};

/// The checkpointing parameters that dictate when a Bitcoin transaction is considered final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointParams {
    /// The number of confirmations a Bitcoin transaction needs before it is considered final.
    pub btc_confirmation_depth: u64,

    /// The number of Bitcoin blocks after which a checkpoint is considered finalized.
    pub checkpoint_finalization_timeout: u64,
}

impl Default for CheckpointParams {
    fn default() -> Self {
        Self {
            btc_confirmation_depth: BTC_CONFIRMATION_DEPTH,
            checkpoint_finalization_timeout: CHECKPOINT_FINALIZATION_TIMEOUT,
        }
    }
}

impl CheckpointParams {
    /// Whether a transaction included at `inclusion_height` is deep enough at `tip_height`.
    ///
    /// A transaction included in the tip block has one confirmation.
    pub const fn is_confirmed(&self, inclusion_height: u64, tip_height: u64) -> bool {
        tip_height >= inclusion_height
            && tip_height - inclusion_height + 1 >= self.btc_confirmation_depth
    }
}
