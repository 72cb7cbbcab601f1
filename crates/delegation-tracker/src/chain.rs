//! Access to the Bitcoin chain.

use async_trait::async_trait;
use staking_primitives::types::BitcoinBlockHeight;

use crate::errors::ChainClientError;

/// Source of the current Bitcoin tip height.
#[async_trait]
pub trait ChainTipSource: Send + Sync {
    /// Returns the height of the current best block.
    async fn current_tip_height(&self) -> Result<BitcoinBlockHeight, ChainClientError>;
}
