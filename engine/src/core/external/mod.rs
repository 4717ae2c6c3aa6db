//! Collaborators owned by the wider platform.
//!
//! The engine reads holdings and grove data through these traits and emits
//! transfer requests to a sink; it never custodies tokens or funds itself.

mod memory;

use async_trait::async_trait;
use grove_common::{
    error::EngineError,
    types::{AccountId, Grove, GroveId, HarvestId, HarvestRecord, TransferRequest, TransferTicket},
};

pub use memory::{MemoryGroveRegistry, MemoryHoldings, MemoryTransferSink};

#[async_trait]
pub trait HoldingSource: Send + Sync {
    /// Token balance of `holder` for `grove`, zero when unknown.
    async fn get_balance(&self, grove: &GroveId, holder: &AccountId) -> Result<u64, EngineError>;

    /// Every holder of `grove` with a non-zero balance, in a stable order.
    async fn get_all_holders_with_balance(
        &self,
        grove: &GroveId,
    ) -> Result<Vec<(AccountId, u64)>, EngineError>;

    async fn get_total_circulating_tokens(&self, grove: &GroveId) -> Result<u64, EngineError>;

    /// Payment asset balance, used to reject purchases the buyer cannot pay for.
    async fn get_payment_balance(
        &self,
        holder: &AccountId,
        asset: &str,
    ) -> Result<u64, EngineError>;
}

#[async_trait]
pub trait TransferSink: Send + Sync {
    /// Request a transfer. Must execute a given idempotency key at most once
    /// and return the original ticket on retries.
    async fn request_transfer(&self, request: &TransferRequest)
        -> Result<TransferTicket, EngineError>;
}

#[async_trait]
pub trait GroveRegistry: Send + Sync {
    async fn get_harvest(&self, harvest_id: &HarvestId)
        -> Result<Option<HarvestRecord>, EngineError>;

    async fn get_grove(&self, grove_id: &GroveId) -> Result<Option<Grove>, EngineError>;
}
