use async_trait::async_trait;
use grove_common::{
    error::EngineError,
    types::{AccountId, ListingId, Trade, TradeId},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TradeTotals {
    pub count: usize,
    pub volume: u128,
    pub fees: u128,
}

#[async_trait]
pub trait TradeProvider: Send + Sync {
    async fn get_trade(&self, id: TradeId) -> Result<Option<Trade>, EngineError>;

    /// Trades newest first, optionally only those involving `user`, and the
    /// number of matching trades overall.
    async fn list_trades(
        &self,
        user: Option<&AccountId>,
        skip: usize,
        limit: usize,
    ) -> Result<(Vec<Trade>, usize), EngineError>;

    async fn list_trades_by_listing(
        &self,
        listing_id: ListingId,
    ) -> Result<Vec<Trade>, EngineError>;

    async fn get_trade_totals(&self) -> Result<TradeTotals, EngineError>;
}
