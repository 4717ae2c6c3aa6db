use serde::{Deserialize, Serialize};

use crate::time::TimestampSeconds;

use super::{AccountId, GroveId, Listing, ListingId, TradeId, TransferTicket};

/// A completed, possibly partial, fill of a listing. Append-only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: TradeId,
    pub listing_id: ListingId,
    pub grove_id: GroveId,
    pub seller: AccountId,
    pub buyer: AccountId,
    pub token_amount: u64,
    pub price_per_token: u64,
    pub total_price: u64,
    pub fee: u64,
    pub seller_proceeds: u64,
    pub created_at: TimestampSeconds,
}

impl Trade {
    pub fn involves(&self, account: &AccountId) -> bool {
        &self.seller == account || &self.buyer == account
    }
}

/// Outcome of a successful purchase.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResult {
    pub trade: Trade,
    /// Listing after the fill.
    pub listing: Listing,
    /// Settlement legs accepted by the transfer sink.
    pub tickets: Vec<TransferTicket>,
    /// Settlement legs that failed and wait for reconciliation.
    pub failed_legs: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceStats {
    pub active_listings: usize,
    pub total_tokens_available: u128,
    /// Σ remaining × price over open listings.
    pub total_market_value: u128,
    /// Market value divided by tokens available, rounded down.
    pub average_price: u64,
    pub total_trades: usize,
    pub total_volume: u128,
    pub total_fees: u128,
}
