//! In-memory repositories.
//!
//! Each table group sits behind one `tokio::sync::RwLock`; every provider
//! method that enforces an invariant does its check and its write under a
//! single write guard, which makes it atomic with respect to concurrent
//! callers.

mod distribution;
mod market;
mod outbox;

use std::collections::HashMap;

use indexmap::IndexMap;
use tokio::sync::RwLock;

use grove_common::types::{
    AccountId, Distribution, DistributionId, DistributionShare, FarmerBalance, GroveId,
    HarvestId, IdempotencyKey, Listing, ListingId, OutboxEntry, Trade, Withdrawal, WithdrawalId,
};

#[derive(Default)]
struct DistributionTables {
    last_distribution_id: DistributionId,
    distributions: IndexMap<DistributionId, Distribution>,
    by_harvest: HashMap<HarvestId, DistributionId>,
    shares: IndexMap<(DistributionId, AccountId), DistributionShare>,
    farmer_balances: HashMap<GroveId, FarmerBalance>,
    retained_dust: HashMap<GroveId, u64>,
    last_withdrawal_id: WithdrawalId,
    withdrawals: IndexMap<WithdrawalId, Withdrawal>,
}

#[derive(Default)]
struct MarketTables {
    last_listing_id: ListingId,
    listings: IndexMap<ListingId, Listing>,
    last_trade_id: u64,
    trades: Vec<Trade>,
}

#[derive(Default)]
pub struct MemoryStorage {
    distributions: RwLock<DistributionTables>,
    market: RwLock<MarketTables>,
    outbox: RwLock<IndexMap<IdempotencyKey, OutboxEntry>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn next_id(last: &mut u64) -> u64 {
    *last += 1;
    *last
}
