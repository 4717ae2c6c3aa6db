use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::{info, warn};

use grove_common::{
    api::{Page, ReconcileReport},
    error::EngineError,
    types::{
        AccountId, Distribution, DistributionId, DistributionResult, DistributionShare,
        DistributionSummary, FarmerBalance, GroveId, HarvestId, HolderEarnings, IdempotencyKey,
        Listing, ListingId, MarketplaceStats, OutboxEntry, PurchaseResult, Trade, TransferStatus,
        Withdrawal,
    },
};

use super::{
    distribution::RevenueDistributionEngine,
    external::{GroveRegistry, HoldingSource, TransferSink},
    matcher::TradeMatcher,
    registry::ListingRegistry,
    storage::Storage,
    transfers::TransferDispatcher,
};
use crate::{clock::Clock, config::EngineConfig};

/// Distribution and marketplace components behind one pause switch.
///
/// Every mutating operation fails with `Paused` while the engine is paused;
/// reads keep working.
pub struct GroveEngine<S: Storage> {
    config: Arc<EngineConfig>,
    paused: AtomicBool,
    transfers: Arc<TransferDispatcher<S>>,
    distributions: RevenueDistributionEngine<S>,
    listings: ListingRegistry<S>,
    matcher: TradeMatcher<S>,
}

impl<S: Storage> GroveEngine<S> {
    pub fn new(
        config: EngineConfig,
        storage: Arc<S>,
        holdings: Arc<dyn HoldingSource>,
        registry: Arc<dyn GroveRegistry>,
        sink: Arc<dyn TransferSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EngineError> {
        config
            .validate()
            .map_err(|e| EngineError::invalid(e.to_string()))?;
        let config = Arc::new(config);

        let transfers = Arc::new(TransferDispatcher::new(
            storage.clone(),
            sink,
            clock.clone(),
            config.reserve_account.clone(),
            config.payment_asset.clone(),
            config.payout_batch_size,
        ));
        let distributions = RevenueDistributionEngine::new(
            config.clone(),
            storage.clone(),
            holdings.clone(),
            registry.clone(),
            transfers.clone(),
            clock.clone(),
        );
        let listings = ListingRegistry::new(
            config.clone(),
            storage.clone(),
            holdings.clone(),
            registry,
            clock.clone(),
        );
        let matcher = TradeMatcher::new(config.clone(), storage, holdings, transfers.clone(), clock);

        info!(
            "Engine ready: farmer share {}%, marketplace fee {} bps, dust policy {}",
            config.farmer_share_percent, config.marketplace_fee_bps, config.dust_policy
        );
        Ok(Self {
            config,
            paused: AtomicBool::new(false),
            transfers,
            distributions,
            listings,
            matcher,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn ensure_running(&self) -> Result<(), EngineError> {
        if self.is_paused() {
            return Err(EngineError::Paused);
        }
        Ok(())
    }

    fn set_paused(&self, caller: &AccountId, paused: bool) -> Result<bool, EngineError> {
        let action = if paused { "pause the engine" } else { "unpause the engine" };
        if !self.config.is_admin(caller) {
            warn!("{} is not allowed to {}", caller, action);
            return Err(EngineError::unauthorized(caller, action));
        }
        let previous = self.paused.swap(paused, Ordering::SeqCst);
        if previous != paused {
            info!("Engine {} by {}", if paused { "paused" } else { "unpaused" }, caller);
        }
        Ok(paused)
    }

    pub fn pause(&self, caller: &AccountId) -> Result<bool, EngineError> {
        self.set_paused(caller, true)
    }

    pub fn unpause(&self, caller: &AccountId) -> Result<bool, EngineError> {
        self.set_paused(caller, false)
    }

    // ===== Distribution =====

    pub async fn deposit_harvest_revenue(
        &self,
        caller: &AccountId,
        grove_id: &GroveId,
        harvest_id: &HarvestId,
        amount: u64,
    ) -> Result<Distribution, EngineError> {
        self.ensure_running()?;
        self.distributions
            .deposit(caller, grove_id, harvest_id, amount)
            .await
    }

    pub async fn distribute_revenue(
        &self,
        caller: &AccountId,
        grove_id: &GroveId,
        harvest_id: &HarvestId,
    ) -> Result<DistributionResult, EngineError> {
        self.ensure_running()?;
        self.distributions
            .distribute(caller, grove_id, harvest_id)
            .await
    }

    pub async fn withdraw_farmer_share(
        &self,
        caller: &AccountId,
        grove_id: &GroveId,
        amount: u64,
    ) -> Result<Withdrawal, EngineError> {
        self.ensure_running()?;
        self.distributions
            .withdraw_farmer_share(caller, grove_id, amount)
            .await
    }

    pub async fn get_distribution(&self, harvest_id: &HarvestId) -> Result<Distribution, EngineError> {
        self.distributions.get_distribution(harvest_id).await
    }

    pub async fn get_distribution_summary(
        &self,
        harvest_id: &HarvestId,
    ) -> Result<DistributionSummary, EngineError> {
        self.distributions.get_distribution_summary(harvest_id).await
    }

    pub async fn get_pending_distributions(&self) -> Result<Vec<Distribution>, EngineError> {
        self.distributions.get_pending_distributions().await
    }

    pub async fn get_holder_distribution_history(
        &self,
        holder: &AccountId,
    ) -> Result<Vec<DistributionShare>, EngineError> {
        self.distributions.get_holder_distribution_history(holder).await
    }

    pub async fn get_holder_earnings(&self, holder: &AccountId) -> Result<HolderEarnings, EngineError> {
        self.distributions.get_holder_earnings(holder).await
    }

    pub async fn has_claimed(
        &self,
        distribution_id: DistributionId,
        holder: &AccountId,
    ) -> Result<bool, EngineError> {
        self.distributions.has_claimed(distribution_id, holder).await
    }

    pub async fn get_farmer_balance(&self, grove_id: &GroveId) -> Result<FarmerBalance, EngineError> {
        self.distributions.get_farmer_balance(grove_id).await
    }

    pub async fn get_withdrawal_history(
        &self,
        farmer: &AccountId,
    ) -> Result<Vec<Withdrawal>, EngineError> {
        self.distributions.get_withdrawal_history(farmer).await
    }

    pub async fn get_retained_dust(&self, grove_id: &GroveId) -> Result<u64, EngineError> {
        self.distributions.get_retained_dust(grove_id).await
    }

    // ===== Marketplace =====

    pub async fn list_tokens_for_sale(
        &self,
        caller: &AccountId,
        grove_id: &GroveId,
        amount: u64,
        price_per_token: u64,
        duration_days: u32,
    ) -> Result<Listing, EngineError> {
        self.ensure_running()?;
        self.listings
            .create(caller, grove_id, amount, price_per_token, duration_days)
            .await
    }

    pub async fn cancel_listing(
        &self,
        caller: &AccountId,
        listing_id: ListingId,
    ) -> Result<Listing, EngineError> {
        self.ensure_running()?;
        self.listings.cancel(listing_id, caller).await
    }

    pub async fn update_listing(
        &self,
        caller: &AccountId,
        listing_id: ListingId,
        new_price: Option<u64>,
        new_duration_days: Option<u32>,
    ) -> Result<Listing, EngineError> {
        self.ensure_running()?;
        self.listings
            .update(listing_id, caller, new_price, new_duration_days)
            .await
    }

    pub async fn purchase_from_marketplace(
        &self,
        caller: &AccountId,
        listing_id: ListingId,
        amount: u64,
    ) -> Result<PurchaseResult, EngineError> {
        self.ensure_running()?;
        self.matcher.purchase(caller, listing_id, amount).await
    }

    pub async fn get_listing(&self, listing_id: ListingId) -> Result<Listing, EngineError> {
        self.listings.get_listing(listing_id).await
    }

    pub async fn get_active_listings(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Page<Listing>, EngineError> {
        self.listings.get_active_listings(offset, limit).await
    }

    pub async fn get_listings_for_grove(&self, grove_id: &GroveId) -> Result<Vec<Listing>, EngineError> {
        self.listings.get_listings_for_grove(grove_id).await
    }

    pub async fn get_user_listings(&self, seller: &AccountId) -> Result<Vec<Listing>, EngineError> {
        self.listings.get_user_listings(seller).await
    }

    pub async fn get_trade_history(
        &self,
        user: Option<&AccountId>,
        offset: usize,
        limit: usize,
    ) -> Result<Page<Trade>, EngineError> {
        self.matcher.get_trade_history(user, offset, limit).await
    }

    pub async fn get_trades_for_listing(&self, listing_id: ListingId) -> Result<Vec<Trade>, EngineError> {
        self.matcher.get_trades_for_listing(listing_id).await
    }

    pub async fn get_marketplace_stats(&self) -> Result<MarketplaceStats, EngineError> {
        self.matcher.get_marketplace_stats().await
    }

    pub async fn sweep_expired(&self) -> Result<Vec<ListingId>, EngineError> {
        self.listings.sweep_expired().await
    }

    // ===== Settlement =====

    /// Callback of the transfer layer for a request it answered `Pending`.
    pub async fn handle_transfer_outcome(
        &self,
        key: &IdempotencyKey,
        success: bool,
        reason: Option<String>,
    ) -> Result<OutboxEntry, EngineError> {
        self.transfers.handle_outcome(key, success, reason).await
    }

    pub async fn reconcile(&self) -> Result<ReconcileReport, EngineError> {
        self.transfers.reconcile().await
    }

    pub async fn get_transfer(&self, key: &IdempotencyKey) -> Result<OutboxEntry, EngineError> {
        self.transfers.get_transfer(key).await
    }

    pub async fn list_transfers(
        &self,
        status: Option<TransferStatus>,
    ) -> Result<Vec<OutboxEntry>, EngineError> {
        self.transfers.list_transfers(status).await
    }
}
