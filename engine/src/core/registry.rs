use std::sync::Arc;

use log::{debug, info, warn};

use grove_common::{
    api::Page,
    config::MIN_LISTING_DURATION_DAYS,
    error::EngineError,
    time::{add_days, TimestampSeconds},
    types::{AccountId, GroveId, Listing, ListingId},
};

use super::{
    external::{GroveRegistry, HoldingSource},
    storage::{ListingUpdate, NewListing, Storage},
};
use crate::{clock::Clock, config::EngineConfig};

/// Marketplace listings and their lifecycle.
///
/// The registry never custodies tokens: a listing is an offer checked
/// against the seller's balance in the holding source. Expired listings are
/// reported as such by every read path whether or not they were swept.
pub struct ListingRegistry<S: Storage> {
    config: Arc<EngineConfig>,
    storage: Arc<S>,
    holdings: Arc<dyn HoldingSource>,
    registry: Arc<dyn GroveRegistry>,
    clock: Arc<dyn Clock>,
}

impl<S: Storage> ListingRegistry<S> {
    pub fn new(
        config: Arc<EngineConfig>,
        storage: Arc<S>,
        holdings: Arc<dyn HoldingSource>,
        registry: Arc<dyn GroveRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            storage,
            holdings,
            registry,
            clock,
        }
    }

    fn expiry(&self, now: TimestampSeconds, duration_days: u32) -> Result<TimestampSeconds, EngineError> {
        let max = self.config.max_listing_duration_days;
        if !(MIN_LISTING_DURATION_DAYS..=max).contains(&duration_days) {
            return Err(EngineError::invalid(format!(
                "duration must be between {} and {} days",
                MIN_LISTING_DURATION_DAYS, max
            )));
        }
        add_days(now, duration_days).ok_or(EngineError::Overflow)
    }

    pub async fn create(
        &self,
        seller: &AccountId,
        grove_id: &GroveId,
        amount: u64,
        price_per_token: u64,
        duration_days: u32,
    ) -> Result<Listing, EngineError> {
        if amount == 0 {
            return Err(EngineError::invalid("listing amount must be positive"));
        }
        if price_per_token == 0 {
            return Err(EngineError::invalid("price per token must be positive"));
        }
        let now = self.clock.now();
        let expires_at = self.expiry(now, duration_days)?;

        if self.registry.get_grove(grove_id).await?.is_none() {
            return Err(EngineError::GroveNotFound(grove_id.clone()));
        }
        let balance = self.holdings.get_balance(grove_id, seller).await?;

        let listing = self
            .storage
            .insert_listing(
                NewListing {
                    grove_id: grove_id.clone(),
                    seller: seller.clone(),
                    amount,
                    price_per_token,
                    created_at: now,
                    expires_at,
                },
                balance,
            )
            .await
            .inspect_err(|e| warn!("Listing by {} for grove {} rejected: {}", seller, grove_id, e))?;

        info!(
            "Listing {} created: {} tokens of grove {} at {} by {}, expires at {}",
            listing.id, amount, grove_id, price_per_token, seller, expires_at
        );
        Ok(listing)
    }

    pub async fn cancel(
        &self,
        listing_id: ListingId,
        requester: &AccountId,
    ) -> Result<Listing, EngineError> {
        let listing = self
            .storage
            .cancel_listing(listing_id, requester, self.clock.now())
            .await
            .inspect_err(|e| warn!("Cancel of listing {} rejected: {}", listing_id, e))?;
        info!(
            "Listing {} cancelled by {}, {} tokens released",
            listing_id, requester, listing.remaining_amount
        );
        Ok(listing)
    }

    /// Reprice and/or extend an open listing. A new duration counts from now.
    pub async fn update(
        &self,
        listing_id: ListingId,
        requester: &AccountId,
        new_price: Option<u64>,
        new_duration_days: Option<u32>,
    ) -> Result<Listing, EngineError> {
        if new_price.is_none() && new_duration_days.is_none() {
            return Err(EngineError::invalid("nothing to update"));
        }
        if new_price == Some(0) {
            return Err(EngineError::invalid("price per token must be positive"));
        }
        let now = self.clock.now();
        let new_expires_at = new_duration_days
            .map(|days| self.expiry(now, days))
            .transpose()?;

        let listing = self
            .storage
            .update_listing(ListingUpdate {
                listing_id,
                requester: requester.clone(),
                new_price,
                new_expires_at,
                now,
            })
            .await
            .inspect_err(|e| warn!("Update of listing {} rejected: {}", listing_id, e))?;
        info!(
            "Listing {} updated: price {}, expires at {}",
            listing_id, listing.price_per_token, listing.expires_at
        );
        Ok(listing)
    }

    pub async fn get_listing(&self, listing_id: ListingId) -> Result<Listing, EngineError> {
        let now = self.clock.now();
        self.storage
            .get_listing(listing_id)
            .await?
            .map(|listing| listing.with_effective_state(now))
            .ok_or(EngineError::ListingNotFound(listing_id))
    }

    /// Open listings in creation order.
    pub async fn get_active_listings(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Page<Listing>, EngineError> {
        let (items, total) = self
            .storage
            .list_open_listings(self.clock.now(), offset, limit)
            .await?;
        Ok(Page::new(items, total, offset, limit))
    }

    pub async fn get_listings_for_grove(&self, grove_id: &GroveId) -> Result<Vec<Listing>, EngineError> {
        let now = self.clock.now();
        Ok(self
            .storage
            .list_listings_by_grove(grove_id)
            .await?
            .into_iter()
            .map(|listing| listing.with_effective_state(now))
            .collect())
    }

    pub async fn get_user_listings(&self, seller: &AccountId) -> Result<Vec<Listing>, EngineError> {
        let now = self.clock.now();
        Ok(self
            .storage
            .list_listings_by_seller(seller)
            .await?
            .into_iter()
            .map(|listing| listing.with_effective_state(now))
            .collect())
    }

    /// Flip listings past their expiry to `Expired`.
    pub async fn sweep_expired(&self) -> Result<Vec<ListingId>, EngineError> {
        let expired = self.storage.expire_listings(self.clock.now()).await?;
        if !expired.is_empty() {
            debug!("Expired {} listings: {:?}", expired.len(), expired);
        }
        Ok(expired)
    }
}
