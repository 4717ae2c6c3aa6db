use async_trait::async_trait;

use grove_common::{
    error::EngineError,
    time::TimestampSeconds,
    types::{AccountId, GroveId, Listing, ListingId, ListingState, Trade, TradeId},
};

use super::{next_id, MarketTables, MemoryStorage};
use crate::core::storage::{
    FillOrder, ListingProvider, ListingUpdate, NewListing, TradeProvider, TradeTotals,
};

impl MarketTables {
    // Tokens of `seller` still offered in open listings of `grove_id`
    fn committed_amount(
        &self,
        grove_id: &GroveId,
        seller: &AccountId,
        now: TimestampSeconds,
    ) -> Result<u64, EngineError> {
        self.listings
            .values()
            .filter(|listing| {
                &listing.grove_id == grove_id && &listing.seller == seller && listing.is_open(now)
            })
            .try_fold(0u64, |total, listing| {
                total
                    .checked_add(listing.remaining_amount)
                    .ok_or(EngineError::Overflow)
            })
    }

    // Open listing for a mutation by its seller, flipping a lazily expired
    // listing to `Expired` on the way
    fn open_listing_mut(
        &mut self,
        id: ListingId,
        requester: &AccountId,
        action: &'static str,
        now: TimestampSeconds,
    ) -> Result<&mut Listing, EngineError> {
        let listing = self
            .listings
            .get_mut(&id)
            .ok_or(EngineError::ListingNotFound(id))?;
        if &listing.seller != requester {
            return Err(EngineError::unauthorized(requester, action));
        }
        if !listing.is_open(now) {
            if listing.state == ListingState::Active {
                listing.state = ListingState::Expired;
                listing.closed_at = Some(listing.expires_at);
            }
            return Err(EngineError::AlreadyClosed(id));
        }
        Ok(listing)
    }
}

#[async_trait]
impl ListingProvider for MemoryStorage {
    async fn insert_listing(
        &self,
        listing: NewListing,
        balance: u64,
    ) -> Result<Listing, EngineError> {
        if listing.amount == 0 {
            return Err(EngineError::invalid("listing amount must be positive"));
        }

        let mut market = self.market.write().await;
        let required = market
            .committed_amount(&listing.grove_id, &listing.seller, listing.created_at)?
            .checked_add(listing.amount)
            .ok_or(EngineError::Overflow)?;
        if required > balance {
            return Err(EngineError::InsufficientTokens {
                required,
                available: balance,
            });
        }

        let id = next_id(&mut market.last_listing_id);
        let listing = Listing {
            id,
            grove_id: listing.grove_id,
            seller: listing.seller,
            original_amount: listing.amount,
            remaining_amount: listing.amount,
            price_per_token: listing.price_per_token,
            created_at: listing.created_at,
            expires_at: listing.expires_at,
            state: ListingState::Active,
            closed_at: None,
        };
        market.listings.insert(id, listing.clone());
        Ok(listing)
    }

    async fn get_listing(&self, id: ListingId) -> Result<Option<Listing>, EngineError> {
        let market = self.market.read().await;
        Ok(market.listings.get(&id).cloned())
    }

    async fn fill_listing(&self, order: FillOrder) -> Result<(Listing, Trade), EngineError> {
        if order.amount == 0 {
            return Err(EngineError::invalid("purchase amount must be positive"));
        }
        let seller_proceeds = order
            .total_price
            .checked_sub(order.fee)
            .ok_or(EngineError::Overflow)?;

        let mut market = self.market.write().await;
        let listing = market
            .listings
            .get_mut(&order.listing_id)
            .ok_or(EngineError::ListingNotFound(order.listing_id))?;
        if !listing.is_open(order.now) {
            return Err(EngineError::ListingNotFound(order.listing_id));
        }
        if listing.seller == order.buyer {
            return Err(EngineError::SelfTrade);
        }
        if listing.price_per_token != order.price_per_token {
            return Err(EngineError::StaleListing(order.listing_id));
        }

        // Decrement-if-sufficient
        listing.remaining_amount = listing.remaining_amount.checked_sub(order.amount).ok_or(
            EngineError::InsufficientTokens {
                required: order.amount,
                available: listing.remaining_amount,
            },
        )?;
        if listing.remaining_amount == 0 {
            listing.state = ListingState::Filled;
            listing.closed_at = Some(order.now);
        }
        let listing = listing.clone();

        let id: TradeId = next_id(&mut market.last_trade_id);
        let trade = Trade {
            id,
            listing_id: listing.id,
            grove_id: listing.grove_id.clone(),
            seller: listing.seller.clone(),
            buyer: order.buyer,
            token_amount: order.amount,
            price_per_token: order.price_per_token,
            total_price: order.total_price,
            fee: order.fee,
            seller_proceeds,
            created_at: order.now,
        };
        market.trades.push(trade.clone());
        Ok((listing, trade))
    }

    async fn cancel_listing(
        &self,
        id: ListingId,
        requester: &AccountId,
        now: TimestampSeconds,
    ) -> Result<Listing, EngineError> {
        let mut market = self.market.write().await;
        let listing = market.open_listing_mut(id, requester, "cancel this listing", now)?;
        listing.state = ListingState::Cancelled;
        listing.closed_at = Some(now);
        Ok(listing.clone())
    }

    async fn update_listing(&self, update: ListingUpdate) -> Result<Listing, EngineError> {
        let mut market = self.market.write().await;
        let listing = market.open_listing_mut(
            update.listing_id,
            &update.requester,
            "update this listing",
            update.now,
        )?;
        if let Some(price) = update.new_price {
            listing.price_per_token = price;
        }
        if let Some(expires_at) = update.new_expires_at {
            listing.expires_at = expires_at;
        }
        Ok(listing.clone())
    }

    async fn list_open_listings(
        &self,
        now: TimestampSeconds,
        skip: usize,
        limit: usize,
    ) -> Result<(Vec<Listing>, usize), EngineError> {
        let market = self.market.read().await;
        let open: Vec<&Listing> = market
            .listings
            .values()
            .filter(|listing| listing.is_open(now))
            .collect();
        let total = open.len();
        let page = open
            .into_iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn list_listings_by_grove(
        &self,
        grove_id: &GroveId,
    ) -> Result<Vec<Listing>, EngineError> {
        let market = self.market.read().await;
        Ok(market
            .listings
            .values()
            .filter(|listing| &listing.grove_id == grove_id)
            .cloned()
            .collect())
    }

    async fn list_listings_by_seller(
        &self,
        seller: &AccountId,
    ) -> Result<Vec<Listing>, EngineError> {
        let market = self.market.read().await;
        Ok(market
            .listings
            .values()
            .filter(|listing| &listing.seller == seller)
            .cloned()
            .collect())
    }

    async fn expire_listings(&self, now: TimestampSeconds) -> Result<Vec<ListingId>, EngineError> {
        let mut market = self.market.write().await;
        let mut expired = Vec::new();
        for listing in market.listings.values_mut() {
            if listing.state == ListingState::Active && listing.is_expired(now) {
                listing.state = ListingState::Expired;
                listing.closed_at = Some(listing.expires_at);
                expired.push(listing.id);
            }
        }
        Ok(expired)
    }
}

#[async_trait]
impl TradeProvider for MemoryStorage {
    async fn get_trade(&self, id: TradeId) -> Result<Option<Trade>, EngineError> {
        let market = self.market.read().await;
        Ok(market.trades.iter().find(|trade| trade.id == id).cloned())
    }

    async fn list_trades(
        &self,
        user: Option<&AccountId>,
        skip: usize,
        limit: usize,
    ) -> Result<(Vec<Trade>, usize), EngineError> {
        let market = self.market.read().await;
        let matching: Vec<&Trade> = market
            .trades
            .iter()
            .rev()
            .filter(|trade| user.map_or(true, |user| trade.involves(user)))
            .collect();
        let total = matching.len();
        let page = matching
            .into_iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn list_trades_by_listing(
        &self,
        listing_id: ListingId,
    ) -> Result<Vec<Trade>, EngineError> {
        let market = self.market.read().await;
        Ok(market
            .trades
            .iter()
            .filter(|trade| trade.listing_id == listing_id)
            .cloned()
            .collect())
    }

    async fn get_trade_totals(&self) -> Result<TradeTotals, EngineError> {
        let market = self.market.read().await;
        Ok(market
            .trades
            .iter()
            .fold(TradeTotals::default(), |mut totals, trade| {
                totals.count += 1;
                totals.volume += trade.total_price as u128;
                totals.fees += trade.fee as u128;
                totals
            }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn new_listing(seller: &str, amount: u64) -> NewListing {
        NewListing {
            grove_id: "G1".into(),
            seller: seller.into(),
            amount,
            price_per_token: 100,
            created_at: 1_000,
            expires_at: 2_000,
        }
    }

    fn order(listing_id: ListingId, buyer: &str, amount: u64, now: TimestampSeconds) -> FillOrder {
        FillOrder {
            listing_id,
            buyer: buyer.into(),
            amount,
            price_per_token: 100,
            total_price: amount * 100,
            fee: amount * 100 * 250 / 10_000,
            now,
        }
    }

    #[tokio::test]
    async fn test_committed_tokens_count_against_balance() -> Result<(), EngineError> {
        let storage = MemoryStorage::new();
        storage.insert_listing(new_listing("s", 60), 100).await?;
        let err = storage
            .insert_listing(new_listing("s", 50), 100)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientTokens {
                required: 110,
                available: 100
            }
        );
        storage.insert_listing(new_listing("s", 40), 100).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_fill_partial_then_full() -> Result<(), EngineError> {
        let storage = MemoryStorage::new();
        let listing = storage.insert_listing(new_listing("s", 50), 50).await?;

        let (after, trade) = storage.fill_listing(order(listing.id, "b", 20, 1_100)).await?;
        assert_eq!(after.remaining_amount, 30);
        assert_eq!(after.state, ListingState::Active);
        assert_eq!(trade.total_price, 2_000);
        assert_eq!(trade.fee, 50);
        assert_eq!(trade.seller_proceeds, 1_950);

        let (after, _) = storage.fill_listing(order(listing.id, "b", 30, 1_200)).await?;
        assert_eq!(after.remaining_amount, 0);
        assert_eq!(after.state, ListingState::Filled);
        assert_eq!(after.closed_at, Some(1_200));

        let err = storage
            .fill_listing(order(listing.id, "b", 1, 1_300))
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::ListingNotFound(listing.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_fill_rejections_leave_listing_unchanged() -> Result<(), EngineError> {
        let storage = MemoryStorage::new();
        let listing = storage.insert_listing(new_listing("s", 50), 50).await?;

        let err = storage
            .fill_listing(order(listing.id, "s", 10, 1_100))
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::SelfTrade);

        let err = storage
            .fill_listing(order(listing.id, "b", 51, 1_100))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientTokens {
                required: 51,
                available: 50
            }
        );

        let mut stale = order(listing.id, "b", 10, 1_100);
        stale.price_per_token = 90;
        let err = storage.fill_listing(stale).await.unwrap_err();
        assert_eq!(err, EngineError::StaleListing(listing.id));

        let err = storage
            .fill_listing(order(listing.id, "b", 10, 2_000))
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::ListingNotFound(listing.id));

        let stored = storage.get_listing(listing.id).await?;
        assert_eq!(stored.map(|l| l.remaining_amount), Some(50));
        assert_eq!(storage.get_trade_totals().await?.count, 0);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_fills_never_oversell() -> Result<(), EngineError> {
        let storage = Arc::new(MemoryStorage::new());
        let listing_id = storage.insert_listing(new_listing("s", 50), 50).await?.id;

        let mut handles = Vec::new();
        for i in 0..10 {
            let storage = storage.clone();
            let buyer = format!("buyer-{i}");
            handles.push(tokio::spawn(async move {
                storage.fill_listing(order(listing_id, &buyer, 7, 1_100)).await
            }));
        }

        let mut filled = 0;
        for handle in handles {
            if let Ok((_, trade)) = handle.await.map_err(|e| EngineError::Storage(e.to_string()))? {
                filled += trade.token_amount;
            }
        }
        assert_eq!(filled, 49);
        let stored = storage.get_listing(listing_id).await?;
        assert_eq!(stored.map(|l| l.remaining_amount), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_and_update_rules() -> Result<(), EngineError> {
        let storage = MemoryStorage::new();
        let listing = storage.insert_listing(new_listing("s", 50), 50).await?;

        let err = storage
            .cancel_listing(listing.id, &"other".into(), 1_100)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Unauthorized { .. }));

        let updated = storage
            .update_listing(ListingUpdate {
                listing_id: listing.id,
                requester: "s".into(),
                new_price: Some(120),
                new_expires_at: None,
                now: 1_100,
            })
            .await?;
        assert_eq!(updated.price_per_token, 120);
        assert_eq!(updated.expires_at, 2_000);

        let cancelled = storage
            .cancel_listing(listing.id, &"s".into(), 1_200)
            .await?;
        assert_eq!(cancelled.state, ListingState::Cancelled);

        let err = storage
            .cancel_listing(listing.id, &"s".into(), 1_300)
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::AlreadyClosed(listing.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_expiry_sweep_and_pagination() -> Result<(), EngineError> {
        let storage = MemoryStorage::new();
        let first = storage.insert_listing(new_listing("a", 5), 5).await?;
        let mut late = new_listing("b", 5);
        late.expires_at = 5_000;
        storage.insert_listing(late, 5).await?;

        let (page, total) = storage.list_open_listings(1_500, 0, 10).await?;
        assert_eq!((page.len(), total), (2, 2));

        let (page, total) = storage.list_open_listings(2_500, 0, 10).await?;
        assert_eq!((page.len(), total), (1, 1));

        assert_eq!(storage.expire_listings(2_500).await?, vec![first.id]);
        assert!(storage.expire_listings(2_500).await?.is_empty());
        let stored = storage.get_listing(first.id).await?;
        assert_eq!(stored.map(|l| l.state), Some(ListingState::Expired));
        Ok(())
    }
}
