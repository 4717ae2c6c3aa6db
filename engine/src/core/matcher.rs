use std::sync::Arc;

use log::{debug, info, warn};

use grove_common::{
    api::Page,
    error::EngineError,
    share::compute_fee,
    types::{
        AccountId, Asset, IdempotencyKey, ListingId, MarketplaceStats, PurchaseResult, Trade,
        TransferPurpose, TransferRequest,
    },
};

use super::{
    external::HoldingSource,
    storage::{FillOrder, Storage},
    transfers::TransferDispatcher,
};
use crate::{clock::Clock, config::EngineConfig};

/// Validates and settles purchases against listings.
pub struct TradeMatcher<S: Storage> {
    config: Arc<EngineConfig>,
    storage: Arc<S>,
    holdings: Arc<dyn HoldingSource>,
    transfers: Arc<TransferDispatcher<S>>,
    clock: Arc<dyn Clock>,
}

impl<S: Storage> TradeMatcher<S> {
    pub fn new(
        config: Arc<EngineConfig>,
        storage: Arc<S>,
        holdings: Arc<dyn HoldingSource>,
        transfers: Arc<TransferDispatcher<S>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            storage,
            holdings,
            transfers,
            clock,
        }
    }

    /// Buy `amount` tokens from a listing.
    ///
    /// Checks run on a read of the listing; the fill itself is one
    /// decrement-if-sufficient in storage, so concurrent purchases can never
    /// take more than the listing has left. A purchase asking for more than
    /// what remains fails instead of being cut down.
    pub async fn purchase(
        &self,
        buyer: &AccountId,
        listing_id: ListingId,
        amount: u64,
    ) -> Result<PurchaseResult, EngineError> {
        if amount == 0 {
            return Err(EngineError::invalid("purchase amount must be positive"));
        }
        let now = self.clock.now();

        let listing = self
            .storage
            .get_listing(listing_id)
            .await?
            .filter(|listing| listing.is_open(now))
            .ok_or(EngineError::ListingNotFound(listing_id))?;
        if &listing.seller == buyer {
            warn!("{} tried to buy from their own listing {}", buyer, listing_id);
            return Err(EngineError::SelfTrade);
        }
        if amount > listing.remaining_amount {
            return Err(EngineError::InsufficientTokens {
                required: amount,
                available: listing.remaining_amount,
            });
        }

        let total_price = amount
            .checked_mul(listing.price_per_token)
            .ok_or(EngineError::Overflow)?;
        let fee = compute_fee(total_price, self.config.marketplace_fee_bps)?;

        let payment_balance = self
            .holdings
            .get_payment_balance(buyer, self.transfers.payment_asset())
            .await?;
        if payment_balance < total_price {
            return Err(EngineError::InsufficientPayment {
                required: total_price,
                available: payment_balance,
            });
        }
        let seller_balance = self
            .holdings
            .get_balance(&listing.grove_id, &listing.seller)
            .await?;
        if seller_balance < amount {
            return Err(EngineError::InsufficientTokens {
                required: amount,
                available: seller_balance,
            });
        }

        let (listing, trade) = self
            .storage
            .fill_listing(FillOrder {
                listing_id,
                buyer: buyer.clone(),
                amount,
                price_per_token: listing.price_per_token,
                total_price,
                fee,
                now,
            })
            .await
            .inspect_err(|e| warn!("Purchase from listing {} by {} rejected: {}", listing_id, buyer, e))?;

        info!(
            "Trade {}: {} bought {} tokens of grove {} from {} for {} (fee {}), {} left on listing {}",
            trade.id,
            buyer,
            amount,
            trade.grove_id,
            trade.seller,
            total_price,
            fee,
            listing.remaining_amount,
            listing_id
        );

        let report = self.transfers.dispatch(self.settlement_legs(&trade)).await?;
        Ok(PurchaseResult {
            trade,
            listing,
            tickets: report.tickets,
            failed_legs: report.failed.len(),
        })
    }

    // Token leg, proceeds leg and, when charged, the fee leg
    fn settlement_legs(&self, trade: &Trade) -> Vec<TransferRequest> {
        let payment = Asset::Payment(self.transfers.payment_asset().to_string());
        let mut legs = vec![
            TransferRequest {
                key: IdempotencyKey::trade_tokens(trade.id),
                from: trade.seller.clone(),
                to: trade.buyer.clone(),
                asset: Asset::GroveToken(trade.grove_id.clone()),
                amount: trade.token_amount,
                purpose: TransferPurpose::TradeTokens { trade_id: trade.id },
            },
            TransferRequest {
                key: IdempotencyKey::trade_proceeds(trade.id),
                from: trade.buyer.clone(),
                to: trade.seller.clone(),
                asset: payment.clone(),
                amount: trade.seller_proceeds,
                purpose: TransferPurpose::TradeProceeds { trade_id: trade.id },
            },
        ];
        if trade.fee > 0 {
            legs.push(TransferRequest {
                key: IdempotencyKey::trade_fee(trade.id),
                from: trade.buyer.clone(),
                to: self.config.fee_account.clone(),
                asset: payment,
                amount: trade.fee,
                purpose: TransferPurpose::TradeFee { trade_id: trade.id },
            });
        }
        debug!("Trade {} settles in {} legs", trade.id, legs.len());
        legs
    }

    /// Trades newest first, optionally only those `user` took part in.
    pub async fn get_trade_history(
        &self,
        user: Option<&AccountId>,
        offset: usize,
        limit: usize,
    ) -> Result<Page<Trade>, EngineError> {
        let (items, total) = self.storage.list_trades(user, offset, limit).await?;
        Ok(Page::new(items, total, offset, limit))
    }

    pub async fn get_trades_for_listing(&self, listing_id: ListingId) -> Result<Vec<Trade>, EngineError> {
        self.storage.list_trades_by_listing(listing_id).await
    }

    pub async fn get_marketplace_stats(&self) -> Result<MarketplaceStats, EngineError> {
        let (open, active_listings) = self
            .storage
            .list_open_listings(self.clock.now(), 0, usize::MAX)
            .await?;
        let (total_tokens_available, total_market_value) =
            open.iter().fold((0u128, 0u128), |(tokens, value), listing| {
                (
                    tokens + listing.remaining_amount as u128,
                    value + listing.remaining_amount as u128 * listing.price_per_token as u128,
                )
            });
        let average_price = if total_tokens_available == 0 {
            0
        } else {
            u64::try_from(total_market_value / total_tokens_available).unwrap_or(u64::MAX)
        };

        let totals = self.storage.get_trade_totals().await?;
        Ok(MarketplaceStats {
            active_listings,
            total_tokens_available,
            total_market_value,
            average_price,
            total_trades: totals.count,
            total_volume: totals.volume,
            total_fees: totals.fees,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        core::{
            external::{MemoryHoldings, MemoryTransferSink},
            storage::{ListingProvider, MemoryStorage, NewListing},
        },
    };
    use grove_common::types::{GroveId, ListingState, TransferStatus};

    struct Fixture {
        storage: Arc<MemoryStorage>,
        holdings: Arc<MemoryHoldings>,
        matcher: TradeMatcher<MemoryStorage>,
    }

    async fn fixture() -> Result<(Fixture, ListingId), EngineError> {
        let config = Arc::new(EngineConfig::default());
        let storage = Arc::new(MemoryStorage::new());
        let holdings = Arc::new(MemoryHoldings::new());
        let sink = Arc::new(MemoryTransferSink::settling_into(holdings.clone()));
        let clock = Arc::new(ManualClock::new(10));

        holdings.set_balance(&"G1".into(), &"seller".into(), 50).await;
        holdings.set_payment_balance(&"buyer".into(), "USDC", 10_000).await;

        let listing = storage
            .insert_listing(
                NewListing {
                    grove_id: "G1".into(),
                    seller: "seller".into(),
                    amount: 50,
                    price_per_token: 100,
                    created_at: 10,
                    expires_at: 1_000,
                },
                50,
            )
            .await?;

        let transfers = Arc::new(TransferDispatcher::new(
            storage.clone(),
            sink,
            clock.clone(),
            config.reserve_account.clone(),
            config.payment_asset.clone(),
            config.payout_batch_size,
        ));
        let matcher = TradeMatcher::new(config, storage.clone(), holdings.clone(), transfers, clock);
        Ok((
            Fixture {
                storage,
                holdings,
                matcher,
            },
            listing.id,
        ))
    }

    #[tokio::test]
    async fn test_purchase_settles_three_legs() -> Result<(), EngineError> {
        let (f, listing_id) = fixture().await?;
        let result = f.matcher.purchase(&"buyer".into(), listing_id, 20).await?;

        assert_eq!(result.trade.total_price, 2_000);
        assert_eq!(result.trade.fee, 50);
        assert_eq!(result.trade.seller_proceeds, 1_950);
        assert_eq!(result.listing.remaining_amount, 30);
        assert_eq!(result.listing.state, ListingState::Active);
        assert_eq!(result.tickets.len(), 3);
        assert!(result
            .tickets
            .iter()
            .all(|ticket| ticket.status == TransferStatus::Settled));

        let grove = GroveId::from("G1");
        assert_eq!(f.holdings.get_balance(&grove, &"buyer".into()).await?, 20);
        assert_eq!(f.holdings.get_balance(&grove, &"seller".into()).await?, 30);
        assert_eq!(
            f.holdings.get_payment_balance(&"seller".into(), "USDC").await?,
            1_950
        );
        assert_eq!(
            f.holdings
                .get_payment_balance(&"platform-fees".into(), "USDC")
                .await?,
            50
        );
        assert_eq!(
            f.holdings.get_payment_balance(&"buyer".into(), "USDC").await?,
            8_000
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_self_trade_leaves_listing_unchanged() -> Result<(), EngineError> {
        let (f, listing_id) = fixture().await?;
        let err = f
            .matcher
            .purchase(&"seller".into(), listing_id, 5)
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::SelfTrade);
        let listing = f.storage.get_listing(listing_id).await?;
        assert_eq!(listing.map(|l| l.remaining_amount), Some(50));
        Ok(())
    }

    #[tokio::test]
    async fn test_purchase_rejections() -> Result<(), EngineError> {
        let (f, listing_id) = fixture().await?;
        let buyer = AccountId::from("buyer");

        let err = f.matcher.purchase(&buyer, listing_id, 0).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameters(_)));

        let err = f.matcher.purchase(&buyer, 99, 1).await.unwrap_err();
        assert_eq!(err, EngineError::ListingNotFound(99));

        let err = f.matcher.purchase(&buyer, listing_id, 51).await.unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientTokens {
                required: 51,
                available: 50
            }
        );

        f.holdings.set_payment_balance(&buyer, "USDC", 999).await;
        let err = f.matcher.purchase(&buyer, listing_id, 10).await.unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientPayment {
                required: 1_000,
                available: 999
            }
        );

        // Seller moved tokens away after listing
        f.holdings.set_payment_balance(&buyer, "USDC", 10_000).await;
        f.holdings.set_balance(&"G1".into(), &"seller".into(), 5).await;
        let err = f.matcher.purchase(&buyer, listing_id, 10).await.unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientTokens {
                required: 10,
                available: 5
            }
        );
        assert_eq!(f.matcher.get_trade_history(None, 0, 10).await?.total, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_stats_and_history() -> Result<(), EngineError> {
        let (f, listing_id) = fixture().await?;
        f.matcher.purchase(&"buyer".into(), listing_id, 10).await?;
        f.matcher.purchase(&"buyer".into(), listing_id, 40).await?;

        let stats = f.matcher.get_marketplace_stats().await?;
        assert_eq!(stats.active_listings, 0);
        assert_eq!(stats.total_tokens_available, 0);
        assert_eq!(stats.average_price, 0);
        assert_eq!(stats.total_trades, 2);
        assert_eq!(stats.total_volume, 5_000);
        assert_eq!(stats.total_fees, 125);

        let history = f
            .matcher
            .get_trade_history(Some(&"seller".into()), 0, 1)
            .await?;
        assert_eq!(history.total, 2);
        assert_eq!(history.items[0].token_amount, 40);
        assert_eq!(history.items.len(), 1);
        assert_eq!(f.matcher.get_trades_for_listing(listing_id).await?.len(), 2);
        Ok(())
    }
}
