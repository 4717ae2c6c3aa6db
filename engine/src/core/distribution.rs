use std::sync::Arc;

use log::{debug, warn};

use grove_common::{
    error::EngineError,
    share::{compute_shares, share_bps, split_revenue},
    types::{
        AccountId, Distribution, DistributionId, DistributionResult, DistributionShare,
        DistributionSummary, FarmerBalance, Grove, GroveEarnings, GroveId, HarvestId,
        HarvestRecord, HolderEarnings, HolderShareSummary, Withdrawal,
    },
};
use indexmap::IndexMap;

use super::{
    external::{GroveRegistry, HoldingSource},
    ledger::DistributionLedger,
    storage::{DistributionCommit, HolderAllocation, Storage},
    transfers::TransferDispatcher,
};
use crate::{
    clock::Clock,
    config::{DustPolicy, EngineConfig},
};

/// Deposit, split and payout of harvest revenue.
pub struct RevenueDistributionEngine<S: Storage> {
    pub(super) config: Arc<EngineConfig>,
    pub(super) ledger: DistributionLedger<S>,
    pub(super) storage: Arc<S>,
    pub(super) holdings: Arc<dyn HoldingSource>,
    pub(super) registry: Arc<dyn GroveRegistry>,
    pub(super) transfers: Arc<TransferDispatcher<S>>,
    pub(super) clock: Arc<dyn Clock>,
}

impl<S: Storage> RevenueDistributionEngine<S> {
    pub fn new(
        config: Arc<EngineConfig>,
        storage: Arc<S>,
        holdings: Arc<dyn HoldingSource>,
        registry: Arc<dyn GroveRegistry>,
        transfers: Arc<TransferDispatcher<S>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            ledger: DistributionLedger::new(storage.clone()),
            storage,
            holdings,
            registry,
            transfers,
            clock,
        }
    }

    pub fn ledger(&self) -> &DistributionLedger<S> {
        &self.ledger
    }

    pub(super) async fn get_grove(&self, grove_id: &GroveId) -> Result<Grove, EngineError> {
        self.registry
            .get_grove(grove_id)
            .await?
            .ok_or_else(|| EngineError::GroveNotFound(grove_id.clone()))
    }

    // Grove owner or admin
    async fn authorize_distributor(
        &self,
        caller: &AccountId,
        grove_id: &GroveId,
        action: &'static str,
    ) -> Result<Grove, EngineError> {
        let grove = self.get_grove(grove_id).await?;
        if &grove.owner != caller && !self.config.is_admin(caller) {
            warn!("{} is not allowed to {} for grove {}", caller, action, grove_id);
            return Err(EngineError::unauthorized(caller, action));
        }
        Ok(grove)
    }

    async fn get_harvest(
        &self,
        grove_id: &GroveId,
        harvest_id: &HarvestId,
    ) -> Result<HarvestRecord, EngineError> {
        match self.registry.get_harvest(harvest_id).await? {
            Some(harvest) if &harvest.grove_id == grove_id => Ok(harvest),
            Some(harvest) => {
                debug!(
                    "Harvest {} belongs to grove {}, not {}",
                    harvest_id, harvest.grove_id, grove_id
                );
                Err(EngineError::HarvestNotFound(harvest_id.clone()))
            }
            None => Err(EngineError::HarvestNotFound(harvest_id.clone())),
        }
    }

    /// Record the revenue of a harvest into the reserve. At most once per harvest.
    pub async fn deposit(
        &self,
        caller: &AccountId,
        grove_id: &GroveId,
        harvest_id: &HarvestId,
        amount: u64,
    ) -> Result<Distribution, EngineError> {
        if amount == 0 {
            warn!("Rejected zero deposit for harvest {}", harvest_id);
            return Err(EngineError::ZeroAmount);
        }
        self.authorize_distributor(caller, grove_id, "deposit harvest revenue")
            .await?;
        let harvest = self.get_harvest(grove_id, harvest_id).await?;

        match harvest.total_revenue() {
            Ok(revenue) if revenue != amount => warn!(
                "Deposit of {} for harvest {} differs from its reported revenue {}",
                amount, harvest_id, revenue
            ),
            Err(e) => warn!("Cannot derive revenue of harvest {}: {}", harvest_id, e),
            _ => {}
        }

        self.ledger
            .record_deposit(grove_id, harvest_id, amount, caller, self.clock.now())
            .await
    }

    /// Split the deposit of `harvest_id` and emit every payout.
    ///
    /// Everything before the ledger commit is pure computation on one
    /// holdings snapshot: a failure leaves no state behind. Payout failures
    /// after the commit are left in the outbox for [`TransferDispatcher::reconcile`].
    pub async fn distribute(
        &self,
        caller: &AccountId,
        grove_id: &GroveId,
        harvest_id: &HarvestId,
    ) -> Result<DistributionResult, EngineError> {
        let grove = self
            .authorize_distributor(caller, grove_id, "distribute revenue")
            .await?;
        self.get_harvest(grove_id, harvest_id).await?;

        let deposit = self.ledger.get_deposit(harvest_id).await?;
        if deposit.is_distributed() {
            return Err(EngineError::AlreadyDistributed(harvest_id.clone()));
        }

        let split = split_revenue(deposit.total_amount, self.config.farmer_share_percent)?;

        // One snapshot, the farmer's own allocation excluded
        let holders: Vec<(AccountId, u64)> = self
            .holdings
            .get_all_holders_with_balance(grove_id)
            .await?
            .into_iter()
            .filter(|(holder, balance)| *balance > 0 && holder != &grove.owner)
            .collect();
        let circulating = self.holdings.get_total_circulating_tokens(grove_id).await?;
        let owner_balance = self.holdings.get_balance(grove_id, &grove.owner).await?;
        let investor_tokens = circulating.saturating_sub(owner_balance);

        let allocation = compute_shares(split.investor_share, &holders, investor_tokens)
            .inspect_err(|e| warn!("Cannot distribute harvest {}: {}", harvest_id, e))?;

        if log::log_enabled!(log::Level::Debug) {
            debug!(
                "Harvest {}: farmer {}, investors {} over {} tokens, dust {}",
                harvest_id,
                split.farmer_share,
                split.investor_share,
                investor_tokens,
                allocation.dust
            );
        }

        let balances: IndexMap<&AccountId, u64> = holders
            .iter()
            .map(|(holder, balance)| (holder, *balance))
            .collect();
        let allocations = allocation
            .shares
            .iter()
            .filter(|(_, amount)| *amount > 0)
            .map(|(holder, amount)| HolderAllocation {
                holder: holder.clone(),
                token_balance: balances.get(holder).copied().unwrap_or(0),
                amount: *amount,
            })
            .collect();

        let (distribution, shares) = self
            .ledger
            .commit_distribution(DistributionCommit {
                harvest_id: harvest_id.clone(),
                farmer: grove.owner.clone(),
                farmer_share: split.farmer_share,
                investor_share: split.investor_share,
                allocations,
                dust: allocation.dust,
                dust_to_farmer: self.config.dust_policy == DustPolicy::ToFarmer,
                distributed_at: self.clock.now(),
            })
            .await?;

        let mut requests: Vec<_> = shares
            .iter()
            .map(|share| self.transfers.payout_request(share))
            .collect();

        let farmer_withdrawal = if self.config.auto_payout_farmer_share {
            match self.farmer_payout(&grove, &distribution).await? {
                Some((withdrawal, request)) => {
                    requests.push(request);
                    Some(withdrawal)
                }
                None => None,
            }
        } else {
            None
        };

        let report = self.transfers.dispatch(requests).await?;
        // Settled payouts flipped claim flags in the ledger
        let shares = self.ledger.get_shares(distribution.id).await?;
        Ok(DistributionResult {
            distribution,
            shares,
            farmer_withdrawal,
            tickets: report.tickets,
            failed_payouts: report.failed.len(),
        })
    }

    pub async fn get_distribution(&self, harvest_id: &HarvestId) -> Result<Distribution, EngineError> {
        self.ledger.get_deposit(harvest_id).await
    }

    pub async fn get_distribution_summary(
        &self,
        harvest_id: &HarvestId,
    ) -> Result<DistributionSummary, EngineError> {
        let distribution = self.ledger.get_deposit(harvest_id).await?;
        let shares = self.ledger.get_shares(distribution.id).await?;

        let mut claimed_count = 0;
        let mut unclaimed_amount: u64 = 0;
        let holders = shares
            .into_iter()
            .map(|share| {
                if share.claimed {
                    claimed_count += 1;
                } else {
                    unclaimed_amount = unclaimed_amount
                        .checked_add(share.amount)
                        .ok_or(EngineError::Overflow)?;
                }
                Ok(HolderShareSummary {
                    share_bps: share_bps(share.amount, distribution.investor_share),
                    holder: share.holder,
                    token_balance: share.token_balance,
                    amount: share.amount,
                    claimed: share.claimed,
                })
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        Ok(DistributionSummary {
            distribution,
            holders,
            claimed_count,
            unclaimed_amount,
        })
    }

    pub async fn get_pending_distributions(&self) -> Result<Vec<Distribution>, EngineError> {
        self.ledger.get_pending().await
    }

    /// Every share of `holder`, newest first.
    pub async fn get_holder_distribution_history(
        &self,
        holder: &AccountId,
    ) -> Result<Vec<DistributionShare>, EngineError> {
        self.ledger.get_holder_shares(holder).await
    }

    pub async fn get_holder_earnings(&self, holder: &AccountId) -> Result<HolderEarnings, EngineError> {
        let shares = self.ledger.get_holder_shares(holder).await?;

        let mut earnings = HolderEarnings {
            holder: holder.clone(),
            total_earned: 0,
            total_claimed: 0,
            total_unclaimed: 0,
            distribution_count: shares.len(),
            by_grove: IndexMap::new(),
        };
        for share in shares {
            earnings.total_earned = earnings
                .total_earned
                .checked_add(share.amount)
                .ok_or(EngineError::Overflow)?;
            let bucket = if share.claimed {
                &mut earnings.total_claimed
            } else {
                &mut earnings.total_unclaimed
            };
            *bucket = bucket.checked_add(share.amount).ok_or(EngineError::Overflow)?;

            let grove: &mut GroveEarnings = earnings.by_grove.entry(share.grove_id).or_default();
            grove.total_earned = grove
                .total_earned
                .checked_add(share.amount)
                .ok_or(EngineError::Overflow)?;
            grove.distribution_count += 1;
        }
        Ok(earnings)
    }

    pub async fn has_claimed(
        &self,
        distribution_id: DistributionId,
        holder: &AccountId,
    ) -> Result<bool, EngineError> {
        self.ledger.has_claimed(distribution_id, holder).await
    }

    /// Farmer balance of a grove, zero before its first distribution.
    pub async fn get_farmer_balance(&self, grove_id: &GroveId) -> Result<FarmerBalance, EngineError> {
        if let Some(balance) = self.storage.get_farmer_balance(grove_id).await? {
            return Ok(balance);
        }
        let grove = self.get_grove(grove_id).await?;
        Ok(FarmerBalance {
            grove_id: grove.id,
            farmer: grove.owner,
            available: 0,
            total_credited: 0,
            total_withdrawn: 0,
        })
    }

    pub async fn get_withdrawal_history(
        &self,
        farmer: &AccountId,
    ) -> Result<Vec<Withdrawal>, EngineError> {
        self.storage.list_withdrawals(farmer).await
    }

    pub async fn get_retained_dust(&self, grove_id: &GroveId) -> Result<u64, EngineError> {
        self.get_grove(grove_id).await?;
        self.ledger.get_retained_dust(grove_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        core::{
            external::{MemoryGroveRegistry, MemoryHoldings, MemoryTransferSink},
            storage::MemoryStorage,
        },
    };
    use grove_common::types::{IdempotencyKey, TransferStatus};

    struct Fixture {
        holdings: Arc<MemoryHoldings>,
        sink: Arc<MemoryTransferSink>,
        engine: RevenueDistributionEngine<MemoryStorage>,
    }

    async fn fixture(config: EngineConfig) -> Result<Fixture, EngineError> {
        let config = Arc::new(config);
        let storage = Arc::new(MemoryStorage::new());
        let holdings = Arc::new(MemoryHoldings::new());
        let registry = Arc::new(MemoryGroveRegistry::new());
        let sink = Arc::new(MemoryTransferSink::new());
        let clock = Arc::new(ManualClock::new(1_000));

        registry
            .add_grove(Grove {
                id: "G1".into(),
                name: "Hillside".to_string(),
                owner: "farmer".into(),
                total_supply: 10_000,
                price_per_token: 10,
            })
            .await?;
        registry
            .add_harvest(HarvestRecord {
                id: "H1".into(),
                grove_id: "G1".into(),
                yield_quantity: 1_000,
                quality_grade: 80,
                unit_price: 1_000,
                reported_at: 900,
            })
            .await?;

        let transfers = Arc::new(TransferDispatcher::new(
            storage.clone(),
            sink.clone(),
            clock.clone(),
            config.reserve_account.clone(),
            config.payment_asset.clone(),
            config.payout_batch_size,
        ));
        let engine = RevenueDistributionEngine::new(
            config,
            storage,
            holdings.clone(),
            registry,
            transfers,
            clock,
        );
        Ok(Fixture {
            holdings,
            sink,
            engine,
        })
    }

    async fn seed_holders(holdings: &MemoryHoldings, balances: &[(&str, u64)]) {
        for (holder, balance) in balances {
            holdings
                .set_balance(&"G1".into(), &(*holder).into(), *balance)
                .await;
        }
    }

    #[tokio::test]
    async fn test_distribute_splits_and_pays() -> Result<(), EngineError> {
        let f = fixture(EngineConfig::default()).await?;
        seed_holders(&f.holdings, &[("a", 250), ("b", 750), ("farmer", 500)]).await;

        f.engine
            .deposit(&"farmer".into(), &"G1".into(), &"H1".into(), 1_000_000)
            .await?;
        let result = f
            .engine
            .distribute(&"farmer".into(), &"G1".into(), &"H1".into())
            .await?;

        assert_eq!(result.distribution.farmer_share, 300_000);
        assert_eq!(result.distribution.investor_share, 700_000);
        assert_eq!(result.distribution.dust, 0);
        let amounts: Vec<_> = result
            .shares
            .iter()
            .map(|share| (share.holder.as_str(), share.amount))
            .collect();
        assert_eq!(amounts, vec![("a", 175_000), ("b", 525_000)]);
        assert!(result.shares.iter().all(|share| share.claimed));
        let summary = f.engine.get_distribution_summary(&"H1".into()).await?;
        assert_eq!(summary.claimed_count, 2);
        assert_eq!(summary.unclaimed_amount, 0);

        let withdrawal = result.farmer_withdrawal.expect("farmer payout");
        assert_eq!(withdrawal.amount, 300_000);
        assert_eq!(withdrawal.distribution_id, Some(result.distribution.id));
        let farmer_key = IdempotencyKey::payout(result.distribution.id, &"farmer".into());
        assert_eq!(f.sink.executed(&farmer_key).map(|r| r.amount), Some(300_000));
        assert_eq!(f.engine.get_farmer_balance(&"G1".into()).await?.available, 0);
        assert_eq!(result.failed_payouts, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_deposit_rules() -> Result<(), EngineError> {
        let f = fixture(EngineConfig::default()).await?;
        let err = f
            .engine
            .deposit(&"mallory".into(), &"G1".into(), &"H1".into(), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Unauthorized { .. }));

        let err = f
            .engine
            .deposit(&"farmer".into(), &"G1".into(), &"H9".into(), 10)
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::HarvestNotFound("H9".into()));

        let err = f
            .engine
            .deposit(&"farmer".into(), &"G2".into(), &"H1".into(), 10)
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::GroveNotFound("G2".into()));

        f.engine
            .deposit(&"farmer".into(), &"G1".into(), &"H1".into(), 10)
            .await?;
        let err = f
            .engine
            .deposit(&"farmer".into(), &"G1".into(), &"H1".into(), 10)
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::HarvestAlreadyProcessed("H1".into()));
        assert_eq!(f.engine.get_pending_distributions().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_no_holders_leaves_deposit_pending() -> Result<(), EngineError> {
        let f = fixture(EngineConfig::default()).await?;
        seed_holders(&f.holdings, &[("farmer", 500)]).await;
        f.engine
            .deposit(&"farmer".into(), &"G1".into(), &"H1".into(), 100)
            .await?;

        let err = f
            .engine
            .distribute(&"farmer".into(), &"G1".into(), &"H1".into())
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::NoTokenHolders);
        assert!(!f.engine.get_distribution(&"H1".into()).await?.is_distributed());
        assert_eq!(f.sink.call_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_dust_to_farmer_without_auto_payout() -> Result<(), EngineError> {
        let f = fixture(EngineConfig {
            dust_policy: DustPolicy::ToFarmer,
            auto_payout_farmer_share: false,
            ..Default::default()
        })
        .await?;
        seed_holders(&f.holdings, &[("a", 1), ("b", 1), ("c", 1)]).await;

        f.engine
            .deposit(&"farmer".into(), &"G1".into(), &"H1".into(), 100)
            .await?;
        let result = f
            .engine
            .distribute(&"farmer".into(), &"G1".into(), &"H1".into())
            .await?;

        // 30 to the farmer, 70 over three holders: 23 each and 1 of dust
        assert_eq!(result.distribution.dust, 1);
        assert_eq!(result.distribution.farmer_credit, 31);
        assert!(result.farmer_withdrawal.is_none());
        assert_eq!(f.engine.get_farmer_balance(&"G1".into()).await?.available, 31);
        assert_eq!(f.engine.get_retained_dust(&"G1".into()).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_summary_and_earnings() -> Result<(), EngineError> {
        let f = fixture(EngineConfig::default()).await?;
        seed_holders(&f.holdings, &[("a", 1), ("b", 3)]).await;
        f.sink.set_auto_settle(false);

        f.engine
            .deposit(&"farmer".into(), &"G1".into(), &"H1".into(), 1_000)
            .await?;
        let result = f
            .engine
            .distribute(&"farmer".into(), &"G1".into(), &"H1".into())
            .await?;
        assert!(result
            .tickets
            .iter()
            .all(|ticket| ticket.status == TransferStatus::Pending));

        let summary = f.engine.get_distribution_summary(&"H1".into()).await?;
        assert_eq!(summary.claimed_count, 0);
        assert_eq!(summary.unclaimed_amount, 700);
        assert_eq!(summary.holders[0].share_bps, 2_500);
        assert_eq!(summary.holders[1].share_bps, 7_500);

        let earnings = f.engine.get_holder_earnings(&"b".into()).await?;
        assert_eq!(earnings.total_earned, 525);
        assert_eq!(earnings.total_unclaimed, 525);
        assert_eq!(earnings.by_grove[&GroveId::from("G1")].distribution_count, 1);
        assert!(!f.engine.has_claimed(result.distribution.id, &"b".into()).await?);
        Ok(())
    }
}
