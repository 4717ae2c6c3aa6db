use std::sync::Arc;

use log::{debug, info, warn};

use grove_common::{
    error::EngineError,
    time::TimestampSeconds,
    types::{
        AccountId, Distribution, DistributionId, DistributionShare, DistributionState, GroveId,
        HarvestId,
    },
};

use super::storage::{DistributionCommit, NewDeposit, Storage};

/// Per-harvest distribution state: `Unknown -> Deposited -> Distributed`.
///
/// Every transition is delegated to one atomic storage call, so racing
/// callers observe exactly one winner.
pub struct DistributionLedger<S: Storage> {
    storage: Arc<S>,
}

impl<S: Storage> Clone for DistributionLedger<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
        }
    }
}

impl<S: Storage> DistributionLedger<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    pub async fn record_deposit(
        &self,
        grove_id: &GroveId,
        harvest_id: &HarvestId,
        amount: u64,
        deposited_by: &AccountId,
        now: TimestampSeconds,
    ) -> Result<Distribution, EngineError> {
        if amount == 0 {
            return Err(EngineError::ZeroAmount);
        }

        let distribution = self
            .storage
            .insert_deposit(NewDeposit {
                grove_id: grove_id.clone(),
                harvest_id: harvest_id.clone(),
                amount,
                deposited_by: deposited_by.clone(),
                deposited_at: now,
            })
            .await
            .inspect_err(|e| warn!("Deposit for harvest {} rejected: {}", harvest_id, e))?;

        info!(
            "Deposited {} for harvest {} of grove {} (distribution {})",
            amount, harvest_id, grove_id, distribution.id
        );
        Ok(distribution)
    }

    /// Deposit recorded for `harvest_id`, whatever its state.
    pub async fn get_deposit(&self, harvest_id: &HarvestId) -> Result<Distribution, EngineError> {
        self.storage
            .get_distribution_by_harvest(harvest_id)
            .await?
            .ok_or_else(|| EngineError::NotYetDeposited(harvest_id.clone()))
    }

    pub async fn commit_distribution(
        &self,
        commit: DistributionCommit,
    ) -> Result<(Distribution, Vec<DistributionShare>), EngineError> {
        let harvest_id = commit.harvest_id.clone();
        let (distribution, shares) = self
            .storage
            .commit_distribution(commit)
            .await
            .inspect_err(|e| warn!("Distribution of harvest {} rejected: {}", harvest_id, e))?;

        info!(
            "Distributed harvest {}: farmer {}, investors {} across {} holders, dust {}",
            distribution.harvest_id,
            distribution.farmer_share,
            distribution.distributed_amount,
            distribution.holder_count,
            distribution.dust
        );
        Ok((distribution, shares))
    }

    pub async fn mark_claimed(
        &self,
        distribution_id: DistributionId,
        holder: &AccountId,
        now: TimestampSeconds,
    ) -> Result<DistributionShare, EngineError> {
        let share = self
            .storage
            .mark_share_claimed(distribution_id, holder, now)
            .await?;
        debug!(
            "Share of {} in distribution {} claimed ({})",
            holder, distribution_id, share.amount
        );
        Ok(share)
    }

    pub async fn get_distribution(
        &self,
        distribution_id: DistributionId,
    ) -> Result<Distribution, EngineError> {
        self.storage
            .get_distribution(distribution_id)
            .await?
            .ok_or(EngineError::DistributionNotFound(distribution_id))
    }

    pub async fn get_shares(
        &self,
        distribution_id: DistributionId,
    ) -> Result<Vec<DistributionShare>, EngineError> {
        self.storage.list_shares(distribution_id).await
    }

    /// Whether `holder` was paid for `distribution_id`. A holder without a
    /// share in a committed distribution has nothing to claim and reports false.
    pub async fn has_claimed(
        &self,
        distribution_id: DistributionId,
        holder: &AccountId,
    ) -> Result<bool, EngineError> {
        let distribution = self.get_distribution(distribution_id).await?;
        if distribution.state != DistributionState::Distributed {
            return Ok(false);
        }
        Ok(self
            .storage
            .get_share(distribution_id, holder)
            .await?
            .is_some_and(|share| share.claimed))
    }

    pub async fn get_pending(&self) -> Result<Vec<Distribution>, EngineError> {
        self.storage.list_pending_distributions().await
    }

    pub async fn get_holder_shares(
        &self,
        holder: &AccountId,
    ) -> Result<Vec<DistributionShare>, EngineError> {
        self.storage.list_shares_by_holder(holder).await
    }

    pub async fn get_retained_dust(&self, grove_id: &GroveId) -> Result<u64, EngineError> {
        self.storage.get_retained_dust(grove_id).await
    }
}
