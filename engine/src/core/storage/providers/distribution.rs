use async_trait::async_trait;
use grove_common::{
    error::EngineError,
    time::TimestampSeconds,
    types::{AccountId, Distribution, DistributionId, DistributionShare, GroveId, HarvestId},
};

/// Revenue deposited for a harvest, before any split.
#[derive(Clone, Debug)]
pub struct NewDeposit {
    pub grove_id: GroveId,
    pub harvest_id: HarvestId,
    pub amount: u64,
    pub deposited_by: AccountId,
    pub deposited_at: TimestampSeconds,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HolderAllocation {
    pub holder: AccountId,
    pub token_balance: u64,
    pub amount: u64,
}

/// Result of the share computation, committed in one step.
#[derive(Clone, Debug)]
pub struct DistributionCommit {
    pub harvest_id: HarvestId,
    pub farmer: AccountId,
    pub farmer_share: u64,
    pub investor_share: u64,
    pub allocations: Vec<HolderAllocation>,
    pub dust: u64,
    /// Credit the dust to the farmer instead of retaining it in the reserve.
    pub dust_to_farmer: bool,
    pub distributed_at: TimestampSeconds,
}

impl DistributionCommit {
    /// farmer share + Σ allocations + dust, the amount the commit consumes.
    pub fn total(&self) -> Result<u64, EngineError> {
        self.allocations
            .iter()
            .try_fold(self.farmer_share, |total, allocation| {
                total.checked_add(allocation.amount)
            })
            .and_then(|total| total.checked_add(self.dust))
            .ok_or(EngineError::Overflow)
    }
}

#[async_trait]
pub trait DistributionProvider: Send + Sync {
    /// Record a deposit. Fails with `HarvestAlreadyProcessed` if the harvest
    /// already has one.
    async fn insert_deposit(&self, deposit: NewDeposit) -> Result<Distribution, EngineError>;

    async fn get_distribution(
        &self,
        id: DistributionId,
    ) -> Result<Option<Distribution>, EngineError>;

    async fn get_distribution_by_harvest(
        &self,
        harvest_id: &HarvestId,
    ) -> Result<Option<Distribution>, EngineError>;

    /// Compare-and-set `Deposited -> Distributed`, appending one unclaimed
    /// share per allocation and crediting the farmer balance.
    ///
    /// Fails with `NotYetDeposited`, `AlreadyDistributed`, or
    /// `InsufficientReserves` when the commit total exceeds the deposit.
    async fn commit_distribution(
        &self,
        commit: DistributionCommit,
    ) -> Result<(Distribution, Vec<DistributionShare>), EngineError>;

    /// Flip `claimed` once. A second claim fails with `AlreadyClaimed`.
    async fn mark_share_claimed(
        &self,
        distribution_id: DistributionId,
        holder: &AccountId,
        claimed_at: TimestampSeconds,
    ) -> Result<DistributionShare, EngineError>;

    async fn get_share(
        &self,
        distribution_id: DistributionId,
        holder: &AccountId,
    ) -> Result<Option<DistributionShare>, EngineError>;

    /// Shares of a distribution in commit order.
    async fn list_shares(
        &self,
        distribution_id: DistributionId,
    ) -> Result<Vec<DistributionShare>, EngineError>;

    /// Every share of `holder`, newest distribution first.
    async fn list_shares_by_holder(
        &self,
        holder: &AccountId,
    ) -> Result<Vec<DistributionShare>, EngineError>;

    /// Deposited harvests not yet distributed, oldest first.
    async fn list_pending_distributions(&self) -> Result<Vec<Distribution>, EngineError>;

    /// Unclaimed shares, oldest first.
    async fn list_unclaimed_shares(
        &self,
        limit: usize,
    ) -> Result<Vec<DistributionShare>, EngineError>;

    /// Dust retained in the reserve for `grove_id` across all distributions.
    async fn get_retained_dust(&self, grove_id: &GroveId) -> Result<u64, EngineError>;
}
