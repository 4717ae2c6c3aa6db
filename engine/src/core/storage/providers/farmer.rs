use async_trait::async_trait;
use grove_common::{
    error::EngineError,
    time::TimestampSeconds,
    types::{AccountId, DistributionId, FarmerBalance, GroveId, Withdrawal, WithdrawalId},
};

#[derive(Clone, Debug)]
pub struct FarmerDebit {
    pub grove_id: GroveId,
    pub farmer: AccountId,
    pub amount: u64,
    pub distribution_id: Option<DistributionId>,
    pub created_at: TimestampSeconds,
}

#[async_trait]
pub trait FarmerProvider: Send + Sync {
    async fn get_farmer_balance(
        &self,
        grove_id: &GroveId,
    ) -> Result<Option<FarmerBalance>, EngineError>;

    /// Atomically check and debit the farmer balance, recording the
    /// withdrawal. Fails with `InsufficientFarmerBalance`.
    async fn debit_farmer_balance(&self, debit: FarmerDebit) -> Result<Withdrawal, EngineError>;

    async fn get_withdrawal(&self, id: WithdrawalId) -> Result<Option<Withdrawal>, EngineError>;

    /// Withdrawals of `farmer`, newest first.
    async fn list_withdrawals(&self, farmer: &AccountId) -> Result<Vec<Withdrawal>, EngineError>;
}
