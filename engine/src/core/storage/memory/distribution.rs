use std::collections::HashSet;

use async_trait::async_trait;
use log::{debug, error};

use grove_common::{
    error::EngineError,
    time::TimestampSeconds,
    types::{
        AccountId, Distribution, DistributionId, DistributionShare, DistributionState,
        FarmerBalance, GroveId, HarvestId, Withdrawal, WithdrawalId,
    },
};

use super::{next_id, MemoryStorage};
use crate::core::storage::{
    DistributionCommit, DistributionProvider, FarmerDebit, FarmerProvider, NewDeposit,
};

#[async_trait]
impl DistributionProvider for MemoryStorage {
    async fn insert_deposit(&self, deposit: NewDeposit) -> Result<Distribution, EngineError> {
        if deposit.amount == 0 {
            return Err(EngineError::ZeroAmount);
        }

        let mut tables = self.distributions.write().await;
        if tables.by_harvest.contains_key(&deposit.harvest_id) {
            return Err(EngineError::HarvestAlreadyProcessed(deposit.harvest_id));
        }

        let id = next_id(&mut tables.last_distribution_id);
        let distribution = Distribution {
            id,
            grove_id: deposit.grove_id,
            harvest_id: deposit.harvest_id,
            state: DistributionState::Deposited,
            total_amount: deposit.amount,
            farmer_share: 0,
            investor_share: 0,
            distributed_amount: 0,
            dust: 0,
            farmer_credit: 0,
            holder_count: 0,
            deposited_by: deposit.deposited_by,
            deposited_at: deposit.deposited_at,
            distributed_at: None,
        };
        tables
            .by_harvest
            .insert(distribution.harvest_id.clone(), id);
        tables.distributions.insert(id, distribution.clone());
        Ok(distribution)
    }

    async fn get_distribution(
        &self,
        id: DistributionId,
    ) -> Result<Option<Distribution>, EngineError> {
        let tables = self.distributions.read().await;
        Ok(tables.distributions.get(&id).cloned())
    }

    async fn get_distribution_by_harvest(
        &self,
        harvest_id: &HarvestId,
    ) -> Result<Option<Distribution>, EngineError> {
        let tables = self.distributions.read().await;
        Ok(tables
            .by_harvest
            .get(harvest_id)
            .and_then(|id| tables.distributions.get(id))
            .cloned())
    }

    async fn commit_distribution(
        &self,
        commit: DistributionCommit,
    ) -> Result<(Distribution, Vec<DistributionShare>), EngineError> {
        let required = commit.total()?;
        let distributed = commit
            .allocations
            .iter()
            .try_fold(0u64, |sum, allocation| sum.checked_add(allocation.amount))
            .ok_or(EngineError::Overflow)?;
        let investor_used = distributed
            .checked_add(commit.dust)
            .ok_or(EngineError::Overflow)?;
        let mut seen = HashSet::with_capacity(commit.allocations.len());
        if !commit
            .allocations
            .iter()
            .all(|allocation| seen.insert(&allocation.holder))
        {
            return Err(EngineError::invalid("duplicate holder in distribution"));
        }

        let mut tables = self.distributions.write().await;
        let id = *tables
            .by_harvest
            .get(&commit.harvest_id)
            .ok_or_else(|| EngineError::NotYetDeposited(commit.harvest_id.clone()))?;
        let current = tables
            .distributions
            .get(&id)
            .ok_or(EngineError::DistributionNotFound(id))?;

        if current.state == DistributionState::Distributed {
            return Err(EngineError::AlreadyDistributed(commit.harvest_id));
        }
        if required > current.total_amount {
            return Err(EngineError::InsufficientReserves {
                required,
                available: current.total_amount,
            });
        }
        if investor_used > commit.investor_share {
            return Err(EngineError::invalid(format!(
                "shares and dust {} exceed investor share {}",
                investor_used, commit.investor_share
            )));
        }

        let grove_id = current.grove_id.clone();
        let farmer_credit = if commit.dust_to_farmer {
            commit
                .farmer_share
                .checked_add(commit.dust)
                .ok_or(EngineError::Overflow)?
        } else {
            commit.farmer_share
        };
        let retained = if commit.dust_to_farmer { 0 } else { commit.dust };

        // Compute every new value before the first write so a failure leaves
        // the tables untouched
        let mut balance = tables
            .farmer_balances
            .get(&grove_id)
            .cloned()
            .unwrap_or_else(|| FarmerBalance {
                grove_id: grove_id.clone(),
                farmer: commit.farmer.clone(),
                available: 0,
                total_credited: 0,
                total_withdrawn: 0,
            });
        balance.farmer = commit.farmer.clone();
        balance.available = balance
            .available
            .checked_add(farmer_credit)
            .ok_or(EngineError::Overflow)?;
        balance.total_credited = balance
            .total_credited
            .checked_add(farmer_credit)
            .ok_or(EngineError::Overflow)?;
        let retained_dust = tables
            .retained_dust
            .get(&grove_id)
            .copied()
            .unwrap_or(0)
            .checked_add(retained)
            .ok_or(EngineError::Overflow)?;

        let shares: Vec<DistributionShare> = commit
            .allocations
            .iter()
            .map(|allocation| DistributionShare {
                distribution_id: id,
                harvest_id: commit.harvest_id.clone(),
                grove_id: grove_id.clone(),
                holder: allocation.holder.clone(),
                token_balance: allocation.token_balance,
                amount: allocation.amount,
                claimed: false,
                created_at: commit.distributed_at,
                claimed_at: None,
            })
            .collect();

        let distribution = match tables.distributions.get_mut(&id) {
            Some(distribution) => {
                distribution.state = DistributionState::Distributed;
                distribution.farmer_share = commit.farmer_share;
                distribution.investor_share = commit.investor_share;
                distribution.distributed_amount = distributed;
                distribution.dust = commit.dust;
                distribution.farmer_credit = farmer_credit;
                distribution.holder_count = shares.len();
                distribution.distributed_at = Some(commit.distributed_at);
                distribution.clone()
            }
            None => {
                error!("Distribution {} vanished during commit", id);
                return Err(EngineError::DistributionNotFound(id));
            }
        };
        for share in &shares {
            tables
                .shares
                .insert((id, share.holder.clone()), share.clone());
        }
        tables.farmer_balances.insert(grove_id.clone(), balance);
        tables.retained_dust.insert(grove_id, retained_dust);

        debug!(
            "Committed distribution {} for harvest {} with {} shares",
            id,
            distribution.harvest_id,
            shares.len()
        );
        Ok((distribution, shares))
    }

    async fn mark_share_claimed(
        &self,
        distribution_id: DistributionId,
        holder: &AccountId,
        claimed_at: TimestampSeconds,
    ) -> Result<DistributionShare, EngineError> {
        let mut tables = self.distributions.write().await;
        let exists = tables.distributions.contains_key(&distribution_id);
        let share = match tables.shares.get_mut(&(distribution_id, holder.clone())) {
            Some(share) => share,
            None if exists => {
                return Err(EngineError::ShareNotFound {
                    distribution_id,
                    holder: holder.clone(),
                })
            }
            None => return Err(EngineError::DistributionNotFound(distribution_id)),
        };
        if share.claimed {
            return Err(EngineError::AlreadyClaimed {
                distribution_id,
                holder: holder.clone(),
            });
        }
        share.claimed = true;
        share.claimed_at = Some(claimed_at);
        Ok(share.clone())
    }

    async fn get_share(
        &self,
        distribution_id: DistributionId,
        holder: &AccountId,
    ) -> Result<Option<DistributionShare>, EngineError> {
        let tables = self.distributions.read().await;
        Ok(tables
            .shares
            .get(&(distribution_id, holder.clone()))
            .cloned())
    }

    async fn list_shares(
        &self,
        distribution_id: DistributionId,
    ) -> Result<Vec<DistributionShare>, EngineError> {
        let tables = self.distributions.read().await;
        Ok(tables
            .shares
            .values()
            .filter(|share| share.distribution_id == distribution_id)
            .cloned()
            .collect())
    }

    async fn list_shares_by_holder(
        &self,
        holder: &AccountId,
    ) -> Result<Vec<DistributionShare>, EngineError> {
        let tables = self.distributions.read().await;
        Ok(tables
            .shares
            .values()
            .rev()
            .filter(|share| &share.holder == holder)
            .cloned()
            .collect())
    }

    async fn list_pending_distributions(&self) -> Result<Vec<Distribution>, EngineError> {
        let tables = self.distributions.read().await;
        Ok(tables
            .distributions
            .values()
            .filter(|distribution| distribution.state == DistributionState::Deposited)
            .cloned()
            .collect())
    }

    async fn list_unclaimed_shares(
        &self,
        limit: usize,
    ) -> Result<Vec<DistributionShare>, EngineError> {
        let tables = self.distributions.read().await;
        Ok(tables
            .shares
            .values()
            .filter(|share| !share.claimed)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_retained_dust(&self, grove_id: &GroveId) -> Result<u64, EngineError> {
        let tables = self.distributions.read().await;
        Ok(tables.retained_dust.get(grove_id).copied().unwrap_or(0))
    }
}

#[async_trait]
impl FarmerProvider for MemoryStorage {
    async fn get_farmer_balance(
        &self,
        grove_id: &GroveId,
    ) -> Result<Option<FarmerBalance>, EngineError> {
        let tables = self.distributions.read().await;
        Ok(tables.farmer_balances.get(grove_id).cloned())
    }

    async fn debit_farmer_balance(&self, debit: FarmerDebit) -> Result<Withdrawal, EngineError> {
        if debit.amount == 0 {
            return Err(EngineError::ZeroAmount);
        }

        let mut tables = self.distributions.write().await;
        let balance = tables.farmer_balances.get_mut(&debit.grove_id).ok_or(
            EngineError::InsufficientFarmerBalance {
                required: debit.amount,
                available: 0,
            },
        )?;
        if balance.farmer != debit.farmer {
            return Err(EngineError::unauthorized(
                &debit.farmer,
                "withdraw the farmer share",
            ));
        }
        let remaining = balance.available.checked_sub(debit.amount).ok_or(
            EngineError::InsufficientFarmerBalance {
                required: debit.amount,
                available: balance.available,
            },
        )?;
        let withdrawn = balance
            .total_withdrawn
            .checked_add(debit.amount)
            .ok_or(EngineError::Overflow)?;
        balance.available = remaining;
        balance.total_withdrawn = withdrawn;

        let id = next_id(&mut tables.last_withdrawal_id);
        let withdrawal = Withdrawal {
            id,
            grove_id: debit.grove_id,
            farmer: debit.farmer,
            amount: debit.amount,
            distribution_id: debit.distribution_id,
            created_at: debit.created_at,
        };
        tables.withdrawals.insert(id, withdrawal.clone());
        Ok(withdrawal)
    }

    async fn get_withdrawal(&self, id: WithdrawalId) -> Result<Option<Withdrawal>, EngineError> {
        let tables = self.distributions.read().await;
        Ok(tables.withdrawals.get(&id).cloned())
    }

    async fn list_withdrawals(&self, farmer: &AccountId) -> Result<Vec<Withdrawal>, EngineError> {
        let tables = self.distributions.read().await;
        Ok(tables
            .withdrawals
            .values()
            .rev()
            .filter(|withdrawal| &withdrawal.farmer == farmer)
            .cloned()
            .collect())
    }
}
