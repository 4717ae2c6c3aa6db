use log::{info, warn};

use grove_common::{
    error::EngineError,
    types::{
        AccountId, Distribution, Grove, GroveId, IdempotencyKey, TransferPurpose, TransferRequest,
        Withdrawal,
    },
};

use super::{
    distribution::RevenueDistributionEngine,
    storage::{FarmerDebit, Storage},
};

impl<S: Storage> RevenueDistributionEngine<S> {
    /// Withdraw `amount` of the farmer balance of `grove_id` to its owner.
    pub async fn withdraw_farmer_share(
        &self,
        caller: &AccountId,
        grove_id: &GroveId,
        amount: u64,
    ) -> Result<Withdrawal, EngineError> {
        if amount == 0 {
            return Err(EngineError::ZeroAmount);
        }
        let grove = self.get_grove(grove_id).await?;
        if &grove.owner != caller {
            warn!("{} tried to withdraw the farmer share of grove {}", caller, grove_id);
            return Err(EngineError::unauthorized(caller, "withdraw the farmer share"));
        }

        let withdrawal = self
            .storage
            .debit_farmer_balance(FarmerDebit {
                grove_id: grove_id.clone(),
                farmer: caller.clone(),
                amount,
                distribution_id: None,
                created_at: self.clock.now(),
            })
            .await
            .inspect_err(|e| warn!("Withdrawal from grove {} rejected: {}", grove_id, e))?;
        info!(
            "Farmer {} withdrew {} from grove {} (withdrawal {})",
            caller, amount, grove_id, withdrawal.id
        );

        let request = self.transfers.withdrawal_request(
            IdempotencyKey::withdrawal(withdrawal.id),
            caller,
            amount,
            TransferPurpose::FarmerWithdrawal {
                withdrawal_id: withdrawal.id,
                distribution_id: None,
            },
        );
        self.transfers.dispatch(vec![request]).await?;
        Ok(withdrawal)
    }

    /// Debit the credit of a fresh distribution and build its payout request.
    ///
    /// Returns `None` when nothing was credited or the balance was drained
    /// by a concurrent withdrawal.
    pub(super) async fn farmer_payout(
        &self,
        grove: &Grove,
        distribution: &Distribution,
    ) -> Result<Option<(Withdrawal, TransferRequest)>, EngineError> {
        if distribution.farmer_credit == 0 {
            return Ok(None);
        }

        let debit = FarmerDebit {
            grove_id: grove.id.clone(),
            farmer: grove.owner.clone(),
            amount: distribution.farmer_credit,
            distribution_id: Some(distribution.id),
            created_at: self.clock.now(),
        };
        let withdrawal = match self.storage.debit_farmer_balance(debit).await {
            Ok(withdrawal) => withdrawal,
            Err(e @ EngineError::InsufficientFarmerBalance { .. }) => {
                warn!(
                    "Skipping farmer payout of distribution {}: {}",
                    distribution.id, e
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        info!(
            "Paying farmer share {} of distribution {} to {}",
            withdrawal.amount, distribution.id, grove.owner
        );

        let request = self.transfers.withdrawal_request(
            IdempotencyKey::payout(distribution.id, &grove.owner),
            &grove.owner,
            withdrawal.amount,
            TransferPurpose::FarmerWithdrawal {
                withdrawal_id: withdrawal.id,
                distribution_id: Some(distribution.id),
            },
        );
        Ok(Some((withdrawal, request)))
    }
}
