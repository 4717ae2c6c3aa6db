use serde_json::Value;

use grove_common::{
    api::{
        ApiResponse, CallerParams, DepositHarvestRevenueParams, DistributeRevenueParams,
        FarmerParams, GetDistributionParams, GroveParams, HasClaimedParams, HolderParams,
        ListTransfersParams, ReconcileReport, TransferKeyParams, TransferOutcomeParams,
        WithdrawFarmerShareParams,
    },
    types::{
        Distribution, DistributionResult, DistributionShare, DistributionSummary, FarmerBalance,
        HolderEarnings, OutboxEntry, Withdrawal,
    },
};

use super::{handle, to_json, GroveApi};
use crate::{async_handler, core::storage::Storage};

pub fn register_methods<S: Storage>(api: &mut GroveApi<S>) {
    api.register_method(
        "depositHarvestRevenue",
        async_handler!(deposit_harvest_revenue::<S>),
    );
    api.register_method("distributeRevenue", async_handler!(distribute_revenue::<S>));
    api.register_method(
        "withdrawFarmerShare",
        async_handler!(withdraw_farmer_share::<S>),
    );
    api.register_method("getDistribution", async_handler!(get_distribution::<S>));
    api.register_method(
        "getDistributionSummary",
        async_handler!(get_distribution_summary::<S>),
    );
    api.register_method(
        "getPendingDistributions",
        async_handler!(get_pending_distributions::<S>),
    );
    api.register_method(
        "getHolderDistributionHistory",
        async_handler!(get_holder_distribution_history::<S>),
    );
    api.register_method("getHolderEarnings", async_handler!(get_holder_earnings::<S>));
    api.register_method("hasClaimed", async_handler!(has_claimed::<S>));
    api.register_method("getFarmerBalance", async_handler!(get_farmer_balance::<S>));
    api.register_method(
        "getWithdrawalHistory",
        async_handler!(get_withdrawal_history::<S>),
    );
    api.register_method("getRetainedDust", async_handler!(get_retained_dust::<S>));
    api.register_method(
        "handleTransferOutcome",
        async_handler!(handle_transfer_outcome::<S>),
    );
    api.register_method("reconcile", async_handler!(reconcile::<S>));
    api.register_method("getTransfer", async_handler!(get_transfer::<S>));
    api.register_method("listTransfers", async_handler!(list_transfers::<S>));
    api.register_method("pause", async_handler!(pause::<S>));
    api.register_method("unpause", async_handler!(unpause::<S>));
}

impl<S: Storage> GroveApi<S> {
    pub async fn deposit_harvest_revenue(
        &self,
        params: DepositHarvestRevenueParams,
    ) -> ApiResponse<Distribution> {
        self.engine
            .deposit_harvest_revenue(
                &params.caller,
                &params.grove_id,
                &params.harvest_id,
                params.amount,
            )
            .await
            .into()
    }

    pub async fn distribute_revenue(
        &self,
        params: DistributeRevenueParams,
    ) -> ApiResponse<DistributionResult> {
        self.engine
            .distribute_revenue(&params.caller, &params.grove_id, &params.harvest_id)
            .await
            .into()
    }

    pub async fn withdraw_farmer_share(
        &self,
        params: WithdrawFarmerShareParams,
    ) -> ApiResponse<Withdrawal> {
        self.engine
            .withdraw_farmer_share(&params.caller, &params.grove_id, params.amount)
            .await
            .into()
    }

    pub async fn get_distribution(&self, params: GetDistributionParams) -> ApiResponse<Distribution> {
        self.engine.get_distribution(&params.harvest_id).await.into()
    }

    pub async fn get_distribution_summary(
        &self,
        params: GetDistributionParams,
    ) -> ApiResponse<DistributionSummary> {
        self.engine
            .get_distribution_summary(&params.harvest_id)
            .await
            .into()
    }

    pub async fn get_pending_distributions(&self) -> ApiResponse<Vec<Distribution>> {
        self.engine.get_pending_distributions().await.into()
    }

    pub async fn get_holder_distribution_history(
        &self,
        params: HolderParams,
    ) -> ApiResponse<Vec<DistributionShare>> {
        self.engine
            .get_holder_distribution_history(&params.holder)
            .await
            .into()
    }

    pub async fn get_holder_earnings(&self, params: HolderParams) -> ApiResponse<HolderEarnings> {
        self.engine.get_holder_earnings(&params.holder).await.into()
    }

    pub async fn has_claimed(&self, params: HasClaimedParams) -> ApiResponse<bool> {
        self.engine
            .has_claimed(params.distribution_id, &params.holder)
            .await
            .into()
    }

    pub async fn get_farmer_balance(&self, params: GroveParams) -> ApiResponse<FarmerBalance> {
        self.engine.get_farmer_balance(&params.grove_id).await.into()
    }

    pub async fn get_withdrawal_history(&self, params: FarmerParams) -> ApiResponse<Vec<Withdrawal>> {
        self.engine.get_withdrawal_history(&params.farmer).await.into()
    }

    pub async fn get_retained_dust(&self, params: GroveParams) -> ApiResponse<u64> {
        self.engine.get_retained_dust(&params.grove_id).await.into()
    }

    pub async fn handle_transfer_outcome(
        &self,
        params: TransferOutcomeParams,
    ) -> ApiResponse<OutboxEntry> {
        self.engine
            .handle_transfer_outcome(&params.key, params.success, params.reason)
            .await
            .into()
    }

    pub async fn reconcile(&self) -> ApiResponse<ReconcileReport> {
        self.engine.reconcile().await.into()
    }

    pub async fn get_transfer(&self, params: TransferKeyParams) -> ApiResponse<OutboxEntry> {
        self.engine.get_transfer(&params.key).await.into()
    }

    pub async fn list_transfers(&self, params: ListTransfersParams) -> ApiResponse<Vec<OutboxEntry>> {
        self.engine.list_transfers(params.status).await.into()
    }

    pub fn pause(&self, params: CallerParams) -> ApiResponse<bool> {
        self.engine.pause(&params.caller).into()
    }

    pub fn unpause(&self, params: CallerParams) -> ApiResponse<bool> {
        self.engine.unpause(&params.caller).into()
    }
}

async fn deposit_harvest_revenue<S: Storage>(api: &GroveApi<S>, body: Value) -> ApiResponse<Value> {
    handle(body, move |params| api.deposit_harvest_revenue(params)).await
}

async fn distribute_revenue<S: Storage>(api: &GroveApi<S>, body: Value) -> ApiResponse<Value> {
    handle(body, move |params| api.distribute_revenue(params)).await
}

async fn withdraw_farmer_share<S: Storage>(api: &GroveApi<S>, body: Value) -> ApiResponse<Value> {
    handle(body, move |params| api.withdraw_farmer_share(params)).await
}

async fn get_distribution<S: Storage>(api: &GroveApi<S>, body: Value) -> ApiResponse<Value> {
    handle(body, move |params| api.get_distribution(params)).await
}

async fn get_distribution_summary<S: Storage>(api: &GroveApi<S>, body: Value) -> ApiResponse<Value> {
    handle(body, move |params| api.get_distribution_summary(params)).await
}

async fn get_pending_distributions<S: Storage>(api: &GroveApi<S>, _: Value) -> ApiResponse<Value> {
    to_json(api.get_pending_distributions().await)
}

async fn get_holder_distribution_history<S: Storage>(
    api: &GroveApi<S>,
    body: Value,
) -> ApiResponse<Value> {
    handle(body, move |params| api.get_holder_distribution_history(params)).await
}

async fn get_holder_earnings<S: Storage>(api: &GroveApi<S>, body: Value) -> ApiResponse<Value> {
    handle(body, move |params| api.get_holder_earnings(params)).await
}

async fn has_claimed<S: Storage>(api: &GroveApi<S>, body: Value) -> ApiResponse<Value> {
    handle(body, move |params| api.has_claimed(params)).await
}

async fn get_farmer_balance<S: Storage>(api: &GroveApi<S>, body: Value) -> ApiResponse<Value> {
    handle(body, move |params| api.get_farmer_balance(params)).await
}

async fn get_withdrawal_history<S: Storage>(api: &GroveApi<S>, body: Value) -> ApiResponse<Value> {
    handle(body, move |params| api.get_withdrawal_history(params)).await
}

async fn get_retained_dust<S: Storage>(api: &GroveApi<S>, body: Value) -> ApiResponse<Value> {
    handle(body, move |params| api.get_retained_dust(params)).await
}

async fn handle_transfer_outcome<S: Storage>(api: &GroveApi<S>, body: Value) -> ApiResponse<Value> {
    handle(body, move |params| api.handle_transfer_outcome(params)).await
}

async fn reconcile<S: Storage>(api: &GroveApi<S>, _: Value) -> ApiResponse<Value> {
    to_json(api.reconcile().await)
}

async fn get_transfer<S: Storage>(api: &GroveApi<S>, body: Value) -> ApiResponse<Value> {
    handle(body, move |params| api.get_transfer(params)).await
}

async fn list_transfers<S: Storage>(api: &GroveApi<S>, body: Value) -> ApiResponse<Value> {
    handle(body, move |params| api.list_transfers(params)).await
}

async fn pause<S: Storage>(api: &GroveApi<S>, body: Value) -> ApiResponse<Value> {
    handle(body, move |params| async move { api.pause(params) }).await
}

async fn unpause<S: Storage>(api: &GroveApi<S>, body: Value) -> ApiResponse<Value> {
    handle(body, move |params| async move { api.unpause(params) }).await
}
