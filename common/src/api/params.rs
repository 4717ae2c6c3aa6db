use serde::{Deserialize, Serialize};

use crate::types::{
    AccountId, DistributionId, GroveId, HarvestId, IdempotencyKey, ListingId, TransferStatus,
};

// ===== Revenue distribution =====

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositHarvestRevenueParams {
    pub caller: AccountId,
    pub grove_id: GroveId,
    pub harvest_id: HarvestId,
    pub amount: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributeRevenueParams {
    pub caller: AccountId,
    pub grove_id: GroveId,
    pub harvest_id: HarvestId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawFarmerShareParams {
    pub caller: AccountId,
    pub grove_id: GroveId,
    pub amount: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetDistributionParams {
    pub harvest_id: HarvestId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderParams {
    pub holder: AccountId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HasClaimedParams {
    pub distribution_id: DistributionId,
    pub holder: AccountId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroveParams {
    pub grove_id: GroveId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerParams {
    pub farmer: AccountId,
}

// ===== Marketplace =====

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTokensForSaleParams {
    pub caller: AccountId,
    pub grove_id: GroveId,
    pub amount: u64,
    pub price_per_token: u64,
    pub duration_days: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelListingParams {
    pub caller: AccountId,
    pub listing_id: ListingId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateListingParams {
    pub caller: AccountId,
    pub listing_id: ListingId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_price: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_duration_days: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseFromMarketplaceParams {
    pub caller: AccountId,
    pub listing_id: ListingId,
    pub amount: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetListingParams {
    pub listing_id: ListingId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerParams {
    pub seller: AccountId,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTradeHistoryParams {
    /// Only trades where this account is buyer or seller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<AccountId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

// ===== Transfers & administration =====

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcomeParams {
    pub key: IdempotencyKey,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferKeyParams {
    pub key: IdempotencyKey,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTransfersParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TransferStatus>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerParams {
    pub caller: AccountId,
}

/// Outcome of a reconciliation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Requests re-emitted with their original key.
    pub retried: usize,
    pub settled: usize,
    pub pending: usize,
    pub failed: usize,
}
