use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::time::TimestampSeconds;

use super::{AccountId, DistributionId, GroveId, HarvestId, TransferTicket, WithdrawalId};

/// Lifecycle of one harvest's revenue. `Distributed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistributionState {
    Deposited,
    Distributed,
}

/// Revenue deposited for a harvest and, once committed, how it was split.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub id: DistributionId,
    pub grove_id: GroveId,
    pub harvest_id: HarvestId,
    pub state: DistributionState,
    /// Amount deposited into the reserve for this harvest.
    pub total_amount: u64,
    pub farmer_share: u64,
    pub investor_share: u64,
    /// Sum of the per-holder shares, `investor_share - dust`.
    pub distributed_amount: u64,
    pub dust: u64,
    /// Amount credited to the farmer balance: farmer share, plus dust when
    /// the dust policy sends it to the farmer.
    pub farmer_credit: u64,
    pub holder_count: usize,
    pub deposited_by: AccountId,
    pub deposited_at: TimestampSeconds,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distributed_at: Option<TimestampSeconds>,
}

impl Distribution {
    pub fn is_distributed(&self) -> bool {
        self.state == DistributionState::Distributed
    }
}

/// One holder's part of a committed distribution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionShare {
    pub distribution_id: DistributionId,
    pub harvest_id: HarvestId,
    pub grove_id: GroveId,
    pub holder: AccountId,
    /// Balance in the snapshot the share was computed from.
    pub token_balance: u64,
    pub amount: u64,
    pub claimed: bool,
    pub created_at: TimestampSeconds,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<TimestampSeconds>,
}

/// Farmer revenue credited by distributions and not yet withdrawn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerBalance {
    pub grove_id: GroveId,
    pub farmer: AccountId,
    pub available: u64,
    pub total_credited: u64,
    pub total_withdrawn: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    pub id: WithdrawalId,
    pub grove_id: GroveId,
    pub farmer: AccountId,
    pub amount: u64,
    /// Set when the withdrawal is the automatic farmer payout of a distribution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution_id: Option<DistributionId>,
    pub created_at: TimestampSeconds,
}

/// Outcome of a successful `distributeRevenue` call.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionResult {
    pub distribution: Distribution,
    pub shares: Vec<DistributionShare>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farmer_withdrawal: Option<Withdrawal>,
    /// Payout requests accepted by the transfer sink.
    pub tickets: Vec<TransferTicket>,
    /// Payout requests that failed and wait for reconciliation.
    pub failed_payouts: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderShareSummary {
    pub holder: AccountId,
    pub token_balance: u64,
    pub amount: u64,
    /// Holder's part of the investor pool in basis points.
    pub share_bps: u64,
    pub claimed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionSummary {
    pub distribution: Distribution,
    pub holders: Vec<HolderShareSummary>,
    pub claimed_count: usize,
    pub unclaimed_amount: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroveEarnings {
    pub total_earned: u64,
    pub distribution_count: usize,
}

/// Lifetime earnings of one holder across every grove.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderEarnings {
    pub holder: AccountId,
    pub total_earned: u64,
    pub total_claimed: u64,
    pub total_unclaimed: u64,
    pub distribution_count: usize,
    pub by_grove: IndexMap<GroveId, GroveEarnings>,
}
