use std::fmt;

use serde::{Deserialize, Serialize};

use crate::time::TimestampSeconds;

use super::{AccountId, DistributionId, GroveId, TradeId, WithdrawalId};

/// Asset moved by a transfer request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "id")]
pub enum Asset {
    GroveToken(GroveId),
    Payment(String),
}

/// Key under which the transfer layer deduplicates requests.
///
/// Keys are derived from engine record ids only, so a retry of the same
/// payout or trade leg always produces the same key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Payout of a distribution to one account, holder or farmer.
    pub fn payout(distribution_id: DistributionId, account: &AccountId) -> Self {
        Self(format!("payout:{}:{}", distribution_id, account))
    }

    pub fn withdrawal(withdrawal_id: WithdrawalId) -> Self {
        Self(format!("withdrawal:{}", withdrawal_id))
    }

    pub fn trade_tokens(trade_id: TradeId) -> Self {
        Self(format!("trade:{}:tokens", trade_id))
    }

    pub fn trade_proceeds(trade_id: TradeId) -> Self {
        Self(format!("trade:{}:proceeds", trade_id))
    }

    pub fn trade_fee(trade_id: TradeId) -> Self {
        Self(format!("trade:{}:fee", trade_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdempotencyKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Why a transfer was requested, used to apply its outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum TransferPurpose {
    #[serde(rename_all = "camelCase")]
    HolderPayout {
        distribution_id: DistributionId,
        holder: AccountId,
    },
    #[serde(rename_all = "camelCase")]
    FarmerWithdrawal {
        withdrawal_id: WithdrawalId,
        #[serde(skip_serializing_if = "Option::is_none")]
        distribution_id: Option<DistributionId>,
    },
    #[serde(rename_all = "camelCase")]
    TradeTokens { trade_id: TradeId },
    #[serde(rename_all = "camelCase")]
    TradeProceeds { trade_id: TradeId },
    #[serde(rename_all = "camelCase")]
    TradeFee { trade_id: TradeId },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub key: IdempotencyKey,
    pub from: AccountId,
    pub to: AccountId,
    pub asset: Asset,
    pub amount: u64,
    pub purpose: TransferPurpose,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferStatus {
    Pending,
    Settled,
    Failed,
}

/// Receipt returned by the transfer layer for an accepted request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferTicket {
    pub key: IdempotencyKey,
    pub status: TransferStatus,
    /// Order in which the transfer layer first accepted the key.
    pub sequence: u64,
}

/// Outbox row tracking one emitted transfer request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    pub request: TransferRequest,
    pub status: TransferStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: TimestampSeconds,
    pub updated_at: TimestampSeconds,
}
