// Pure revenue arithmetic: proportional shares, the farmer/investor split
// and marketplace fees. Nothing here touches state, so every function is
// safe to call from any task without locking.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    config::{BPS_DENOMINATOR, PERCENT_DENOMINATOR},
    error::EngineError,
    types::AccountId,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareAllocation {
    /// Per-holder shares, in the order the holders were given.
    pub shares: Vec<(AccountId, u64)>,
    /// `total - Σ shares`, reported to the caller and never dropped.
    pub dust: u64,
}

impl ShareAllocation {
    pub fn distributed(&self) -> u64 {
        // Σ shares ≤ total, so this never overflows
        self.shares.iter().map(|(_, amount)| *amount).sum()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueSplit {
    pub farmer_share: u64,
    pub investor_share: u64,
}

// floor(amount * numerator / denominator) with a 128-bit intermediate
fn mul_div_floor(amount: u64, numerator: u64, denominator: u64) -> Result<u64, EngineError> {
    if denominator == 0 {
        return Err(EngineError::invalid("denominator must be positive"));
    }
    let value = (amount as u128) * (numerator as u128) / (denominator as u128);
    u64::try_from(value).map_err(|_| EngineError::Overflow)
}

/// Split `total` among `holders` proportionally to their balances.
///
/// Each share is `floor(total * balance / total_tokens)`. Holder order is
/// preserved in the output. Fails with `NoTokenHolders` when there is no
/// holder or `total_tokens` is zero, and with `InvalidParameters` when a
/// holder appears twice or the balances add up to more than `total_tokens`.
pub fn compute_shares(
    total: u64,
    holders: &[(AccountId, u64)],
    total_tokens: u64,
) -> Result<ShareAllocation, EngineError> {
    if holders.is_empty() || total_tokens == 0 {
        return Err(EngineError::NoTokenHolders);
    }

    let mut shares: IndexMap<&AccountId, u64> = IndexMap::with_capacity(holders.len());
    let mut balance_sum: u64 = 0;
    let mut distributed: u64 = 0;
    for (holder, balance) in holders {
        balance_sum = balance_sum
            .checked_add(*balance)
            .ok_or(EngineError::Overflow)?;
        if balance_sum > total_tokens {
            return Err(EngineError::invalid(format!(
                "holder balances exceed total tokens {}",
                total_tokens
            )));
        }

        let share = mul_div_floor(total, *balance, total_tokens)?;
        if shares.insert(holder, share).is_some() {
            return Err(EngineError::invalid(format!("duplicate holder {}", holder)));
        }
        distributed = distributed.checked_add(share).ok_or(EngineError::Overflow)?;
    }

    let dust = total
        .checked_sub(distributed)
        .ok_or(EngineError::Overflow)?;

    Ok(ShareAllocation {
        shares: shares
            .into_iter()
            .map(|(holder, share)| (holder.clone(), share))
            .collect(),
        dust,
    })
}

/// Split a deposit into the farmer share and the investor remainder.
pub fn split_revenue(total: u64, farmer_percent: u8) -> Result<RevenueSplit, EngineError> {
    if farmer_percent as u64 > PERCENT_DENOMINATOR {
        return Err(EngineError::invalid("farmer share must be at most 100%"));
    }
    let farmer_share = mul_div_floor(total, farmer_percent as u64, PERCENT_DENOMINATOR)?;
    Ok(RevenueSplit {
        farmer_share,
        investor_share: total - farmer_share,
    })
}

/// Marketplace fee on a trade, rounded down.
pub fn compute_fee(total_price: u64, fee_bps: u16) -> Result<u64, EngineError> {
    mul_div_floor(total_price, fee_bps as u64, BPS_DENOMINATOR)
}

/// Part of `total` represented by `amount`, in basis points, rounded down.
pub fn share_bps(amount: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    ((amount as u128) * (BPS_DENOMINATOR as u128) / (total as u128)) as u64
}
