use serde::{Deserialize, Serialize};

use crate::{
    config::{MAX_QUALITY_GRADE, MIN_QUALITY_GRADE},
    error::EngineError,
    time::TimestampSeconds,
};

use super::{AccountId, GroveId, HarvestId};

/// A tokenized grove, owned by the platform and read by the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grove {
    pub id: GroveId,
    pub name: String,
    /// Farmer owning the grove, receives the farmer share of every harvest.
    pub owner: AccountId,
    pub total_supply: u64,
    pub price_per_token: u64,
}

/// Balance of one holder for one grove.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenHolding {
    pub grove_id: GroveId,
    pub holder: AccountId,
    pub balance: u64,
}

/// A reported harvest. Immutable once reported.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestRecord {
    pub id: HarvestId,
    pub grove_id: GroveId,
    /// Yield in kilograms.
    pub yield_quantity: u64,
    /// Quality grade, 1 to 100.
    pub quality_grade: u8,
    /// Sale price per kilogram in payment asset units.
    pub unit_price: u64,
    pub reported_at: TimestampSeconds,
}

impl HarvestRecord {
    /// Revenue derived from the report: yield × unit price.
    pub fn total_revenue(&self) -> Result<u64, EngineError> {
        self.yield_quantity
            .checked_mul(self.unit_price)
            .ok_or(EngineError::Overflow)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.yield_quantity == 0 {
            return Err(EngineError::invalid("harvest yield must be positive"));
        }
        if !(MIN_QUALITY_GRADE..=MAX_QUALITY_GRADE).contains(&self.quality_grade) {
            return Err(EngineError::invalid(format!(
                "quality grade must be between {} and {}",
                MIN_QUALITY_GRADE, MAX_QUALITY_GRADE
            )));
        }
        if self.unit_price == 0 {
            return Err(EngineError::invalid("sale price must be positive"));
        }
        self.total_revenue().map(|_| ())
    }
}
