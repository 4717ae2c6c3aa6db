use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;

use crate::types::{
    AccountId, DistributionId, GroveId, HarvestId, IdempotencyKey, ListingId,
};

pub type EngineResult<T> = Result<T, EngineError>;

/// Coarse classification of every engine failure.
///
/// Callers branch on the kind rather than on individual variants:
/// state conflicts are never retried, only `External` failures are.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    Validation,
    StateConflict,
    Authorization,
    Insufficiency,
    NotFound,
    External,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    // ===== Validation =====
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Cannot trade with yourself")]
    SelfTrade,

    // ===== State conflicts =====
    #[error("Harvest {0} was already deposited")]
    HarvestAlreadyProcessed(HarvestId),

    #[error("Harvest {0} was already distributed")]
    AlreadyDistributed(HarvestId),

    #[error("Listing {0} is already closed")]
    AlreadyClosed(ListingId),

    #[error("Share of {holder} in distribution {distribution_id} was already claimed")]
    AlreadyClaimed {
        distribution_id: DistributionId,
        holder: AccountId,
    },

    #[error("No revenue deposited for harvest {0}")]
    NotYetDeposited(HarvestId),

    #[error("Listing {0} changed while the purchase was being prepared")]
    StaleListing(ListingId),

    #[error("Engine is paused")]
    Paused,

    // ===== Authorization =====
    #[error("{caller} is not allowed to {action}")]
    Unauthorized {
        caller: AccountId,
        action: &'static str,
    },

    // ===== Insufficiency =====
    #[error("Insufficient reserves: need {required}, have {available}")]
    InsufficientReserves { required: u64, available: u64 },

    #[error("Insufficient tokens: need {required}, have {available}")]
    InsufficientTokens { required: u64, available: u64 },

    #[error("Insufficient payment: need {required}, have {available}")]
    InsufficientPayment { required: u64, available: u64 },

    #[error("Insufficient farmer balance: need {required}, have {available}")]
    InsufficientFarmerBalance { required: u64, available: u64 },

    #[error("No token holders to distribute to")]
    NoTokenHolders,

    // ===== Not found =====
    #[error("Harvest {0} not found")]
    HarvestNotFound(HarvestId),

    #[error("Grove {0} not found")]
    GroveNotFound(GroveId),

    #[error("Listing {0} not found")]
    ListingNotFound(ListingId),

    #[error("Distribution {0} not found")]
    DistributionNotFound(DistributionId),

    #[error("No share for {holder} in distribution {distribution_id}")]
    ShareNotFound {
        distribution_id: DistributionId,
        holder: AccountId,
    },

    #[error("Unknown transfer {0}")]
    TransferNotFound(IdempotencyKey),

    #[error("Unknown method {0}")]
    MethodNotFound(String),

    // ===== External / internal =====
    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ZeroAmount | Self::InvalidParameters(_) | Self::Overflow | Self::SelfTrade => {
                ErrorKind::Validation
            }
            Self::HarvestAlreadyProcessed(_)
            | Self::AlreadyDistributed(_)
            | Self::AlreadyClosed(_)
            | Self::AlreadyClaimed { .. }
            | Self::NotYetDeposited(_)
            | Self::StaleListing(_)
            | Self::Paused => ErrorKind::StateConflict,
            Self::Unauthorized { .. } => ErrorKind::Authorization,
            Self::InsufficientReserves { .. }
            | Self::InsufficientTokens { .. }
            | Self::InsufficientPayment { .. }
            | Self::InsufficientFarmerBalance { .. }
            | Self::NoTokenHolders => ErrorKind::Insufficiency,
            Self::HarvestNotFound(_)
            | Self::GroveNotFound(_)
            | Self::ListingNotFound(_)
            | Self::DistributionNotFound(_)
            | Self::ShareNotFound { .. }
            | Self::TransferNotFound(_)
            | Self::MethodNotFound(_) => ErrorKind::NotFound,
            Self::Transfer(_) => ErrorKind::External,
            Self::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Stable numeric code, grouped by kind in blocks of 100.
    pub fn code(&self) -> u16 {
        match self {
            Self::ZeroAmount => 100,
            Self::InvalidParameters(_) => 101,
            Self::Overflow => 102,
            Self::SelfTrade => 103,
            Self::HarvestAlreadyProcessed(_) => 200,
            Self::AlreadyDistributed(_) => 201,
            Self::AlreadyClosed(_) => 202,
            Self::AlreadyClaimed { .. } => 203,
            Self::NotYetDeposited(_) => 204,
            Self::StaleListing(_) => 205,
            Self::Paused => 206,
            Self::Unauthorized { .. } => 300,
            Self::InsufficientReserves { .. } => 400,
            Self::InsufficientTokens { .. } => 401,
            Self::InsufficientPayment { .. } => 402,
            Self::InsufficientFarmerBalance { .. } => 403,
            Self::NoTokenHolders => 404,
            Self::HarvestNotFound(_) => 500,
            Self::GroveNotFound(_) => 501,
            Self::ListingNotFound(_) => 502,
            Self::DistributionNotFound(_) => 503,
            Self::ShareNotFound { .. } => 504,
            Self::TransferNotFound(_) => 505,
            Self::MethodNotFound(_) => 506,
            Self::Transfer(_) => 600,
            Self::Storage(_) => 700,
        }
    }

    /// Only transient transfer failures may be retried, and only through
    /// their original idempotency key.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transfer(_))
    }

    pub fn unauthorized(caller: &AccountId, action: &'static str) -> Self {
        Self::Unauthorized {
            caller: caller.clone(),
            action,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameters(message.into())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidParameters(err.to_string())
    }
}
