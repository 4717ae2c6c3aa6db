use serde::{Deserialize, Serialize};

use crate::time::TimestampSeconds;

use super::{AccountId, GroveId, ListingId};

/// Stored state of a listing.
///
/// A partially filled listing stays `Active`; expiry is applied lazily by
/// [`Listing::effective_state`] even when the stored state was never flipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListingState {
    Active,
    Filled,
    Cancelled,
    Expired,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: ListingId,
    pub grove_id: GroveId,
    pub seller: AccountId,
    pub original_amount: u64,
    pub remaining_amount: u64,
    pub price_per_token: u64,
    pub created_at: TimestampSeconds,
    pub expires_at: TimestampSeconds,
    pub state: ListingState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<TimestampSeconds>,
}

impl Listing {
    pub fn is_expired(&self, now: TimestampSeconds) -> bool {
        now >= self.expires_at
    }

    /// Active and not yet expired: the only listings that match purchases.
    pub fn is_open(&self, now: TimestampSeconds) -> bool {
        self.state == ListingState::Active && !self.is_expired(now)
    }

    pub fn effective_state(&self, now: TimestampSeconds) -> ListingState {
        match self.state {
            ListingState::Active if self.is_expired(now) => ListingState::Expired,
            state => state,
        }
    }

    /// Copy with the lazily computed state applied, as returned by read paths.
    pub fn with_effective_state(mut self, now: TimestampSeconds) -> Self {
        self.state = self.effective_state(now);
        self
    }
}
