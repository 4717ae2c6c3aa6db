use async_trait::async_trait;
use grove_common::{
    error::EngineError,
    time::TimestampSeconds,
    types::{AccountId, GroveId, Listing, ListingId, Trade},
};

#[derive(Clone, Debug)]
pub struct NewListing {
    pub grove_id: GroveId,
    pub seller: AccountId,
    pub amount: u64,
    pub price_per_token: u64,
    pub created_at: TimestampSeconds,
    pub expires_at: TimestampSeconds,
}

/// A purchase priced by the matcher, applied in one step.
#[derive(Clone, Debug)]
pub struct FillOrder {
    pub listing_id: ListingId,
    pub buyer: AccountId,
    pub amount: u64,
    /// Price the totals were computed with; a listing repriced since fails
    /// the fill with `StaleListing`.
    pub price_per_token: u64,
    pub total_price: u64,
    pub fee: u64,
    pub now: TimestampSeconds,
}

#[derive(Clone, Debug)]
pub struct ListingUpdate {
    pub listing_id: ListingId,
    pub requester: AccountId,
    pub new_price: Option<u64>,
    pub new_expires_at: Option<TimestampSeconds>,
    pub now: TimestampSeconds,
}

#[async_trait]
pub trait ListingProvider: Send + Sync {
    /// Insert a listing if the seller's `balance` covers it together with
    /// the remaining amount of the seller's other open listings of the grove.
    async fn insert_listing(
        &self,
        listing: NewListing,
        balance: u64,
    ) -> Result<Listing, EngineError>;

    async fn get_listing(&self, id: ListingId) -> Result<Option<Listing>, EngineError>;

    /// Decrement-if-sufficient on the remaining amount and append the trade.
    /// Closes the listing as filled when nothing remains.
    async fn fill_listing(&self, order: FillOrder) -> Result<(Listing, Trade), EngineError>;

    /// Close an open listing on behalf of its seller.
    async fn cancel_listing(
        &self,
        id: ListingId,
        requester: &AccountId,
        now: TimestampSeconds,
    ) -> Result<Listing, EngineError>;

    async fn update_listing(&self, update: ListingUpdate) -> Result<Listing, EngineError>;

    /// Open listings in creation order with skip/limit pagination, and the
    /// number of open listings overall.
    async fn list_open_listings(
        &self,
        now: TimestampSeconds,
        skip: usize,
        limit: usize,
    ) -> Result<(Vec<Listing>, usize), EngineError>;

    async fn list_listings_by_grove(
        &self,
        grove_id: &GroveId,
    ) -> Result<Vec<Listing>, EngineError>;

    async fn list_listings_by_seller(
        &self,
        seller: &AccountId,
    ) -> Result<Vec<Listing>, EngineError>;

    /// Flip active listings past their expiry to `Expired`.
    async fn expire_listings(&self, now: TimestampSeconds) -> Result<Vec<ListingId>, EngineError>;
}
