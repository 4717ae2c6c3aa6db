mod memory;
mod providers;

pub use memory::MemoryStorage;
pub use providers::*;

/// Every repository the engine persists through.
///
/// Each provider method that enforces an invariant (insert-if-absent,
/// compare-and-set, decrement-if-sufficient) runs as one atomic step in the
/// implementation, never as a read followed by a separate write.
pub trait Storage:
    DistributionProvider
    + FarmerProvider
    + ListingProvider
    + TradeProvider
    + OutboxProvider
    + Send
    + Sync
    + 'static
{
}

impl<T> Storage for T where
    T: DistributionProvider
        + FarmerProvider
        + ListingProvider
        + TradeProvider
        + OutboxProvider
        + Send
        + Sync
        + 'static
{
}
