use async_trait::async_trait;
use grove_common::{
    error::EngineError,
    time::TimestampSeconds,
    types::{IdempotencyKey, OutboxEntry, TransferRequest, TransferStatus},
};

#[async_trait]
pub trait OutboxProvider: Send + Sync {
    /// Record a request as `Pending` unless its key is already known, in
    /// which case the existing entry is returned untouched.
    async fn record_transfer(
        &self,
        request: TransferRequest,
        now: TimestampSeconds,
    ) -> Result<OutboxEntry, EngineError>;

    /// Store the result of one dispatch attempt. A `Settled` entry never
    /// moves back to another status.
    async fn record_attempt(
        &self,
        key: &IdempotencyKey,
        status: TransferStatus,
        error: Option<String>,
        now: TimestampSeconds,
    ) -> Result<OutboxEntry, EngineError>;

    /// Apply an outcome reported by the transfer layer, without counting
    /// an attempt. Same `Settled` rule as [`Self::record_attempt`].
    async fn set_transfer_status(
        &self,
        key: &IdempotencyKey,
        status: TransferStatus,
        error: Option<String>,
        now: TimestampSeconds,
    ) -> Result<OutboxEntry, EngineError>;

    async fn get_transfer(&self, key: &IdempotencyKey)
        -> Result<Option<OutboxEntry>, EngineError>;

    /// Entries in emission order, optionally filtered by status.
    async fn list_transfers(
        &self,
        status: Option<TransferStatus>,
    ) -> Result<Vec<OutboxEntry>, EngineError>;
}
