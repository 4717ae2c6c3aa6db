use async_trait::async_trait;
use indexmap::map::Entry;
use log::trace;

use grove_common::{
    error::EngineError,
    time::TimestampSeconds,
    types::{IdempotencyKey, OutboxEntry, TransferRequest, TransferStatus},
};

use super::MemoryStorage;
use crate::core::storage::OutboxProvider;

impl MemoryStorage {
    async fn update_outbox(
        &self,
        key: &IdempotencyKey,
        status: TransferStatus,
        error: Option<String>,
        attempted: bool,
        now: TimestampSeconds,
    ) -> Result<OutboxEntry, EngineError> {
        let mut outbox = self.outbox.write().await;
        let entry = outbox
            .get_mut(key)
            .ok_or_else(|| EngineError::TransferNotFound(key.clone()))?;
        if attempted {
            entry.attempts = entry.attempts.saturating_add(1);
        }
        if entry.status == TransferStatus::Settled {
            trace!("Transfer {} already settled, keeping status", key);
            return Ok(entry.clone());
        }
        entry.status = status;
        entry.last_error = error;
        entry.updated_at = now;
        Ok(entry.clone())
    }
}

#[async_trait]
impl OutboxProvider for MemoryStorage {
    async fn record_transfer(
        &self,
        request: TransferRequest,
        now: TimestampSeconds,
    ) -> Result<OutboxEntry, EngineError> {
        let mut outbox = self.outbox.write().await;
        match outbox.entry(request.key.clone()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let record = OutboxEntry {
                    request,
                    status: TransferStatus::Pending,
                    attempts: 0,
                    last_error: None,
                    created_at: now,
                    updated_at: now,
                };
                entry.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn record_attempt(
        &self,
        key: &IdempotencyKey,
        status: TransferStatus,
        error: Option<String>,
        now: TimestampSeconds,
    ) -> Result<OutboxEntry, EngineError> {
        self.update_outbox(key, status, error, true, now).await
    }

    async fn set_transfer_status(
        &self,
        key: &IdempotencyKey,
        status: TransferStatus,
        error: Option<String>,
        now: TimestampSeconds,
    ) -> Result<OutboxEntry, EngineError> {
        self.update_outbox(key, status, error, false, now).await
    }

    async fn get_transfer(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<OutboxEntry>, EngineError> {
        Ok(self.outbox.read().await.get(key).cloned())
    }

    async fn list_transfers(
        &self,
        status: Option<TransferStatus>,
    ) -> Result<Vec<OutboxEntry>, EngineError> {
        let outbox = self.outbox.read().await;
        Ok(outbox
            .values()
            .filter(|entry| status.map_or(true, |status| entry.status == status))
            .cloned()
            .collect())
    }
}
