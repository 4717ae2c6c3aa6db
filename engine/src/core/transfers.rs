use std::sync::Arc;

use futures::future::join_all;
use log::{debug, info, warn};

use grove_common::{
    api::ReconcileReport,
    error::EngineError,
    types::{
        AccountId, Asset, DistributionShare, IdempotencyKey, OutboxEntry, TransferPurpose,
        TransferRequest, TransferStatus, TransferTicket,
    },
};

use super::{external::TransferSink, ledger::DistributionLedger, storage::Storage};
use crate::clock::Clock;

/// Tickets and failures of one dispatch call.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub tickets: Vec<TransferTicket>,
    pub failed: Vec<IdempotencyKey>,
}

/// Emits transfer requests through the outbox.
///
/// Every request is recorded before it is sent, keyed by its idempotency
/// key, so a failed send is retried later with the same key and the
/// original amounts.
pub struct TransferDispatcher<S: Storage> {
    storage: Arc<S>,
    ledger: DistributionLedger<S>,
    sink: Arc<dyn TransferSink>,
    clock: Arc<dyn Clock>,
    reserve_account: AccountId,
    payment_asset: String,
    batch_size: usize,
}

impl<S: Storage> TransferDispatcher<S> {
    pub fn new(
        storage: Arc<S>,
        sink: Arc<dyn TransferSink>,
        clock: Arc<dyn Clock>,
        reserve_account: AccountId,
        payment_asset: String,
        batch_size: usize,
    ) -> Self {
        Self {
            ledger: DistributionLedger::new(storage.clone()),
            storage,
            sink,
            clock,
            reserve_account,
            payment_asset,
            batch_size: batch_size.max(1),
        }
    }

    pub fn payment_asset(&self) -> &str {
        &self.payment_asset
    }

    /// Payout of a committed share from the revenue reserve.
    pub fn payout_request(&self, share: &DistributionShare) -> TransferRequest {
        TransferRequest {
            key: IdempotencyKey::payout(share.distribution_id, &share.holder),
            from: self.reserve_account.clone(),
            to: share.holder.clone(),
            asset: Asset::Payment(self.payment_asset.clone()),
            amount: share.amount,
            purpose: TransferPurpose::HolderPayout {
                distribution_id: share.distribution_id,
                holder: share.holder.clone(),
            },
        }
    }

    /// Farmer withdrawal from the revenue reserve.
    pub fn withdrawal_request(
        &self,
        key: IdempotencyKey,
        farmer: &AccountId,
        amount: u64,
        purpose: TransferPurpose,
    ) -> TransferRequest {
        TransferRequest {
            key,
            from: self.reserve_account.clone(),
            to: farmer.clone(),
            asset: Asset::Payment(self.payment_asset.clone()),
            amount,
            purpose,
        }
    }

    /// Record and send `requests` in batches, requests of a batch concurrently.
    ///
    /// Transfer failures are recorded in the outbox and reported, not
    /// returned as errors: the state that caused the requests is already
    /// committed.
    pub async fn dispatch(
        &self,
        requests: Vec<TransferRequest>,
    ) -> Result<DispatchReport, EngineError> {
        let mut report = DispatchReport::default();
        for batch in requests.chunks(self.batch_size) {
            let now = self.clock.now();
            for request in batch {
                self.storage.record_transfer(request.clone(), now).await?;
            }

            let results = join_all(batch.iter().map(|request| self.send(request))).await;
            for (request, result) in batch.iter().zip(results) {
                match result? {
                    Some(ticket) => report.tickets.push(ticket),
                    None => report.failed.push(request.key.clone()),
                }
            }
        }

        if !report.failed.is_empty() {
            warn!(
                "{} of {} transfer requests failed, left for reconciliation",
                report.failed.len(),
                requests.len()
            );
        }
        Ok(report)
    }

    // Send one recorded request, None when the sink rejected it
    async fn send(&self, request: &TransferRequest) -> Result<Option<TransferTicket>, EngineError> {
        if log::log_enabled!(log::Level::Debug) {
            debug!(
                "Requesting transfer {}: {} {:?} from {} to {}",
                request.key, request.amount, request.asset, request.from, request.to
            );
        }

        match self.sink.request_transfer(request).await {
            Ok(ticket) => {
                self.storage
                    .record_attempt(&request.key, ticket.status, None, self.clock.now())
                    .await?;
                if ticket.status == TransferStatus::Settled {
                    self.apply_settlement(&request.purpose).await?;
                }
                Ok(Some(ticket))
            }
            Err(e) => {
                warn!("Transfer {} failed: {}", request.key, e);
                self.storage
                    .record_attempt(
                        &request.key,
                        TransferStatus::Failed,
                        Some(e.to_string()),
                        self.clock.now(),
                    )
                    .await?;
                Ok(None)
            }
        }
    }

    // Effects of a settled transfer on engine state
    async fn apply_settlement(&self, purpose: &TransferPurpose) -> Result<(), EngineError> {
        if let TransferPurpose::HolderPayout {
            distribution_id,
            holder,
        } = purpose
        {
            match self
                .ledger
                .mark_claimed(*distribution_id, holder, self.clock.now())
                .await
            {
                Ok(_) => {}
                Err(EngineError::AlreadyClaimed { .. }) => {
                    debug!(
                        "Payout to {} for distribution {} was already claimed",
                        holder, distribution_id
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Outcome reported by the transfer layer for a pending request.
    pub async fn handle_outcome(
        &self,
        key: &IdempotencyKey,
        success: bool,
        reason: Option<String>,
    ) -> Result<OutboxEntry, EngineError> {
        let entry = self
            .storage
            .get_transfer(key)
            .await?
            .ok_or_else(|| EngineError::TransferNotFound(key.clone()))?;

        let now = self.clock.now();
        if success {
            let updated = self
                .storage
                .set_transfer_status(key, TransferStatus::Settled, None, now)
                .await?;
            self.apply_settlement(&entry.request.purpose).await?;
            info!("Transfer {} settled", key);
            Ok(updated)
        } else if entry.status == TransferStatus::Settled {
            warn!("Ignoring failure report for settled transfer {}", key);
            Ok(entry)
        } else {
            let reason = reason.unwrap_or_else(|| "reported failed".to_string());
            warn!("Transfer {} failed: {}", key, reason);
            self.storage
                .set_transfer_status(key, TransferStatus::Failed, Some(reason), now)
                .await
        }
    }

    /// Re-emit failed requests and unclaimed payouts with their original keys.
    ///
    /// Amounts come from the outbox or the committed shares; nothing is
    /// recomputed.
    pub async fn reconcile(&self) -> Result<ReconcileReport, EngineError> {
        let mut retry: Vec<TransferRequest> = self
            .storage
            .list_transfers(Some(TransferStatus::Failed))
            .await?
            .into_iter()
            .map(|entry| entry.request)
            .collect();

        for share in self.storage.list_unclaimed_shares(usize::MAX).await? {
            let request = self.payout_request(&share);
            match self.storage.get_transfer(&request.key).await? {
                // Never emitted, the commit went through but the send did not
                None if share.amount > 0 => retry.push(request),
                // Settled before the claim was recorded
                Some(entry) if entry.status == TransferStatus::Settled => {
                    self.apply_settlement(&entry.request.purpose).await?;
                }
                _ => {}
            }
        }

        let retried = retry.len();
        let report = self.dispatch(retry).await?;
        let pending = self
            .storage
            .list_transfers(Some(TransferStatus::Pending))
            .await?
            .len();
        let failed = self
            .storage
            .list_transfers(Some(TransferStatus::Failed))
            .await?
            .len();

        let result = ReconcileReport {
            retried,
            settled: report
                .tickets
                .iter()
                .filter(|ticket| ticket.status == TransferStatus::Settled)
                .count(),
            pending,
            failed,
        };
        info!(
            "Reconciliation: {} retried, {} settled, {} pending, {} failed",
            result.retried, result.settled, result.pending, result.failed
        );
        Ok(result)
    }

    pub async fn get_transfer(&self, key: &IdempotencyKey) -> Result<OutboxEntry, EngineError> {
        self.storage
            .get_transfer(key)
            .await?
            .ok_or_else(|| EngineError::TransferNotFound(key.clone()))
    }

    pub async fn list_transfers(
        &self,
        status: Option<TransferStatus>,
    ) -> Result<Vec<OutboxEntry>, EngineError> {
        self.storage.list_transfers(status).await
    }
}
