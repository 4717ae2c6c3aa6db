use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap, DashSet};
use indexmap::IndexMap;
use log::{debug, trace, warn};
use tokio::sync::RwLock;

use grove_common::{
    error::EngineError,
    types::{
        AccountId, Asset, Grove, GroveId, HarvestId, HarvestRecord, IdempotencyKey,
        TransferRequest, TransferStatus, TransferTicket,
    },
};

use super::{GroveRegistry, HoldingSource, TransferSink};

/// In-memory token and payment balances.
#[derive(Default)]
pub struct MemoryHoldings {
    tokens: RwLock<HashMap<GroveId, IndexMap<AccountId, u64>>>,
    payments: RwLock<HashMap<(AccountId, String), u64>>,
}

impl MemoryHoldings {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_balance(&self, grove: &GroveId, holder: &AccountId, balance: u64) {
        let mut tokens = self.tokens.write().await;
        let holders = tokens.entry(grove.clone()).or_default();
        if balance == 0 {
            holders.shift_remove(holder);
        } else {
            holders.insert(holder.clone(), balance);
        }
    }

    pub async fn set_payment_balance(&self, holder: &AccountId, asset: &str, balance: u64) {
        let mut payments = self.payments.write().await;
        payments.insert((holder.clone(), asset.to_string()), balance);
    }

    /// Move balances as the ledger would once a transfer settles.
    pub async fn apply_transfer(&self, request: &TransferRequest) -> Result<(), EngineError> {
        match &request.asset {
            Asset::GroveToken(grove) => {
                let mut tokens = self.tokens.write().await;
                let holders = tokens.entry(grove.clone()).or_default();
                let available = holders.get(&request.from).copied().unwrap_or(0);
                let remaining = available.checked_sub(request.amount).ok_or(
                    EngineError::InsufficientTokens {
                        required: request.amount,
                        available,
                    },
                )?;
                let credited = holders
                    .get(&request.to)
                    .copied()
                    .unwrap_or(0)
                    .checked_add(request.amount)
                    .ok_or(EngineError::Overflow)?;

                if remaining == 0 {
                    holders.shift_remove(&request.from);
                } else {
                    holders.insert(request.from.clone(), remaining);
                }
                if credited > 0 {
                    holders.insert(request.to.clone(), credited);
                }
            }
            Asset::Payment(asset) => {
                let mut payments = self.payments.write().await;
                let from_key = (request.from.clone(), asset.clone());
                let available = payments.get(&from_key).copied().unwrap_or(0);
                let remaining = available.checked_sub(request.amount).ok_or(
                    EngineError::InsufficientPayment {
                        required: request.amount,
                        available,
                    },
                )?;
                let to_key = (request.to.clone(), asset.clone());
                let credited = payments
                    .get(&to_key)
                    .copied()
                    .unwrap_or(0)
                    .checked_add(request.amount)
                    .ok_or(EngineError::Overflow)?;
                payments.insert(from_key, remaining);
                payments.insert(to_key, credited);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl HoldingSource for MemoryHoldings {
    async fn get_balance(&self, grove: &GroveId, holder: &AccountId) -> Result<u64, EngineError> {
        let tokens = self.tokens.read().await;
        Ok(tokens
            .get(grove)
            .and_then(|holders| holders.get(holder))
            .copied()
            .unwrap_or(0))
    }

    async fn get_all_holders_with_balance(
        &self,
        grove: &GroveId,
    ) -> Result<Vec<(AccountId, u64)>, EngineError> {
        let tokens = self.tokens.read().await;
        Ok(tokens
            .get(grove)
            .map(|holders| {
                holders
                    .iter()
                    .filter(|(_, balance)| **balance > 0)
                    .map(|(holder, balance)| (holder.clone(), *balance))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_total_circulating_tokens(&self, grove: &GroveId) -> Result<u64, EngineError> {
        let tokens = self.tokens.read().await;
        let Some(holders) = tokens.get(grove) else {
            return Ok(0);
        };
        holders.values().try_fold(0u64, |total, balance| {
            total.checked_add(*balance).ok_or(EngineError::Overflow)
        })
    }

    async fn get_payment_balance(
        &self,
        holder: &AccountId,
        asset: &str,
    ) -> Result<u64, EngineError> {
        let payments = self.payments.read().await;
        Ok(payments
            .get(&(holder.clone(), asset.to_string()))
            .copied()
            .unwrap_or(0))
    }
}

/// In-memory grove and harvest registry.
#[derive(Default)]
pub struct MemoryGroveRegistry {
    groves: RwLock<HashMap<GroveId, Grove>>,
    harvests: RwLock<HashMap<HarvestId, HarvestRecord>>,
}

impl MemoryGroveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_grove(&self, grove: Grove) -> Result<(), EngineError> {
        if grove.total_supply == 0 {
            return Err(EngineError::invalid("grove supply must be positive"));
        }
        let mut groves = self.groves.write().await;
        if groves.contains_key(&grove.id) {
            return Err(EngineError::invalid(format!(
                "grove {} already registered",
                grove.id
            )));
        }
        groves.insert(grove.id.clone(), grove);
        Ok(())
    }

    /// Report a harvest. Harvest records are immutable once reported.
    pub async fn add_harvest(&self, harvest: HarvestRecord) -> Result<(), EngineError> {
        harvest.validate()?;
        if !self.groves.read().await.contains_key(&harvest.grove_id) {
            return Err(EngineError::GroveNotFound(harvest.grove_id));
        }
        let mut harvests = self.harvests.write().await;
        if harvests.contains_key(&harvest.id) {
            return Err(EngineError::invalid(format!(
                "harvest {} already reported",
                harvest.id
            )));
        }
        harvests.insert(harvest.id.clone(), harvest);
        Ok(())
    }
}

#[async_trait]
impl GroveRegistry for MemoryGroveRegistry {
    async fn get_harvest(
        &self,
        harvest_id: &HarvestId,
    ) -> Result<Option<HarvestRecord>, EngineError> {
        Ok(self.harvests.read().await.get(harvest_id).cloned())
    }

    async fn get_grove(&self, grove_id: &GroveId) -> Result<Option<Grove>, EngineError> {
        Ok(self.groves.read().await.get(grove_id).cloned())
    }
}

/// Idempotent in-memory transfer layer.
///
/// Each key is accepted once; retries get the original ticket back. Keys can
/// be made to fail to simulate an outage of the settlement layer.
pub struct MemoryTransferSink {
    tickets: DashMap<IdempotencyKey, TransferTicket>,
    accepted: DashMap<IdempotencyKey, TransferRequest>,
    failing: DashSet<IdempotencyKey>,
    offline: AtomicBool,
    auto_settle: AtomicBool,
    sequence: AtomicU64,
    calls: AtomicUsize,
    holdings: Option<Arc<MemoryHoldings>>,
}

impl Default for MemoryTransferSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransferSink {
    pub fn new() -> Self {
        Self {
            tickets: DashMap::new(),
            accepted: DashMap::new(),
            failing: DashSet::new(),
            offline: AtomicBool::new(false),
            auto_settle: AtomicBool::new(true),
            sequence: AtomicU64::new(0),
            calls: AtomicUsize::new(0),
            holdings: None,
        }
    }

    /// Sink that moves balances in `holdings` for every accepted request.
    pub fn settling_into(holdings: Arc<MemoryHoldings>) -> Self {
        Self {
            holdings: Some(holdings),
            ..Self::new()
        }
    }

    /// Make every request for `key` fail until [`Self::heal`] is called.
    pub fn fail_key(&self, key: IdempotencyKey) {
        self.failing.insert(key);
    }

    pub fn heal(&self, key: &IdempotencyKey) {
        self.failing.remove(key);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// When disabled, tickets are returned `Pending` and the outcome is
    /// reported later through the engine callback.
    pub fn set_auto_settle(&self, auto_settle: bool) {
        self.auto_settle.store(auto_settle, Ordering::SeqCst);
    }

    /// Number of distinct keys executed.
    pub fn executed_count(&self) -> usize {
        self.accepted.len()
    }

    /// Number of calls received, retries included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn executed(&self, key: &IdempotencyKey) -> Option<TransferRequest> {
        self.accepted.get(key).map(|entry| entry.value().clone())
    }

    pub fn executed_requests(&self) -> Vec<TransferRequest> {
        let mut requests: Vec<(u64, TransferRequest)> = self
            .accepted
            .iter()
            .filter_map(|entry| {
                self.tickets
                    .get(entry.key())
                    .map(|ticket| (ticket.sequence, entry.value().clone()))
            })
            .collect();
        requests.sort_by_key(|(sequence, _)| *sequence);
        requests.into_iter().map(|(_, request)| request).collect()
    }
}

#[async_trait]
impl TransferSink for MemoryTransferSink {
    async fn request_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<TransferTicket, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.offline.load(Ordering::SeqCst) || self.failing.contains(&request.key) {
            warn!("Transfer {} rejected by settlement layer", request.key);
            return Err(EngineError::Transfer(format!(
                "settlement layer unavailable for {}",
                request.key
            )));
        }

        let ticket = match self.tickets.entry(request.key.clone()) {
            Entry::Occupied(entry) => {
                trace!("Transfer {} already accepted, returning ticket", request.key);
                return Ok(entry.get().clone());
            }
            Entry::Vacant(entry) => {
                let status = if self.auto_settle.load(Ordering::SeqCst) {
                    TransferStatus::Settled
                } else {
                    TransferStatus::Pending
                };
                let ticket = TransferTicket {
                    key: request.key.clone(),
                    status,
                    sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
                };
                entry.insert(ticket.clone());
                ticket
            }
        };

        if let Some(holdings) = &self.holdings {
            if let Err(e) = holdings.apply_transfer(request).await {
                // Let a later retry of the same key run again
                self.tickets.remove(&request.key);
                return Err(EngineError::Transfer(e.to_string()));
            }
        }

        self.accepted.insert(request.key.clone(), request.clone());
        debug!(
            "Transfer {} accepted: {} {:?} from {} to {}",
            request.key, request.amount, request.asset, request.from, request.to
        );
        Ok(ticket)
    }
}
