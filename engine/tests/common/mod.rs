#![allow(dead_code)]

use std::sync::Arc;

use grove_common::{
    error::EngineError,
    types::{AccountId, Grove, GroveId, HarvestId, HarvestRecord},
};
use grove_engine::{
    clock::{Clock, ManualClock},
    config::EngineConfig,
    core::{
        external::{MemoryGroveRegistry, MemoryHoldings, MemoryTransferSink},
        storage::MemoryStorage,
    },
    GroveApi, GroveEngine,
};

pub const GROVE: &str = "G1";
pub const FARMER: &str = "farmer";
pub const ADMIN: &str = "admin";
pub const PAYMENT: &str = "USDC";
pub const START: u64 = 1_700_000_000;

pub struct Harness {
    pub engine: Arc<GroveEngine<MemoryStorage>>,
    pub storage: Arc<MemoryStorage>,
    pub holdings: Arc<MemoryHoldings>,
    pub registry: Arc<MemoryGroveRegistry>,
    pub sink: Arc<MemoryTransferSink>,
    pub clock: Arc<ManualClock>,
}

pub fn account(name: &str) -> AccountId {
    AccountId::from(name)
}

pub fn grove() -> GroveId {
    GroveId::from(GROVE)
}

pub fn harvest(id: &str) -> HarvestId {
    HarvestId::from(id)
}

pub fn default_config() -> EngineConfig {
    EngineConfig {
        admins: vec![account(ADMIN)],
        ..Default::default()
    }
}

impl Harness {
    /// Engine over in-memory collaborators with one grove owned by `FARMER`.
    pub async fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let storage = Arc::new(MemoryStorage::new());
        let holdings = Arc::new(MemoryHoldings::new());
        let registry = Arc::new(MemoryGroveRegistry::new());
        let sink = Arc::new(MemoryTransferSink::settling_into(holdings.clone()));
        let clock = Arc::new(ManualClock::new(START));

        registry
            .add_grove(Grove {
                id: grove(),
                name: "Sunrise Estate".to_string(),
                owner: account(FARMER),
                total_supply: 1_000_000,
                price_per_token: 100,
            })
            .await?;
        // The reserve holds every deposit until it is paid out
        holdings
            .set_payment_balance(&config.reserve_account, PAYMENT, u64::MAX / 2)
            .await;

        let engine = Arc::new(GroveEngine::new(
            config,
            storage.clone(),
            holdings.clone(),
            registry.clone(),
            sink.clone(),
            clock.clone(),
        )?);
        Ok(Self {
            engine,
            storage,
            holdings,
            registry,
            sink,
            clock,
        })
    }

    pub async fn with_defaults() -> Result<Self, EngineError> {
        Self::new(default_config()).await
    }

    pub fn api(&self) -> GroveApi<MemoryStorage> {
        GroveApi::new(self.engine.clone())
    }

    pub async fn report_harvest(&self, id: &str, yield_quantity: u64, unit_price: u64) -> Result<(), EngineError> {
        self.registry
            .add_harvest(HarvestRecord {
                id: harvest(id),
                grove_id: grove(),
                yield_quantity,
                quality_grade: 85,
                unit_price,
                reported_at: self.clock.now(),
            })
            .await
    }

    pub async fn set_holders(&self, balances: &[(&str, u64)]) {
        for (holder, balance) in balances {
            self.holdings
                .set_balance(&grove(), &account(holder), *balance)
                .await;
        }
    }

    pub async fn fund(&self, buyer: &str, amount: u64) {
        self.holdings
            .set_payment_balance(&account(buyer), PAYMENT, amount)
            .await;
    }

    /// Deposit `amount` for a freshly reported harvest.
    pub async fn deposit(&self, id: &str, amount: u64) -> Result<(), EngineError> {
        self.report_harvest(id, amount, 1).await?;
        self.engine
            .deposit_harvest_revenue(&account(FARMER), &grove(), &harvest(id), amount)
            .await?;
        Ok(())
    }
}
