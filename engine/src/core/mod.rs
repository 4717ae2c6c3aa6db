pub mod distribution;
pub mod engine;
pub mod external;
pub mod ledger;
pub mod matcher;
pub mod registry;
pub mod storage;
pub mod transfers;

mod withdrawal;

pub use engine::GroveEngine;
