// Revenue distribution and marketplace settlement engine for tokenized groves.

extern crate log;

pub mod clock;
pub mod config;
pub mod core;
pub mod rpc;

pub use crate::core::GroveEngine;
pub use rpc::{ApiRequest, GroveApi};
