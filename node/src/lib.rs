pub mod api;
pub mod cache;
pub mod config;
pub mod drainer;
pub mod error;
pub mod ledger;
pub mod queue;
pub mod registry;
pub mod storage;
pub mod sync;
pub mod telemetry;
pub mod transaction;

mod service;

pub use service::{ForgeOutcome, NodeHandle, NodeService, NodeStatus, SyncReport};
