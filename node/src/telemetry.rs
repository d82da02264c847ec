use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;
use serde::Serialize;

use crate::sync::PeerFailure;

#[derive(Debug)]
pub struct Telemetry {
    start: Instant,
    committed: AtomicU64,
    deferred: AtomicU64,
    rejected: AtomicU64,
    chain_replacements: AtomicU64,
    sync_failures: AtomicU64,
    broadcast_failures: AtomicU64,
    ledger_height: AtomicU64,
    last_failures: RwLock<Vec<PeerFailure>>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            committed: AtomicU64::new(0),
            deferred: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            chain_replacements: AtomicU64::new(0),
            sync_failures: AtomicU64::new(0),
            broadcast_failures: AtomicU64::new(0),
            ledger_height: AtomicU64::new(0),
            last_failures: RwLock::new(Vec::new()),
        }
    }

    pub fn record_commit(&self, height: usize) {
        self.committed.fetch_add(1, Ordering::Relaxed);
        self.set_height(height);
    }

    pub fn record_deferred(&self) {
        self.deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_replacement(&self, height: usize) {
        self.chain_replacements.fetch_add(1, Ordering::Relaxed);
        self.set_height(height);
    }

    pub fn record_sync_failures(&self, failures: &[PeerFailure]) {
        self.sync_failures.fetch_add(1, Ordering::Relaxed);
        *self.last_failures.write() = failures.to_vec();
    }

    pub fn record_broadcast_failures(&self, count: usize) {
        self.broadcast_failures
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn set_height(&self, height: usize) {
        self.ledger_height.store(height as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            uptime_secs: self.start.elapsed().as_secs(),
            committed: self.committed.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            chain_replacements: self.chain_replacements.load(Ordering::Relaxed),
            sync_failures: self.sync_failures.load(Ordering::Relaxed),
            broadcast_failures: self.broadcast_failures.load(Ordering::Relaxed),
            ledger_height: self.ledger_height.load(Ordering::Relaxed),
            last_sync_failures: self.last_failures.read().clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct TelemetrySnapshot {
    pub uptime_secs: u64,
    pub committed: u64,
    pub deferred: u64,
    pub rejected: u64,
    pub chain_replacements: u64,
    pub sync_failures: u64,
    pub broadcast_failures: u64,
    pub ledger_height: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub last_sync_failures: Vec<PeerFailure>,
}
