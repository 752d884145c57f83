//! Shared health counters for the /health endpoint.
//! Written by the controller, read by the API.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct HealthState {
    pub cycles_started: AtomicU64,
    /// Outcomes that arrived after a newer cycle (or a stop/reconfigure) superseded them.
    pub cycles_discarded: AtomicU64,
    pub fetch_failures: AtomicU64,
    /// Nanosecond timestamp of the last applied successful fetch (0 = none).
    pub last_success_at_ns: AtomicU64,
    /// Nanosecond timestamp of the last applied failed fetch (0 = none).
    pub last_error_at_ns: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_cycles_started(&self) {
        self.cycles_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cycles_discarded(&self) {
        self.cycles_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, at_ns: u64) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
        self.last_error_at_ns.store(at_ns, Ordering::Relaxed);
    }

    pub fn record_success(&self, at_ns: u64) {
        self.last_success_at_ns.store(at_ns, Ordering::Relaxed);
    }

    pub fn cycles_started(&self) -> u64 {
        self.cycles_started.load(Ordering::Relaxed)
    }

    pub fn cycles_discarded(&self) -> u64 {
        self.cycles_discarded.load(Ordering::Relaxed)
    }

    pub fn fetch_failures(&self) -> u64 {
        self.fetch_failures.load(Ordering::Relaxed)
    }

    pub fn last_success_at_ns(&self) -> u64 {
        self.last_success_at_ns.load(Ordering::Relaxed)
    }

    pub fn last_error_at_ns(&self) -> u64 {
        self.last_error_at_ns.load(Ordering::Relaxed)
    }
}
