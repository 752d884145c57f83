//! Gateway round-trip times, measured from cycle start until the marketplace
//! answers or the fetch deadline fires.

use std::sync::Mutex;
use std::time::Duration;

use hdrhistogram::Histogram;
use serde::Serialize;

use crate::error::{AppError, Result};

const FLOOR_US: u64 = 1;
/// Well above any sane fetch timeout.
const CEILING_US: u64 = 120_000_000;
const SIGNIFICANT_DIGITS: u8 = 3;

/// Served as-is by `GET /stats/latency`. Percentiles are absent until the
/// first cycle finishes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencySummary {
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub max_ms: Option<f64>,
    pub sample_count: u64,
}

pub struct LatencyStats {
    round_trips: Mutex<Histogram<u64>>,
}

impl LatencyStats {
    pub fn new() -> Result<Self> {
        let round_trips = Histogram::new_with_bounds(FLOOR_US, CEILING_US, SIGNIFICANT_DIGITS)
            .map_err(|e| AppError::Config(format!("latency histogram: {e:?}")))?;
        Ok(Self {
            round_trips: Mutex::new(round_trips),
        })
    }

    pub fn record(&self, elapsed: Duration) {
        let us = u64::try_from(elapsed.as_micros()).unwrap_or(CEILING_US);
        if let Ok(mut h) = self.round_trips.lock() {
            h.saturating_record(us.clamp(FLOOR_US, CEILING_US));
        }
    }

    pub fn summary(&self) -> LatencySummary {
        let empty = LatencySummary {
            p50_ms: None,
            p95_ms: None,
            p99_ms: None,
            max_ms: None,
            sample_count: 0,
        };
        let Ok(h) = self.round_trips.lock() else {
            return empty;
        };
        if h.is_empty() {
            return empty;
        }
        let ms = |us: u64| Some(us as f64 / 1000.0);
        LatencySummary {
            p50_ms: ms(h.value_at_quantile(0.50)),
            p95_ms: ms(h.value_at_quantile(0.95)),
            p99_ms: ms(h.value_at_quantile(0.99)),
            max_ms: ms(h.max()),
            sample_count: h.len(),
        }
    }
}
