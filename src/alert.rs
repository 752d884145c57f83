//! Price alert: fires a best-effort notification whenever a cycle's listings
//! reach the configured threshold. Every qualifying cycle fires again; there
//! is no de-duplication across cycles.

use std::io::Write;

use tracing::{info, warn};

use crate::error::NotificationError;
use crate::types::{AdRecord, AlertConfig};

/// True when a threshold is set and at least one listing is priced at or below it.
pub fn check_alert(records: &[AdRecord], config: &AlertConfig) -> bool {
    match config.threshold_price {
        Some(threshold) => records.iter().any(|r| r.price <= threshold),
        None => false,
    }
}

/// What the notifier is told about a triggered alert.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceAlert {
    pub threshold: f64,
    pub best_price: f64,
    pub seller_name: String,
    pub matching: usize,
}

pub trait Notifier: Send {
    fn notify(&mut self, alert: &PriceAlert) -> Result<(), NotificationError>;
}

/// Rings the terminal bell.
#[derive(Debug, Default)]
pub struct TerminalBell;

impl Notifier for TerminalBell {
    fn notify(&mut self, _alert: &PriceAlert) -> Result<(), NotificationError> {
        let mut out = std::io::stdout().lock();
        out.write_all(b"\x07")?;
        out.flush()?;
        Ok(())
    }
}

/// Silent notifier for headless runs (ALERT_SOUND=false); the watcher still logs.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, _alert: &PriceAlert) -> Result<(), NotificationError> {
        Ok(())
    }
}

pub struct PriceAlertWatcher {
    notifier: Box<dyn Notifier>,
}

impl PriceAlertWatcher {
    pub fn new(notifier: Box<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Evaluate one cycle's records. Notification failures are logged and
    /// swallowed; the return value only reflects the price condition.
    pub fn evaluate(&mut self, records: &[AdRecord], config: &AlertConfig) -> bool {
        let Some(threshold) = config.threshold_price else {
            return false;
        };
        if !check_alert(records, config) {
            return false;
        }

        let matching = records.iter().filter(|r| r.price <= threshold).count();
        let Some(best) = records.iter().min_by(|a, b| a.price.total_cmp(&b.price)) else {
            return false;
        };
        let alert = PriceAlert {
            threshold,
            best_price: best.price,
            seller_name: best.seller_name.clone(),
            matching,
        };

        info!(
            threshold = alert.threshold,
            best_price = alert.best_price,
            seller = %alert.seller_name,
            matching = alert.matching,
            "PRICE ALERT | best {:.2} <= threshold {:.2} ({} listings)",
            alert.best_price, alert.threshold, alert.matching,
        );

        if let Err(e) = self.notifier.notify(&alert) {
            warn!("Price alert notification failed: {e}");
        }
        true
    }
}
