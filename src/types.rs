use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::config::MAX_ROWS;
use crate::error::CriteriaError;

// ---------------------------------------------------------------------------
// Query criteria
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeType {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TradeType::Buy => "BUY",
            TradeType::Sell => "SELL",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TradeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(TradeType::Buy),
            "SELL" => Ok(TradeType::Sell),
            other => Err(format!("unknown trade type `{other}`, expected BUY or SELL")),
        }
    }
}

/// What to ask the marketplace for, plus the local filters applied afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCriteria {
    pub asset: String,
    pub fiat: String,
    pub trade_type: TradeType,
    /// Empty means "any method"; the field is then left out of the request.
    #[serde(default)]
    pub pay_types: Vec<String>,
    pub rows: u32,
    #[serde(default)]
    pub amount_min: Option<f64>,
    #[serde(default)]
    pub amount_max: Option<f64>,
    #[serde(default)]
    pub merchant_only: bool,
}

impl Default for QueryCriteria {
    fn default() -> Self {
        Self {
            asset: "USDT".to_string(),
            fiat: "UAH".to_string(),
            trade_type: TradeType::Buy,
            pay_types: Vec::new(),
            rows: MAX_ROWS,
            amount_min: None,
            amount_max: None,
            merchant_only: false,
        }
    }
}

impl QueryCriteria {
    /// Rejects criteria that must never reach the marketplace. Inverted amount
    /// windows are refused rather than clamped.
    pub fn validate(&self) -> Result<(), CriteriaError> {
        if self.asset.trim().is_empty() {
            return Err(CriteriaError::Blank("asset"));
        }
        if self.fiat.trim().is_empty() {
            return Err(CriteriaError::Blank("fiat"));
        }
        if self.rows == 0 || self.rows > MAX_ROWS {
            return Err(CriteriaError::RowsOutOfRange {
                got: self.rows,
                max: MAX_ROWS,
            });
        }
        let bounds = [
            ("amount_min", self.amount_min),
            ("amount_max", self.amount_max),
        ];
        for (name, bound) in bounds {
            if let Some(v) = bound {
                if !v.is_finite() || v < 0.0 {
                    return Err(CriteriaError::InvalidAmount(name));
                }
            }
        }
        if let (Some(min), Some(max)) = (self.amount_min, self.amount_max) {
            if min > max {
                return Err(CriteriaError::InvertedAmountRange { min, max });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Normalized listing
// ---------------------------------------------------------------------------

/// One listing in canonical shape. Built fresh by every pipeline run and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdRecord {
    pub id: String,
    pub price: f64,
    pub fiat: String,
    pub asset: String,
    pub min_fiat: f64,
    /// Dynamic upper limit when the marketplace reports one, static otherwise.
    pub max_fiat: f64,
    pub available_asset: f64,
    pub pay_methods: Vec<String>,
    pub seller_name: String,
    pub is_merchant: bool,
    pub month_order_count: Option<f64>,
    /// Fraction in [0, 1].
    pub month_finish_rate: Option<f64>,
    pub is_promoted: bool,
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Price,
    Amount,
    Merchant,
    Completion,
    Orders,
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SortKey::Price => "price",
            SortKey::Amount => "amount",
            SortKey::Merchant => "merchant",
            SortKey::Completion => "completion",
            SortKey::Orders => "orders",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortConfig {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            key: SortKey::Price,
            direction: SortDirection::Asc,
        }
    }
}

impl SortConfig {
    /// Column-header behaviour: picking the active key again flips the direction,
    /// picking another key starts ascending.
    pub fn select(self, key: SortKey) -> Self {
        let direction = if self.key == key && self.direction == SortDirection::Asc {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        Self { key, direction }
    }
}

// ---------------------------------------------------------------------------
// Refresh + alert state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshState {
    pub interval_secs: u64,
    pub is_running: bool,
    pub seconds_remaining: u64,
    /// Nanosecond UTC epoch of the last snapshot that made it to the screen.
    pub last_updated_at_ns: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Unset disables alerting.
    pub threshold_price: Option<f64>,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    Idle,
    Loading,
    Ready,
    Error,
}

impl std::fmt::Display for SnapshotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SnapshotStatus::Idle => "idle",
            SnapshotStatus::Loading => "loading",
            SnapshotStatus::Ready => "ready",
            SnapshotStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Result of one pipeline cycle. Each completed cycle replaces the previous
/// snapshot wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub records: Vec<AdRecord>,
    pub status: SnapshotStatus,
    pub error_message: Option<String>,
    /// The price alert fired on this cycle's records.
    pub alert_triggered: bool,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            status: SnapshotStatus::Idle,
            error_message: None,
            alert_triggered: false,
        }
    }
}

impl Snapshot {
    pub fn ready(records: Vec<AdRecord>, alert_triggered: bool) -> Self {
        Self {
            records,
            status: SnapshotStatus::Ready,
            error_message: None,
            alert_triggered,
        }
    }

    pub fn failed(message: String) -> Self {
        Self {
            records: Vec::new(),
            status: SnapshotStatus::Error,
            error_message: Some(message),
            alert_triggered: false,
        }
    }

    /// Status to fall back to when a pending cycle is abandoned.
    pub fn settled_status(&self, ever_completed: bool) -> SnapshotStatus {
        if self.error_message.is_some() {
            SnapshotStatus::Error
        } else if ever_completed {
            SnapshotStatus::Ready
        } else {
            SnapshotStatus::Idle
        }
    }
}

/// Footer figures for the current snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BookSummary {
    pub count: usize,
    pub merchant_count: usize,
    pub average_price: Option<f64>,
    pub best_price: Option<f64>,
}

impl BookSummary {
    pub fn from_records(records: &[AdRecord]) -> Self {
        let count = records.len();
        let merchant_count = records.iter().filter(|r| r.is_merchant).count();
        let average_price = (count > 0)
            .then(|| records.iter().map(|r| r.price).sum::<f64>() / count as f64);
        let best_price = records
            .iter()
            .map(|r| r.price)
            .min_by(|a, b| a.total_cmp(b));
        Self {
            count,
            merchant_count,
            average_price,
            best_price,
        }
    }
}

/// Everything the presentation layer needs, published after every state change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookView {
    pub snapshot: Snapshot,
    pub summary: BookSummary,
    pub refresh: RefreshState,
    pub criteria: QueryCriteria,
    pub sort: SortConfig,
    pub alert: AlertConfig,
}

impl Default for RefreshState {
    fn default() -> Self {
        Self {
            interval_secs: crate::config::DEFAULT_REFRESH_INTERVAL_SECS,
            is_running: false,
            seconds_remaining: crate::config::DEFAULT_REFRESH_INTERVAL_SECS,
            last_updated_at_ns: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Channel message types
// ---------------------------------------------------------------------------

/// Inbound commands from the presentation layer to the controller.
#[derive(Debug)]
pub enum ControlMsg {
    /// Run one cycle now, independent of the countdown.
    Search,
    /// Replace the criteria; the reply carries the validation verdict.
    UpdateCriteria(QueryCriteria, oneshot::Sender<Result<(), CriteriaError>>),
    SelectSort(SortKey),
    /// Start (or re-arm) auto-refresh, optionally with a new interval.
    StartRefresh(Option<u64>),
    StopRefresh,
    SetInterval(i64),
    SetAlert(AlertConfig),
}
