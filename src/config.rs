use std::time::Duration;

use crate::error::{AppError, Result};
use crate::types::{QueryCriteria, TradeType};

pub const P2P_API_URL: &str = "https://p2p.binance.com/bapi/c2c/v2/friendly/c2c/adv/search";

/// Bounded wait for one marketplace call; a slower call is surfaced as a timeout.
pub const FETCH_TIMEOUT_SECS: u64 = 15;

/// Auto-refresh interval used until the operator picks another one.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 10;

/// The marketplace never returns more than this many listings per page.
pub const MAX_ROWS: u32 = 20;

/// Countdown granularity of the refresh scheduler.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Channel capacity for commands and fetch outcomes.
pub const CHANNEL_CAPACITY: usize = 64;

/// `advertiser.userType` value that marks a merchant.
pub const MERCHANT_USER_TYPE: &str = "merchant";

pub mod catalog {
    pub const PAYMENT_METHODS: &[&str] = &[
        "Monobank",
        "PrivatBank",
        "PUMBBank",
        "ABank",
        "RaiffeisenBankAval",
        "UniversalBank",
        "BankVlasnyiRakhunok",
        "Kredobank",
        "OTPBank",
        "SportBank",
        "Visa/MasterCard",
        "Cash",
    ];

    pub const ASSETS: &[&str] = &["USDT", "BTC", "USDC", "BNB", "ETH", "SOL"];

    pub const FIAT_CURRENCIES: &[&str] = &["UAH"];
}

#[derive(Debug, Clone)]
pub struct Config {
    pub p2p_api_url: String,
    pub log_level: String,
    pub api_port: u16,
    /// Criteria the controller starts with (DEFAULT_ASSET, DEFAULT_FIAT, ...)
    pub criteria: QueryCriteria,
    /// REFRESH_INTERVAL_SECS; 0 disables auto-refresh
    pub refresh_interval_secs: u64,
    /// Start the countdown immediately (AUTO_REFRESH=true)
    pub auto_refresh: bool,
    /// ALERT_THRESHOLD; unset disables alerting
    pub alert_threshold: Option<f64>,
    /// Ring the terminal bell on alerts (ALERT_SOUND, default true)
    pub alert_sound: bool,
    pub fetch_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            p2p_api_url: P2P_API_URL.to_string(),
            log_level: "info".to_string(),
            api_port: 3000,
            criteria: QueryCriteria::default(),
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            auto_refresh: false,
            alert_threshold: None,
            alert_sound: true,
            fetch_timeout: Duration::from_secs(FETCH_TIMEOUT_SECS),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let trade_type = match std::env::var("DEFAULT_TRADE_TYPE") {
            Ok(s) => s.parse::<TradeType>().map_err(AppError::Config)?,
            Err(_) => TradeType::Buy,
        };

        let criteria = QueryCriteria {
            asset: std::env::var("DEFAULT_ASSET").unwrap_or_else(|_| "USDT".to_string()),
            fiat: std::env::var("DEFAULT_FIAT").unwrap_or_else(|_| "UAH".to_string()),
            trade_type,
            pay_types: std::env::var("PAY_TYPES")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            rows: std::env::var("DEFAULT_ROWS")
                .unwrap_or_else(|_| MAX_ROWS.to_string())
                .parse::<u32>()
                .map_err(|_| {
                    AppError::Config("DEFAULT_ROWS must be a positive integer".to_string())
                })?,
            ..QueryCriteria::default()
        };
        criteria.validate()?;

        Ok(Self {
            p2p_api_url: std::env::var("P2P_API_URL").unwrap_or_else(|_| P2P_API_URL.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            criteria,
            refresh_interval_secs: std::env::var("REFRESH_INTERVAL_SECS")
                .unwrap_or_else(|_| DEFAULT_REFRESH_INTERVAL_SECS.to_string())
                .parse::<u64>()
                .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS),
            auto_refresh: std::env::var("AUTO_REFRESH")
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(false),
            alert_threshold: match std::env::var("ALERT_THRESHOLD") {
                Ok(v) => Some(parse_threshold(&v)?),
                Err(_) => None,
            },
            alert_sound: std::env::var("ALERT_SOUND")
                .map(|v| !matches!(v.trim(), "0" | "false" | "no"))
                .unwrap_or(true),
            fetch_timeout: Duration::from_secs(
                std::env::var("FETCH_TIMEOUT_SECS")
                    .unwrap_or_else(|_| FETCH_TIMEOUT_SECS.to_string())
                    .parse::<u64>()
                    .unwrap_or(FETCH_TIMEOUT_SECS),
            ),
        })
    }
}

/// Alert thresholds are prices: finite and not negative.
fn parse_threshold(raw: &str) -> Result<f64> {
    match raw.trim().parse::<f64>() {
        Ok(t) if t.is_finite() && t >= 0.0 => Ok(t),
        _ => Err(AppError::Config(format!(
            "ALERT_THRESHOLD must be a finite, non-negative number, got {raw:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_accepts_plain_prices() {
        assert_eq!(parse_threshold("41.25").unwrap(), 41.25);
        assert_eq!(parse_threshold(" 0 ").unwrap(), 0.0);
    }

    #[test]
    fn threshold_rejects_non_finite_and_negative() {
        for raw in ["NaN", "inf", "-inf", "-1", "cheap", ""] {
            assert!(
                matches!(parse_threshold(raw), Err(AppError::Config(_))),
                "{raw:?} should be rejected"
            );
        }
    }
}
