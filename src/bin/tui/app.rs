use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// API response types (mirror the service's BookView)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct AdResponse {
    pub id: String,
    pub price: f64,
    pub fiat: String,
    pub asset: String,
    pub min_fiat: f64,
    pub max_fiat: f64,
    pub available_asset: f64,
    pub pay_methods: Vec<String>,
    pub seller_name: String,
    pub is_merchant: bool,
    pub month_order_count: Option<f64>,
    pub month_finish_rate: Option<f64>,
    pub is_promoted: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SnapshotResponse {
    pub records: Vec<AdResponse>,
    pub status: String,
    pub error_message: Option<String>,
    pub alert_triggered: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SummaryResponse {
    pub count: usize,
    pub merchant_count: usize,
    pub average_price: Option<f64>,
    pub best_price: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RefreshResponse {
    pub interval_secs: u64,
    pub is_running: bool,
    pub seconds_remaining: u64,
    pub last_updated_at_ns: Option<u64>,
}

/// Sent back whole through PUT /criteria after a single field is changed.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CriteriaBody {
    pub asset: String,
    pub fiat: String,
    pub trade_type: String,
    #[serde(default)]
    pub pay_types: Vec<String>,
    pub rows: u32,
    pub amount_min: Option<f64>,
    pub amount_max: Option<f64>,
    #[serde(default)]
    pub merchant_only: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SortResponse {
    pub key: String,
    pub direction: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AlertResponse {
    pub threshold_price: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BookResponse {
    pub snapshot: SnapshotResponse,
    pub summary: SummaryResponse,
    pub refresh: RefreshResponse,
    pub criteria: CriteriaBody,
    pub sort: SortResponse,
    pub alert: AlertResponse,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CatalogResponse {
    pub payment_methods: Vec<String>,
    pub assets: Vec<String>,
    pub fiat_currencies: Vec<String>,
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Error(String),
    Connecting,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub status: ConnectionStatus,
    pub book: BookResponse,
    pub catalog: CatalogResponse,
    pub base_url: String,
}

impl AppState {
    pub fn new(base_url: String) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            book: BookResponse::default(),
            catalog: CatalogResponse::default(),
            base_url,
        }
    }

    pub async fn load_catalog(&mut self, client: &reqwest::Client) {
        let url = format!("{}/catalog", self.base_url);
        if let Ok(resp) = client.get(&url).send().await {
            if let Ok(catalog) = resp.json::<CatalogResponse>().await {
                self.catalog = catalog;
            }
        }
    }

    pub async fn refresh(&mut self, client: &reqwest::Client) {
        let url = format!("{}/book", self.base_url);
        match client.get(&url).send().await {
            Ok(resp) => match resp.json::<BookResponse>().await {
                Ok(book) => {
                    self.book = book;
                    self.status = ConnectionStatus::Connected;
                }
                Err(e) => self.status = ConnectionStatus::Error(format!("parse error: {e}")),
            },
            Err(e) => self.status = ConnectionStatus::Error(format!("{e}")),
        }
    }

    /// Refresh after a command without hiding the command's own error.
    pub async fn refresh_keeping_error(&mut self, client: &reqwest::Client) {
        let prior = self.status.clone();
        self.refresh(client).await;
        let had_error = matches!(prior, ConnectionStatus::Error(_));
        if had_error && self.status == ConnectionStatus::Connected {
            self.status = prior;
        }
    }

    async fn post(
        &mut self,
        client: &reqwest::Client,
        path: &str,
        body: Option<serde_json::Value>,
    ) {
        let url = format!("{}{}", self.base_url, path);
        let req = client.post(&url);
        let req = match body {
            Some(b) => req.json(&b),
            None => req,
        };
        self.report(req.send().await).await;
    }

    async fn put(&mut self, client: &reqwest::Client, path: &str, body: serde_json::Value) {
        let url = format!("{}{}", self.base_url, path);
        self.report(client.put(&url).json(&body).send().await).await;
    }

    async fn report(&mut self, res: reqwest::Result<reqwest::Response>) {
        match res {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => {
                let code = resp.status();
                let text = resp.text().await.unwrap_or_default();
                self.status = ConnectionStatus::Error(format!("{code}: {text}"));
            }
            Err(e) => self.status = ConnectionStatus::Error(format!("{e}")),
        }
    }

    pub async fn search(&mut self, client: &reqwest::Client) {
        self.post(client, "/search", None).await;
    }

    pub async fn sort_by(&mut self, client: &reqwest::Client, key: &str) {
        self.post(client, "/sort", Some(serde_json::json!({ "key": key }))).await;
    }

    pub async fn toggle_auto_refresh(&mut self, client: &reqwest::Client) {
        if self.book.refresh.is_running {
            self.post(client, "/refresh/stop", None).await;
        } else {
            self.post(client, "/refresh/start", Some(serde_json::json!({}))).await;
        }
    }

    pub async fn bump_interval(&mut self, client: &reqwest::Client, delta: i64) {
        let next = self.book.refresh.interval_secs as i64 + delta;
        let body = serde_json::json!({ "seconds": next.max(0) });
        self.put(client, "/refresh/interval", body).await;
    }

    /// Switches sides only when `wanted` differs, so repeated presses stay quiet.
    pub async fn select_trade_type(&mut self, client: &reqwest::Client, wanted: &str) {
        if self.book.criteria.trade_type.eq_ignore_ascii_case(wanted) {
            return;
        }
        let mut criteria = self.book.criteria.clone();
        criteria.trade_type = wanted.to_string();
        self.put_criteria(client, criteria).await;
    }

    pub async fn cycle_asset(&mut self, client: &reqwest::Client) {
        let mut criteria = self.book.criteria.clone();
        criteria.asset = next_in(&self.catalog.assets, &criteria.asset);
        self.put_criteria(client, criteria).await;
    }

    pub async fn cycle_fiat(&mut self, client: &reqwest::Client) {
        let mut criteria = self.book.criteria.clone();
        criteria.fiat = next_in(&self.catalog.fiat_currencies, &criteria.fiat);
        self.put_criteria(client, criteria).await;
    }

    pub async fn cycle_pay_type(&mut self, client: &reqwest::Client) {
        let mut criteria = self.book.criteria.clone();
        criteria.pay_types = next_pay_filter(&self.catalog.payment_methods, &criteria.pay_types);
        self.put_criteria(client, criteria).await;
    }

    pub async fn toggle_merchant_only(&mut self, client: &reqwest::Client) {
        let mut criteria = self.book.criteria.clone();
        criteria.merchant_only = !criteria.merchant_only;
        self.put_criteria(client, criteria).await;
    }

    async fn put_criteria(&mut self, client: &reqwest::Client, criteria: CriteriaBody) {
        match serde_json::to_value(&criteria) {
            Ok(body) => self.put(client, "/criteria", body).await,
            Err(e) => self.status = ConnectionStatus::Error(format!("encode error: {e}")),
        }
    }
}

/// Next entry after `current`, wrapping; unknown or empty lists keep `current`.
pub fn next_in(options: &[String], current: &str) -> String {
    match options.iter().position(|o| o == current) {
        Some(i) => options[(i + 1) % options.len()].clone(),
        None => options.first().cloned().unwrap_or_else(|| current.to_string()),
    }
}

/// Any method, then each catalog method alone, then back to any method.
/// Unknown or multi-method filters fall back to any method.
pub fn next_pay_filter(options: &[String], current: &[String]) -> Vec<String> {
    let next = match current {
        [] => options.first(),
        [only] => options
            .iter()
            .position(|o| o == only)
            .and_then(|i| options.get(i + 1)),
        _ => None,
    };
    next.cloned().into_iter().collect()
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Two decimals with thin-space thousands grouping: `20000` → `20 000.00`.
pub fn format_amount(v: f64) -> String {
    let fixed = format!("{:.2}", v.abs());
    let (int_part, frac) = fixed.split_once('.').unwrap_or((&fixed, "00"));
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }
    let sign = if v < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac}")
}

pub fn format_completion(rate: Option<f64>) -> String {
    match rate {
        Some(r) if r > 0.0 => format!("{:.1}%", r * 100.0),
        _ => "0%".to_string(),
    }
}

pub fn format_orders(count: Option<f64>) -> String {
    match count {
        Some(c) if c > 0.0 => format!("{c:.0}"),
        _ => "0".to_string(),
    }
}

/// Convert nanosecond epoch timestamp to HH:MM:SS string.
pub fn format_time_ns(ns: u64) -> String {
    let secs = ns / 1_000_000_000;
    let h = (secs / 3600) % 24;
    let m = (secs / 60) % 60;
    let s = secs % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_are_grouped() {
        assert_eq!(format_amount(20000.0), "20 000.00");
        assert_eq!(format_amount(500.0), "500.00");
        assert_eq!(format_amount(1234567.891), "1 234 567.89");
        assert_eq!(format_amount(-1500.5), "-1 500.50");
    }

    #[test]
    fn completion_and_orders_default_to_zero() {
        assert_eq!(format_completion(Some(0.97)), "97.0%");
        assert_eq!(format_completion(None), "0%");
        assert_eq!(format_orders(Some(120.0)), "120");
        assert_eq!(format_orders(None), "0");
    }

    fn owned(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cycling_wraps_and_tolerates_unknowns() {
        let assets = owned(&["USDT", "BTC", "ETH"]);
        assert_eq!(next_in(&assets, "USDT"), "BTC");
        assert_eq!(next_in(&assets, "ETH"), "USDT");
        assert_eq!(next_in(&assets, "DOGE"), "USDT");
        assert_eq!(next_in(&[], "USDT"), "USDT");
    }

    #[test]
    fn pay_filter_steps_through_methods_then_clears() {
        let methods = owned(&["Monobank", "PrivatBank"]);
        let first = next_pay_filter(&methods, &[]);
        assert_eq!(first, owned(&["Monobank"]));
        let second = next_pay_filter(&methods, &first);
        assert_eq!(second, owned(&["PrivatBank"]));
        assert!(next_pay_filter(&methods, &second).is_empty());
    }

    #[test]
    fn pay_filter_resets_unknown_or_combined_selections() {
        let methods = owned(&["Monobank", "PrivatBank"]);
        assert!(next_pay_filter(&methods, &owned(&["Wise"])).is_empty());
        assert!(next_pay_filter(&methods, &methods).is_empty());
        assert!(next_pay_filter(&[], &[]).is_empty());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("Монобанк", 4), "Мон…");
        assert_eq!(truncate("Bob", 10), "Bob");
    }

    #[test]
    fn time_of_day_from_nanos() {
        assert_eq!(format_time_ns(3_723 * 1_000_000_000), "01:02:03");
    }
}
