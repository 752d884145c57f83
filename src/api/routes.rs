use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};

use crate::api::health::HealthState;
use crate::api::latency::{LatencyStats, LatencySummary};
use crate::config::catalog;
use crate::error::AppError;
use crate::types::{AlertConfig, BookView, ControlMsg, QueryCriteria, SortKey};

#[derive(Clone)]
pub struct ApiState {
    pub view_rx: watch::Receiver<BookView>,
    pub control_tx: mpsc::Sender<ControlMsg>,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
}

impl ApiState {
    async fn send(&self, msg: ControlMsg) -> Result<(), AppError> {
        self.control_tx
            .send(msg)
            .await
            .map_err(|e| AppError::ChannelSend(e.to_string()))
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/book", get(get_book))
        .route("/catalog", get(get_catalog))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .route("/search", post(post_search))
        .route("/criteria", put(put_criteria))
        .route("/sort", post(post_sort))
        .route("/refresh/start", post(post_refresh_start))
        .route("/refresh/stop", post(post_refresh_stop))
        .route("/refresh/interval", put(put_refresh_interval))
        .route("/alert", put(put_alert))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct SortBody {
    pub key: SortKey,
}

#[derive(Deserialize, Default)]
pub struct StartRefreshBody {
    pub interval_secs: Option<u64>,
}

#[derive(Deserialize)]
pub struct IntervalBody {
    pub seconds: i64,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub cycles_started: u64,
    pub cycles_discarded: u64,
    pub fetch_failures: u64,
    pub last_success_at_ns: Option<u64>,
    pub last_error_at_ns: Option<u64>,
    pub auto_refresh: bool,
}

#[derive(Serialize)]
pub struct CatalogResponse {
    pub payment_methods: &'static [&'static str],
    pub assets: &'static [&'static str],
    pub fiat_currencies: &'static [&'static str],
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_book(State(state): State<ApiState>) -> Json<BookView> {
    Json(state.view_rx.borrow().clone())
}

async fn get_catalog() -> Json<CatalogResponse> {
    Json(CatalogResponse {
        payment_methods: catalog::PAYMENT_METHODS,
        assets: catalog::ASSETS,
        fiat_currencies: catalog::FIAT_CURRENCIES,
    })
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let (status, refresh) = {
        let view = state.view_rx.borrow();
        (view.snapshot.status, view.refresh)
    };
    let nonzero = |v: u64| (v > 0).then_some(v);
    Json(HealthResponse {
        status: status.to_string(),
        cycles_started: state.health.cycles_started(),
        cycles_discarded: state.health.cycles_discarded(),
        fetch_failures: state.health.fetch_failures(),
        last_success_at_ns: nonzero(state.health.last_success_at_ns()),
        last_error_at_ns: nonzero(state.health.last_error_at_ns()),
        auto_refresh: refresh.is_running && refresh.interval_secs > 0,
    })
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencySummary> {
    Json(state.latency.summary())
}

async fn post_search(State(state): State<ApiState>) -> Result<StatusCode, AppError> {
    state.send(ControlMsg::Search).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn put_criteria(
    State(state): State<ApiState>,
    Json(criteria): Json<QueryCriteria>,
) -> Result<StatusCode, AppError> {
    let (reply_tx, reply_rx) = oneshot::channel();
    state.send(ControlMsg::UpdateCriteria(criteria, reply_tx)).await?;
    let verdict = reply_rx
        .await
        .map_err(|e| AppError::ChannelSend(e.to_string()))?;
    verdict?;
    Ok(StatusCode::NO_CONTENT)
}

async fn post_sort(
    State(state): State<ApiState>,
    Json(body): Json<SortBody>,
) -> Result<StatusCode, AppError> {
    state.send(ControlMsg::SelectSort(body.key)).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn post_refresh_start(
    State(state): State<ApiState>,
    body: Option<Json<StartRefreshBody>>,
) -> Result<StatusCode, AppError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    state.send(ControlMsg::StartRefresh(body.interval_secs)).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn post_refresh_stop(State(state): State<ApiState>) -> Result<StatusCode, AppError> {
    state.send(ControlMsg::StopRefresh).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn put_refresh_interval(
    State(state): State<ApiState>,
    Json(body): Json<IntervalBody>,
) -> Result<StatusCode, AppError> {
    state.send(ControlMsg::SetInterval(body.seconds)).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn put_alert(
    State(state): State<ApiState>,
    Json(alert): Json<AlertConfig>,
) -> Result<StatusCode, AppError> {
    state.send(ControlMsg::SetAlert(alert)).await?;
    Ok(StatusCode::ACCEPTED)
}
