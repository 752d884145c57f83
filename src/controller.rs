use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::alert::PriceAlertWatcher;
use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::config::{Config, CHANNEL_CAPACITY, TICK_PERIOD};
use crate::error::{CriteriaError, GatewayError};
use crate::gateway::{MarketplaceGateway, RawListing};
use crate::pipeline::{normalize, sort_records};
use crate::refresh::RefreshScheduler;
use crate::types::{
    AdRecord, AlertConfig, BookSummary, BookView, ControlMsg, QueryCriteria, Snapshot,
    SnapshotStatus, SortConfig,
};

/// Result of one gateway call, tagged with the cycle that started it.
#[derive(Debug)]
struct FetchOutcome {
    seq: u64,
    criteria: QueryCriteria,
    result: Result<Vec<RawListing>, GatewayError>,
}

/// Single owner of criteria, sort, alert config, refresh state and the snapshot.
///
/// Runs as one task: commands, countdown ticks and fetch outcomes are handled
/// one at a time, so nothing here needs a lock. Gateway calls run as spawned
/// tasks and report back over `outcome_rx`; only the outcome of the most
/// recently started cycle is ever applied. Stopping or reconfiguring the
/// scheduler and changing criteria also retire whatever is in flight.
pub struct Controller<G: MarketplaceGateway> {
    gateway: Arc<G>,
    fetch_timeout: Duration,
    criteria: QueryCriteria,
    sort: SortConfig,
    alert: AlertConfig,
    scheduler: RefreshScheduler,
    /// The one and only countdown tick source; `None` while auto-refresh is off.
    ticker: Option<Interval>,
    /// Last applied page in arrival order; re-sorting always starts from here.
    records: Vec<AdRecord>,
    snapshot: Snapshot,
    ever_completed: bool,
    latest_seq: u64,
    watcher: PriceAlertWatcher,
    control_rx: mpsc::Receiver<ControlMsg>,
    outcome_tx: mpsc::Sender<FetchOutcome>,
    outcome_rx: mpsc::Receiver<FetchOutcome>,
    view_tx: watch::Sender<BookView>,
    health: Arc<HealthState>,
    latency: Arc<LatencyStats>,
}

impl<G: MarketplaceGateway> Controller<G> {
    pub fn new(
        cfg: &Config,
        gateway: Arc<G>,
        watcher: PriceAlertWatcher,
        control_rx: mpsc::Receiver<ControlMsg>,
        health: Arc<HealthState>,
        latency: Arc<LatencyStats>,
    ) -> (Self, watch::Receiver<BookView>) {
        let mut scheduler = RefreshScheduler::new(cfg.refresh_interval_secs);
        if cfg.auto_refresh {
            scheduler.start(cfg.refresh_interval_secs);
        }
        let (outcome_tx, outcome_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let controller = Self {
            gateway,
            fetch_timeout: cfg.fetch_timeout,
            criteria: cfg.criteria.clone(),
            sort: SortConfig::default(),
            alert: AlertConfig {
                threshold_price: cfg.alert_threshold,
            },
            scheduler,
            ticker: None,
            records: Vec::new(),
            snapshot: Snapshot::default(),
            ever_completed: false,
            latest_seq: 0,
            watcher,
            control_rx,
            outcome_tx,
            outcome_rx,
            view_tx: watch::Sender::new(BookView::default()),
            health,
            latency,
        };
        controller.publish();
        let view_rx = controller.view_tx.subscribe();
        (controller, view_rx)
    }

    pub async fn run(mut self) {
        info!(
            asset = %self.criteria.asset,
            fiat = %self.criteria.fiat,
            trade_type = %self.criteria.trade_type,
            auto_refresh = self.scheduler.is_active(),
            interval_secs = self.scheduler.interval_secs(),
            "Order book controller started"
        );
        self.rearm_ticker();
        self.begin_cycle();
        self.publish();

        loop {
            tokio::select! {
                msg = self.control_rx.recv() => match msg {
                    Some(msg) => self.handle_control(msg),
                    None => {
                        info!("Control channel closed, controller stopping");
                        return;
                    }
                },
                Some(outcome) = self.outcome_rx.recv() => self.handle_outcome(outcome),
                _ = next_tick(&mut self.ticker) => self.handle_tick(),
            }
            self.publish();
        }
    }

    fn handle_control(&mut self, msg: ControlMsg) {
        match msg {
            ControlMsg::Search => {
                self.begin_cycle();
            }
            ControlMsg::UpdateCriteria(criteria, reply) => {
                let verdict = self.update_criteria(criteria);
                if let Err(e) = &verdict {
                    warn!("Rejected criteria update: {e}");
                }
                let _ = reply.send(verdict);
            }
            ControlMsg::SelectSort(key) => {
                self.sort = self.sort.select(key);
                if self.snapshot.status != SnapshotStatus::Error {
                    self.snapshot.records =
                        sort_records(&self.records, self.sort.key, self.sort.direction);
                }
                debug!(key = %self.sort.key, direction = ?self.sort.direction, "Sort changed");
            }
            ControlMsg::StartRefresh(interval) => {
                let secs = interval.unwrap_or_else(|| self.scheduler.interval_secs());
                self.scheduler.start(secs);
                self.rearm_ticker();
                info!(interval_secs = secs, "Auto-refresh started");
            }
            ControlMsg::StopRefresh => {
                self.scheduler.stop();
                self.retire_in_flight();
                self.rearm_ticker();
                info!("Auto-refresh stopped");
            }
            ControlMsg::SetInterval(seconds) => {
                self.scheduler.set_interval(seconds);
                self.retire_in_flight();
                self.rearm_ticker();
                info!(
                    interval_secs = self.scheduler.interval_secs(),
                    "Refresh interval changed"
                );
            }
            ControlMsg::SetAlert(alert) => match alert.threshold_price {
                Some(t) if !t.is_finite() => warn!("Ignoring non-finite alert threshold"),
                _ => {
                    self.alert = alert;
                    info!(threshold = ?alert.threshold_price, "Alert threshold updated");
                }
            },
        }
    }

    fn update_criteria(&mut self, criteria: QueryCriteria) -> Result<(), CriteriaError> {
        criteria.validate()?;
        let trade_type_changed = criteria.trade_type != self.criteria.trade_type;
        self.criteria = criteria;
        self.retire_in_flight();

        if self.scheduler.is_active() {
            self.scheduler.restart_countdown();
            self.rearm_ticker();
        }
        if trade_type_changed {
            self.begin_cycle();
        }
        Ok(())
    }

    fn handle_tick(&mut self) {
        if self.scheduler.tick() {
            debug!("Countdown elapsed, starting scheduled cycle");
            self.begin_cycle();
        }
    }

    /// Kick off one cycle. Does not wait for a pending one; its result will
    /// simply be ignored once this cycle's sequence number supersedes it.
    fn begin_cycle(&mut self) -> u64 {
        self.latest_seq += 1;
        let seq = self.latest_seq;
        self.snapshot.status = SnapshotStatus::Loading;
        self.health.inc_cycles_started();

        let gateway = Arc::clone(&self.gateway);
        let latency = Arc::clone(&self.latency);
        let criteria = self.criteria.clone();
        let outcome_tx = self.outcome_tx.clone();
        let timeout = self.fetch_timeout;

        tokio::spawn(async move {
            let started = Instant::now();
            let fetch = gateway.fetch_listings(&criteria);
            let result = match tokio::time::timeout(timeout, fetch).await {
                Ok(result) => result,
                Err(_) => Err(GatewayError::Timeout(timeout)),
            };
            latency.record(started.elapsed());

            let outcome = FetchOutcome {
                seq,
                criteria,
                result,
            };
            if outcome_tx.send(outcome).await.is_err() {
                debug!(seq, "Controller gone, dropping fetch outcome");
            }
        });

        seq
    }

    fn handle_outcome(&mut self, outcome: FetchOutcome) {
        if outcome.seq != self.latest_seq {
            self.health.inc_cycles_discarded();
            debug!(
                seq = outcome.seq,
                latest = self.latest_seq,
                "Discarding superseded fetch outcome"
            );
            return;
        }

        let now = now_ns();
        match outcome.result {
            Ok(raw) => {
                let (records, stats) = normalize(&raw, &outcome.criteria);
                info!(
                    seq = outcome.seq,
                    input = stats.input,
                    kept = stats.kept,
                    dropped_malformed = stats.dropped_malformed,
                    filtered_amount = stats.filtered_amount,
                    filtered_merchant = stats.filtered_merchant,
                    "Order book refreshed: {} of {} listings",
                    stats.kept,
                    stats.input,
                );

                let alert_triggered = self.watcher.evaluate(&records, &self.alert);
                let ordered = sort_records(&records, self.sort.key, self.sort.direction);
                self.records = records;
                self.snapshot = Snapshot::ready(ordered, alert_triggered);
                self.ever_completed = true;
                self.scheduler.mark_updated(now);
                self.health.record_success(now);
            }
            Err(e) => {
                warn!(seq = outcome.seq, "P2P fetch failed: {e}");
                self.records.clear();
                self.snapshot = Snapshot::failed(e.to_string());
                self.health.record_failure(now);
            }
        }
    }

    /// Make any in-flight cycle stale without starting a new one.
    fn retire_in_flight(&mut self) {
        self.latest_seq += 1;
        if self.snapshot.status == SnapshotStatus::Loading {
            self.snapshot.status = self.snapshot.settled_status(self.ever_completed);
        }
    }

    /// Drop the current tick source and create a fresh one if the scheduler is
    /// active. Replacing the `Option` is what keeps it to a single source.
    fn rearm_ticker(&mut self) {
        self.ticker = self.scheduler.is_active().then(|| {
            let mut ticker = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
    }

    fn view(&self) -> BookView {
        BookView {
            snapshot: self.snapshot.clone(),
            summary: BookSummary::from_records(&self.snapshot.records),
            refresh: self.scheduler.state(),
            criteria: self.criteria.clone(),
            sort: self.sort,
            alert: self.alert,
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.view());
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
