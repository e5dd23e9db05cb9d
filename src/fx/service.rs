//! Caches the exchange rate table and decides when to go back to the `RateSource`.
//!
//! The policy is: keep the last table that was fetched successfully, retry failed fetches a bounded
//! number of times with exponential backoff, and when every attempt fails raise an error flag while
//! leaving the last known table in place. There is no hardcoded fallback table.

use crate::error::BudgetError;
use crate::fx::{ExchangeRateTable, RateSource};
use crate::Result;
use anyhow::anyhow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

/// The background refresh never runs more often than this.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Timing and retry settings for the `RateService`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    /// How long a fetched table is served without going back to the source.
    pub staleness: Duration,
    /// How often the background task refreshes the table.
    pub refresh_interval: Duration,
    /// Fetch attempts per refresh, including the first one.
    pub max_attempts: u32,
    /// Delay after the first failed attempt, doubled after each further failure.
    pub initial_backoff: Duration,
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self {
            staleness: Duration::from_secs(30 * 60),
            refresh_interval: Duration::from_secs(60 * 60),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

/// What consumers can see of the rate cache at a point in time.
#[derive(Debug, Clone, Default)]
pub struct RatesSnapshot {
    /// The last table fetched successfully, if any.
    pub table: Option<Arc<ExchangeRateTable>>,
    /// Set when the most recent refresh failed.
    pub error: Option<BudgetError>,
    /// True while a fetch is in flight.
    pub loading: bool,
    /// True when `table` is older than the staleness window or the last refresh failed.
    pub stale: bool,
}

#[derive(Debug, Default)]
struct RateState {
    table: Option<Arc<ExchangeRateTable>>,
    fetched_at: Option<Instant>,
    error: Option<BudgetError>,
    loading: bool,
    /// Incremented each time a round of fetch attempts finishes, whatever the outcome.
    generation: u64,
}

impl RateState {
    fn outcome(&self) -> Result<Arc<ExchangeRateTable>> {
        match (&self.error, &self.table) {
            (Some(e), _) => Err(e.clone().into()),
            (None, Some(table)) => Ok(Arc::clone(table)),
            (None, None) => Err(anyhow!("No exchange rates have been fetched")),
        }
    }
}

/// Serves exchange rate tables for one base currency. Clone the `Arc` to share it; concurrent
/// callers share a single in-flight fetch.
pub struct RateService {
    source: Arc<dyn RateSource>,
    base: String,
    policy: RatePolicy,
    fetch_lock: Mutex<()>,
    state: RwLock<RateState>,
    /// Carries the generation of each finished round of fetch attempts.
    updates: watch::Sender<u64>,
}

impl RateService {
    pub fn new(source: Arc<dyn RateSource>, base: impl Into<String>, policy: RatePolicy) -> Self {
        Self {
            source,
            base: base.into().trim().to_uppercase(),
            policy,
            fetch_lock: Mutex::new(()),
            state: RwLock::new(RateState::default()),
            updates: watch::channel(0).0,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn policy(&self) -> RatePolicy {
        self.policy
    }

    /// The interval the background refresh actually uses.
    pub fn refresh_interval(&self) -> Duration {
        self.policy.refresh_interval.max(MIN_REFRESH_INTERVAL)
    }

    /// Notifies the receiver each time a round of fetch attempts finishes, successful or not.
    /// Rounds that finished before subscribing are not reported.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }

    /// Returns the cached table while it is inside the staleness window, otherwise fetches a new
    /// one. If another caller is already fetching, waits for that fetch and shares its result.
    pub async fn rates(&self) -> Result<Arc<ExchangeRateTable>> {
        let seen = {
            let state = self.state.read().await;
            if let Some(table) = self.fresh(&state) {
                trace!("Serving cached exchange rates");
                return Ok(table);
            }
            state.generation
        };
        self.fetch_once(seen).await
    }

    /// Fetches a new table regardless of the staleness window. Used by the background refresh.
    pub async fn refresh(&self) -> Result<Arc<ExchangeRateTable>> {
        let seen = self.state.read().await.generation;
        self.fetch_once(seen).await
    }

    /// Loads rates if needed, swallowing the error, and returns the resulting snapshot. This is the
    /// entry point for consumers that must keep rendering whatever happens.
    pub async fn load(&self) -> RatesSnapshot {
        if let Err(e) = self.rates().await {
            debug!("Continuing without fresh exchange rates: {e:#}");
        }
        self.snapshot().await
    }

    pub async fn snapshot(&self) -> RatesSnapshot {
        let state = self.state.read().await;
        let expired = state
            .fetched_at
            .map(|at| at.elapsed() >= self.policy.staleness)
            .unwrap_or(true);
        RatesSnapshot {
            table: state.table.clone(),
            error: state.error.clone(),
            loading: state.loading,
            stale: state.table.is_some() && (expired || state.error.is_some()),
        }
    }

    /// Spawns a task that refreshes the table every `refresh_interval`. Abort the returned handle
    /// to stop it.
    pub fn spawn_refresh(self: &Arc<Self>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(service.refresh_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                debug!("Background refresh of exchange rates");
                if let Err(e) = service.refresh().await {
                    debug!("Background refresh failed: {e:#}");
                }
            }
        })
    }

    fn fresh(&self, state: &RateState) -> Option<Arc<ExchangeRateTable>> {
        match (&state.table, state.fetched_at, &state.error) {
            (Some(table), Some(at), None) if at.elapsed() < self.policy.staleness => {
                Some(Arc::clone(table))
            }
            _ => None,
        }
    }

    /// Runs one round of fetch attempts unless a round finished after generation `seen`, in which
    /// case that round's outcome is shared.
    async fn fetch_once(&self, seen: u64) -> Result<Arc<ExchangeRateTable>> {
        let _guard = self.fetch_lock.lock().await;
        {
            let state = self.state.read().await;
            if state.generation != seen {
                trace!("Sharing the result of a concurrent exchange rate fetch");
                return state.outcome();
            }
        }
        self.fetch_with_retry().await
    }

    async fn fetch_with_retry(&self) -> Result<Arc<ExchangeRateTable>> {
        self.state.write().await.loading = true;
        let attempts = self.policy.max_attempts.max(1);
        let mut backoff = self.policy.initial_backoff;
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.source.fetch_rates(&self.base).await {
                Ok(table) => {
                    let table = Arc::new(table);
                    let mut state = self.state.write().await;
                    state.table = Some(Arc::clone(&table));
                    state.fetched_at = Some(Instant::now());
                    state.error = None;
                    state.loading = false;
                    state.generation += 1;
                    self.updates.send_replace(state.generation);
                    info!(
                        "Fetched {} exchange rates for base {}",
                        table.len(),
                        self.base
                    );
                    return Ok(table);
                }
                Err(e) => {
                    warn!("Exchange rate fetch attempt {attempt}/{attempts} failed: {e:#}");
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(backoff).await;
                        backoff = backoff.saturating_mul(2);
                    }
                }
            }
        }

        let failure = BudgetError::RateFetch {
            base: self.base.clone(),
            attempts,
            message: last_error
                .map(|e| format!("{e:#}"))
                .unwrap_or_default(),
        };
        error!("{failure}");
        let mut state = self.state.write().await;
        if state.table.is_some() {
            info!("Keeping the last known exchange rates");
        }
        state.error = Some(failure.clone());
        state.loading = false;
        state.generation += 1;
        self.updates.send_replace(state.generation);
        Err(failure.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CurrencyContext;
    use crate::fx::TestRateSource;
    use crate::model::Currency;

    fn service(source: &Arc<TestRateSource>) -> RateService {
        RateService::new(source.clone(), "PHP", RatePolicy::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_within_staleness_window() {
        let source = Arc::new(TestRateSource::default());
        let svc = service(&source);
        svc.rates().await.unwrap();
        tokio::time::advance(Duration::from_secs(29 * 60)).await;
        svc.rates().await.unwrap();
        assert_eq!(source.fetches(), 1);
        tokio::time::advance(Duration::from_secs(2 * 60)).await;
        svc.rates().await.unwrap();
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_fetch() {
        let source = Arc::new(TestRateSource::default());
        let svc = service(&source);
        let (a, b, c) = tokio::join!(svc.rates(), svc.rates(), svc.rates());
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_failure() {
        let source = Arc::new(TestRateSource::default());
        source.fail_always().await;
        let svc = service(&source);
        let (a, b, c) = tokio::join!(svc.rates(), svc.rates(), svc.rates());
        assert!(a.is_err() && b.is_err() && c.is_err());
        assert_eq!(source.fetches(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_backoff() {
        let source = Arc::new(TestRateSource::default());
        source.fail_next(2).await;
        let svc = service(&source);
        let start = Instant::now();
        let table = svc.rates().await.unwrap();
        assert_eq!(table.rate("EUR"), Some(0.016));
        assert_eq!(source.fetches(), 3);
        // 500ms then 1000ms of backoff
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
        let snapshot = svc.snapshot().await;
        assert!(snapshot.error.is_none());
        assert!(!snapshot.stale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_without_any_table() {
        let source = Arc::new(TestRateSource::default());
        source.fail_always().await;
        let svc = service(&source);
        let err = svc.rates().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BudgetError>(),
            Some(BudgetError::RateFetch { attempts: 3, .. })
        ));
        let snapshot = svc.snapshot().await;
        assert!(snapshot.table.is_none());
        assert!(snapshot.error.is_some());
        assert!(!snapshot.loading);
        assert!(!snapshot.stale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_last_known_good() {
        let source = Arc::new(TestRateSource::default());
        let svc = service(&source);
        svc.rates().await.unwrap();
        source.fail_always().await;
        tokio::time::advance(Duration::from_secs(31 * 60)).await;
        assert!(svc.rates().await.is_err());

        let snapshot = svc.snapshot().await;
        let table = snapshot.table.unwrap();
        assert_eq!(table.rate("EUR"), Some(0.016));
        assert!(snapshot.error.is_some());
        assert!(snapshot.stale);

        // Recovery clears the error flag.
        source.fail_next(0).await;
        svc.rates().await.unwrap();
        let snapshot = svc.snapshot().await;
        assert!(snapshot.error.is_none());
        assert!(!snapshot.stale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_replaces_table_wholesale() {
        let source = Arc::new(TestRateSource::new([("EUR", 0.016), ("USD", 0.018)]));
        let svc = service(&source);
        svc.rates().await.unwrap();
        source.set_rates([("EUR", 0.017)]).await;
        let table = svc.refresh().await.unwrap();
        assert_eq!(table.rate("EUR"), Some(0.017));
        assert_eq!(table.rate("USD"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_refresh() {
        let source = Arc::new(TestRateSource::default());
        let svc = Arc::new(service(&source));
        let handle = svc.spawn_refresh();
        tokio::time::sleep(Duration::from_secs(60 * 60 + 1)).await;
        assert_eq!(source.fetches(), 1);
        tokio::time::sleep(Duration::from_secs(60 * 60)).await;
        assert_eq!(source.fetches(), 2);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_refresh_interval_is_clamped() {
        let source = Arc::new(TestRateSource::default());
        let policy = RatePolicy {
            refresh_interval: Duration::ZERO,
            ..RatePolicy::default()
        };
        let svc = Arc::new(RateService::new(source.clone(), "PHP", policy));
        assert_eq!(svc.refresh_interval(), MIN_REFRESH_INTERVAL);
        let handle = svc.spawn_refresh();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(!handle.is_finished());
        assert_eq!(source.fetches(), 2);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_hear_about_finished_rounds() {
        let source = Arc::new(TestRateSource::default());
        let svc = service(&source);
        svc.rates().await.unwrap();
        let mut updates = svc.subscribe();
        assert!(!updates.has_changed().unwrap());

        source.set_rates([("EUR", 0.02)]).await;
        svc.refresh().await.unwrap();
        assert!(updates.has_changed().unwrap());
        assert_eq!(*updates.borrow_and_update(), 2);

        source.fail_always().await;
        assert!(svc.refresh().await.is_err());
        updates.changed().await.unwrap();
        assert_eq!(*updates.borrow(), 3);
    }

    /// A source that holds every fetch until it is released.
    #[derive(Default)]
    struct GatedSource {
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    #[async_trait::async_trait]
    impl RateSource for GatedSource {
        async fn fetch_rates(&self, base: &str) -> Result<ExchangeRateTable> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(ExchangeRateTable::new(base, [("EUR", 0.016)]))
        }
    }

    #[tokio::test]
    async fn test_loading_while_fetch_is_in_flight() {
        let source = Arc::new(GatedSource::default());
        let svc = Arc::new(RateService::new(
            source.clone(),
            "PHP",
            RatePolicy::default(),
        ));
        assert!(!svc.snapshot().await.loading);

        let fetch = tokio::spawn({
            let svc = Arc::clone(&svc);
            async move { svc.rates().await.map(|t| t.rate("EUR")) }
        });
        source.entered.notified().await;
        let snapshot = svc.snapshot().await;
        assert!(snapshot.loading);
        assert!(snapshot.table.is_none());
        let ctx = CurrencyContext::new(Currency::Eur, "PHP", snapshot);
        assert!(ctx.rates_loading());

        source.release.notify_one();
        assert_eq!(fetch.await.unwrap().unwrap(), Some(0.016));
        let snapshot = svc.snapshot().await;
        assert!(!snapshot.loading);
        assert!(snapshot.table.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_never_fails() {
        let source = Arc::new(TestRateSource::default());
        source.fail_always().await;
        let svc = service(&source);
        let snapshot = svc.load().await;
        assert!(snapshot.table.is_none());
        assert!(snapshot.error.is_some());
    }
}
