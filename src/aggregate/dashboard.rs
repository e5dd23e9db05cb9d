//! The state behind a month view: the selected `Period` and the three collections loaded for it.
//!
//! Each collection loads independently and may fail on its own. Every fetch is tagged with the
//! period it was issued for, and a result that arrives after the user has moved to another month is
//! discarded instead of applied.

use crate::aggregate::stats::{month_report, MonthReport, Resource};
use crate::api::BudgetApi;
use crate::context::CurrencyContext;
use crate::error::BudgetError;
use crate::model::{Category, MonthlyBudget, Period, Transaction};
use crate::Result;
use anyhow::{bail, Context};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The load state of one collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Loadable<T> {
    Pending,
    Loaded(T),
    Failed(String),
}

impl<T> Loadable<T> {
    pub fn loaded(&self) -> Option<&T> {
        match self {
            Loadable::Loaded(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Loadable::Pending)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Loadable::Failed(_))
    }

    fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(value) => Loadable::Loaded(value),
            Err(e) => Loadable::Failed(format!("{e:#}")),
        }
    }
}

/// The response to one fetch, tagged with the period it was requested for.
#[derive(Debug, Clone)]
pub struct Fetched {
    period: Period,
    data: FetchedData,
}

#[derive(Debug, Clone)]
enum FetchedData {
    Categories(Loadable<Vec<Category>>),
    Budgets(Loadable<Vec<MonthlyBudget>>),
    Transactions(Loadable<Vec<Transaction>>),
}

impl Fetched {
    pub fn period(&self) -> Period {
        self.period
    }

    pub fn resource(&self) -> Resource {
        match self.data {
            FetchedData::Categories(_) => Resource::Categories,
            FetchedData::Budgets(_) => Resource::Budgets,
            FetchedData::Transactions(_) => Resource::Transactions,
        }
    }
}

/// What a month view can show.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum MonthView {
    /// Categories or budgets have not arrived yet.
    Loading { period: Period },
    /// Categories or budgets failed, no totals are shown until they are retried.
    NeedsRetry {
        period: Period,
        failed: Vec<Resource>,
        errors: Vec<String>,
    },
    /// Totals, possibly partial when transactions are missing.
    Ready(MonthReport),
}

pub struct Dashboard {
    api: Arc<dyn BudgetApi>,
    period: Period,
    categories: Loadable<Vec<Category>>,
    budgets: Loadable<Vec<MonthlyBudget>>,
    transactions: Loadable<Vec<Transaction>>,
}

impl Dashboard {
    pub fn new(api: Arc<dyn BudgetApi>, period: Period) -> Self {
        Self {
            api,
            period,
            categories: Loadable::Pending,
            budgets: Loadable::Pending,
            transactions: Loadable::Pending,
        }
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn categories(&self) -> &Loadable<Vec<Category>> {
        &self.categories
    }

    pub fn budgets(&self) -> &Loadable<Vec<MonthlyBudget>> {
        &self.budgets
    }

    pub fn transactions(&self) -> &Loadable<Vec<Transaction>> {
        &self.transactions
    }

    /// Switches to `period`. Everything loaded for the previous period is dropped; call `refresh`
    /// to load the new one.
    pub fn select_period(&mut self, period: Period) {
        if period == self.period {
            return;
        }
        debug!("Switching dashboard from {} to {period}", self.period);
        self.period = period;
        self.categories = Loadable::Pending;
        self.budgets = Loadable::Pending;
        self.transactions = Loadable::Pending;
    }

    pub async fn fetch_categories(&self) -> Fetched {
        Fetched {
            period: self.period,
            data: FetchedData::Categories(Loadable::from_result(
                self.api.categories().await.context("Unable to load categories"),
            )),
        }
    }

    pub async fn fetch_budgets(&self) -> Fetched {
        let period = self.period;
        Fetched {
            period,
            data: FetchedData::Budgets(Loadable::from_result(
                self.api
                    .monthly_budgets(period)
                    .await
                    .with_context(|| format!("Unable to load the budgets for {period}")),
            )),
        }
    }

    pub async fn fetch_transactions(&self) -> Fetched {
        Fetched {
            period: self.period,
            data: FetchedData::Transactions(Loadable::from_result(
                self.api
                    .transactions()
                    .await
                    .context("Unable to load transactions"),
            )),
        }
    }

    /// Stores a fetch result. Returns false, and leaves the state untouched, when the result was
    /// requested for a period other than the selected one.
    pub fn apply(&mut self, fetched: Fetched) -> bool {
        if fetched.period != self.period {
            debug!(
                "Discarding {} loaded for {}, the dashboard now shows {}",
                fetched.resource(),
                fetched.period,
                self.period
            );
            return false;
        }
        if let FetchedData::Categories(Loadable::Failed(e))
        | FetchedData::Budgets(Loadable::Failed(e))
        | FetchedData::Transactions(Loadable::Failed(e)) = &fetched.data
        {
            warn!("{e}");
        }
        match fetched.data {
            FetchedData::Categories(c) => self.categories = c,
            FetchedData::Budgets(b) => self.budgets = b,
            FetchedData::Transactions(t) => self.transactions = t,
        }
        true
    }

    /// Loads all three collections concurrently for the selected period.
    pub async fn refresh(&mut self) {
        let (categories, budgets, transactions) = tokio::join!(
            self.fetch_categories(),
            self.fetch_budgets(),
            self.fetch_transactions()
        );
        self.apply(categories);
        self.apply(budgets);
        self.apply(transactions);
    }

    /// Reloads only the collections that failed or never loaded.
    pub async fn retry(&mut self) {
        if self.categories.loaded().is_none() {
            let fetched = self.fetch_categories().await;
            self.apply(fetched);
        }
        if self.budgets.loaded().is_none() {
            let fetched = self.fetch_budgets().await;
            self.apply(fetched);
        }
        if self.transactions.loaded().is_none() {
            let fetched = self.fetch_transactions().await;
            self.apply(fetched);
        }
    }

    /// Builds the view for the selected period from whatever is loaded.
    pub fn view(&self, ctx: &CurrencyContext) -> MonthView {
        let period = self.period;
        let mut failed = Vec::new();
        let mut errors = Vec::new();
        if let Loadable::Failed(e) = &self.categories {
            failed.push(Resource::Categories);
            errors.push(e.clone());
        }
        if let Loadable::Failed(e) = &self.budgets {
            failed.push(Resource::Budgets);
            errors.push(e.clone());
        }
        if !failed.is_empty() {
            return MonthView::NeedsRetry {
                period,
                failed,
                errors,
            };
        }
        let (Some(categories), Some(budgets)) = (self.categories.loaded(), self.budgets.loaded())
        else {
            return MonthView::Loading { period };
        };
        let transactions = self.transactions.loaded().map(Vec::as_slice);
        MonthView::Ready(month_report(
            period,
            categories,
            budgets,
            transactions,
            ctx,
        ))
    }

    /// Looks up a category by id, or by name ignoring case.
    pub fn find_category(&self, id_or_name: &str) -> Option<&Category> {
        let categories = self.categories.loaded()?;
        categories
            .iter()
            .find(|c| c.id == id_or_name)
            .or_else(|| {
                categories
                    .iter()
                    .find(|c| c.name.eq_ignore_ascii_case(id_or_name.trim()))
            })
    }

    /// Sets the selected month's budget for a category, in the base currency.
    ///
    /// Months the server marks as read-only are rejected with `BudgetError::StaleWrite` before
    /// anything is sent. After the server accepts the write the budgets are refetched; if that
    /// refetch fails the previous figures stay in place until the next refresh.
    pub async fn update_budget(&mut self, category_id: &str, amount: f64) -> Result<()> {
        if !amount.is_finite() || amount < 0.0 {
            bail!("The budget amount must be a non-negative number, got {amount}");
        }
        let period = self.period;
        let Some(budgets) = self.budgets.loaded() else {
            return Err(BudgetError::PartialLoad(Resource::Budgets.to_string()).into());
        };
        let Some(row) = budgets.iter().find(|b| b.category_id == category_id) else {
            bail!("There is no budget for category '{category_id}' in {period}");
        };
        if !row.is_editable {
            let e = BudgetError::StaleWrite {
                period: period.to_string(),
            };
            warn!("{e}");
            return Err(e.into());
        }

        self.api
            .update_monthly_budget(category_id, period, amount)
            .await
            .with_context(|| format!("Unable to update the budget for category '{category_id}'"))?;
        info!("Budget for category '{category_id}' in {period} set to {amount}");

        let fetched = self.fetch_budgets().await;
        if fetched_failed(&fetched) {
            warn!("Unable to reload budgets after the update, the figures shown may be stale");
            return Ok(());
        }
        self.apply(fetched);
        Ok(())
    }
}

fn fetched_failed(fetched: &Fetched) -> bool {
    match &fetched.data {
        FetchedData::Categories(l) => l.is_failed(),
        FetchedData::Budgets(l) => l.is_failed(),
        FetchedData::Transactions(l) => l.is_failed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Collection, TestBudgetApi};
    use crate::fx::{ExchangeRateTable, RatesSnapshot};
    use crate::model::Currency;

    fn ctx() -> CurrencyContext {
        CurrencyContext::new(
            Currency::Php,
            "PHP",
            RatesSnapshot {
                table: Some(Arc::new(ExchangeRateTable::new(
                    "PHP",
                    [("EUR", 0.016), ("USD", 0.018), ("GBP", 0.0137)],
                ))),
                ..RatesSnapshot::default()
            },
        )
    }

    fn march() -> Period {
        Period::new(2025, 3).unwrap()
    }

    fn setup() -> (Arc<TestBudgetApi>, Dashboard) {
        let api = Arc::new(TestBudgetApi::default());
        let dashboard = Dashboard::new(api.clone(), march());
        (api, dashboard)
    }

    fn report(view: MonthView) -> MonthReport {
        match view {
            MonthView::Ready(report) => report,
            other => panic!("Expected a report, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_loading_until_refreshed() {
        let (_api, mut dashboard) = setup();
        assert_eq!(
            dashboard.view(&ctx()),
            MonthView::Loading { period: march() }
        );
        dashboard.refresh().await;
        let report = report(dashboard.view(&ctx()));
        assert_eq!(report.period, march());
        assert_eq!(report.transaction_count, 8);
        assert!(!report.is_partial());
    }

    #[tokio::test]
    async fn test_late_response_for_old_period_is_discarded() {
        let (_api, mut dashboard) = setup();
        dashboard.refresh().await;
        let late = dashboard.fetch_budgets().await;
        assert_eq!(late.period(), march());

        let february = march().previous();
        dashboard.select_period(february);
        assert!(!dashboard.apply(late));
        assert!(dashboard.budgets().is_pending());

        dashboard.refresh().await;
        let report = report(dashboard.view(&ctx()));
        assert_eq!(report.period, february);
        assert!(report.categories.iter().all(|c| !c.is_editable));
    }

    #[tokio::test]
    async fn test_budget_failure_needs_retry() {
        let (api, mut dashboard) = setup();
        api.fail(Collection::Budgets).await;
        dashboard.refresh().await;
        match dashboard.view(&ctx()) {
            MonthView::NeedsRetry { failed, .. } => assert_eq!(failed, vec![Resource::Budgets]),
            other => panic!("Expected NeedsRetry, got {other:?}"),
        }

        api.recover(Collection::Budgets).await;
        dashboard.retry().await;
        assert!(matches!(dashboard.view(&ctx()), MonthView::Ready(_)));
    }

    #[tokio::test]
    async fn test_transactions_failure_is_partial() {
        let (api, mut dashboard) = setup();
        api.fail(Collection::Transactions).await;
        dashboard.refresh().await;
        let report = report(dashboard.view(&ctx()));
        assert!(report.is_partial());
        assert_eq!(report.retry, vec![Resource::Transactions]);
        // Server tally for groceries
        assert_eq!(report.category("1").unwrap().spent, 2450.0 + 1890.75);
    }

    #[tokio::test]
    async fn test_stale_write_is_rejected_before_the_network() {
        let (api, mut dashboard) = setup();
        dashboard.select_period(march().previous());
        dashboard.refresh().await;
        let err = dashboard.update_budget("1", 9000.0).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BudgetError>(),
            Some(BudgetError::StaleWrite { .. })
        ));
        assert_eq!(api.writes(), 0);
    }

    #[tokio::test]
    async fn test_update_budget_refetches() {
        let (api, mut dashboard) = setup();
        dashboard.refresh().await;
        dashboard.update_budget("1", 9000.0).await.unwrap();
        assert_eq!(api.writes(), 1);
        let report = report(dashboard.view(&ctx()));
        assert_eq!(report.category("1").unwrap().budget, 9000.0);
    }

    #[tokio::test]
    async fn test_update_budget_for_a_future_month() {
        let api = Arc::new(TestBudgetApi::default());
        let april = march().next();
        let mut dashboard = Dashboard::new(api.clone(), april);
        dashboard.refresh().await;
        dashboard.update_budget("1", 9000.0).await.unwrap();

        let april_report = report(dashboard.view(&ctx()));
        assert_eq!(april_report.category("1").unwrap().budget, 9000.0);

        // The current month keeps its budget.
        dashboard.select_period(march());
        dashboard.refresh().await;
        let march_report = report(dashboard.view(&ctx()));
        assert_eq!(march_report.category("1").unwrap().budget, 8000.0);
    }

    #[tokio::test]
    async fn test_update_budget_survives_failed_refetch() {
        let (api, mut dashboard) = setup();
        dashboard.refresh().await;
        api.fail(Collection::Budgets).await;
        dashboard.update_budget("1", 9000.0).await.unwrap();
        assert_eq!(api.writes(), 1);
        // The previous figures are still shown.
        let report = report(dashboard.view(&ctx()));
        assert_eq!(report.category("1").unwrap().budget, 8000.0);
    }

    #[tokio::test]
    async fn test_update_budget_needs_loaded_budgets() {
        let (api, mut dashboard) = setup();
        let err = dashboard.update_budget("1", 10.0).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BudgetError>(),
            Some(BudgetError::PartialLoad(_))
        ));
        dashboard.refresh().await;
        assert!(dashboard.update_budget("1", f64::NAN).await.is_err());
        assert!(dashboard.update_budget("5", 10.0).await.is_err());
        assert_eq!(api.writes(), 0);
    }

    #[tokio::test]
    async fn test_find_category() {
        let (_api, mut dashboard) = setup();
        assert!(dashboard.find_category("Groceries").is_none());
        dashboard.refresh().await;
        assert_eq!(dashboard.find_category("groceries").unwrap().id, "1");
        assert_eq!(dashboard.find_category("3").unwrap().name, "Transport");
    }
}
