//! End to end figures for a month, built over the in-memory budgeting API and rate source.

use budget_fx::aggregate::{Dashboard, MonthReport, MonthView};
use budget_fx::api::TestBudgetApi;
use budget_fx::fx::{self, ExchangeRateTable, TestRateSource};
use budget_fx::model::{Category, Currency, Money, Period, Profile, Transaction, TransactionAmount};
use budget_fx::{App, Config};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;

const RATES: &[(&str, f64)] = &[("PHP", 1.0), ("EUR", 0.016), ("USD", 0.018)];

fn march() -> Period {
    Period::new(2025, 3).unwrap()
}

fn category(id: &str, name: &str) -> Category {
    Category {
        id: id.to_string(),
        name: name.to_string(),
        color: "#3b82f6".to_string(),
    }
}

fn transaction(id: &str, amount: f64, currency: &str, category_id: Option<&str>) -> Transaction {
    Transaction {
        id: id.to_string(),
        amount: TransactionAmount::new(Money::new(amount, currency), None),
        date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
        category_id: category_id.map(str::to_string),
    }
}

struct Fixture {
    _dir: TempDir,
    api: Arc<TestBudgetApi>,
    rates: Arc<TestRateSource>,
    app: App,
}

impl Fixture {
    async fn new(
        categories: Vec<Category>,
        budgets: &[(&str, f64)],
        transactions: Vec<Transaction>,
        currency: Currency,
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let config = Config::create(dir.path().join("home"), None).await.unwrap();
        let profile = Profile {
            id: "1".to_string(),
            name: "Someone".to_string(),
            preferred_currency: None,
            currency: None,
        };
        let budgets: BTreeMap<String, f64> =
            budgets.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        let api = Arc::new(TestBudgetApi::new(
            profile,
            categories,
            budgets,
            transactions,
            march(),
        ));
        let rates = Arc::new(TestRateSource::new(RATES.iter().copied()));
        let mut app = App::with_collaborators(config, api.clone(), rates.clone())
            .await
            .unwrap();
        app.set_currency(currency).await.unwrap();
        Self {
            _dir: dir,
            api,
            rates,
            app,
        }
    }

    async fn report(&self) -> MonthReport {
        let ctx = self.app.currency_context().await;
        let mut dashboard = Dashboard::new(self.app.api(), march());
        dashboard.refresh().await;
        match dashboard.view(&ctx) {
            MonthView::Ready(report) => report,
            other => panic!("Expected a ready view, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn one_thousand_pesos_in_euro() {
    let f = Fixture::new(
        vec![category("1", "Groceries")],
        &[("1", 5000.0)],
        vec![transaction("t1", 1000.0, "PHP", Some("1"))],
        Currency::Eur,
    )
    .await;
    let ctx = f.app.currency_context().await;
    let eur = ctx.convert_amount(1000.0, "PHP");
    assert!((eur - 16.0).abs() < 1e-9);
    assert_eq!(ctx.format_amount(eur), "€16.00");

    let report = f.report().await;
    assert!((report.total_spent - 16.0).abs() < 1e-9);
    assert!((report.total_budget - 80.0).abs() < 1e-9);
}

#[tokio::test]
async fn over_budget_category() {
    let f = Fixture::new(
        vec![category("1", "Rent")],
        &[("1", 5000.0)],
        vec![transaction("t1", 6000.0, "PHP", Some("1"))],
        Currency::Php,
    )
    .await;
    let report = f.report().await;
    let rent = report.category("1").unwrap();
    assert!(rent.over_budget);
    assert_eq!(rent.remaining, 0.0);
    assert!((rent.percentage - 120.0).abs() < 1e-9);
}

#[tokio::test]
async fn highest_spender() {
    let f = Fixture::new(
        vec![category("a", "A"), category("b", "B")],
        &[("a", 1000.0), ("b", 1000.0)],
        vec![
            transaction("t1", 200.0, "PHP", Some("a")),
            transaction("t2", 800.0, "PHP", Some("b")),
        ],
        Currency::Php,
    )
    .await;
    let report = f.report().await;
    assert_eq!(report.highest_spender_name(), "B");
    assert_eq!(report.total_spent, 1000.0);
}

#[tokio::test(start_paused = true)]
async fn rate_outage_shows_unconverted_figures() {
    let f = Fixture::new(
        vec![category("1", "Groceries")],
        &[("1", 5000.0)],
        vec![transaction("t1", 1000.0, "PHP", Some("1"))],
        Currency::Eur,
    )
    .await;
    f.rates.fail_always().await;
    let ctx = f.app.currency_context().await;
    assert!(ctx.rates_error().is_some());
    assert_eq!(ctx.convert_amount(1000.0, "PHP"), 1000.0);

    let report = f.report().await;
    assert_eq!(report.total_spent, 1000.0);
    assert_eq!(report.total_budget, 5000.0);
    assert!(report.rates_stale);
}

#[tokio::test]
async fn zero_budget_has_zero_percentage() {
    let f = Fixture::new(
        vec![category("1", "Gifts")],
        &[],
        vec![transaction("t1", 300.0, "PHP", Some("1"))],
        Currency::Php,
    )
    .await;
    let report = f.report().await;
    assert_eq!(report.total_budget, 0.0);
    assert_eq!(report.percentage_used, 0.0);
    assert!(!report.category("1").unwrap().over_budget);
}

#[tokio::test]
async fn uncategorized_spend_is_additive() {
    let f = Fixture::new(
        vec![category("1", "Groceries")],
        &[("1", 5000.0)],
        vec![transaction("t1", 1000.0, "PHP", Some("1"))],
        Currency::Usd,
    )
    .await;
    let before = f.report().await;
    assert!(before.uncategorized().is_none());

    f.api
        .add_transaction(transaction("t2", 250.0, "PHP", None))
        .await;
    let after = f.report().await;
    let added = after.total_spent - before.total_spent;
    assert!((added - 250.0 * 0.018).abs() < 1e-9);
    assert_eq!(
        after.category("1").unwrap().spent,
        before.category("1").unwrap().spent
    );
    assert_eq!(after.uncategorized().unwrap().transaction_count, 1);
}

#[test]
fn identity_and_round_trip() {
    let table = ExchangeRateTable::new("PHP", RATES.iter().copied());
    for amount in [0.0, 0.1 + 0.2, -42.5, 1e9] {
        assert_eq!(fx::convert(amount, "USD", "USD", &table), amount);
        let there = fx::convert(amount, "EUR", "USD", &table);
        let back = fx::convert(there, "USD", "EUR", &table);
        assert!((back - amount).abs() <= 1e-9 * amount.abs().max(1.0));
    }
    assert_eq!(fx::convert(100.0, "XXX", "EUR", &table), 100.0);
}
