//! Implements the `BudgetApi` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without a budgeting server.

use crate::api::BudgetApi;
use crate::model::{Category, MonthlyBudget, Period, Profile, Transaction, AMOUNT_PHP_CURRENCY};
use crate::Result;
use anyhow::{bail, Context};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;

/// The server resources that can be told to fail.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Collection {
    Profile,
    Categories,
    Budgets,
    Transactions,
    /// `update_monthly_budget`
    Writes,
}

/// An implementation of the `BudgetApi` trait that holds its data in memory. By default it is
/// seeded with a few months of data ending in March 2025, which it treats as the current month.
#[derive(Debug)]
pub struct TestBudgetApi {
    state: Mutex<TestState>,
    writes: AtomicU32,
}

#[derive(Debug, Clone)]
struct TestState {
    profile: Profile,
    categories: Vec<Category>,
    /// Budget amount per category id, used for every month that has no explicit amount.
    budgets: BTreeMap<String, f64>,
    /// Amounts written through `update_monthly_budget`.
    written: BTreeMap<(Period, String), f64>,
    transactions: Vec<Transaction>,
    /// The month the server considers current. It and later months are editable.
    current: Period,
    failing: BTreeSet<Collection>,
}

impl TestBudgetApi {
    pub fn new(
        profile: Profile,
        categories: Vec<Category>,
        budgets: BTreeMap<String, f64>,
        transactions: Vec<Transaction>,
        current: Period,
    ) -> Self {
        Self {
            state: Mutex::new(TestState {
                profile,
                categories,
                budgets,
                written: BTreeMap::new(),
                transactions,
                current,
                failing: BTreeSet::new(),
            }),
            writes: AtomicU32::new(0),
        }
    }

    /// Make every call for `collection` fail until `recover` is called.
    pub async fn fail(&self, collection: Collection) {
        self.state.lock().await.failing.insert(collection);
    }

    pub async fn recover(&self, collection: Collection) {
        self.state.lock().await.failing.remove(&collection);
    }

    /// The number of budget writes that reached the server.
    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn current(&self) -> Period {
        self.state.lock().await.current
    }

    pub async fn set_profile(&self, profile: Profile) {
        self.state.lock().await.profile = profile;
    }

    pub async fn set_budget(&self, category_id: impl Into<String>, amount: f64) {
        self.state
            .lock()
            .await
            .budgets
            .insert(category_id.into(), amount);
    }

    pub async fn add_transaction(&self, transaction: Transaction) {
        self.state.lock().await.transactions.push(transaction);
    }

    async fn check(&self, collection: Collection) -> Result<()> {
        if self.state.lock().await.failing.contains(&collection) {
            bail!("Simulated server failure for {collection:?}");
        }
        Ok(())
    }
}

impl Default for TestBudgetApi {
    /// Loads seed data from this module.
    fn default() -> Self {
        // The seed data is a constant of this module and is covered by tests.
        let seed = seed_state().unwrap_or_else(|e| panic!("Invalid seed data: {e:#}"));
        Self::new(
            seed.profile,
            seed.categories,
            seed.budgets,
            seed.transactions,
            seed.current,
        )
    }
}

#[async_trait::async_trait]
impl BudgetApi for TestBudgetApi {
    async fn profile(&self) -> Result<Profile> {
        self.check(Collection::Profile).await?;
        Ok(self.state.lock().await.profile.clone())
    }

    async fn categories(&self) -> Result<Vec<Category>> {
        self.check(Collection::Categories).await?;
        Ok(self.state.lock().await.categories.clone())
    }

    async fn monthly_budgets(&self, period: Period) -> Result<Vec<MonthlyBudget>> {
        self.check(Collection::Budgets).await?;
        let state = self.state.lock().await;
        let budgets = state
            .budgets
            .iter()
            .map(|(category_id, default_amount)| {
                let budget_amount = state
                    .written
                    .get(&(period, category_id.clone()))
                    .copied()
                    .unwrap_or(*default_amount);
                MonthlyBudget {
                    category_id: category_id.clone(),
                    budget_amount,
                    currency: AMOUNT_PHP_CURRENCY.to_string(),
                    spent_this_month: state.spent(period, category_id),
                    is_editable: period >= state.current,
                }
            })
            .collect();
        Ok(budgets)
    }

    async fn transactions(&self) -> Result<Vec<Transaction>> {
        self.check(Collection::Transactions).await?;
        Ok(self.state.lock().await.transactions.clone())
    }

    async fn update_monthly_budget(
        &self,
        category_id: &str,
        period: Period,
        amount: f64,
    ) -> Result<()> {
        self.check(Collection::Writes).await?;
        let mut state = self.state.lock().await;
        if !state.categories.iter().any(|c| c.id == category_id) {
            bail!("Category '{category_id}' not found");
        }
        if period < state.current {
            bail!("The budget for {period} is closed");
        }
        state
            .written
            .insert((period, category_id.to_string()), amount);
        state.budgets.entry(category_id.to_string()).or_insert(0.0);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl TestState {
    /// The server's own tally: the base amount of each transaction in the month, or the original
    /// amount when it was recorded in the base currency.
    fn spent(&self, period: Period, category_id: &str) -> f64 {
        self.transactions
            .iter()
            .filter(|t| period.contains(t.date) && t.category_id.as_deref() == Some(category_id))
            .filter_map(|t| match &t.amount.base {
                Some(base) => Some(base.value),
                None if t.amount.original.currency == AMOUNT_PHP_CURRENCY => {
                    Some(t.amount.original.value)
                }
                None => None,
            })
            .sum()
    }
}

/// Builds the seed state from the CSV data in this module.
fn seed_state() -> Result<TestState> {
    let profile: Profile = serde_json::from_str(PROFILE_DATA).context("Invalid seed profile")?;

    let categories = records::<Category>(CATEGORY_DATA, &[])?;

    let mut budgets = BTreeMap::new();
    for row in load_csv(BUDGET_DATA)?.into_iter().skip(1) {
        let [category_id, amount] = row.as_slice() else {
            bail!("Invalid seed budget row {row:?}");
        };
        let amount: f64 = amount
            .parse()
            .with_context(|| format!("Invalid seed budget amount '{amount}'"))?;
        budgets.insert(category_id.clone(), amount);
    }

    let transactions = records::<Transaction>(
        TRANSACTION_DATA,
        &["amount", "originalAmount", "amountPHP"],
    )?;

    Ok(TestState {
        profile,
        categories,
        budgets,
        written: BTreeMap::new(),
        transactions,
        current: Period::new(2025, 3)?,
        failing: BTreeSet::new(),
    })
}

/// Decodes CSV rows, the first of which is a header of wire field names, as JSON records. Empty
/// cells are left out and the `numeric` columns are sent as numbers.
fn records<T>(csv_data: &str, numeric: &[&str]) -> Result<Vec<T>>
where
    T: serde::de::DeserializeOwned,
{
    let rows = load_csv(csv_data)?;
    let Some((header, rows)) = rows.split_first() else {
        return Ok(Vec::new());
    };
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let mut object = Map::new();
        for (name, cell) in header.iter().zip(row) {
            if cell.is_empty() {
                continue;
            }
            let value = if numeric.contains(&name.as_str()) {
                let n: f64 = cell
                    .parse()
                    .with_context(|| format!("Invalid number '{cell}' in column {name}"))?;
                Value::from(n)
            } else {
                Value::from(cell.as_str())
            };
            object.insert(name.clone(), value);
        }
        out.push(
            serde_json::from_value(Value::Object(object))
                .with_context(|| format!("Invalid seed row {row:?}"))?,
        );
    }
    Ok(out)
}

/// Loads data from a CSV-formatted string.
fn load_csv(csv_data: &str) -> Result<Vec<Vec<String>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(Cursor::new(csv_data.as_bytes()));

    let mut rows: Vec<Vec<String>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(rows)
}

/// Seed profile.
const PROFILE_DATA: &str = r#"{"id": "u1", "name": "Test User", "preferredCurrency": "PHP"}"#;

/// Seed category data.
const CATEGORY_DATA: &str = r##"id,name,color
1,Groceries,#22c55e
2,Dining Out,#f97316
3,Transport,#3b82f6
4,Utilities,#a855f7
5,Entertainment,#ec4899
"##;

/// Seed budget amounts in PHP. Entertainment has no budget.
const BUDGET_DATA: &str = r##"categoryId,budgetAmount
1,8000
2,5000
3,3000
4,4500
"##;

/// Seed transaction data. Rows without `amountPHP` have to be converted live.
const TRANSACTION_DATA: &str = r##"id,transactionDate,amount,currency,originalAmount,originalCurrency,amountPHP,categoryId
t01,2025-03-02,2450.00,PHP,,,2450.00,1
t02,2025-03-04,18.50,EUR,18.50,EUR,1156.25,2
t03,2025-03-05,420.00,PHP,,,,3
t04,2025-03-09,3100.00,PHP,,,3100.00,4
t05,2025-03-11,25.00,USD,25.00,USD,,2
t06,2025-03-15,1890.75,PHP,,,1890.75,1
t07,2025-03-18,650.00,PHP,,,650.00,
t08,2025-03-22,12.00,GBP,12.00,GBP,875.91,5
t09,2025-02-10,2200.00,PHP,,,2200.00,1
t10,2025-02-14,1500.00,PHP,,,1500.00,2
t11,2025-02-20,980.00,PHP,,,980.00,3
t12,2025-01-08,2750.00,PHP,,,2750.00,1
t13,2025-01-25,3300.00,PHP,,,3300.00,4
"##;
