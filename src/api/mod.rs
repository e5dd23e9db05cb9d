//! The budgeting backend as seen by this app: profile, categories, monthly budgets and
//! transactions. Persistence lives on the server; this module only reads and submits.

mod http_client;
mod test_client;

use crate::model::{Category, MonthlyBudget, Period, Profile, Transaction};
use crate::{Config, Result};
use std::sync::Arc;
use tracing::debug;

pub use http_client::HttpBudgetApi;
pub use test_client::{Collection, TestBudgetApi};

/// The environment variable that switches the app to in-memory collaborators.
pub const TEST_MODE_ENV: &str = "BUDGET_FX_IN_TEST_MODE";

/// Selects the collaborators the app talks to.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    /// The budgeting API over HTTP and the public exchange rate endpoint.
    #[default]
    Live,
    /// In-memory seeded data, no network.
    Test,
}

impl Mode {
    /// `Mode::Test` when `BUDGET_FX_IN_TEST_MODE` is set and non-empty, otherwise `Mode::Live`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => {
                debug!("{TEST_MODE_ENV} is set, using in-memory collaborators");
                Mode::Test
            }
            _ => Mode::Live,
        }
    }
}

/// The server calls that the currency and aggregation layers depend on.
#[async_trait::async_trait]
pub trait BudgetApi: Send + Sync {
    /// `GET /user/profile`
    async fn profile(&self) -> Result<Profile>;

    /// `GET /categories`
    async fn categories(&self) -> Result<Vec<Category>>;

    /// `GET /budgets/monthly/{year}/{month}`
    async fn monthly_budgets(&self, period: Period) -> Result<Vec<MonthlyBudget>>;

    /// `GET /transactions`
    async fn transactions(&self) -> Result<Vec<Transaction>>;

    /// `PUT /budgets/monthly/{categoryId}`, sets a category's budget for `period`. The month is
    /// sent in the body; the server only accepts months it reports as editable.
    async fn update_monthly_budget(
        &self,
        category_id: &str,
        period: Period,
        amount: f64,
    ) -> Result<()>;
}

/// Creates the `BudgetApi` for `mode`.
pub fn budget_api(
    config: &Config,
    api_token: Option<&str>,
    mode: Mode,
) -> Result<Arc<dyn BudgetApi>> {
    Ok(match mode {
        Mode::Live => Arc::new(HttpBudgetApi::new(config.api_url(), api_token)?),
        Mode::Test => Arc::new(TestBudgetApi::default()),
    })
}
