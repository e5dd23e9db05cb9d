//! Implements the `BudgetApi` trait over HTTP with `reqwest`.

use crate::api::BudgetApi;
use crate::model::{Category, MonthlyBudget, Period, Profile, Transaction};
use crate::Result;
use anyhow::{anyhow, bail, Context};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{trace, warn};
use url::Url;

const USER_AGENT: &str = concat!("budget-fx/", env!("CARGO_PKG_VERSION"));
const TIMEOUT: Duration = Duration::from_secs(30);

/// Talks to the budgeting API rooted at `api_url`, e.g. `http://localhost:5000/api`. When a token
/// is given it is sent as a bearer token on every request.
#[derive(Debug, Clone)]
pub struct HttpBudgetApi {
    client: reqwest::Client,
    api_url: Url,
    token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BudgetUpdate {
    budget_amount: f64,
    year: i32,
    month: u32,
}

impl HttpBudgetApi {
    pub fn new(api_url: &str, token: Option<&str>) -> Result<Self> {
        let api_url =
            Url::parse(api_url).with_context(|| format!("Invalid API URL '{api_url}'"))?;
        let client = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .context("Unable to build the HTTP client")?;
        Ok(Self {
            client,
            api_url,
            token: token.filter(|t| !t.is_empty()).map(str::to_string),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("The API URL '{}' cannot take a path", self.api_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response> {
        let response = builder
            .send()
            .await
            .with_context(|| format!("Failed to send the {what} request"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            bail!("The {what} request failed with status {status}: {body}");
        }
        Ok(response)
    }

    async fn get<T>(&self, segments: &[&str], what: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        trace!("GET {url}");
        let response = self.send(self.request(Method::GET, url), what).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse the {what} response"))
    }

    /// Fetches a list. A body that is not a JSON array is treated as an empty list.
    async fn get_list<T>(&self, segments: &[&str], what: &str) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let value: serde_json::Value = self.get(segments, what).await?;
        if !value.is_array() {
            warn!("The {what} response was not a list, treating it as empty");
            return Ok(Vec::new());
        }
        serde_json::from_value(value).with_context(|| format!("Failed to parse the {what} list"))
    }
}

#[async_trait::async_trait]
impl BudgetApi for HttpBudgetApi {
    async fn profile(&self) -> Result<Profile> {
        self.get(&["user", "profile"], "profile").await
    }

    async fn categories(&self) -> Result<Vec<Category>> {
        self.get_list(&["categories"], "categories").await
    }

    async fn monthly_budgets(&self, period: Period) -> Result<Vec<MonthlyBudget>> {
        let year = period.year().to_string();
        let month = period.month().to_string();
        self.get_list(&["budgets", "monthly", &year, &month], "monthly budgets")
            .await
    }

    async fn transactions(&self) -> Result<Vec<Transaction>> {
        self.get_list(&["transactions"], "transactions").await
    }

    async fn update_monthly_budget(
        &self,
        category_id: &str,
        period: Period,
        amount: f64,
    ) -> Result<()> {
        let url = self.endpoint(&["budgets", "monthly", category_id])?;
        trace!("PUT {url} for {period}");
        let builder = self.request(Method::PUT, url).json(&BudgetUpdate {
            budget_amount: amount,
            year: period.year(),
            month: period.month(),
        });
        self.send(builder, "budget update").await?;
        Ok(())
    }
}
