//! Implements the `RateSource` trait against a public exchange rate endpoint.

use crate::fx::{ExchangeRateTable, RateSource};
use crate::Result;
use anyhow::{anyhow, bail, Context};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

const USER_AGENT: &str = concat!("budget-fx/", env!("CARGO_PKG_VERSION"));
const TIMEOUT: Duration = Duration::from_secs(15);

/// Fetches rates with `GET {rates_url}/{base}`, e.g.
/// `https://api.exchangerate-api.com/v4/latest/PHP`.
#[derive(Debug, Clone)]
pub struct HttpRateSource {
    client: reqwest::Client,
    rates_url: Url,
}

impl HttpRateSource {
    pub fn new(rates_url: &str) -> Result<Self> {
        let rates_url = Url::parse(rates_url)
            .with_context(|| format!("Invalid exchange rate URL '{rates_url}'"))?;
        let client = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .context("Unable to build the HTTP client")?;
        Ok(Self { client, rates_url })
    }

    fn endpoint(&self, base: &str) -> Result<Url> {
        let mut url = self.rates_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("The exchange rate URL '{}' cannot take a path", self.rates_url))?
            .pop_if_empty()
            .push(base);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl RateSource for HttpRateSource {
    async fn fetch_rates(&self, base: &str) -> Result<ExchangeRateTable> {
        let url = self.endpoint(base)?;
        debug!("Fetching exchange rates from {url}");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Failed to send exchange rate request to {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            bail!("Exchange rate request failed with status {status}: {body}");
        }

        let body = response
            .text()
            .await
            .context("Unable to read exchange rate response")?;
        trace!("Exchange rate response: {body}");
        parse_rates(base, &body)
    }
}

/// The part of the provider's response that we use: `{ "rates": { "EUR": 0.016, ... } }`.
#[derive(Debug, Deserialize)]
struct RatesResponse {
    rates: BTreeMap<String, f64>,
}

pub(crate) fn parse_rates(base: &str, body: &str) -> Result<ExchangeRateTable> {
    let response: RatesResponse =
        serde_json::from_str(body).context("Failed to parse exchange rate response")?;
    anyhow::ensure!(
        !response.rates.is_empty(),
        "The exchange rate response for {base} contained no rates"
    );
    Ok(ExchangeRateTable::new(base, response.rates))
}
