//! Exchange rates: where they come from, how they are cached, and how amounts are converted.

mod convert;
mod service;
mod source;
mod table;
mod test_source;

use crate::{Mode, Result};
use std::sync::Arc;

pub use convert::{convert, format_amount_with_original, try_convert};
pub(crate) use convert::same_currency;
pub use service::{RatePolicy, RateService, RatesSnapshot};
pub use source::HttpRateSource;
pub use table::ExchangeRateTable;
pub use test_source::TestRateSource;

/// Fetches a table of exchange rates relative to `base`. Implementations do not cache or retry,
/// that is the job of `RateService`.
#[async_trait::async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_rates(&self, base: &str) -> Result<ExchangeRateTable>;
}

/// Creates the `RateSource` for `mode`: the HTTP provider at `rates_url`, or in-memory rates.
pub fn rate_source(rates_url: &str, mode: Mode) -> Result<Arc<dyn RateSource>> {
    Ok(match mode {
        Mode::Live => Arc::new(HttpRateSource::new(rates_url)?),
        Mode::Test => Arc::new(TestRateSource::default()),
    })
}
