//! Implements the `RateSource` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without calling the exchange rate provider.

use crate::fx::{ExchangeRateTable, RateSource};
use crate::Result;
use anyhow::bail;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;

/// An implementation of the `RateSource` trait that serves a fixed set of rates. It can be told to
/// fail a number of times before succeeding, and counts how often it was asked for rates.
#[derive(Debug)]
pub struct TestRateSource {
    rates: Mutex<BTreeMap<String, f64>>,
    failures: Mutex<Option<u32>>,
    fetches: AtomicU32,
}

impl TestRateSource {
    /// Create a source that serves `rates`. The rates are relative to whatever base is requested.
    pub fn new<I, S>(rates: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            rates: Mutex::new(rates.into_iter().map(|(k, v)| (k.into(), v)).collect()),
            failures: Mutex::new(Some(0)),
            fetches: AtomicU32::new(0),
        }
    }

    /// Fail the next `count` fetches.
    pub async fn fail_next(&self, count: u32) {
        *self.failures.lock().await = Some(count);
    }

    /// Fail every fetch until `fail_next` is called.
    pub async fn fail_always(&self) {
        *self.failures.lock().await = None;
    }

    /// Replace the served rates.
    pub async fn set_rates<I, S>(&self, rates: I)
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        *self.rates.lock().await = rates.into_iter().map(|(k, v)| (k.into(), v)).collect();
    }

    /// How many times `fetch_rates` has been called.
    pub fn fetches(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Default for TestRateSource {
    /// Seeded with approximate rates relative to PHP.
    fn default() -> Self {
        Self::new(SEED_RATES.iter().map(|(k, v)| (*k, *v)))
    }
}

#[async_trait::async_trait]
impl RateSource for TestRateSource {
    async fn fetch_rates(&self, base: &str) -> Result<ExchangeRateTable> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        {
            let mut failures = self.failures.lock().await;
            match failures.as_mut() {
                None => bail!("Simulated exchange rate outage"),
                Some(n) if *n > 0 => {
                    *n -= 1;
                    bail!("Simulated exchange rate failure");
                }
                Some(_) => {}
            }
        }
        let rates = self.rates.lock().await.clone();
        Ok(ExchangeRateTable::new(base, rates))
    }
}

/// Seed rates, units per 1 PHP.
const SEED_RATES: &[(&str, f64)] = &[
    ("PHP", 1.0),
    ("EUR", 0.016),
    ("USD", 0.018),
    ("GBP", 0.0137),
    ("CAD", 0.024),
    ("CHF", 0.0155),
    ("JPY", 2.6),
    ("AUD", 0.027),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_failures() {
        let source = TestRateSource::default();
        source.fail_next(2).await;
        assert!(source.fetch_rates("PHP").await.is_err());
        assert!(source.fetch_rates("PHP").await.is_err());
        let table = source.fetch_rates("PHP").await.unwrap();
        assert_eq!(table.rate("EUR"), Some(0.016));
        assert_eq!(source.fetches(), 3);
    }

    #[tokio::test]
    async fn test_fail_always() {
        let source = TestRateSource::default();
        source.fail_always().await;
        for _ in 0..5 {
            assert!(source.fetch_rates("PHP").await.is_err());
        }
        source.fail_next(0).await;
        assert!(source.fetch_rates("PHP").await.is_ok());
    }
}
