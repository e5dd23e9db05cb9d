use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Exchange rates relative to a base currency: each entry is the number of units of that currency
/// per one unit of the base. The base itself is always present with a rate of exactly 1.
///
/// A table is replaced wholesale on refresh, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRateTable {
    base: String,
    rates: BTreeMap<String, f64>,
    fetched_at: DateTime<Utc>,
}

impl ExchangeRateTable {
    /// Builds a table, dropping entries that are zero, negative or not finite since those can only
    /// corrupt downstream sums.
    pub fn new<I, S>(base: impl Into<String>, rates: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let base = base.into().trim().to_uppercase();
        let mut map = BTreeMap::new();
        for (code, rate) in rates {
            let code = code.into().trim().to_uppercase();
            if !rate.is_finite() || rate <= 0.0 {
                warn!("Dropping unusable exchange rate {rate} for '{code}'");
                continue;
            }
            map.insert(code, rate);
        }
        map.insert(base.clone(), 1.0);
        Self {
            base,
            rates: map,
            fetched_at: Utc::now(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// The rate for `code`, if the table has a usable one.
    pub fn rate(&self, code: &str) -> Option<f64> {
        let code = code.trim();
        self.rates
            .get(code)
            .or_else(|| self.rates.get(&code.to_uppercase()))
            .copied()
    }

    pub fn rates(&self) -> &BTreeMap<String, f64> {
        &self.rates
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_is_always_one() {
        let t = ExchangeRateTable::new("php", [("PHP", 3.0), ("EUR", 0.016)]);
        assert_eq!(t.base(), "PHP");
        assert_eq!(t.rate("PHP"), Some(1.0));
        assert_eq!(t.rate("EUR"), Some(0.016));
    }

    #[test]
    fn test_unusable_rates_are_dropped() {
        let t = ExchangeRateTable::new(
            "PHP",
            [("EUR", 0.0), ("USD", -1.0), ("GBP", f64::NAN), ("JPY", 2.6)],
        );
        assert_eq!(t.rate("EUR"), None);
        assert_eq!(t.rate("USD"), None);
        assert_eq!(t.rate("GBP"), None);
        assert_eq!(t.rate("JPY"), Some(2.6));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_lookup_ignores_case() {
        let t = ExchangeRateTable::new("PHP", [("eur", 0.016)]);
        assert_eq!(t.rate("eur"), Some(0.016));
        assert_eq!(t.rate("EUR"), Some(0.016));
    }
}
