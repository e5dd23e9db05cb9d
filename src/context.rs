//! `CurrencyContext` is what views are handed to render numbers: the active display currency, the
//! current state of the rate cache, and conversion and formatting bound to both.

use crate::error::BudgetError;
use crate::fx::{self, ExchangeRateTable, RatesSnapshot};
use crate::model::{format_amount, format_with, AmountFormat, Currency, Money};
use tracing::warn;

/// A read-only view of the currency state at one point in time. Build a new one after the display
/// currency changes or the rates are refreshed; see `App::currency_context`.
#[derive(Debug, Clone)]
pub struct CurrencyContext {
    currency: Currency,
    base: String,
    rates: RatesSnapshot,
}

impl CurrencyContext {
    pub fn new(currency: Currency, base: impl Into<String>, rates: RatesSnapshot) -> Self {
        Self {
            currency,
            base: base.into().trim().to_uppercase(),
            rates,
        }
    }

    /// The active display currency.
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// The currency the server stores canonical amounts in.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn supported_currencies(&self) -> &'static [Currency] {
        &Currency::ALL
    }

    /// The last table fetched successfully, if any.
    pub fn exchange_rates(&self) -> Option<&ExchangeRateTable> {
        self.rates.table.as_deref()
    }

    /// Set when the most recent rate refresh failed.
    pub fn rates_error(&self) -> Option<&BudgetError> {
        self.rates.error.as_ref()
    }

    pub fn rates_loading(&self) -> bool {
        self.rates.loading
    }

    /// True when the figures may be off: the rates are old, the last refresh failed, or there are
    /// no rates at all.
    pub fn rates_stale(&self) -> bool {
        self.rates.stale || self.rates.table.is_none()
    }

    /// Converts `amount` from `from` into the display currency. Same-currency amounts are returned
    /// exactly. Without a usable rate the amount is returned unconverted.
    pub fn convert_amount(&self, amount: f64, from: &str) -> f64 {
        self.convert_to(amount, from, self.currency.as_str())
    }

    /// Converts `amount` from `from` into `to`, failing soft like `convert_amount`.
    pub fn convert_to(&self, amount: f64, from: &str, to: &str) -> f64 {
        if fx::same_currency(from, to) {
            return amount;
        }
        match self.exchange_rates() {
            Some(rates) => fx::convert(amount, from, to, rates),
            None => {
                warn!("No exchange rates loaded, leaving {amount} {from} unconverted");
                amount
            }
        }
    }

    /// Converts `amount` from `from` into the display currency, failing when a rate is missing.
    pub fn try_convert_amount(&self, amount: f64, from: &str) -> Result<f64, BudgetError> {
        self.try_convert_to(amount, from, self.currency.as_str())
    }

    /// Converts `amount` from `from` into `to`, failing when a rate is missing.
    pub fn try_convert_to(&self, amount: f64, from: &str, to: &str) -> Result<f64, BudgetError> {
        if fx::same_currency(from, to) {
            return Ok(amount);
        }
        match self.exchange_rates() {
            Some(rates) => fx::try_convert(amount, from, to, rates),
            None => Err(BudgetError::MissingRate(from.trim().to_uppercase())),
        }
    }

    /// Converts a `Money` into the display currency, see `convert_amount`.
    pub fn convert_money(&self, money: &Money) -> f64 {
        self.convert_amount(money.value, &money.currency)
    }

    /// True when `currency` can be converted into the display currency with the current rates.
    pub fn can_convert(&self, currency: &str) -> bool {
        self.try_convert_amount(1.0, currency).is_ok()
    }

    /// Formats an amount that is already in the display currency, e.g. `€16.00`.
    pub fn format_amount(&self, amount: f64) -> String {
        format_amount(amount, self.currency.as_str())
    }

    pub fn format_amount_with(&self, amount: f64, format: AmountFormat) -> String {
        format_with(amount, self.currency.as_str(), format)
    }

    /// Formats an amount recorded in `original_currency`: converted to the display currency with
    /// the original in parentheses, or once when the currencies match.
    pub fn format_amount_with_original(&self, amount: f64, original_currency: &str) -> String {
        fx::format_amount_with_original(
            amount,
            original_currency,
            self.currency.as_str(),
            self.exchange_rates(),
        )
    }
}
