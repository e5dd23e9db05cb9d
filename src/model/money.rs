//! Monetary values and their display formatting.
//!
//! Values are `f64`. Sums are taken at full precision and rounding to two decimal places only
//! happens when a value is rendered.

use crate::model::currency::symbol_for;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Represents how amounts should be rendered.
///
/// # Examples
///  - `AmountFormat{ symbol: true, grouping: false }` -> `-€60000.00`
///  - `AmountFormat{ symbol: true, grouping: true }` -> `-€60,000.00`
///  - `AmountFormat{ symbol: false, grouping: true }` -> `-60,000.00`
///  - `AmountFormat{ symbol: false, grouping: false }` -> `-60000.00`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AmountFormat {
    /// Whether the currency symbol is written in front of the number.
    pub symbol: bool,
    /// Whether commas are written as thousands separators.
    pub grouping: bool,
}

impl Default for AmountFormat {
    fn default() -> Self {
        DEFAULT_FORMAT
    }
}

/// The default format has a symbol and no thousands separators: e.g. `-€60000.00`.
const DEFAULT_FORMAT: AmountFormat = AmountFormat {
    symbol: true,
    grouping: false,
};

/// An amount in a specific currency. The currency is a free-form code as received from the API,
/// it is not restricted to the supported display currencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub value: f64,
    pub currency: String,
}

impl Money {
    pub fn new(value: f64, currency: impl Into<String>) -> Self {
        Self {
            value,
            currency: currency.into().trim().to_uppercase(),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_with(self.value, &self.currency, AmountFormat::default()))
    }
}

/// The amount of a transaction as it was entered, plus the same value expressed in the base
/// currency at the time it was recorded (when the server supplied one).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionAmount {
    pub original: Money,
    pub base: Option<Money>,
}

impl TransactionAmount {
    pub fn new(original: Money, base: Option<Money>) -> Self {
        Self { original, base }
    }

    /// The amount that should be summed across currencies: the recorded base-currency value when
    /// there is one, otherwise the original amount, which then has to be converted at today's
    /// rate.
    pub fn for_aggregation(&self) -> &Money {
        self.base.as_ref().unwrap_or(&self.original)
    }
}

/// Renders `amount` with the symbol for `currency` and exactly two decimal places, e.g. `€16.00`.
/// Currencies without a symbol are written as their code followed by a space, e.g. `XXX 16.00`.
pub fn format_amount(amount: f64, currency: &str) -> String {
    format_with(amount, currency, AmountFormat::default())
}

/// Renders `amount` for `currency` using `format`.
pub fn format_with(amount: f64, currency: &str, format: AmountFormat) -> String {
    let amount = if amount.is_finite() {
        amount
    } else {
        warn!("Refusing to render non-finite amount {amount} for {currency}, showing zero");
        0.0
    };

    // Round first so that values like -0.001 do not render as "-0.00".
    let rounded = (amount.abs() * 100.0).round() / 100.0;
    let sign = if amount < 0.0 && rounded > 0.0 {
        "-"
    } else {
        ""
    };

    let number = if format.grouping {
        format_num::format_num!(",.2", rounded)
    } else {
        format!("{rounded:.2}")
    };

    if !format.symbol {
        return format!("{sign}{number}");
    }

    let symbol = symbol_for(currency);
    let separator = if symbol.chars().all(|c| c.is_ascii_alphabetic()) {
        " "
    } else {
        ""
    };
    format!("{sign}{symbol}{separator}{number}")
}
