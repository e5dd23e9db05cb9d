//! Pure currency conversion over an `ExchangeRateTable`.

use crate::error::BudgetError;
use crate::fx::ExchangeRateTable;
use crate::model::format_amount;
use tracing::warn;

/// Converts `amount` from one currency to another.
///
/// Converting a currency to itself returns `amount` untouched, whatever the table holds. Otherwise
/// the result is `amount * rate(to) / rate(from)` and both rates must be present in `rates`.
pub fn try_convert(
    amount: f64,
    from: &str,
    to: &str,
    rates: &ExchangeRateTable,
) -> Result<f64, BudgetError> {
    if same_currency(from, to) {
        return Ok(amount);
    }
    let from_rate = rates
        .rate(from)
        .ok_or_else(|| BudgetError::MissingRate(from.trim().to_uppercase()))?;
    let to_rate = rates
        .rate(to)
        .ok_or_else(|| BudgetError::MissingRate(to.trim().to_uppercase()))?;
    Ok(amount * (to_rate / from_rate))
}

/// Like `try_convert` but never fails: when a rate is missing the lookup failure is logged and
/// `amount` is returned unconverted.
pub fn convert(amount: f64, from: &str, to: &str, rates: &ExchangeRateTable) -> f64 {
    match try_convert(amount, from, to, rates) {
        Ok(v) => v,
        Err(e) => {
            warn!("{e}, leaving {amount} {from} unconverted");
            amount
        }
    }
}

/// Renders an amount recorded in `original_currency` for display in `display_currency`.
///
/// When the currencies differ the converted amount is followed by the original in parentheses,
/// e.g. `€16.00 (₱1000.00)`. When they are equal, or no rate is available, the amount is rendered
/// once in the currency it is actually expressed in.
pub fn format_amount_with_original(
    amount: f64,
    original_currency: &str,
    display_currency: &str,
    rates: Option<&ExchangeRateTable>,
) -> String {
    if same_currency(original_currency, display_currency) {
        return format_amount(amount, display_currency);
    }
    let converted = rates.map(|r| try_convert(amount, original_currency, display_currency, r));
    match converted {
        Some(Ok(value)) => format!(
            "{} ({})",
            format_amount(value, display_currency),
            format_amount(amount, original_currency)
        ),
        Some(Err(e)) => {
            warn!("{e}, showing the original amount only");
            format_amount(amount, original_currency)
        }
        None => format_amount(amount, original_currency),
    }
}

pub(crate) fn same_currency(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
