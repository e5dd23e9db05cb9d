//! Records as they are received from the budgeting API.

use crate::model::currency::Currency;
use crate::model::money::{Money, TransactionAmount};
use anyhow::bail;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// The code of the currency that the server's `amountPHP` field is expressed in.
pub const AMOUNT_PHP_CURRENCY: &str = "PHP";

/// The authenticated user's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl Profile {
    /// The display currency chosen in the profile, `preferredCurrency` first, then `currency`.
    /// Codes that are not supported display currencies are ignored.
    pub fn display_currency(&self) -> Option<Currency> {
        let code = self
            .preferred_currency
            .as_deref()
            .or(self.currency.as_deref())?;
        match Currency::from_code(code) {
            Some(c) => Some(c),
            None => {
                warn!("Ignoring unsupported profile currency '{code}'");
                None
            }
        }
    }
}

/// A spending category. Budgets are not part of the category, they are per month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
}

/// A category's budget for one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyBudget {
    #[serde(deserialize_with = "string_or_number")]
    pub category_id: String,
    pub budget_amount: f64,
    pub currency: String,
    /// The server's own tally of spend for the month, in `currency`.
    #[serde(default)]
    pub spent_this_month: f64,
    /// Only the current and future months are editable. This is decided by the server.
    #[serde(default)]
    pub is_editable: bool,
}

/// A recorded transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TransactionWire", into = "TransactionWire")]
pub struct Transaction {
    pub id: String,
    pub amount: TransactionAmount,
    pub date: NaiveDate,
    pub category_id: Option<String>,
}

/// The shape of a transaction on the wire. Amounts arrive as loose optional fields and are
/// normalized into a `TransactionAmount` when converted into a `Transaction`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionWire {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    amount: f64,
    currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    original_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    original_currency: Option<String>,
    #[serde(
        default,
        rename = "amountPHP",
        alias = "amount_php",
        skip_serializing_if = "Option::is_none"
    )]
    amount_php: Option<f64>,
    #[serde(alias = "date", alias = "transaction_date")]
    transaction_date: String,
    #[serde(
        default,
        alias = "category_id",
        deserialize_with = "optional_string_or_number"
    )]
    category_id: Option<String>,
}

impl TryFrom<TransactionWire> for Transaction {
    type Error = anyhow::Error;

    fn try_from(w: TransactionWire) -> Result<Self, Self::Error> {
        let original = match (w.original_amount, w.original_currency.as_deref()) {
            (Some(value), Some(currency)) if !currency.trim().is_empty() => {
                Money::new(value, currency)
            }
            _ => Money::new(w.amount, &w.currency),
        };
        let base = w
            .amount_php
            .filter(|v| v.is_finite())
            .map(|v| Money::new(v, AMOUNT_PHP_CURRENCY));
        let date = parse_transaction_date(&w.transaction_date)?;
        let category_id = w.category_id.filter(|id| !id.trim().is_empty());
        Ok(Transaction {
            id: w.id,
            amount: TransactionAmount::new(original, base),
            date,
            category_id,
        })
    }
}

impl From<Transaction> for TransactionWire {
    fn from(t: Transaction) -> Self {
        let TransactionAmount { original, base } = t.amount;
        TransactionWire {
            id: t.id,
            amount: original.value,
            currency: original.currency.clone(),
            original_amount: Some(original.value),
            original_currency: Some(original.currency),
            amount_php: base.map(|b| b.value),
            transaction_date: t.date.format("%Y-%m-%d").to_string(),
            category_id: t.category_id,
        }
    }
}

/// Accepts `2025-01-15`, an RFC 3339 timestamp, or a naive `2025-01-15T10:00:00` timestamp.
fn parse_transaction_date(s: &str) -> crate::Result<NaiveDate> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt.date());
    }
    bail!("Invalid transaction date '{s}'")
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Int(i64),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Int(i) => i.to_string(),
        }
    }
}

/// Ids are strings in some API versions and integers in others.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(StringOrNumber::deserialize(deserializer)?.into())
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(String::from))
}
