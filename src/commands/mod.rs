//! Command handlers for the budget-fx CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod budget;
mod convert;
mod currency;
mod dashboard;
mod init;
mod rates;
mod trend;

use crate::model::AmountFormat;
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info};

pub use budget::budget_set;
pub use convert::{convert, Conversion};
pub use currency::{currency_set, currency_show, CurrencyInfo};
pub use dashboard::dashboard;
pub use init::init;
pub use rates::{rates, rates_watch, RatesInfo};
pub use trend::trend;

/// Amounts printed by the commands use thousands separators.
const DISPLAY_FORMAT: AmountFormat = AmountFormat {
    symbol: true,
    grouping: true,
};

/// The output type for a command. This allows the command to return a consistent message and,
/// optionally, structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}
