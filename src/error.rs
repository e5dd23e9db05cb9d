pub type Error = anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// The failure conditions the currency and aggregation layers can report. These travel inside
/// `anyhow::Error` and can be recovered with `downcast_ref::<BudgetError>()`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BudgetError {
    /// The exchange rate table could not be fetched, even after retrying.
    #[error("unable to fetch exchange rates for base {base} after {attempts} attempt(s): {message}")]
    RateFetch {
        base: String,
        attempts: u32,
        message: String,
    },

    /// A currency code has no usable entry in the current rate table.
    #[error("no exchange rate available for '{0}'")]
    MissingRate(String),

    /// An edit was attempted on a month that the server marked as read-only.
    #[error("the budget for {period} is read-only, only the current or a future month can be edited")]
    StaleWrite { period: String },

    /// One or more collections needed for a rollup did not load.
    #[error("unable to load {0}, retry to see complete figures")]
    PartialLoad(String),

    /// The currency is not one of the supported display currencies.
    #[error("unsupported currency '{0}'")]
    UnsupportedCurrency(String),

    /// A year/month pair that does not name a calendar month.
    #[error("invalid period '{0}', expected YYYY-MM")]
    InvalidPeriod(String),
}
