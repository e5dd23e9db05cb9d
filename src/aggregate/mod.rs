//! Per-category and per-month figures in the display currency.
mod dashboard;
mod stats;

pub use dashboard::{Dashboard, Fetched, Loadable, MonthView};
pub use stats::{
    month_report, monthly_totals, CategoryStats, CurrencyTotal, DailySpending, HighestSpender,
    MonthReport, MonthTotal, Resource, UNCATEGORIZED_COLOR, UNCATEGORIZED_ID, UNCATEGORIZED_NAME,
};
