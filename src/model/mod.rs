//! Types that represent the core data model, such as `Transaction`, `MonthlyBudget` and `Money`.
mod currency;
mod money;
mod period;
mod records;

pub use currency::{symbol_for, Currency};
pub use money::{format_amount, format_with, AmountFormat, Money, TransactionAmount};
pub use period::Period;
pub use records::{Category, MonthlyBudget, Profile, Transaction, AMOUNT_PHP_CURRENCY};
