pub mod aggregate;
pub mod api;
mod app;
pub mod args;
pub mod commands;
mod config;
mod context;
mod error;
pub mod fx;
pub mod model;
mod preferences;
mod utils;

#[cfg(test)]
mod test;

pub use api::Mode;
pub use app::App;
pub use config::Config;
pub use context::CurrencyContext;
pub use error::BudgetError;
pub use error::Error;
pub use error::Result;
pub use preferences::PreferenceStore;
