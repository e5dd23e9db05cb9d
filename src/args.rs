//! These structs provide the CLI interface for the budget-fx CLI.

use crate::model::{Currency, Period};
use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// budget-fx: Multi-currency budget figures from the command line.
///
/// Transactions and budgets are recorded on the budgeting server in many currencies. This program
/// loads them, converts everything into your display currency using cached exchange rates, and
/// shows spend, remaining budget and percentage used per category and per month.
///
/// Set BUDGET_FX_IN_TEST_MODE=1 to run against built-in sample data without any network access.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the home directory and an initial config.json.
    ///
    /// By default the home directory is $HOME/budget-fx. Pass --home or set BUDGET_FX_HOME to put
    /// it somewhere else.
    Init(InitArgs),
    /// Show the current exchange rates relative to the base currency.
    Rates(RatesArgs),
    /// Convert an amount into the display currency, or into --to.
    Convert(ConvertArgs),
    /// Show or change the display currency.
    Currency(CurrencyArgs),
    /// Show spend, budget and remaining amounts per category for a month.
    Dashboard(DashboardArgs),
    /// Change monthly budgets.
    Budget(BudgetArgs),
    /// Show total spend for each of the last few months.
    Trend(TrendArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where configuration and preferences are held. Defaults to ~/budget-fx
    #[arg(long, env = "BUDGET_FX_HOME", default_value_t = default_home())]
    home: DisplayPath,

    /// Bearer token for the budgeting API.
    #[arg(long, env = "BUDGET_FX_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,
}

impl Common {
    pub fn new(log_level: LevelFilter, home: PathBuf, api_token: Option<String>) -> Self {
        Self {
            log_level,
            home: home.into(),
            api_token,
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn home(&self) -> &DisplayPath {
        &self.home
    }

    pub fn api_token(&self) -> Option<&str> {
        self.api_token.as_deref()
    }
}

/// (Not shown): Args for the `budget-fx init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The root URL of the budgeting API, e.g. http://localhost:5000/api
    #[arg(long)]
    api_url: Option<String>,
}

impl InitArgs {
    pub fn new(api_url: Option<String>) -> Self {
        Self { api_url }
    }

    pub fn api_url(&self) -> Option<&str> {
        self.api_url.as_deref()
    }
}

/// (Not shown): Args for the `budget-fx rates` command.
#[derive(Debug, Parser, Clone)]
pub struct RatesArgs {
    /// Show every rate the provider returned, not only the supported display currencies.
    #[arg(long)]
    all: bool,

    /// Keep running, refreshing the rates in the background and printing them after each
    /// refresh. Stop with Ctrl-C.
    #[arg(long)]
    watch: bool,
}

impl RatesArgs {
    pub fn new(all: bool, watch: bool) -> Self {
        Self { all, watch }
    }

    pub fn all(&self) -> bool {
        self.all
    }

    pub fn watch(&self) -> bool {
        self.watch
    }
}

/// (Not shown): Args for the `budget-fx convert` command.
#[derive(Debug, Parser, Clone)]
pub struct ConvertArgs {
    /// The amount to convert.
    #[arg(allow_negative_numbers = true)]
    amount: f64,

    /// The currency code the amount is in, e.g. PHP.
    from: String,

    /// The currency to convert into. Defaults to the display currency.
    #[arg(long)]
    to: Option<Currency>,
}

impl ConvertArgs {
    pub fn new(amount: f64, from: impl Into<String>, to: Option<Currency>) -> Self {
        Self {
            amount,
            from: from.into(),
            to,
        }
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> Option<Currency> {
        self.to
    }
}

/// (Not shown): Args for the `budget-fx currency` command.
#[derive(Debug, Parser, Clone)]
pub struct CurrencyArgs {
    #[command(subcommand)]
    action: Option<CurrencyAction>,
}

impl CurrencyArgs {
    pub fn new(action: Option<CurrencyAction>) -> Self {
        Self { action }
    }

    pub fn action(&self) -> CurrencyAction {
        self.action.clone().unwrap_or(CurrencyAction::Show)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum CurrencyAction {
    /// Show the display currency and the supported currencies.
    Show,
    /// Set the display currency, e.g. `currency set USD`.
    Set {
        /// One of PHP, EUR, USD, GBP, CAD, CHF, JPY, AUD
        code: Currency,
    },
}

/// (Not shown): Args for the `budget-fx dashboard` command.
#[derive(Debug, Parser, Clone)]
pub struct DashboardArgs {
    /// The month to show as YYYY-MM. Defaults to the current month.
    #[arg(long)]
    month: Option<Period>,
}

impl DashboardArgs {
    pub fn new(month: Option<Period>) -> Self {
        Self { month }
    }

    pub fn month(&self) -> Option<Period> {
        self.month
    }
}

/// (Not shown): Args for the `budget-fx budget` command.
#[derive(Debug, Parser, Clone)]
pub struct BudgetArgs {
    #[command(subcommand)]
    action: BudgetAction,
}

impl BudgetArgs {
    pub fn new(action: BudgetAction) -> Self {
        Self { action }
    }

    pub fn action(&self) -> &BudgetAction {
        &self.action
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum BudgetAction {
    /// Set a category's budget for the current month.
    Set(BudgetSetArgs),
}

/// (Not shown): Args for the `budget-fx budget set` command.
#[derive(Debug, Parser, Clone)]
pub struct BudgetSetArgs {
    /// The category name or id.
    category: String,

    /// The new budget, in the display currency unless --base is given.
    amount: f64,

    /// The month as YYYY-MM. Only months the server marks as editable are accepted. Defaults to
    /// the current month.
    #[arg(long)]
    month: Option<Period>,

    /// The amount is already in the base currency.
    #[arg(long)]
    base: bool,
}

impl BudgetSetArgs {
    pub fn new(
        category: impl Into<String>,
        amount: f64,
        month: Option<Period>,
        base: bool,
    ) -> Self {
        Self {
            category: category.into(),
            amount,
            month,
            base,
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn month(&self) -> Option<Period> {
        self.month
    }

    pub fn base(&self) -> bool {
        self.base
    }
}

/// (Not shown): Args for the `budget-fx trend` command.
#[derive(Debug, Parser, Clone)]
pub struct TrendArgs {
    /// How many months to show, ending with the current month.
    #[arg(long, default_value_t = 6)]
    months: usize,

    /// The last month of the series as YYYY-MM. Defaults to the current month.
    #[arg(long)]
    until: Option<Period>,
}

impl TrendArgs {
    pub fn new(months: usize, until: Option<Period>) -> Self {
        Self { months, until }
    }

    pub fn months(&self) -> usize {
        self.months
    }

    pub fn until(&self) -> Option<Period> {
        self.until
    }
}

fn default_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("budget-fx"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --home or BUDGET_FX_HOME instead of relying on the default \
                directory. If you continue using the program right now, you may have problems!",
            );
            PathBuf::from("budget-fx")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}
