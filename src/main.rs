use budget_fx::args::{Args, BudgetAction, Command, CurrencyAction};
use budget_fx::{commands, App, Config, Mode, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().home().path();

    // When BUDGET_FX_IN_TEST_MODE is set and non-empty the in-memory sample data and rates are
    // used instead of the network.
    let mode = Mode::from_env();

    let _: () = match args.command() {
        Command::Init(init_args) => commands::init(home, init_args.api_url()).await?.print(),

        Command::Rates(rates_args) => {
            let app = load_app(&args, mode).await?;
            if rates_args.watch() {
                commands::rates_watch(&app, rates_args.all()).await?.print()
            } else {
                commands::rates(&app, rates_args.all()).await?.print()
            }
        }

        Command::Convert(convert_args) => {
            let mut app = load_app(&args, mode).await?;
            app.sync_profile().await?;
            commands::convert(
                &app,
                convert_args.amount(),
                convert_args.from(),
                convert_args.to(),
            )
            .await?
            .print()
        }

        Command::Currency(currency_args) => {
            let mut app = load_app(&args, mode).await?;
            // The profile is applied first so that an explicit `set` wins.
            app.sync_profile().await?;
            match currency_args.action() {
                CurrencyAction::Show => commands::currency_show(&app).await?.print(),
                CurrencyAction::Set { code } => {
                    commands::currency_set(&mut app, code).await?.print()
                }
            }
        }

        Command::Dashboard(dashboard_args) => {
            let mut app = load_app(&args, mode).await?;
            app.sync_profile().await?;
            commands::dashboard(&app, dashboard_args.month())
                .await?
                .print()
        }

        Command::Budget(budget_args) => {
            let mut app = load_app(&args, mode).await?;
            app.sync_profile().await?;
            match budget_args.action() {
                BudgetAction::Set(set_args) => commands::budget_set(&app, set_args).await?.print(),
            }
        }

        Command::Trend(trend_args) => {
            let mut app = load_app(&args, mode).await?;
            app.sync_profile().await?;
            commands::trend(&app, trend_args.months(), trend_args.until())
                .await?
                .print()
        }
    };
    Ok(())
}

/// Loads the config from the home directory and builds the `App` over it.
async fn load_app(args: &Args, mode: Mode) -> Result<App> {
    let config = Config::load(args.common().home().path()).await?;
    App::new(config, args.common().api_token(), mode).await
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            EnvFilter::new(format!(
                "{}={},{}={}",
                env!("CARGO_CRATE_NAME"),
                level,
                env!("CARGO_BIN_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
