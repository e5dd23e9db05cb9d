use crate::app::App;
use crate::commands::Out;
use crate::context::CurrencyContext;
use crate::error::BudgetError;
use crate::model::Currency;
use crate::Result;
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::future::Future;
use tracing::{info, warn};

/// The structured output of the `rates` command.
#[derive(Debug, Clone, Serialize)]
pub struct RatesInfo {
    pub base: String,
    pub fetched_at: DateTime<Utc>,
    pub rates: BTreeMap<String, f64>,
    pub stale: bool,
    pub error: Option<String>,
}

/// Shows the rates of the supported currencies, or of every currency when `all` is set, relative
/// to the base currency.
///
/// # Errors
/// - Returns the fetch error when no rates could be loaded at all.
pub async fn rates(app: &App, all: bool) -> Result<Out<RatesInfo>> {
    let ctx = app.currency_context().await;
    rates_out(&ctx, all)
}

/// Keeps the rates fresh in the background and prints them after every refresh until Ctrl-C.
pub async fn rates_watch(app: &App, all: bool) -> Result<Out<RatesInfo>> {
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Unable to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };
    watch_until(app, all, shutdown, |out| out.print()).await
}

/// Hands the rates to `on_refresh` once up front and again each time a background refresh
/// finishes, until `shutdown` resolves. Returns the last output.
async fn watch_until<F>(
    app: &App,
    all: bool,
    shutdown: impl Future<Output = ()>,
    mut on_refresh: F,
) -> Result<Out<RatesInfo>>
where
    F: FnMut(&Out<RatesInfo>),
{
    let service = app.rate_service();
    let mut out = rates(app, all).await;
    if let Ok(o) = &out {
        on_refresh(o);
    }

    let mut updates = service.subscribe();
    let handle = service.spawn_refresh();
    info!(
        "Refreshing every {}s, press Ctrl-C to stop",
        service.refresh_interval().as_secs()
    );
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                out = rates_out(&app.cached_currency_context().await, all);
                match &out {
                    Ok(o) => on_refresh(o),
                    Err(e) => warn!("{e:#}"),
                }
            }
        }
    }
    handle.abort();
    out
}

fn rates_out(ctx: &CurrencyContext, all: bool) -> Result<Out<RatesInfo>> {
    let Some(table) = ctx.exchange_rates() else {
        return Err(match ctx.rates_error() {
            Some(e) => e.clone().into(),
            None => anyhow!(BudgetError::MissingRate(ctx.base().to_string())),
        });
    };
    let rates: BTreeMap<String, f64> = if all {
        table.rates().clone()
    } else {
        Currency::ALL
            .iter()
            .filter_map(|c| table.rate(c.as_str()).map(|r| (c.as_str().to_string(), r)))
            .collect()
    };

    let mut message = format!(
        "Exchange rates for 1 {} as of {}",
        table.base(),
        table.fetched_at().format("%Y-%m-%d %H:%M UTC")
    );
    for (code, rate) in &rates {
        let _ = write!(message, "\n  {code:<4} {rate:>14.6}");
    }
    if ctx.rates_stale() {
        message.push_str("\nThese rates could not be refreshed and may be out of date.");
    }
    Ok(Out::new(
        message,
        RatesInfo {
            base: table.base().to_string(),
            fetched_at: table.fetched_at(),
            rates,
            stale: ctx.rates_stale(),
            error: ctx.rates_error().map(|e| e.to_string()),
        },
    ))
}
