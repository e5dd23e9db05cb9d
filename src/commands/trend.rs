use crate::aggregate::{monthly_totals, MonthTotal};
use crate::app::App;
use crate::commands::{Out, DISPLAY_FORMAT};
use crate::model::Period;
use crate::Result;
use anyhow::Context;
use std::fmt::Write;

/// Shows total spend in the display currency for `months` months ending with `until`.
pub async fn trend(
    app: &App,
    months: usize,
    until: Option<Period>,
) -> Result<Out<Vec<MonthTotal>>> {
    let until = until.unwrap_or_else(Period::current);
    let periods = until.trailing(months.max(1));
    let ctx = app.currency_context().await;
    let transactions = app
        .api()
        .transactions()
        .await
        .context("Unable to load transactions")?;
    let totals = monthly_totals(&transactions, &periods, &ctx);

    let mut message = format!("Monthly spend in {}", ctx.currency());
    for t in &totals {
        let _ = write!(
            message,
            "\n  {}  {:>14}  {:>3} txn",
            t.period,
            ctx.format_amount_with(t.spent, DISPLAY_FORMAT),
            t.transaction_count
        );
    }
    if ctx.rates_stale() {
        message.push_str("\nWarning: exchange rates may be out of date");
    }
    Ok(Out::new(message, totals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Currency;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_trend() {
        let env = TestEnv::new().await;
        let mut app = env.app().await;
        app.set_currency(Currency::Php).await.unwrap();
        let out = trend(&app, 4, Some(Period::new(2025, 3).unwrap()))
            .await
            .unwrap();
        let totals = out.structure().unwrap();
        assert_eq!(totals.len(), 4);
        assert_eq!(totals[0].period, Period::new(2024, 12).unwrap());
        assert_eq!(totals[0].transaction_count, 0);
        assert_eq!(totals[1].spent, 2750.0 + 3300.0);
        assert_eq!(totals[2].spent, 2200.0 + 1500.0 + 980.0);
        assert_eq!(totals[3].transaction_count, 8);
    }

    #[tokio::test]
    async fn test_zero_months_shows_one() {
        let env = TestEnv::new().await;
        let app = env.app().await;
        let out = trend(&app, 0, Some(Period::new(2025, 1).unwrap()))
            .await
            .unwrap();
        assert_eq!(out.structure().unwrap().len(), 1);
    }
}
