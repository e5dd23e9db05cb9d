use crate::aggregate::{Dashboard, MonthReport, MonthView};
use crate::app::App;
use crate::commands::{Out, DISPLAY_FORMAT};
use crate::context::CurrencyContext;
use crate::error::BudgetError;
use crate::model::Period;
use crate::Result;
use std::fmt::Write;
use tracing::debug;

/// Loads the month and shows spend, budget and remaining amounts per category in the display
/// currency. Collections that fail to load are retried once before giving up.
///
/// # Errors
/// - Returns `BudgetError::PartialLoad` when categories or budgets still cannot be loaded.
pub async fn dashboard(app: &App, month: Option<Period>) -> Result<Out<MonthView>> {
    let period = month.unwrap_or_else(Period::current);
    let ctx = app.currency_context().await;
    let mut dashboard = Dashboard::new(app.api(), period);
    dashboard.refresh().await;
    let view = load_view(&mut dashboard, &ctx).await;
    view_out(view, &ctx)
}

/// Builds the view, retrying once when anything failed to load.
pub(super) async fn load_view(dashboard: &mut Dashboard, ctx: &CurrencyContext) -> MonthView {
    let view = dashboard.view(ctx);
    let needs_retry = match &view {
        MonthView::Ready(report) => report.is_partial(),
        MonthView::NeedsRetry { .. } | MonthView::Loading { .. } => true,
    };
    if !needs_retry {
        return view;
    }
    debug!("Retrying the collections that failed to load");
    dashboard.retry().await;
    dashboard.view(ctx)
}

pub(super) fn view_out(view: MonthView, ctx: &CurrencyContext) -> Result<Out<MonthView>> {
    let message = match &view {
        MonthView::Ready(report) => report_message(report, ctx),
        MonthView::NeedsRetry {
            failed, errors, ..
        } => {
            let names = failed
                .iter()
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join(" and ");
            return Err(anyhow::Error::new(BudgetError::PartialLoad(names))
                .context(errors.join("; ")));
        }
        MonthView::Loading { period } => format!("The figures for {period} are still loading"),
    };
    Ok(Out::new(message, view))
}

fn report_message(report: &MonthReport, ctx: &CurrencyContext) -> String {
    let fmt = |amount: f64| ctx.format_amount_with(amount, DISPLAY_FORMAT);
    let mut message = format!("Budget for {} in {}", report.period, report.currency);
    for c in &report.categories {
        let flag = if c.over_budget { "  OVER" } else { "" };
        let _ = write!(
            message,
            "\n  {:<16} {:>14} of {:>14} {:>6.1}%  {:>3} txn{flag}",
            c.name,
            fmt(c.spent),
            fmt(c.budget),
            c.percentage,
            c.transaction_count,
        );
    }
    let _ = write!(
        message,
        "\nSpent {} of {} ({:.1}%), {} remaining",
        fmt(report.total_spent),
        fmt(report.total_budget),
        report.percentage_used,
        fmt(report.remaining),
    );
    let _ = write!(
        message,
        "\nHighest spender: {}",
        report.highest_spender_name()
    );
    if !report.unconverted.is_empty() {
        let _ = write!(
            message,
            "\nWarning: no exchange rate for {}, those amounts are included unconverted",
            report.unconverted.join(", ")
        );
    }
    if report.rates_stale {
        message.push_str("\nWarning: exchange rates may be out of date");
    }
    if report.is_partial() {
        let names = report
            .retry
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let _ = write!(
            message,
            "\nWarning: unable to load {names}, figures are based on the server's tallies"
        );
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Collection;
    use crate::test::TestEnv;

    fn march() -> Option<Period> {
        Some(Period::new(2025, 3).unwrap())
    }

    #[tokio::test]
    async fn test_dashboard() {
        let env = TestEnv::new().await;
        let app = env.app().await;
        let out = dashboard(&app, march()).await.unwrap();
        let MonthView::Ready(report) = out.structure().unwrap() else {
            panic!("Expected a ready view");
        };
        assert_eq!(report.transaction_count, 8);
        assert_eq!(report.highest_spender_name(), "Groceries");
        assert!(report.uncategorized().is_some());
        assert!(out.message().contains("Highest spender: Groceries"));
        assert!(out.message().contains("Uncategorized"));
        assert!(!out.message().contains("Warning"));
    }

    #[tokio::test]
    async fn test_empty_month() {
        let env = TestEnv::new().await;
        let app = env.app().await;
        let out = dashboard(&app, Some(Period::new(2024, 6).unwrap()))
            .await
            .unwrap();
        assert!(out.message().contains("Highest spender: N/A"));
    }

    #[tokio::test]
    async fn test_budget_failure() {
        let env = TestEnv::new().await;
        env.api().fail(Collection::Budgets).await;
        let app = env.app().await;
        let err = dashboard(&app, march()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BudgetError>(),
            Some(BudgetError::PartialLoad(_))
        ));
    }

    #[tokio::test]
    async fn test_transaction_failure_is_flagged() {
        let env = TestEnv::new().await;
        env.api().fail(Collection::Transactions).await;
        let app = env.app().await;
        let out = dashboard(&app, march()).await.unwrap();
        assert!(out.message().contains("unable to load transactions"));
    }
}
