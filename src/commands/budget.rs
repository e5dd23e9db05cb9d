use crate::aggregate::{Dashboard, MonthView};
use crate::app::App;
use crate::args::BudgetSetArgs;
use crate::commands::dashboard::{load_view, view_out};
use crate::commands::{Out, DISPLAY_FORMAT};
use crate::model::{format_with, Period};
use crate::Result;
use anyhow::{bail, Context};
use tracing::info;

/// Sets a category's budget for a month and shows the refreshed figures.
///
/// The amount is taken to be in the display currency and converted into the base currency before
/// it is sent, unless `--base` is given. A conversion without a usable rate is an error rather
/// than a silent write of the unconverted number.
pub async fn budget_set(app: &App, args: &BudgetSetArgs) -> Result<Out<MonthView>> {
    let period = args.month().unwrap_or_else(Period::current);
    let ctx = app.currency_context().await;
    let mut dashboard = Dashboard::new(app.api(), period);
    dashboard.refresh().await;
    let view = load_view(&mut dashboard, &ctx).await;
    if matches!(view, MonthView::NeedsRetry { .. }) {
        return view_out(view, &ctx);
    }

    let Some(category) = dashboard.find_category(args.category()) else {
        bail!("There is no category named '{}'", args.category());
    };
    let (id, name) = (category.id.clone(), category.name.clone());

    let amount = if args.base() {
        args.amount()
    } else {
        ctx.try_convert_to(args.amount(), ctx.currency().as_str(), ctx.base())
            .with_context(|| {
                format!(
                    "Unable to convert {} into {}, pass --base to give the amount in {}",
                    format_with(args.amount(), ctx.currency().as_str(), DISPLAY_FORMAT),
                    ctx.base(),
                    ctx.base()
                )
            })?
    };
    dashboard.update_budget(&id, amount).await?;
    info!(
        "Set the {period} budget for {name} to {}",
        format_with(amount, ctx.base(), DISPLAY_FORMAT)
    );
    view_out(dashboard.view(&ctx), &ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BudgetError;
    use crate::model::Currency;
    use crate::test::TestEnv;

    fn march() -> Option<Period> {
        Some(Period::new(2025, 3).unwrap())
    }

    #[tokio::test]
    async fn test_set_in_display_currency() {
        let env = TestEnv::new().await;
        let app = env.app().await;
        let args = BudgetSetArgs::new("groceries", 160.0, march(), false);
        let out = budget_set(&app, &args).await.unwrap();
        assert_eq!(env.api().writes(), 1);
        let MonthView::Ready(report) = out.structure().unwrap() else {
            panic!("Expected a ready view");
        };
        // 160 EUR is 10,000 PHP, shown back as 160 EUR.
        assert!((report.category("1").unwrap().budget - 160.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_set_in_base_currency() {
        let env = TestEnv::new().await;
        let mut app = env.app().await;
        app.set_currency(Currency::Php).await.unwrap();
        let args = BudgetSetArgs::new("3", 3500.0, march(), true);
        let out = budget_set(&app, &args).await.unwrap();
        let MonthView::Ready(report) = out.structure().unwrap() else {
            panic!("Expected a ready view");
        };
        assert_eq!(report.category("3").unwrap().budget, 3500.0);
    }

    #[tokio::test]
    async fn test_past_month_is_read_only() {
        let env = TestEnv::new().await;
        let app = env.app().await;
        let february = Some(Period::new(2025, 2).unwrap());
        let args = BudgetSetArgs::new("Groceries", 100.0, february, true);
        let err = budget_set(&app, &args).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BudgetError>(),
            Some(BudgetError::StaleWrite { .. })
        ));
        assert_eq!(env.api().writes(), 0);
    }

    #[tokio::test]
    async fn test_unknown_category() {
        let env = TestEnv::new().await;
        let app = env.app().await;
        let args = BudgetSetArgs::new("Holidays", 100.0, march(), true);
        assert!(budget_set(&app, &args).await.is_err());
        assert_eq!(env.api().writes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_rates_refuses_conversion() {
        let env = TestEnv::new().await;
        env.rates().fail_always().await;
        let app = env.app().await;
        let args = BudgetSetArgs::new("Groceries", 100.0, march(), false);
        assert!(budget_set(&app, &args).await.is_err());
        assert_eq!(env.api().writes(), 0);
    }
}
