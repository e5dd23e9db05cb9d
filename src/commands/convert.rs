use crate::app::App;
use crate::commands::{Out, DISPLAY_FORMAT};
use crate::model::{format_with, Currency};
use crate::Result;
use serde::Serialize;

/// The structured output of the `convert` command.
#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    pub amount: f64,
    pub from: String,
    pub to: Currency,
    pub value: f64,
    /// False when no rate was available and `value` is `amount` unconverted.
    pub converted: bool,
    pub rates_stale: bool,
}

/// Converts `amount` from `from` into `to`, or into the display currency. A missing rate does not
/// fail the command, the amount is shown unconverted and flagged.
pub async fn convert(
    app: &App,
    amount: f64,
    from: &str,
    to: Option<Currency>,
) -> Result<Out<Conversion>> {
    let ctx = app.currency_context().await;
    let to = to.unwrap_or(ctx.currency());
    let from = from.trim().to_uppercase();
    let (value, converted) = match ctx.try_convert_to(amount, &from, to.as_str()) {
        Ok(v) => (v, true),
        Err(_) => (ctx.convert_to(amount, &from, to.as_str()), false),
    };

    let mut message = if converted {
        format!(
            "{} = {}",
            format_with(amount, &from, DISPLAY_FORMAT),
            format_with(value, to.as_str(), DISPLAY_FORMAT)
        )
    } else {
        format!(
            "No exchange rate to convert {from} into {to}, showing {} unconverted",
            format_with(amount, &from, DISPLAY_FORMAT)
        )
    };
    if converted && ctx.rates_stale() {
        message.push_str(" (rates may be out of date)");
    }
    Ok(Out::new(
        message,
        Conversion {
            amount,
            from,
            to,
            value,
            converted,
            rates_stale: ctx.rates_stale(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_convert_to_display_currency() {
        let env = TestEnv::new().await;
        let app = env.app().await;
        let out = convert(&app, 1000.0, "php", None).await.unwrap();
        let c = out.structure().unwrap();
        assert_eq!(c.to, Currency::Eur);
        assert!((c.value - 16.0).abs() < 1e-9);
        assert!(c.converted);
        assert_eq!(out.message(), "₱1,000.00 = €16.00");
    }

    #[tokio::test]
    async fn test_convert_identity() {
        let env = TestEnv::new().await;
        let app = env.app().await;
        let out = convert(&app, 0.1 + 0.2, "USD", Some(Currency::Usd))
            .await
            .unwrap();
        assert_eq!(out.structure().unwrap().value, 0.1 + 0.2);
    }

    #[tokio::test]
    async fn test_convert_unknown_currency_is_unconverted() {
        let env = TestEnv::new().await;
        let app = env.app().await;
        let out = convert(&app, 100.0, "XXX", None).await.unwrap();
        let c = out.structure().unwrap();
        assert_eq!(c.value, 100.0);
        assert!(!c.converted);
        assert!(out.message().contains("XXX 100.00"));
    }
}
