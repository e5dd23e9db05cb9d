use crate::app::App;
use crate::commands::Out;
use crate::model::Currency;
use crate::Result;
use serde::Serialize;

/// The structured output of the `currency` commands.
#[derive(Debug, Clone, Serialize)]
pub struct CurrencyInfo {
    pub currency: Currency,
    pub symbol: String,
    pub supported: Vec<Currency>,
}

impl CurrencyInfo {
    fn new(currency: Currency) -> Self {
        Self {
            currency,
            symbol: currency.symbol().to_string(),
            supported: Currency::ALL.to_vec(),
        }
    }
}

/// Shows the display currency and the currencies that can be chosen.
pub async fn currency_show(app: &App) -> Result<Out<CurrencyInfo>> {
    let currency = app.currency();
    let supported = Currency::ALL
        .iter()
        .map(|c| format!("{c} ({})", c.symbol()))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(Out::new(
        format!(
            "Display currency: {currency} ({})\nSupported: {supported}",
            currency.symbol()
        ),
        CurrencyInfo::new(currency),
    ))
}

/// Sets and persists the display currency.
pub async fn currency_set(app: &mut App, currency: Currency) -> Result<Out<CurrencyInfo>> {
    app.set_currency(currency).await?;
    Ok(Out::new(
        format!("Display currency set to {currency} ({})", currency.symbol()),
        CurrencyInfo::new(currency),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_set_then_show() {
        let env = TestEnv::new().await;
        let mut app = env.app().await;
        let out = currency_show(&app).await.unwrap();
        assert!(out.message().starts_with("Display currency: EUR (€)"));

        currency_set(&mut app, Currency::Chf).await.unwrap();
        let app = env.app().await;
        let out = currency_show(&app).await.unwrap();
        assert_eq!(out.structure().unwrap().currency, Currency::Chf);
        assert_eq!(out.structure().unwrap().supported.len(), 8);
    }
}
