//! `App` is the application-scoped state that the currency and aggregation layers are handed: the
//! configuration, the collaborators, the rate cache and the display currency preference.

use crate::api::{self, BudgetApi, Mode};
use crate::context::CurrencyContext;
use crate::fx::{self, RateService, RateSource};
use crate::model::{Currency, Profile};
use crate::preferences::PreferenceStore;
use crate::{Config, Result};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct App {
    config: Config,
    api: Arc<dyn BudgetApi>,
    rates: Arc<RateService>,
    preferences: PreferenceStore,
    profile: Option<Profile>,
}

impl App {
    /// Builds the app for `mode` without contacting the server. The display currency is the stored
    /// preference, or the system default.
    pub async fn new(config: Config, api_token: Option<&str>, mode: Mode) -> Result<Self> {
        let api = api::budget_api(&config, api_token, mode)?;
        let source = fx::rate_source(config.rates_url(), mode)?;
        Self::with_collaborators(config, api, source).await
    }

    pub async fn with_collaborators(
        config: Config,
        api: Arc<dyn BudgetApi>,
        source: Arc<dyn RateSource>,
    ) -> Result<Self> {
        let rates = Arc::new(RateService::new(
            source,
            config.base_currency(),
            config.rate_policy(),
        ));
        let preferences = PreferenceStore::load(config.preferences_path()).await?;
        debug!(
            "Display currency from preferences: {}",
            preferences.display_currency()
        );
        Ok(Self {
            config,
            api,
            rates,
            preferences,
            profile: None,
        })
    }

    /// Loads the profile and lets its currency override the stored preference. A failure to load
    /// the profile is logged and the stored preference stays in effect.
    pub async fn sync_profile(&mut self) -> Result<()> {
        let profile = match self.api.profile().await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Unable to load the profile, keeping the stored currency: {e:#}");
                return Ok(());
            }
        };
        if self
            .preferences
            .sync_with_profile(profile.display_currency())
            .await?
        {
            debug!(
                "Display currency taken from the profile: {}",
                self.preferences.display_currency()
            );
        }
        self.profile = Some(profile);
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn api(&self) -> Arc<dyn BudgetApi> {
        Arc::clone(&self.api)
    }

    pub fn rate_service(&self) -> Arc<RateService> {
        Arc::clone(&self.rates)
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn currency(&self) -> Currency {
        self.preferences.display_currency()
    }

    /// Changes and persists the display currency.
    pub async fn set_currency(&mut self, currency: Currency) -> Result<()> {
        self.preferences.set_display_currency(currency).await
    }

    /// Loads rates if they are missing or stale and returns a context for the current display
    /// currency. Never fails: without rates, amounts are shown unconverted and flagged.
    pub async fn currency_context(&self) -> CurrencyContext {
        let rates = self.rates.load().await;
        CurrencyContext::new(self.currency(), self.rates.base(), rates)
    }

    /// A context built from the rates already cached, without fetching.
    pub async fn cached_currency_context(&self) -> CurrencyContext {
        let rates = self.rates.snapshot().await;
        CurrencyContext::new(self.currency(), self.rates.base(), rates)
    }
}
