//! The user's display currency preference, persisted at `$BUDGET_FX_HOME/preferences.json`.
//!
//! The active currency resolves in this order: the profile currency once the profile has been
//! loaded, then the stored preference, then `Currency::DEFAULT_DISPLAY`.

use crate::model::Currency;
use crate::{utils, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The serialized form of the preference file.
///
/// ```json
/// {
///   "preferred_currency": "EUR",
///   "profile_currency": "PHP"
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
struct PreferenceFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preferred_currency: Option<Currency>,

    /// The last profile currency that was applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    profile_currency: Option<Currency>,
}

#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
    currency: Currency,
    /// The last profile currency that was applied, so that each profile value is applied once,
    /// across runs.
    synced_profile: Option<Currency>,
}

impl PreferenceStore {
    /// Loads the store from `path`. A missing file means no stored preference.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file: PreferenceFile = if path.is_file() {
            utils::deserialize(&path).await?
        } else {
            debug!("No preference file at {}, using defaults", path.display());
            PreferenceFile::default()
        };
        Ok(Self {
            path,
            currency: file.preferred_currency.unwrap_or(Currency::DEFAULT_DISPLAY),
            synced_profile: file.profile_currency,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn display_currency(&self) -> Currency {
        self.currency
    }

    /// Sets and persists the display currency.
    pub async fn set_display_currency(&mut self, currency: Currency) -> Result<()> {
        self.currency = currency;
        self.save().await?;
        info!("Display currency set to {currency}");
        Ok(())
    }

    async fn save(&self) -> Result<()> {
        let file = PreferenceFile {
            preferred_currency: Some(self.currency),
            profile_currency: self.synced_profile,
        };
        utils::serialize(&self.path, &file).await
    }

    /// Applies the profile's currency when it is known and differs from the last profile value
    /// that was applied. Returns true when the display currency was changed.
    pub async fn sync_with_profile(&mut self, profile_currency: Option<Currency>) -> Result<bool> {
        let Some(profile_currency) = profile_currency else {
            return Ok(false);
        };
        if self.synced_profile == Some(profile_currency) {
            return Ok(false);
        }
        self.synced_profile = Some(profile_currency);
        if self.currency == profile_currency {
            self.save().await?;
            return Ok(false);
        }
        debug!(
            "Profile currency {profile_currency} overrides stored preference {}",
            self.currency
        );
        self.set_display_currency(profile_currency).await?;
        Ok(true)
    }
}
