//! Configuration file handling.
//!
//! The configuration file is stored at `$BUDGET_FX_HOME/config.json` and holds the location of the
//! budgeting API, the exchange rate endpoint, the base currency and the rate caching policy.

use crate::fx::RatePolicy;
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const APP_NAME: &str = "budget-fx";
const CONFIG_VERSION: u8 = 1;
const CONFIG_JSON: &str = "config.json";
const PREFERENCES_JSON: &str = "preferences.json";

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_RATES_URL: &str = "https://api.exchangerate-api.com/v4/latest";
pub const DEFAULT_BASE_CURRENCY: &str = "PHP";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$BUDGET_FX_HOME` and from there it loads `$BUDGET_FX_HOME/config.json`. It also
/// provides the paths of other files that are expected in the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    preferences_path: PathBuf,
    config_file: ConfigFile,
}

impl Config {
    /// Creates the home directory and an initial `config.json` pointing at `api_url`, or at
    /// `DEFAULT_API_URL` when `None`.
    ///
    /// # Errors
    /// - Returns an error if `config.json` already exists or any file operation fails.
    pub async fn create(dir: impl Into<PathBuf>, api_url: Option<&str>) -> Result<Self> {
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        if config_path.exists() {
            bail!(
                "The config file already exists '{}'",
                config_path.display()
            );
        }

        let config_file = ConfigFile {
            api_url: api_url.unwrap_or(DEFAULT_API_URL).to_string(),
            ..ConfigFile::default()
        };
        config_file.validate()?;
        config_file.save(&config_path).await?;

        Ok(Self {
            preferences_path: root.join(PREFERENCES_JSON),
            root,
            config_path,
            config_file,
        })
    }

    /// This will
    /// - validate that the home directory and the config file exist
    /// - load and validate the config file
    /// - return the loaded configuration object
    pub async fn load(home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = home.into();
        if !maybe_relative.is_dir() {
            bail!(
                "The home directory is missing '{}', run init first",
                maybe_relative.display()
            );
        }
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        Ok(Self {
            preferences_path: root.join(PREFERENCES_JSON),
            root,
            config_path,
            config_file,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn preferences_path(&self) -> &Path {
        &self.preferences_path
    }

    pub fn api_url(&self) -> &str {
        &self.config_file.api_url
    }

    pub fn rates_url(&self) -> &str {
        &self.config_file.rates_url
    }

    /// The currency the server stores canonical amounts in.
    pub fn base_currency(&self) -> &str {
        &self.config_file.base_currency
    }

    pub fn rate_policy(&self) -> RatePolicy {
        self.config_file.rates.policy()
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "budget-fx",
///   "config_version": 1,
///   "api_url": "http://localhost:5000/api",
///   "rates_url": "https://api.exchangerate-api.com/v4/latest",
///   "base_currency": "PHP",
///   "rates": {
///     "staleness_secs": 1800,
///     "refresh_secs": 3600,
///     "max_attempts": 3,
///     "initial_backoff_ms": 500
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "budget-fx"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Root URL of the budgeting API
    api_url: String,

    /// Exchange rate endpoint, the base currency code is appended as a path segment
    #[serde(default = "default_rates_url")]
    rates_url: String,

    /// The currency the server stores amounts in
    #[serde(default = "default_base_currency")]
    base_currency: String,

    #[serde(default)]
    rates: RateSettings,
}

/// How exchange rates are cached and retried.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
struct RateSettings {
    /// Seconds a fetched rate table is served without refetching
    staleness_secs: u64,

    /// Seconds between background refreshes
    refresh_secs: u64,

    /// Fetch attempts per refresh
    max_attempts: u32,

    /// Milliseconds to wait after the first failed attempt, doubled after each failure
    initial_backoff_ms: u64,
}

impl Default for RateSettings {
    fn default() -> Self {
        let policy = RatePolicy::default();
        Self {
            staleness_secs: policy.staleness.as_secs(),
            refresh_secs: policy.refresh_interval.as_secs(),
            max_attempts: policy.max_attempts,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
        }
    }
}

impl RateSettings {
    fn policy(&self) -> RatePolicy {
        RatePolicy {
            staleness: Duration::from_secs(self.staleness_secs),
            refresh_interval: Duration::from_secs(self.refresh_secs),
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
        }
    }
}

fn default_rates_url() -> String {
    DEFAULT_RATES_URL.to_string()
}

fn default_base_currency() -> String {
    DEFAULT_BASE_CURRENCY.to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            api_url: DEFAULT_API_URL.to_string(),
            rates_url: default_rates_url(),
            base_currency: default_base_currency(),
            rates: RateSettings::default(),
        }
    }
}

impl ConfigFile {
    /// Loads and validates a ConfigFile from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or fails validation
    async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;

        let mut config: ConfigFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
        config.base_currency = config.base_currency.trim().to_uppercase();
        config
            .validate()
            .with_context(|| format!("Invalid config file at {}", path.display()))?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            self.app_name
        );
        Url::parse(&self.api_url).with_context(|| format!("Invalid api_url '{}'", self.api_url))?;
        Url::parse(&self.rates_url)
            .with_context(|| format!("Invalid rates_url '{}'", self.rates_url))?;
        anyhow::ensure!(
            self.base_currency.len() == 3
                && self.base_currency.chars().all(|c| c.is_ascii_alphabetic()),
            "Invalid base_currency '{}', expected a three letter code",
            self.base_currency
        );
        anyhow::ensure!(
            self.rates.max_attempts > 0,
            "rates.max_attempts must be at least 1"
        );
        anyhow::ensure!(
            self.rates.refresh_secs > 0,
            "rates.refresh_secs must be at least 1"
        );
        Ok(())
    }

    /// Saves the ConfigFile to the specified path.
    async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        utils::serialize(path.as_ref(), self)
            .await
            .context("Unable to write config file")
    }
}
