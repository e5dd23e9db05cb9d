//! Shared test utilities for creating test environments.
//!
//! This module is only compiled when running tests (`#[cfg(test)]`).

use crate::api::TestBudgetApi;
use crate::app::App;
use crate::fx::TestRateSource;
use crate::Config;
use std::sync::Arc;
use tempfile::TempDir;

/// Test environment that sets up a home directory with a Config and in-memory collaborators.
/// Holds TempDir to keep the directory alive for the duration of the test.
pub(crate) struct TestEnv {
    _temp_dir: TempDir,
    config: Config,
    api: Arc<TestBudgetApi>,
    rates: Arc<TestRateSource>,
}

impl TestEnv {
    /// Creates a test environment with a fresh home directory and seeded collaborators.
    pub(crate) async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("budget-fx");
        let config = Config::create(&root, None).await.unwrap();
        Self {
            _temp_dir: temp_dir,
            config,
            api: Arc::new(TestBudgetApi::default()),
            rates: Arc::new(TestRateSource::default()),
        }
    }

    /// Returns a clone of the Config.
    pub(crate) fn config(&self) -> Config {
        self.config.clone()
    }

    /// The in-memory budgeting API shared by every `App` built from this environment.
    pub(crate) fn api(&self) -> Arc<TestBudgetApi> {
        self.api.clone()
    }

    /// The in-memory rate source shared by every `App` built from this environment.
    pub(crate) fn rates(&self) -> Arc<TestRateSource> {
        self.rates.clone()
    }

    /// Builds an `App` over this environment. Each call reloads the stored preferences, like a new
    /// run of the program would.
    pub(crate) async fn app(&self) -> App {
        App::with_collaborators(self.config(), self.api.clone(), self.rates.clone())
            .await
            .unwrap()
    }
}
