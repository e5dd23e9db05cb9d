use crate::commands::Out;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the home directory and an initial `config.json`.
///
/// # Arguments
/// - `home` - The directory that will hold the configuration, e.g. `$HOME/budget-fx`
/// - `api_url` - The root URL of the budgeting API. Defaults to `http://localhost:5000/api`.
///
/// # Errors
/// - Returns an error if the directory is already initialized or any file operation fails.
pub async fn init(home: &Path, api_url: Option<&str>) -> Result<Out<()>> {
    let config = Config::create(home, api_url)
        .await
        .context("Unable to create the home directory and config")?;
    Ok(format!(
        "Created {} using the API at {}",
        config.config_path().display(),
        config.api_url()
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("home");
        let out = init(&home, Some("https://budget.example.com/api"))
            .await
            .unwrap();
        assert!(out.message().contains("https://budget.example.com/api"));
        assert!(home.join("config.json").is_file());
        assert!(init(&home, None).await.is_err());
    }
}
