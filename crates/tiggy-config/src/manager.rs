use crate::config::{AuthConfig, Config, ConfigError, ConfigResult};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Loads, validates and persists the client configuration
///
/// Two copies are kept: the file as written, with `${VAR}` templates intact,
/// and the expanded view handed to callers. Edits go to the file copy, so
/// saving never bakes environment values into the file.
#[derive(Clone)]
pub struct ConfigManager {
    path: PathBuf,
    raw: Arc<RwLock<Config>>,
    config: Arc<RwLock<Config>>,
}

impl ConfigManager {
    /// Load the config file, writing defaults if it does not exist
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        let content = if path.exists() {
            info!("Loading config from {:?}", path);
            tokio::fs::read_to_string(path).await?
        } else {
            info!("Config file not found, creating default config at {:?}", path);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let content = serde_json::to_string_pretty(&Config::default())?;
            tokio::fs::write(path, &content).await?;
            content
        };

        let (raw, config) = Self::parse(&content)?;

        Ok(Self {
            path: path.to_path_buf(),
            raw: Arc::new(RwLock::new(raw)),
            config: Arc::new(RwLock::new(config)),
        })
    }

    /// Load from `~/.tiggy/config.json`
    pub async fn load_default() -> ConfigResult<Self> {
        let config_path = Self::default_config_path()?;
        Self::load(&config_path).await
    }

    /// `~/.tiggy/config.json`, or `InvalidPath` without a home directory
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        crate::default_config_path()
            .ok_or_else(|| ConfigError::InvalidPath("Could not find home directory".to_string()))
    }

    /// Wrap an in-memory config (used by tests and `config init`)
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self {
            path,
            raw: Arc::new(RwLock::new(config.clone())),
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Shared handle to the expanded config
    pub fn get(&self) -> Arc<RwLock<Config>> {
        Arc::clone(&self.config)
    }

    /// Clone of the current config
    pub async fn snapshot(&self) -> Config {
        self.config.read().await.clone()
    }

    /// Write the config to disk, templates unexpanded
    pub async fn save(&self) -> ConfigResult<()> {
        let raw = self.raw.read().await;
        let content = serde_json::to_string_pretty(&*raw)?;
        drop(raw);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&self.path, content).await?;
        info!("Config saved to {:?}", self.path);
        Ok(())
    }

    /// Re-read the file; the current config is kept if it fails to parse or validate
    pub async fn reload(&self) -> ConfigResult<()> {
        if !self.path.exists() {
            return Err(ConfigError::InvalidPath(format!(
                "Config file not found: {:?}",
                self.path
            )));
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        let (new_raw, new_config) = Self::parse(&content)?;

        let mut raw = self.raw.write().await;
        let mut config = self.config.write().await;
        *raw = new_raw;
        *config = new_config;
        drop(config);
        drop(raw);

        info!("Config reloaded from {:?}", self.path);
        Ok(())
    }

    /// Apply a fallible edit, validate and save
    ///
    /// The edit sees the file copy; the result is expanded and validated
    /// before anything is replaced.
    pub async fn update<F>(&self, f: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config) -> ConfigResult<()>,
    {
        let mut raw = self.raw.write().await;
        let mut edited = raw.clone();
        f(&mut edited)?;
        let (edited, expanded) = Self::parse(&serde_json::to_string(&edited)?)?;

        let mut config = self.config.write().await;
        *raw = edited;
        *config = expanded;
        drop(config);
        drop(raw);
        self.save().await
    }

    /// Parse file content into the raw and the expanded config
    fn parse(content: &str) -> ConfigResult<(Config, Config)> {
        let raw: Config = serde_json::from_str(content)?;
        let expanded: Config = serde_json::from_str(&Self::expand_env_vars(content)?)?;
        Self::validate(&expanded)?;
        Ok((raw, expanded))
    }

    /// Check the values the client cannot work without
    pub fn validate(config: &Config) -> ConfigResult<()> {
        let base_url = &config.backend.base_url;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "backend.base_url must be an http(s) URL, got '{}'",
                base_url
            )));
        }

        if config.backend.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "backend.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if !config.backend.api_prefix.is_empty() && !config.backend.api_prefix.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "backend.api_prefix must start with '/', got '{}'",
                config.backend.api_prefix
            )));
        }

        if let AuthConfig::DeviceCode { issuer, .. } = &config.auth {
            if !issuer.starts_with("https://") && !issuer.starts_with("http://") {
                return Err(ConfigError::Validation(format!(
                    "auth.issuer must be an http(s) URL, got '{}'",
                    issuer
                )));
            }
        }

        Ok(())
    }

    /// Expand `${VAR}` and `${VAR:-default}`
    fn expand_env_vars(content: &str) -> ConfigResult<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::Validation(format!("Invalid pattern: {}", e)))?;
        let mut result = content.to_string();

        for cap in re.captures_iter(content) {
            let (Some(full_match), Some(var_expr)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            let var_expr = var_expr.as_str();

            let (var_name, default_value) = match var_expr.split_once(":-") {
                Some((name, default)) => (name, Some(default)),
                None => (var_expr, None),
            };

            let replacement = match std::env::var(var_name) {
                Ok(val) => val,
                Err(_) => match default_value {
                    Some(default) => default.to_string(),
                    None => return Err(ConfigError::EnvVarNotFound(var_name.to_string())),
                },
            };

            result = result.replace(full_match.as_str(), &replacement);
        }

        Ok(result)
    }

    /// Path the config is saved to
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_creates_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let manager = ConfigManager::load(&config_path).await.unwrap();
        let config = manager.snapshot().await;

        assert!(config_path.exists());
        assert_eq!(config.backend.base_url, "http://localhost:5000");
        assert_eq!(config.backend.api_prefix, "/api");
    }

    #[tokio::test]
    async fn test_update_persists() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let manager = ConfigManager::load(&config_path).await.unwrap();

        manager
            .update(|config| config.set_value("ui.reply_delay_ms", "0"))
            .await
            .unwrap();

        let reloaded = ConfigManager::load(&config_path).await.unwrap();
        assert_eq!(reloaded.snapshot().await.ui.reply_delay_ms, 0);
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_edit() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let manager = ConfigManager::load(&config_path).await.unwrap();

        let result = manager
            .update(|config| config.set_value("backend.base_url", "ftp://nope"))
            .await;
        assert!(result.is_err());
        assert_eq!(manager.snapshot().await.backend.base_url, "http://localhost:5000");
    }

    #[tokio::test]
    async fn test_update_keeps_env_templates() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let manager = ConfigManager::load(&config_path).await.unwrap();

        manager
            .update(|config| config.set_value("ui.reply_delay_ms", "250"))
            .await
            .unwrap();

        let on_disk = std::fs::read_to_string(&config_path).unwrap();
        assert!(on_disk.contains("${TIGGY_CLIENT_ID:-}"));
        assert_eq!(manager.snapshot().await.ui.reply_delay_ms, 250);
    }

    #[tokio::test]
    async fn test_update_expands_new_template() {
        std::env::set_var("TIGGY_TEST_UPDATE_URL", "https://tiggy.test");
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let manager = ConfigManager::load(&config_path).await.unwrap();

        manager
            .update(|config| config.set_value("backend.base_url", "${TIGGY_TEST_UPDATE_URL}"))
            .await
            .unwrap();

        assert_eq!(manager.snapshot().await.backend.base_url, "https://tiggy.test");
        let on_disk = std::fs::read_to_string(&config_path).unwrap();
        assert!(on_disk.contains("${TIGGY_TEST_UPDATE_URL}"));
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("TIGGY_TEST_BACKEND", "https://backend.test");

        let content = r#"{"a": "${TIGGY_TEST_BACKEND}", "b": "${TIGGY_TEST_UNSET_VAR:-fallback}"}"#;
        let expanded = ConfigManager::expand_env_vars(content).unwrap();

        assert!(expanded.contains("https://backend.test"));
        assert!(expanded.contains("fallback"));
    }

    #[test]
    fn test_env_var_missing_without_default() {
        let content = r#"{"a": "${TIGGY_TEST_DEFINITELY_UNSET}"}"#;
        assert!(matches!(
            ConfigManager::expand_env_vars(content),
            Err(ConfigError::EnvVarNotFound(_))
        ));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.backend.timeout_seconds = 0;
        assert!(ConfigManager::validate(&config).is_err());

        config.backend.timeout_seconds = 10;
        assert!(ConfigManager::validate(&config).is_ok());

        config.backend.api_prefix = "api".to_string();
        assert!(ConfigManager::validate(&config).is_err());
    }
}
