pub mod config;
pub mod local_state;
pub mod manager;

pub use config::{
    ApiFlavor, AuthConfig, BackendConfig, Config, ConfigError, ConfigResult, LoggingConfig,
    UiConfig,
};
pub use local_state::LocalState;
pub use manager::ConfigManager;

use std::path::PathBuf;

/// `~/.tiggy`
pub fn tiggy_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".tiggy"))
}

pub fn default_config_path() -> Option<PathBuf> {
    tiggy_dir().map(|dir| dir.join("config.json"))
}

pub fn default_log_path() -> Option<PathBuf> {
    tiggy_dir().map(|dir| dir.join("logs").join("tiggy.log"))
}

/// Create `~/.tiggy` and `~/.tiggy/logs`
pub async fn init_tiggy_dirs() -> ConfigResult<()> {
    if let Some(tiggy) = tiggy_dir() {
        tokio::fs::create_dir_all(&tiggy).await?;
        tokio::fs::create_dir_all(tiggy.join("logs")).await?;
    }
    Ok(())
}

/// Expand a leading `~/` to the home directory
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(path)),
    }
}
