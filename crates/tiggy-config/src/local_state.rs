//! Client-side persisted keys
//!
//! Small pieces of identity-derived state kept between runs. All of it is
//! dropped on logout.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::ConfigResult;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub has_completed_welcome: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_thread_id: Option<String>,
}

impl LocalState {
    /// State file next to the config file
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join("state.json")
    }

    /// Load state; a missing file is an empty state
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = tokio::fs::set_permissions(path, perms).await;
        }

        Ok(())
    }

    /// Remove the state file
    pub async fn clear(path: &Path) -> ConfigResult<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let state = LocalState::load(&LocalState::path_in(dir.path())).await.unwrap();
        assert_eq!(state, LocalState::default());
    }

    #[tokio::test]
    async fn test_save_load_clear() {
        let dir = TempDir::new().unwrap();
        let path = LocalState::path_in(dir.path());

        let state = LocalState {
            user_id: Some("tiger@princeton.edu".to_string()),
            has_completed_welcome: true,
            active_thread_id: Some("66f1".to_string()),
            ..Default::default()
        };
        state.save(&path).await.unwrap();
        assert_eq!(LocalState::load(&path).await.unwrap(), state);

        LocalState::clear(&path).await.unwrap();
        assert!(!path.exists());
        LocalState::clear(&path).await.unwrap();
    }
}
