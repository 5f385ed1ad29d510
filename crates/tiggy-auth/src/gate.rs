//! The auth gate: who is the current user, and how do they sign in

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tiggy_config::{AuthConfig, LocalState};
use tiggy_core::Identity;
use tracing::{info, warn};

use crate::cache::CredentialCache;
use crate::device_code::{DeviceCodeResponse, DeviceFlow};
use crate::error::{AuthError, Result};

/// What the user has to do to finish signing in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginPrompt {
    /// Open `verification_uri` in a browser and enter `user_code`
    DeviceCode(DeviceCodeResponse),
    /// Nothing to do out of band
    Local { email: String },
}

impl LoginPrompt {
    /// Human-readable instructions, one line each
    pub fn instructions(&self) -> Vec<String> {
        match self {
            LoginPrompt::DeviceCode(code) => {
                let mut lines = vec![
                    format!("Open {} in your browser", code.verification_uri),
                    format!("and enter the code {}", code.user_code),
                ];
                if let Some(complete) = &code.verification_uri_complete {
                    lines.push(format!("(or open {})", complete));
                }
                lines.push(format!("The code expires in {} seconds.", code.expires_in));
                lines
            }
            LoginPrompt::Local { email } => vec![format!("Signing in as {}", email)],
        }
    }
}

#[async_trait]
pub trait AuthGate: Send + Sync {
    /// The signed-in user, or `Unauthenticated`
    async fn resolve_identity(&self) -> Result<Identity>;

    /// Start signing in. Never yields an identity directly.
    async fn login(&self) -> Result<LoginPrompt>;

    /// Wait for the out-of-band step started by `login`
    async fn complete_login(&self, prompt: &LoginPrompt) -> Result<Identity>;

    /// Drop every piece of identity-derived local state
    async fn logout(&self) -> Result<()>;
}

/// Build the gate selected by config; files live under `dir`
pub fn build_auth_gate(config: &AuthConfig, dir: impl Into<PathBuf>) -> Result<Arc<dyn AuthGate>> {
    let dir = dir.into();
    match config {
        AuthConfig::DeviceCode {
            issuer,
            client_id,
            audience,
            scope,
        } => {
            if client_id.trim().is_empty() {
                return Err(AuthError::Api(
                    "auth.client_id is not configured (set TIGGY_CLIENT_ID)".to_string(),
                ));
            }
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()?;
            let flow = DeviceFlow::new(client, issuer, client_id, audience.clone(), scope);
            Ok(Arc::new(DeviceCodeAuth::new(flow, dir)))
        }
        AuthConfig::Local { email } => Ok(Arc::new(LocalAuth::new(email.clone(), dir))),
    }
}

async fn remember_user(dir: &Path, email: &str, name: Option<String>) -> Result<()> {
    let path = LocalState::path_in(dir);
    let mut state = LocalState::load(&path).await?;
    state.user_id = Some(email.to_string());
    state.user_email = Some(email.to_string());
    if name.is_some() {
        state.user_name = name;
    }
    state.save(&path).await?;
    Ok(())
}

/// Device authorization grant with cached credentials
pub struct DeviceCodeAuth {
    flow: DeviceFlow,
    dir: PathBuf,
}

impl DeviceCodeAuth {
    pub fn new(flow: DeviceFlow, dir: impl Into<PathBuf>) -> Self {
        Self {
            flow,
            dir: dir.into(),
        }
    }

    fn cache_path(&self) -> PathBuf {
        CredentialCache::path_in(&self.dir)
    }
}

#[async_trait]
impl AuthGate for DeviceCodeAuth {
    async fn resolve_identity(&self) -> Result<Identity> {
        let path = self.cache_path();
        let cached = CredentialCache::load(&path)
            .await
            .ok_or(AuthError::Unauthenticated)?;
        if cached.is_valid() {
            return Ok(Identity::new(cached.email));
        }

        info!("Cached credentials expired, refreshing");
        match self.flow.refresh(&cached).await {
            Ok(fresh) => {
                fresh.save(&path).await?;
                Ok(Identity::new(fresh.email))
            }
            Err(e) => {
                warn!("Credential refresh failed: {}", e);
                Err(AuthError::Unauthenticated)
            }
        }
    }

    async fn login(&self) -> Result<LoginPrompt> {
        let code = self.flow.request_device_code().await?;
        info!("Device authorization started");
        Ok(LoginPrompt::DeviceCode(code))
    }

    async fn complete_login(&self, prompt: &LoginPrompt) -> Result<Identity> {
        let LoginPrompt::DeviceCode(code) = prompt else {
            return Err(AuthError::Api("Prompt was not issued by the device flow".to_string()));
        };
        let creds = self.flow.poll_token(code).await?;
        creds.save(&self.cache_path()).await?;
        remember_user(&self.dir, &creds.email, creds.name.clone()).await?;
        info!(email = %creds.email, "Signed in");
        Ok(Identity::new(creds.email))
    }

    async fn logout(&self) -> Result<()> {
        CredentialCache::delete(&self.cache_path()).await?;
        LocalState::clear(&LocalState::path_in(&self.dir)).await?;
        info!("Signed out");
        Ok(())
    }
}

/// Local stand-in: signed in means the state file carries a user id
pub struct LocalAuth {
    email: Option<String>,
    dir: PathBuf,
}

impl LocalAuth {
    pub fn new(email: Option<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            email: email.filter(|e| !e.trim().is_empty()),
            dir: dir.into(),
        }
    }
}

#[async_trait]
impl AuthGate for LocalAuth {
    async fn resolve_identity(&self) -> Result<Identity> {
        let state = LocalState::load(&LocalState::path_in(&self.dir)).await?;
        state
            .user_id
            .map(Identity::new)
            .ok_or(AuthError::Unauthenticated)
    }

    async fn login(&self) -> Result<LoginPrompt> {
        let email = self
            .email
            .clone()
            .ok_or_else(|| AuthError::Api("auth.email is not configured".to_string()))?;
        Ok(LoginPrompt::Local { email })
    }

    async fn complete_login(&self, prompt: &LoginPrompt) -> Result<Identity> {
        let LoginPrompt::Local { email } = prompt else {
            return Err(AuthError::Api("Prompt was not issued by local auth".to_string()));
        };
        remember_user(&self.dir, email, None).await?;
        info!(email = %email, "Signed in locally");
        Ok(Identity::new(email.clone()))
    }

    async fn logout(&self) -> Result<()> {
        LocalState::clear(&LocalState::path_in(&self.dir)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::now_secs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_login_logout() {
        let dir = TempDir::new().unwrap();
        let gate = LocalAuth::new(Some("tiger@princeton.edu".to_string()), dir.path());

        assert!(matches!(
            gate.resolve_identity().await,
            Err(AuthError::Unauthenticated)
        ));

        let prompt = gate.login().await.unwrap();
        let identity = gate.complete_login(&prompt).await.unwrap();
        assert_eq!(identity.as_str(), "tiger@princeton.edu");
        assert_eq!(gate.resolve_identity().await.unwrap(), identity);

        gate.logout().await.unwrap();
        assert!(gate.resolve_identity().await.is_err());
    }

    #[tokio::test]
    async fn test_local_login_without_email() {
        let dir = TempDir::new().unwrap();
        let gate = LocalAuth::new(Some("  ".to_string()), dir.path());
        assert!(matches!(gate.login().await, Err(AuthError::Api(_))));
    }

    #[tokio::test]
    async fn test_logout_clears_state() {
        let dir = TempDir::new().unwrap();
        let state_path = LocalState::path_in(dir.path());
        LocalState {
            user_id: Some("tiger@princeton.edu".to_string()),
            has_completed_welcome: true,
            active_thread_id: Some("66f1".to_string()),
            ..Default::default()
        }
        .save(&state_path)
        .await
        .unwrap();

        let server = mockito::Server::new_async().await;
        let flow = DeviceFlow::new(reqwest::Client::new(), server.url(), "cid", None, "openid");
        let gate = DeviceCodeAuth::new(flow, dir.path());
        CredentialCache {
            access_token: "at".to_string(),
            refresh_token: None,
            expires_at: now_secs() + 3600,
            email: "tiger@princeton.edu".to_string(),
            name: None,
        }
        .save(&gate.cache_path())
        .await
        .unwrap();

        assert_eq!(
            gate.resolve_identity().await.unwrap().as_str(),
            "tiger@princeton.edu"
        );

        gate.logout().await.unwrap();
        assert!(matches!(
            gate.resolve_identity().await,
            Err(AuthError::Unauthenticated)
        ));
        assert_eq!(
            LocalState::load(&state_path).await.unwrap(),
            LocalState::default()
        );
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token() {
        let dir = TempDir::new().unwrap();
        let server = mockito::Server::new_async().await;
        let flow = DeviceFlow::new(reqwest::Client::new(), server.url(), "cid", None, "openid");
        let gate = DeviceCodeAuth::new(flow, dir.path());
        CredentialCache {
            access_token: "at".to_string(),
            refresh_token: None,
            expires_at: now_secs(),
            email: "tiger@princeton.edu".to_string(),
            name: None,
        }
        .save(&gate.cache_path())
        .await
        .unwrap();

        assert!(matches!(
            gate.resolve_identity().await,
            Err(AuthError::Unauthenticated)
        ));
    }

    #[test]
    fn test_device_prompt_instructions() {
        let prompt = LoginPrompt::DeviceCode(DeviceCodeResponse {
            device_code: "d".to_string(),
            user_code: "WXYZ-1234".to_string(),
            verification_uri: "https://idp.example/activate".to_string(),
            verification_uri_complete: None,
            expires_in: 900,
            interval: 5,
        });
        let lines = prompt.instructions();
        assert!(lines[0].contains("https://idp.example/activate"));
        assert!(lines[1].contains("WXYZ-1234"));
    }
}
