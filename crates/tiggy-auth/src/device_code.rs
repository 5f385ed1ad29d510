//! OAuth 2.0 device authorization grant against an OIDC identity provider

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::cache::{now_secs, CredentialCache};
use crate::error::{AuthError, Result};

const DEVICE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Device code response from the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCodeResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_uri_complete: Option<String>,
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
}

fn default_interval() -> u64 {
    5
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
    name: Option<String>,
}

/// Endpoints and client registration for one identity provider
#[derive(Debug, Clone)]
pub struct DeviceFlow {
    client: Client,
    issuer: String,
    client_id: String,
    audience: Option<String>,
    scope: String,
    min_poll_interval: Duration,
}

impl DeviceFlow {
    pub fn new(
        client: Client,
        issuer: impl Into<String>,
        client_id: impl Into<String>,
        audience: Option<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            client,
            issuer: issuer.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            audience,
            scope: scope.into(),
            min_poll_interval: Duration::from_secs(5),
        }
    }

    /// Lower bound on the poll interval the provider asks for
    pub fn with_min_poll_interval(mut self, interval: Duration) -> Self {
        self.min_poll_interval = interval;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.issuer, path)
    }

    /// Start the flow
    pub async fn request_device_code(&self) -> Result<DeviceCodeResponse> {
        let mut params = vec![
            ("client_id", self.client_id.as_str()),
            ("scope", self.scope.as_str()),
        ];
        if let Some(audience) = self.audience.as_deref() {
            params.push(("audience", audience));
        }

        let response = self
            .client
            .post(self.url("/oauth/device/code"))
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(format!(
                "Device code request failed: HTTP {} - {}",
                status, text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Parse(e.to_string()))
    }

    /// Poll the token endpoint until the user finishes the browser step
    pub async fn poll_token(&self, device_code: &DeviceCodeResponse) -> Result<CredentialCache> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("device_code", device_code.device_code.as_str()),
            ("grant_type", DEVICE_GRANT_TYPE),
        ];

        let start = Instant::now();
        let max_duration = Duration::from_secs(device_code.expires_in);
        let mut interval = Duration::from_secs(device_code.interval).max(self.min_poll_interval);

        loop {
            if start.elapsed() > max_duration {
                return Err(AuthError::Expired);
            }

            let token: TokenResponse = self
                .client
                .post(self.url("/oauth/token"))
                .header("Accept", "application/json")
                .form(&params)
                .send()
                .await?
                .json()
                .await
                .map_err(|e| AuthError::Parse(e.to_string()))?;

            if let Some(access_token) = token.access_token {
                info!("Access token received");
                return self
                    .credentials(access_token, token.refresh_token, token.expires_in)
                    .await;
            }

            match token.error.as_deref() {
                Some("authorization_pending") => debug!("Authorization pending"),
                Some("slow_down") => {
                    interval += Duration::from_secs(5);
                    debug!("Provider requested slower polling: {:?}", interval);
                }
                Some("expired_token") => return Err(AuthError::Expired),
                Some("access_denied") => return Err(AuthError::Denied),
                Some(other) => {
                    let desc = token.error_description.unwrap_or_default();
                    return Err(AuthError::Api(format!("{}: {}", other, desc)));
                }
                None => return Err(AuthError::Parse("Token response without token or error".to_string())),
            }

            sleep(interval).await;
        }
    }

    /// Exchange a refresh token for fresh credentials
    pub async fn refresh(&self, cached: &CredentialCache) -> Result<CredentialCache> {
        let Some(refresh_token) = cached.refresh_token.as_deref() else {
            return Err(AuthError::Unauthenticated);
        };
        let params = [
            ("client_id", self.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let response = self
            .client
            .post(self.url("/oauth/token"))
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await?;
        if !response.status().is_success() {
            debug!("Refresh rejected with HTTP {}", response.status());
            return Err(AuthError::Unauthenticated);
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Parse(e.to_string()))?;
        let access_token = token.access_token.ok_or(AuthError::Unauthenticated)?;

        Ok(CredentialCache {
            access_token,
            refresh_token: token.refresh_token.or_else(|| cached.refresh_token.clone()),
            expires_at: now_secs() + token.expires_in.unwrap_or(3600),
            email: cached.email.clone(),
            name: cached.name.clone(),
        })
    }

    async fn credentials(
        &self,
        access_token: String,
        refresh_token: Option<String>,
        expires_in: Option<u64>,
    ) -> Result<CredentialCache> {
        let response = self
            .client
            .get(self.url("/userinfo"))
            .bearer_auth(&access_token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Api(format!("Userinfo request failed: HTTP {}", status)));
        }

        let user: UserInfo = response
            .json()
            .await
            .map_err(|e| AuthError::Parse(e.to_string()))?;
        let email = user
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AuthError::Api("Identity provider returned no email claim".to_string()))?;

        Ok(CredentialCache {
            access_token,
            refresh_token,
            expires_at: now_secs() + expires_in.unwrap_or(3600),
            email,
            name: user.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(server: &mockito::Server) -> DeviceFlow {
        DeviceFlow::new(
            Client::new(),
            server.url(),
            "client-123",
            None,
            "openid profile email",
        )
        .with_min_poll_interval(Duration::ZERO)
    }

    fn device_code() -> DeviceCodeResponse {
        DeviceCodeResponse {
            device_code: "dev-1".to_string(),
            user_code: "ABCD-EFGH".to_string(),
            verification_uri: "https://idp.example/activate".to_string(),
            verification_uri_complete: None,
            expires_in: 60,
            interval: 0,
        }
    }

    #[tokio::test]
    async fn test_request_device_code() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth/device/code")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"device_code":"dev-1","user_code":"ABCD-EFGH",
                    "verification_uri":"https://idp.example/activate",
                    "expires_in":900,"interval":5}"#,
            )
            .create_async()
            .await;

        let code = flow(&server).request_device_code().await.unwrap();
        assert_eq!(code.user_code, "ABCD-EFGH");
        assert_eq!(code.interval, 5);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_poll_token_reads_email_claim() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"at-1","refresh_token":"rt-1","expires_in":3600}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/userinfo")
            .match_header("authorization", "Bearer at-1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"sub":"auth0|1","email":"tiger@princeton.edu","name":"Tiger"}"#)
            .create_async()
            .await;

        let creds = flow(&server).poll_token(&device_code()).await.unwrap();
        assert_eq!(creds.email, "tiger@princeton.edu");
        assert_eq!(creds.refresh_token.as_deref(), Some("rt-1"));
        assert!(creds.is_valid());
    }

    #[tokio::test]
    async fn test_poll_token_denied() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/token")
            .with_status(403)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"access_denied","error_description":"User refused"}"#)
            .create_async()
            .await;

        let result = flow(&server).poll_token(&device_code()).await;
        assert!(matches!(result, Err(AuthError::Denied)));
    }

    #[tokio::test]
    async fn test_missing_email_claim() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"at-1"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/userinfo")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"sub":"auth0|1"}"#)
            .create_async()
            .await;

        let result = flow(&server).poll_token(&device_code()).await;
        assert!(matches!(result, Err(AuthError::Api(_))));
    }
}
