use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Top-level client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub version: String,
    pub backend: BackendConfig,
    pub auth: AuthConfig,
    pub ui: UiConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            backend: BackendConfig::default(),
            auth: AuthConfig::default(),
            ui: UiConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Look up a value by dotted key
    pub fn get_value(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["version"] => Some(self.version.clone()),
            ["backend", "base_url"] => Some(self.backend.base_url.clone()),
            ["backend", "api_prefix"] => Some(self.backend.api_prefix.clone()),
            ["backend", "api_flavor"] => Some(self.backend.api_flavor.to_string()),
            ["backend", "timeout_seconds"] => Some(self.backend.timeout_seconds.to_string()),
            ["backend", "max_read_retries"] => Some(self.backend.max_read_retries.to_string()),
            ["auth", "mode"] => Some(self.auth.mode_name().to_string()),
            ["auth", "issuer"] => match &self.auth {
                AuthConfig::DeviceCode { issuer, .. } => Some(issuer.clone()),
                AuthConfig::Local { .. } => None,
            },
            ["auth", "client_id"] => match &self.auth {
                AuthConfig::DeviceCode { client_id, .. } => Some(client_id.clone()),
                AuthConfig::Local { .. } => None,
            },
            ["auth", "audience"] => match &self.auth {
                AuthConfig::DeviceCode { audience, .. } => audience.clone(),
                AuthConfig::Local { .. } => None,
            },
            ["auth", "email"] => match &self.auth {
                AuthConfig::Local { email } => email.clone(),
                AuthConfig::DeviceCode { .. } => None,
            },
            ["ui", "reply_delay_ms"] => Some(self.ui.reply_delay_ms.to_string()),
            ["ui", "assistant_name"] => Some(self.ui.assistant_name.clone()),
            ["logging", "level"] => Some(self.logging.level.clone()),
            ["logging", "file"] => self.logging.file.clone(),
            ["logging", "json_format"] => Some(self.logging.json_format.to_string()),
            _ => None,
        }
    }

    /// Set a value by dotted key
    pub fn set_value(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["backend", "base_url"] => {
                self.backend.base_url = value.trim_end_matches('/').to_string();
            }
            ["backend", "api_prefix"] => {
                self.backend.api_prefix = value.to_string();
            }
            ["backend", "api_flavor"] => {
                self.backend.api_flavor = value.parse()?;
            }
            ["backend", "timeout_seconds"] => {
                self.backend.timeout_seconds = value.parse().map_err(|_| {
                    ConfigError::Validation(format!("Invalid number: {}", value))
                })?;
            }
            ["backend", "max_read_retries"] => {
                self.backend.max_read_retries = value.parse().map_err(|_| {
                    ConfigError::Validation(format!("Invalid number: {}", value))
                })?;
            }
            ["auth", "mode"] => {
                self.auth = match value {
                    "device_code" => AuthConfig::default(),
                    "local" => AuthConfig::Local { email: None },
                    other => {
                        return Err(ConfigError::Validation(format!(
                            "Invalid auth mode: {} (expected device_code or local)",
                            other
                        )))
                    }
                };
            }
            ["auth", "issuer"] => match &mut self.auth {
                AuthConfig::DeviceCode { issuer, .. } => {
                    *issuer = value.trim_end_matches('/').to_string();
                }
                AuthConfig::Local { .. } => return Err(ConfigError::KeyNotFound(key.to_string())),
            },
            ["auth", "client_id"] => match &mut self.auth {
                AuthConfig::DeviceCode { client_id, .. } => *client_id = value.to_string(),
                AuthConfig::Local { .. } => return Err(ConfigError::KeyNotFound(key.to_string())),
            },
            ["auth", "audience"] => match &mut self.auth {
                AuthConfig::DeviceCode { audience, .. } => *audience = Some(value.to_string()),
                AuthConfig::Local { .. } => return Err(ConfigError::KeyNotFound(key.to_string())),
            },
            ["auth", "email"] => match &mut self.auth {
                AuthConfig::Local { email } => *email = Some(value.to_string()),
                AuthConfig::DeviceCode { .. } => {
                    return Err(ConfigError::KeyNotFound(key.to_string()))
                }
            },
            ["ui", "reply_delay_ms"] => {
                self.ui.reply_delay_ms = value.parse().map_err(|_| {
                    ConfigError::Validation(format!("Invalid number: {}", value))
                })?;
            }
            ["ui", "assistant_name"] => {
                self.ui.assistant_name = value.to_string();
            }
            ["logging", "level"] => {
                self.logging.level = value.to_string();
            }
            ["logging", "file"] => {
                self.logging.file = Some(value.to_string());
            }
            ["logging", "json_format"] => {
                self.logging.json_format = value.parse().map_err(|_| {
                    ConfigError::Validation(format!("Invalid boolean: {}", value))
                })?;
            }
            _ => return Err(ConfigError::KeyNotFound(key.to_string())),
        }
        Ok(())
    }
}

/// Which request-body/query naming the backend speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiFlavor {
    /// `user_id`, `chat_id`
    SnakeCase,
    /// `userId`, `chatId`
    CamelCase,
}

impl ApiFlavor {
    pub fn user_key(&self) -> &'static str {
        match self {
            ApiFlavor::SnakeCase => "user_id",
            ApiFlavor::CamelCase => "userId",
        }
    }

    pub fn chat_key(&self) -> &'static str {
        match self {
            ApiFlavor::SnakeCase => "chat_id",
            ApiFlavor::CamelCase => "chatId",
        }
    }
}

impl std::fmt::Display for ApiFlavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiFlavor::SnakeCase => write!(f, "snake_case"),
            ApiFlavor::CamelCase => write!(f, "camel_case"),
        }
    }
}

impl FromStr for ApiFlavor {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "snake_case" | "snake" => Ok(ApiFlavor::SnakeCase),
            "camel_case" | "camel" => Ok(ApiFlavor::CamelCase),
            _ => Err(ConfigError::Validation(format!("Invalid api flavor: {}", s))),
        }
    }
}

/// Backend API settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    pub base_url: String,
    /// Path prefix in front of every endpoint, e.g. `/api`
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    pub api_flavor: ApiFlavor,
    pub timeout_seconds: u64,
    /// Retries for idempotent reads; writes are never retried
    pub max_read_retries: u32,
}

fn default_api_prefix() -> String {
    "/api".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            api_prefix: default_api_prefix(),
            api_flavor: ApiFlavor::SnakeCase,
            timeout_seconds: 30,
            max_read_retries: 3,
        }
    }
}

/// Authentication settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuthConfig {
    /// OAuth 2.0 device authorization against an OIDC identity provider
    DeviceCode {
        issuer: String,
        client_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        audience: Option<String>,
        #[serde(default = "default_scope")]
        scope: String,
    },
    /// Local stand-in: a signed-in flag plus a configured email
    Local {
        #[serde(skip_serializing_if = "Option::is_none")]
        email: Option<String>,
    },
}

fn default_scope() -> String {
    "openid profile email offline_access".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::DeviceCode {
            issuer: "https://tiggy.us.auth0.com".to_string(),
            client_id: "${TIGGY_CLIENT_ID:-}".to_string(),
            audience: None,
            scope: default_scope(),
        }
    }
}

impl AuthConfig {
    pub fn mode_name(&self) -> &'static str {
        match self {
            AuthConfig::DeviceCode { .. } => "device_code",
            AuthConfig::Local { .. } => "local",
        }
    }
}

/// Terminal UI settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UiConfig {
    /// Pause before showing an assistant reply; 0 disables it
    pub reply_delay_ms: u64,
    pub assistant_name: String,
    pub suggested_questions: Vec<String>,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            reply_delay_ms: 1000,
            assistant_name: "Tiggy".to_string(),
            suggested_questions: vec![
                "What events are happening tomorrow?".to_string(),
                "Should I take COS217 or COS226?".to_string(),
                "How do I register for classes?".to_string(),
                "What's the weather like today?".to_string(),
            ],
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `tiggy_client=debug`
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default)]
    pub json_format: bool,
    #[serde(default)]
    pub module_levels: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("~/.tiggy/logs/tiggy.log".to_string()),
            json_format: false,
            module_levels: HashMap::new(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend.api_flavor, ApiFlavor::SnakeCase);
        assert_eq!(config.ui.reply_delay_ms, 1000);
        assert_eq!(config.ui.suggested_questions.len(), 4);
        assert_eq!(config.auth.mode_name(), "device_code");
    }

    #[test]
    fn test_auth_serialization_is_tagged() {
        let auth = AuthConfig::Local {
            email: Some("tiger@princeton.edu".to_string()),
        };
        let json = serde_json::to_string(&auth).unwrap();
        assert!(json.contains(r#""mode":"local""#));

        let back: AuthConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, auth);
    }

    #[test]
    fn test_get_and_set_values() {
        let mut config = Config::default();
        config.set_value("backend.base_url", "https://tiggy.example.edu/").unwrap();
        assert_eq!(
            config.get_value("backend.base_url").as_deref(),
            Some("https://tiggy.example.edu")
        );

        config.set_value("backend.api_flavor", "camel_case").unwrap();
        assert_eq!(config.backend.api_flavor, ApiFlavor::CamelCase);

        config.set_value("auth.mode", "local").unwrap();
        config.set_value("auth.email", "tiger@princeton.edu").unwrap();
        assert_eq!(config.get_value("auth.email").as_deref(), Some("tiger@princeton.edu"));
        assert!(config.get_value("auth.issuer").is_none());
    }

    #[test]
    fn test_set_value_rejects_bad_input() {
        let mut config = Config::default();
        assert!(matches!(
            config.set_value("ui.reply_delay_ms", "soon"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            config.set_value("nope.key", "1"),
            Err(ConfigError::KeyNotFound(_))
        ));
        assert!(config.set_value("auth.mode", "saml").is_err());
    }

    #[test]
    fn test_flavor_keys() {
        assert_eq!(ApiFlavor::SnakeCase.user_key(), "user_id");
        assert_eq!(ApiFlavor::CamelCase.chat_key(), "chatId");
    }
}
