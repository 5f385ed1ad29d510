use tiggy_config::ConfigError;
use tiggy_core::TiggyError;

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Not signed in")]
    Unauthenticated,

    #[error("Device code expired")]
    Expired,

    #[error("Authorization denied")]
    Denied,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Http(err.to_string())
    }
}

impl From<ConfigError> for AuthError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io(e) => AuthError::Io(e),
            ConfigError::Json(e) => AuthError::Json(e),
            other => AuthError::Api(other.to_string()),
        }
    }
}

impl From<AuthError> for TiggyError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthenticated | AuthError::Expired | AuthError::Denied => {
                TiggyError::Unauthenticated
            }
            other => TiggyError::backend(0, other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
