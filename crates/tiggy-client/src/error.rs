use thiserror::Error;
use tiggy_auth::AuthError;
use tiggy_core::TiggyError;

/// Gateway and controller errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response; `message` is the body's `error` field when present
    #[error("{message}")]
    Backend { status: u16, message: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("not authenticated")]
    Unauthenticated,

    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("config error: {0}")]
    Config(String),
}

impl ClientError {
    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        Self::Backend {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Network(err.to_string())
    }
}

impl From<reqwest_middleware::Error> for ClientError {
    fn from(err: reqwest_middleware::Error) -> Self {
        ClientError::Network(err.to_string())
    }
}

impl From<ClientError> for TiggyError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Backend { status, message } => TiggyError::Backend { status, message },
            ClientError::Unauthenticated => TiggyError::Unauthenticated,
            ClientError::Auth(e) => e.into(),
            ClientError::Network(m) | ClientError::Decode(m) | ClientError::Config(m) => {
                TiggyError::backend(0, m)
            }
        }
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
