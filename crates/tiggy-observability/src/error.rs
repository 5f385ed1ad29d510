//! Logging setup errors

#[derive(Debug, thiserror::Error, Clone)]
pub enum ObservabilityError {
    #[error("Logging error: {message}")]
    Logging { message: String },

    #[error("IO error: {message}")]
    Io { message: String },
}

impl ObservabilityError {
    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ObservabilityError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ObservabilityError>;
