use thiserror::Error;

/// Errors raised at the backend boundaries (identity provider, document store, config).
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),

    #[error("sign-in failed: {0}")]
    SignIn(String),

    #[error("not signed in")]
    NotSignedIn,

    #[error("relay error: {0}")]
    Relay(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = ChatError> = std::result::Result<T, E>;
