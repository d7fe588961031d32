use thiserror::Error;

/// Errors that can occur while constructing or loading core values.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid regex or glob pattern
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Invalid IP address literal
    #[error("invalid address: {0}")]
    Address(#[from] std::net::AddrParseError),

    /// Invalid subnet literal
    #[error("invalid subnet: {0}")]
    Subnet(String),

    /// Invalid port literal
    #[error("invalid port: {0}")]
    Port(String),

    /// Schema failed to deserialize
    #[error("invalid schema: {0}")]
    Schema(#[from] serde_json::Error),
}

static_assertions::const_assert!(std::mem::size_of::<CoreError>() <= 64);

pub type Result<T> = std::result::Result<T, CoreError>;
