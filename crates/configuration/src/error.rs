use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or parse configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Configuration for strategy '{strategy}' is invalid: {reason}")]
    InvalidStrategy { strategy: String, reason: String },

    #[error("Configuration is invalid: {0}")]
    Invalid(String),
}
