use thiserror::Error;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for '{0}': {1}")]
    InvalidValue(&'static str, String),

    #[error("Finalization depth {finalization} is below confirmation depth {confirmation}")]
    InvalidCommitmentDepths { confirmation: u64, finalization: u64 },
}
