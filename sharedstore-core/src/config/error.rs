//! Errors from loading, overriding and checking a SharedStore [`Config`](super::Config)

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML file could not be opened or read
    #[error("cannot read config file {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write config file {}: {source}", path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot render config as TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A `SHAREDSTORE_*` override did not parse
    #[error("{var}: {reason}")]
    InvalidEnv { var: &'static str, reason: String },

    /// Values parsed but cannot run a context (zero buffers, unknown log level)
    #[error("invalid configuration: {0}")]
    ValidationFailed(String),
}
