//! Error types for Dirbind configuration loading

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::ConfigRead { .. } => "ConfigReadError",
            Error::ConfigParse { .. } => "ConfigParseError",
            Error::InvalidEnv { .. } => "InvalidEnvironment",
        }
    }
}
