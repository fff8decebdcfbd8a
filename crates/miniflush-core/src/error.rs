use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Could not read config file {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{0}")]
    InvalidConfig(String),

    #[error("config does not include either 'categories' or 'feeds' entry. Nothing to do here.")]
    NoSweepTargets,

    #[error("Invalid expiry '{expiry}': {reason}")]
    InvalidExpiry { expiry: String, reason: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Miniflux API error ({status}): {reason}")]
    Api { status: u16, reason: String },

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    pub(crate) fn invalid_expiry(expiry: &str, reason: impl Into<String>) -> Self {
        Self::InvalidExpiry {
            expiry: expiry.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
