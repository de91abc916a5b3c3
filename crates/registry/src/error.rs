//! Error types for `commerce-registry`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("failed to read registry file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse registry from '{location}': {source}")]
    Parse {
        location: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// The document parsed but violates a structural invariant.
    #[error("invalid registry: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
