//! Custom error types for larder

use thiserror::Error;

/// Main error type for larder operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The page reader could not resolve an expected field
    #[error("Extraction failed for {link}: {reason}")]
    Extraction { link: String, reason: String },

    /// Adding a slot column failed
    #[error("Schema evolution failed adding {table}.{column}: {source}")]
    SchemaEvolution {
        table: String,
        column: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Image fetch failed for {url}: {reason}")]
    ImageFetch { url: String, reason: String },

    #[error("Image compression failed: {0}")]
    ImageCompression(String),

    #[error("Database error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Recipe not found: {0}")]
    RecipeNotFound(String),

    #[error("Not initialized: run 'larder init' first")]
    NotInitialized,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn extraction(link: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Extraction {
            link: link.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error means the store connection is gone and the run must stop.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Persistence(e) | Error::SchemaEvolution { source: e, .. } => matches!(
                e,
                sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)
            ),
            _ => false,
        }
    }

    /// Short label used in logs and run history
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Extraction { .. } => "extraction",
            Error::SchemaEvolution { .. } => "schema-evolution",
            Error::ImageFetch { .. } => "image-fetch",
            Error::ImageCompression(_) => "image-compression",
            Error::Persistence(_) => "persistence",
            Error::Http(_) => "http",
            _ => "other",
        }
    }
}

/// Result type alias for larder
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_loss_is_fatal() {
        assert!(Error::Persistence(sqlx::Error::PoolClosed).is_fatal());
        assert!(Error::Persistence(sqlx::Error::PoolTimedOut).is_fatal());
        assert!(!Error::Persistence(sqlx::Error::RowNotFound).is_fatal());
        assert!(!Error::extraction("https://example.com/r/1", "missing name").is_fatal());
    }

    #[test]
    fn test_extraction_message_names_link() {
        let err = Error::extraction("https://example.com/r/2", "missing author");
        assert_eq!(err.kind(), "extraction");
        assert!(err.to_string().contains("https://example.com/r/2"));
    }
}
