// src/error.rs

use thiserror::Error;

/// Core error types for pkgflow
#[derive(Error, Debug)]
pub enum Error {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest or catalog JSON could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Database initialization error
    #[error("Failed to initialize database: {0}")]
    InitError(String),

    /// Database not found
    #[error("Database not found at path: {0}")]
    DatabaseNotFound(String),

    /// A pipeline step read a context slot that no earlier step populated
    #[error("Context is missing required data: {0}")]
    MissingData(&'static str),

    /// Catalog source could not be loaded
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Installer backend failed
    #[error("Install error: {0}")]
    InstallError(String),

    /// Invalid or unknown configuration key/value
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using pkgflow's Error type
pub type Result<T> = std::result::Result<T, Error>;
