//! Error types for the configuration repositories

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("You have to provide a key with at least 'component_name/key_name': {0}")]
    InvalidKey(String),

    #[error("Invalid configuration item: {0}")]
    InvalidItem(String),

    /// No connection string in the environment or the startup properties.
    #[error("Missing configuration database connection string")]
    MissingUri,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Invalid value: {0}")]
    Value(#[from] tconf_migrate::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
