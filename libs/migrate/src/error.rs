//! Error types for configuration migration

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A legacy setting that cannot be converted without manual changes.
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    Dsl(#[from] tconf_dsl::Error),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
