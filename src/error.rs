//! Centralized error type for the orbitmix umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] orbitmix_core::Error),

    #[error("Export: {0}")]
    Export(#[from] orbitmix_export::ExportError),

    #[error("duck target orbit {0} does not exist")]
    OrbitNotFound(usize),

    #[error("Config: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
