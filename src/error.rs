// src/error.rs

//! Crate-level error type
//!
//! Each module defines its own error enum; this wraps them for callers
//! that drive a whole job.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Feature(#[from] crate::feature::FeatureError),

    #[error(transparent)]
    Definition(#[from] crate::definitions::DefinitionError),

    #[error(transparent)]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error(transparent)]
    Package(#[from] crate::package::PackageError),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
