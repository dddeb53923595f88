//! Crate-level error type

use crate::config::ConfigError;
use crate::matrix::MatrixError;
use crate::table::TableError;
use thiserror::Error;

/// Errors surfaced by the propagation engine
#[derive(Error, Debug)]
pub enum DrugPropError {
    #[error("Matrix error: {0}")]
    Matrix(#[from] MatrixError),

    #[error("Table error: {0}")]
    Table(#[from] TableError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Artifact store failure other than a plain miss
    #[error("Cache error: {0}")]
    Cache(String),

    /// The kernel backend could not build or apply its kernel
    #[error("Kernel backend error: {0}")]
    Kernel(String),

    /// Drug pair row with fewer than two columns
    #[error("Drug pair row {row} has {found} column(s), expected at least 2")]
    MalformedPair { row: usize, found: usize },

    /// Two distinct pairs whose `drugA_drugB` keys are the same string
    #[error("Drug pairs {first:?} and {second:?} share the row key {key:?}")]
    PairKeyCollision {
        key: String,
        first: (String, String),
        second: (String, String),
    },
}

pub type DrugPropResult<T> = Result<T, DrugPropError>;
