//! drugprop: drug-target network propagation
//!
//! Spreads drug-target signals over a weighted gene-gene interaction network
//! to produce per-drug, per-gene influence scores, combines drug pairs, and
//! joins the result with expression or dependency data into model features.
//!
//! # Architecture
//!
//! - [`table`]: CSV interchange (edge lists, gene index, target tables, artifacts)
//! - [`matrix`]: labeled dense matrices and row/column normalization
//! - [`network`]: gene universe and network matrix construction
//! - [`propagation`]: max-probability, diffusion and kernel random walk
//! - [`combine`]: drug-pair union
//! - [`cache`]: memoization of every expensive step behind a cache key
//! - [`pipeline`]: configured end-to-end run
//!
//! ## Example Usage
//!
//! ```rust
//! use drugprop::matrix::LabeledMatrix;
//! use drugprop::network::{Edge, GeneUniverse, NetworkMatrixBuilder};
//! use drugprop::propagation::{MaxProbabilityPropagator, Propagator};
//! use ndarray::array;
//!
//! let genes = GeneUniverse::from_ids([1, 2, 3]);
//! let edges = vec![Edge::new(1, 2, 0.4), Edge::new(2, 3, 0.6)];
//! let network = NetworkMatrixBuilder::default().build(&edges, &genes);
//!
//! // Drug D targets gene 1
//! let targets = LabeledMatrix::new(["D"], ["1", "2", "3"], array![[1.0, 0.0, 0.0]]).unwrap();
//! let influence = MaxProbabilityPropagator.propagate(&targets, &network).unwrap();
//!
//! assert_eq!(influence.row("D").unwrap().to_vec(), vec![1.0, 0.4, 0.0]);
//! ```

pub mod cache;
pub mod combine;
pub mod config;
pub mod coverage;
pub mod error;
pub mod features;
pub mod logging;
pub mod matrix;
pub mod network;
pub mod pipeline;
pub mod profile;
pub mod propagation;
pub mod table;

pub use cache::{ArtifactKind, ArtifactStore, CacheKey, FileStore, Fingerprint, MemoryStore, ResultCache};
pub use combine::{combine, DrugPair};
pub use config::{KernelConfig, PipelineConfig, RenewFlags};
pub use error::{DrugPropError, DrugPropResult};
pub use matrix::{normalize, Axis, LabeledMatrix};
pub use network::{DiagonalPolicy, Edge, Gene, GeneId, GeneUniverse, NetworkMatrixBuilder};
pub use pipeline::{Pipeline, PipelineInputs, PipelineOutput};
pub use propagation::{
    DiffusionPropagator, KernelBackend, KernelPropagator, MaxProbabilityPropagator,
    PropagationMethod, Propagator, RwrBackend,
};

/// Environment variable naming the pipeline config file
pub const CONFIG_ENV: &str = "DRUGPROP_CONFIG";

/// Config file used when `DRUGPROP_CONFIG` is unset
pub const DEFAULT_CONFIG_FILE: &str = "drugprop.yaml";

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
