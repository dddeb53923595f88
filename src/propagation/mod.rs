//! Drug-target propagation
//!
//! Turns a binary drug × gene target matrix into a continuous influence
//! matrix over the gene universe. Three strategies are provided:
//!
//! - [`MaxProbabilityPropagator`]: strongest one-hop association from any
//!   target of the drug
//! - [`DiffusionPropagator`]: one sparse product with the (row-normalized)
//!   network, floored at the target matrix
//! - [`KernelPropagator`]: random walk with restart through a pluggable
//!   [`KernelBackend`]

pub mod diffusion;
pub mod kernel;
pub mod max_probability;

pub use diffusion::DiffusionPropagator;
pub use kernel::{KernelBackend, KernelPropagator, RwrBackend, Subnetwork};
pub use max_probability::MaxProbabilityPropagator;

use crate::cache::{ArtifactKind, ArtifactStore, Fingerprint, ResultCache};
use crate::config::ConfigError;
use crate::error::DrugPropResult;
use crate::matrix::{LabeledMatrix, MatrixError, MatrixResult};
use crate::network::{DiagonalPolicy, GeneUniverse};
use indexmap::IndexSet;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Propagation strategy selected by configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropagationMethod {
    /// Max-probability, targets read 1
    #[default]
    #[serde(rename = "target_as_1")]
    TargetAsOne,
    /// Max-probability distance view, targets read 0
    #[serde(rename = "target_as_0")]
    TargetAsZero,
    /// Row-normalized one-step diffusion
    #[serde(rename = "RWlike")]
    RwLike,
    /// Unnormalized diffusion over the self-loop network
    #[serde(rename = "plain_diffusion")]
    PlainDiffusion,
    /// Random walk with restart kernel
    #[serde(rename = "random_walk")]
    RandomWalk,
}

impl PropagationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropagationMethod::TargetAsOne => "target_as_1",
            PropagationMethod::TargetAsZero => "target_as_0",
            PropagationMethod::RwLike => "RWlike",
            PropagationMethod::PlainDiffusion => "plain_diffusion",
            PropagationMethod::RandomWalk => "random_walk",
        }
    }

    /// Diagonal of the network matrix this method runs on
    pub fn diagonal_policy(&self) -> DiagonalPolicy {
        match self {
            PropagationMethod::PlainDiffusion => DiagonalPolicy::SelfLoop,
            _ => DiagonalPolicy::Zero,
        }
    }
}

impl FromStr for PropagationMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "target_as_1" => Ok(PropagationMethod::TargetAsOne),
            "target_as_0" => Ok(PropagationMethod::TargetAsZero),
            "RWlike" | "rwlike" | "rw_like" => Ok(PropagationMethod::RwLike),
            "plain_diffusion" => Ok(PropagationMethod::PlainDiffusion),
            "random_walk" | "kernel" => Ok(PropagationMethod::RandomWalk),
            other => Err(ConfigError::Invalid(format!(
                "unknown propagation method: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for PropagationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A propagation strategy over the dense network matrix.
///
/// `drug_target` is drugs × genes, `network` is genes × genes; both gene
/// axes must carry the same labels in the same order. The result has the
/// shape and labels of `drug_target`.
pub trait Propagator {
    fn propagate(
        &self,
        drug_target: &LabeledMatrix,
        network: &LabeledMatrix,
    ) -> DrugPropResult<LabeledMatrix>;

    /// Artifact the result is cached under
    fn artifact_kind(&self) -> ArtifactKind;

    /// Diagonal policy of the network matrix this strategy expects
    fn diagonal_policy(&self) -> DiagonalPolicy {
        DiagonalPolicy::Zero
    }

    /// `propagate`, memoized through the result cache
    fn propagate_cached<S: ArtifactStore>(
        &self,
        cache: &ResultCache<S>,
        drug_target: &LabeledMatrix,
        network: &LabeledMatrix,
    ) -> DrugPropResult<LabeledMatrix>
    where
        Self: Sized,
    {
        let fingerprint = Fingerprint::new().matrix(drug_target).matrix(network);
        let key = cache.key(self.artifact_kind(), fingerprint);
        cache.get_or_compute(&key, || self.propagate(drug_target, network))
    }
}

/// Distance-like view of an influence matrix: `1 - x`, so targets read 0
pub fn target_as_zero(influence: &LabeledMatrix) -> LabeledMatrix {
    influence.complement()
}

/// Reorient a genes × drugs target table into a drugs × `G` matrix.
///
/// Table rows are resolved by entrez id or symbol; rows that resolve to no
/// gene of the universe are dropped. Genes of the universe absent from the
/// table read 0. When two rows resolve to the same gene, the larger value
/// wins.
pub fn drug_target_matrix(table: &LabeledMatrix, genes: &GeneUniverse) -> LabeledMatrix {
    let mut values = Array2::zeros((table.ncols(), genes.len()));
    let mut dropped = 0usize;

    for (i, label) in table.row_labels().iter().enumerate() {
        let Some(position) = genes.resolve(label).and_then(|id| genes.position(id)) else {
            dropped += 1;
            continue;
        };
        for (d, &v) in table.values().row(i).iter().enumerate() {
            let cell = &mut values[[d, position]];
            if v > *cell {
                *cell = v;
            }
        }
    }
    if dropped > 0 {
        debug!(
            "Dropped {} of {} drug-target rows outside the gene universe",
            dropped,
            table.nrows()
        );
    }

    let cols: IndexSet<String> = genes.labels().into_iter().collect();
    LabeledMatrix::from_label_sets(table.col_labels().clone(), cols, values)
}

/// Check that the drug-target gene axis matches a square network matrix
pub(crate) fn check_aligned(
    drug_target: &LabeledMatrix,
    network: &LabeledMatrix,
) -> MatrixResult<()> {
    if network.nrows() != network.ncols() {
        return Err(MatrixError::ShapeMismatch {
            context: "network matrix is not square".to_string(),
            expected: network.nrows(),
            found: network.ncols(),
        });
    }
    if drug_target.ncols() != network.nrows() {
        return Err(MatrixError::ShapeMismatch {
            context: "drug-target genes vs network genes".to_string(),
            expected: network.nrows(),
            found: drug_target.ncols(),
        });
    }
    let mismatch = drug_target
        .col_labels()
        .iter()
        .zip(network.row_labels().iter())
        .find(|(a, b)| a != b);
    if let Some((label, _)) = mismatch {
        return Err(MatrixError::UnknownLabel {
            axis: "network",
            label: label.clone(),
        });
    }
    Ok(())
}
