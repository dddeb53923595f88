//! One-step linear diffusion

use super::{check_aligned, Propagator};
use crate::cache::ArtifactKind;
use crate::error::DrugPropResult;
use crate::matrix::{normalize, Axis, LabeledMatrix};
use crate::network::DiagonalPolicy;
use drugprop_graph_algorithms::CsrMatrix;
use ndarray::Zip;
use tracing::debug;

/// `result[d][g] = Σ_k target[d][k] · W[g][k]`.
///
/// The RW-like variant row-normalizes the network into `W`, so a non-target
/// gene reads the share of its association weight that points at the drug's
/// targets, then floors the result at the target matrix. The plain variant
/// uses the self-loop network as `W` with neither step.
#[derive(Debug, Clone, Copy)]
pub struct DiffusionPropagator {
    normalized: bool,
}

impl DiffusionPropagator {
    /// Row-normalized diffusion, targets forced to 1
    pub fn rw_like() -> Self {
        Self { normalized: true }
    }

    /// Unnormalized product over the self-loop network
    pub fn plain() -> Self {
        Self { normalized: false }
    }

    pub fn is_normalized(&self) -> bool {
        self.normalized
    }
}

impl Default for DiffusionPropagator {
    fn default() -> Self {
        Self::rw_like()
    }
}

impl Propagator for DiffusionPropagator {
    fn propagate(
        &self,
        drug_target: &LabeledMatrix,
        network: &LabeledMatrix,
    ) -> DrugPropResult<LabeledMatrix> {
        check_aligned(drug_target, network)?;
        debug!(
            "Diffusion ({}) of {} drugs over {} genes",
            if self.normalized { "RW-like" } else { "plain" },
            drug_target.nrows(),
            drug_target.ncols()
        );

        let weights = if self.normalized {
            normalize(network, Axis::Row)
        } else {
            network.clone()
        };

        let targets = CsrMatrix::from_dense(drug_target.values());
        let weights_t = CsrMatrix::from_dense(&weights.values().t().to_owned());
        let mut values = targets.dot(&weights_t);

        if self.normalized {
            Zip::from(&mut values)
                .and(drug_target.values())
                .for_each(|v, &t| *v = v.max(t));
        }

        Ok(drug_target.with_values(values)?)
    }

    fn artifact_kind(&self) -> ArtifactKind {
        if self.normalized {
            ArtifactKind::Diffusion
        } else {
            ArtifactKind::PlainDiffusion
        }
    }

    fn diagonal_policy(&self) -> DiagonalPolicy {
        if self.normalized {
            DiagonalPolicy::Zero
        } else {
            DiagonalPolicy::SelfLoop
        }
    }
}
