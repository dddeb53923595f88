//! One-hop max-probability propagation

use super::{check_aligned, Propagator};
use crate::cache::ArtifactKind;
use crate::error::DrugPropResult;
use crate::matrix::LabeledMatrix;
use drugprop_graph_algorithms::CsrMatrix;
use ndarray::Zip;
use tracing::debug;

/// Influence of drug `d` on gene `g`: 1 when `g` is a target of `d`,
/// otherwise `max_{g'} target[d][g'] · N[g][g']` (0 without any path).
///
/// Only the stored targets of each drug and the stored edges of each target
/// are visited, which yields the same cells as the dense triple loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxProbabilityPropagator;

impl Propagator for MaxProbabilityPropagator {
    fn propagate(
        &self,
        drug_target: &LabeledMatrix,
        network: &LabeledMatrix,
    ) -> DrugPropResult<LabeledMatrix> {
        check_aligned(drug_target, network)?;
        debug!(
            "Max-probability propagation of {} drugs over {} genes",
            drug_target.nrows(),
            drug_target.ncols()
        );

        let targets = CsrMatrix::from_dense(drug_target.values());
        // Row g of N is scanned for gene g, so the product runs on N^T
        let network_t = CsrMatrix::from_dense(&network.values().t().to_owned());
        let mut values = targets.max_product(&network_t);

        Zip::from(&mut values)
            .and(drug_target.values())
            .for_each(|v, &t| {
                if t == 1.0 {
                    *v = 1.0;
                }
            });

        Ok(drug_target.with_values(values)?)
    }

    fn artifact_kind(&self) -> ArtifactKind {
        ArtifactKind::MaxProbability
    }
}
