//! Random walk with restart through a precomputed kernel
//!
//! The adapter in this module owns no solver. It induces the subnetwork on
//! the drug-target genes, seeds the backend with the identity over that node
//! set, and applies the resulting kernel to the drug-target matrix.

use crate::cache::{ArtifactKind, ArtifactStore, Fingerprint, ResultCache};
use crate::config::KernelConfig;
use crate::error::{DrugPropError, DrugPropResult};
use crate::matrix::LabeledMatrix;
use crate::network::{fingerprint_edges, parse_gene_id, Edge, GeneId};
use drugprop_graph_algorithms::{
    kernel_propagation, random_walk_with_restart, GraphView, RwrConfig,
};
use indexmap::{IndexMap, IndexSet};
use ndarray::Array2;
use tracing::{debug, info, warn};

/// Network restricted to a node set
#[derive(Debug, Clone, PartialEq)]
pub struct Subnetwork {
    /// Nodes in seed order
    pub nodes: Vec<GeneId>,
    /// Edges with both endpoints in `nodes`
    pub edges: Vec<Edge>,
}

impl Subnetwork {
    /// Induce the subnetwork on `genes`. Genes that never occur in `edges`
    /// are not part of the network and are left out.
    pub fn induce(edges: &[Edge], genes: &[GeneId]) -> Self {
        let in_network: IndexSet<GeneId> = edges
            .iter()
            .flat_map(|e| [e.entrez_a, e.entrez_b])
            .collect();
        let nodes: IndexSet<GeneId> = genes
            .iter()
            .copied()
            .filter(|id| in_network.contains(id))
            .collect();
        let edges = edges
            .iter()
            .filter(|e| nodes.contains(&e.entrez_a) && nodes.contains(&e.entrez_b))
            .copied()
            .collect();

        Self {
            nodes: nodes.into_iter().collect(),
            edges,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn labels(&self) -> Vec<String> {
        self.nodes.iter().map(|id| id.to_string()).collect()
    }
}

/// Kernel capability: build a node × node diffusion kernel, then apply it
/// to a samples × nodes binary matrix.
pub trait KernelBackend {
    /// Propagate `seed` (rows = seeds, columns = subnetwork nodes) with
    /// continuation probability `alpha`
    fn build_kernel(
        &self,
        subnetwork: &Subnetwork,
        seed: &LabeledMatrix,
        alpha: f64,
    ) -> DrugPropResult<LabeledMatrix>;

    /// Scores for every row of `binary`, columns = kernel columns
    fn propagate(
        &self,
        kernel: &LabeledMatrix,
        binary: &LabeledMatrix,
    ) -> DrugPropResult<LabeledMatrix>;

    /// Mix backend parameters that affect the output into a cache fingerprint
    fn fingerprint(&self, fingerprint: Fingerprint) -> Fingerprint {
        fingerprint
    }
}

/// Fixed-point random walk with restart from `drugprop-graph-algorithms`
#[derive(Debug, Clone)]
pub struct RwrBackend {
    symmetric_norm: bool,
    max_iterations: usize,
    tolerance: f64,
}

impl RwrBackend {
    pub fn new(config: &KernelConfig) -> Self {
        Self {
            symmetric_norm: config.symmetric_norm,
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
        }
    }
}

impl Default for RwrBackend {
    fn default() -> Self {
        Self::new(&KernelConfig::default())
    }
}

impl KernelBackend for RwrBackend {
    fn build_kernel(
        &self,
        subnetwork: &Subnetwork,
        seed: &LabeledMatrix,
        alpha: f64,
    ) -> DrugPropResult<LabeledMatrix> {
        if seed.ncols() != subnetwork.node_count() {
            return Err(DrugPropError::Kernel(format!(
                "seed has {} columns for {} subnetwork nodes",
                seed.ncols(),
                subnetwork.node_count()
            )));
        }

        let view = GraphView::from_edges(
            &subnetwork.nodes,
            subnetwork
                .edges
                .iter()
                .map(|e| (e.entrez_a, e.entrez_b, e.association)),
        );
        let config = RwrConfig {
            alpha,
            symmetric_norm: self.symmetric_norm,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
        };

        let result = random_walk_with_restart(&view, seed.values(), &config);
        if result.converged {
            debug!("Kernel converged after {} iterations", result.iterations);
        } else {
            warn!(
                "Kernel did not converge within {} iterations",
                result.iterations
            );
        }

        Ok(seed.with_values(result.scores)?)
    }

    fn propagate(
        &self,
        kernel: &LabeledMatrix,
        binary: &LabeledMatrix,
    ) -> DrugPropResult<LabeledMatrix> {
        if !binary.col_labels().iter().eq(kernel.row_labels().iter()) {
            return Err(DrugPropError::Kernel(format!(
                "binary matrix columns ({}) do not match kernel nodes ({})",
                binary.ncols(),
                kernel.nrows()
            )));
        }

        let values = kernel_propagation(kernel.values(), binary.values());
        Ok(LabeledMatrix::new(
            binary.row_labels().iter().cloned(),
            kernel.col_labels().iter().cloned(),
            values,
        )?)
    }

    fn fingerprint(&self, fingerprint: Fingerprint) -> Fingerprint {
        fingerprint
            .u64(self.symmetric_norm as u64)
            .u64(self.max_iterations as u64)
            .f64(self.tolerance)
    }
}

/// Kernel propagation adapter
#[derive(Debug, Clone)]
pub struct KernelPropagator<B = RwrBackend> {
    backend: B,
    alpha: f64,
}

impl KernelPropagator<RwrBackend> {
    pub fn from_config(config: &KernelConfig) -> Self {
        Self::new(RwrBackend::new(config), config.alpha)
    }
}

impl<B: KernelBackend> KernelPropagator<B> {
    pub fn new(backend: B, alpha: f64) -> Self {
        Self { backend, alpha }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Propagate a genes × drugs target table over `edges`.
    ///
    /// Returns drugs × subnetwork nodes, nodes in table order rather than the
    /// order genes first appear in `edges`; values do not depend on it. Table
    /// rows whose label is not an entrez id are skipped.
    pub fn propagate(
        &self,
        drug_target: &LabeledMatrix,
        edges: &[Edge],
    ) -> DrugPropResult<LabeledMatrix> {
        let mut rows: IndexMap<GeneId, usize> = IndexMap::new();
        for (i, label) in drug_target.row_labels().iter().enumerate() {
            match parse_gene_id(label) {
                Some(id) => {
                    rows.entry(id).or_insert(i);
                }
                None => debug!("Skipping drug-target row {:?}: not an entrez id", label),
            }
        }
        let genes: Vec<GeneId> = rows.keys().copied().collect();

        let subnetwork = Subnetwork::induce(edges, &genes);
        debug!(
            "Induced subnetwork: {} of {} genes, {} edges",
            subnetwork.node_count(),
            genes.len(),
            subnetwork.edges.len()
        );

        let labels = subnetwork.labels();
        let seed = LabeledMatrix::new(
            labels.iter().cloned(),
            labels.iter().cloned(),
            Array2::eye(subnetwork.node_count()),
        )?;

        info!("Preparing network propagation kernel");
        let kernel = self.backend.build_kernel(&subnetwork, &seed, self.alpha)?;

        // drugs × nodes binary matrix
        let mut binary = Array2::zeros((drug_target.ncols(), subnetwork.node_count()));
        for (j, id) in subnetwork.nodes.iter().enumerate() {
            if let Some(&i) = rows.get(id) {
                binary.column_mut(j).assign(&drug_target.values().row(i));
            }
        }
        let binary = LabeledMatrix::new(
            drug_target.col_labels().iter().cloned(),
            labels,
            binary,
        )?;

        let propagated = self.backend.propagate(&kernel, &binary)?;
        info!(
            "Kernel propagation finished ({}x{})",
            propagated.nrows(),
            propagated.ncols()
        );
        Ok(propagated)
    }

    /// `propagate`, memoized through the result cache
    pub fn propagate_cached<S: ArtifactStore>(
        &self,
        cache: &ResultCache<S>,
        drug_target: &LabeledMatrix,
        edges: &[Edge],
    ) -> DrugPropResult<LabeledMatrix> {
        let fingerprint = fingerprint_edges(edges, Fingerprint::new().matrix(drug_target));
        let fingerprint = self.backend.fingerprint(fingerprint.f64(self.alpha));
        let key = cache.key(ArtifactKind::KernelPropagated, fingerprint);
        cache.get_or_compute(&key, || self.propagate(drug_target, edges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::config::RenewFlags;
    use ndarray::array;
    use std::cell::Cell;

    fn edges() -> Vec<Edge> {
        vec![
            Edge::new(1, 2, 0.4),
            Edge::new(2, 3, 0.6),
            Edge::new(3, 99, 1.0),
        ]
    }

    /// genes × drugs; gene 4 never occurs in the edge list
    fn drug_target() -> LabeledMatrix {
        LabeledMatrix::new(
            ["3", "1", "2", "4"],
            ["A", "B"],
            array![[0.0, 1.0], [1.0, 0.0], [0.0, 0.0], [1.0, 1.0]],
        )
        .unwrap()
    }

    /// Records what the adapter hands over and returns the seed as kernel
    #[derive(Default)]
    struct IdentityBackend {
        nodes: std::cell::RefCell<Vec<GeneId>>,
        builds: Cell<usize>,
    }

    impl KernelBackend for IdentityBackend {
        fn build_kernel(
            &self,
            subnetwork: &Subnetwork,
            seed: &LabeledMatrix,
            _alpha: f64,
        ) -> DrugPropResult<LabeledMatrix> {
            *self.nodes.borrow_mut() = subnetwork.nodes.clone();
            self.builds.set(self.builds.get() + 1);
            Ok(seed.clone())
        }

        fn propagate(
            &self,
            kernel: &LabeledMatrix,
            binary: &LabeledMatrix,
        ) -> DrugPropResult<LabeledMatrix> {
            Ok(binary.with_values(binary.values().dot(kernel.values()))?)
        }
    }

    #[test]
    fn test_subnetwork_induction() {
        let sub = Subnetwork::induce(&edges(), &[3, 1, 2, 4]);
        assert_eq!(sub.nodes, vec![3, 1, 2]);
        assert_eq!(sub.edges, vec![Edge::new(1, 2, 0.4), Edge::new(2, 3, 0.6)]);
    }

    #[test]
    fn test_adapter_seeds_identity_in_table_order() {
        let propagator = KernelPropagator::new(IdentityBackend::default(), 0.5);
        let out = propagator.propagate(&drug_target(), &edges()).unwrap();

        assert_eq!(*propagator.backend().nodes.borrow(), vec![3, 1, 2]);
        assert_eq!(out.row_labels().iter().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(out.col_labels().iter().collect::<Vec<_>>(), vec!["3", "1", "2"]);
        // Identity kernel gives back the binary matrix
        assert_eq!(out.values(), &array![[0.0, 1.0, 0.0], [1.0, 0.0, 0.0]]);
    }

    #[test]
    fn test_rwr_backend_scores() {
        let propagator = KernelPropagator::from_config(&KernelConfig::default());
        let out = propagator.propagate(&drug_target(), &edges()).unwrap();

        assert_eq!(out.shape(), (2, 3));
        // Each seed row carries unit mass through a connected graph
        for row in out.values().rows() {
            assert!((row.sum() - 1.0).abs() < 1e-8);
            assert!(row.iter().all(|&v| v >= 0.0));
        }
        // Drug A seeds gene 1: its own score beats the far end of the path
        assert!(out.get("A", "1").unwrap() > out.get("A", "3").unwrap());
    }

    #[test]
    fn test_rwr_backend_rejects_misaligned_binary() {
        let backend = RwrBackend::default();
        let kernel = LabeledMatrix::new(["1", "2"], ["1", "2"], Array2::eye(2)).unwrap();
        let binary = LabeledMatrix::new(["A"], ["2", "1"], array![[1.0, 0.0]]).unwrap();
        assert!(matches!(
            backend.propagate(&kernel, &binary),
            Err(DrugPropError::Kernel(_))
        ));
    }

    #[test]
    fn test_cached_kernel_propagation() {
        let cache = ResultCache::new(MemoryStore::new(), RenewFlags::default());
        let propagator = KernelPropagator::new(IdentityBackend::default(), 0.5);

        let first = propagator
            .propagate_cached(&cache, &drug_target(), &edges())
            .unwrap();
        let second = propagator
            .propagate_cached(&cache, &drug_target(), &edges())
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(propagator.backend().builds.get(), 1);
    }
}
