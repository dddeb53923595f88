//! End-to-end propagation pipeline
//!
//! Wires the configured inputs through network construction, drug-pair
//! combination, propagation and the optional feature join. Every expensive
//! step goes through the shared [`ResultCache`].

use crate::cache::{ArtifactStore, FileStore, ResultCache};
use crate::combine::{combine_cached, pairs_from_rows, DrugPair};
use crate::config::PipelineConfig;
use crate::coverage::CoverageReport;
use crate::error::DrugPropResult;
use crate::features::join_features_cached;
use crate::matrix::LabeledMatrix;
use crate::network::{DiagonalPolicy, Edge, GeneUniverse, NetworkMatrixBuilder};
use crate::profile::build_drug_profiles_cached;
use crate::propagation::{
    drug_target_matrix, target_as_zero, DiffusionPropagator, KernelBackend, KernelPropagator,
    MaxProbabilityPropagator, PropagationMethod, Propagator, RwrBackend,
};
use crate::table::{self, SynergyRecord};
use tracing::info;

/// Everything read from the configured input files
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub genes: GeneUniverse,
    pub edges: Vec<Edge>,
    /// Genes × drugs target table as read (or built from chemicals)
    pub drug_targets: LabeledMatrix,
    pub synergy: Vec<SynergyRecord>,
    /// Explicit pair list, when one is configured
    pub pair_list: Option<Vec<DrugPair>>,
    /// Genes × cell lines
    pub expression: Option<LabeledMatrix>,
}

impl PipelineInputs {
    /// Pairs to combine: the explicit pair list if any, otherwise the pairs
    /// named by the synergy records, in record order
    pub fn pairs(&self) -> Vec<DrugPair> {
        match &self.pair_list {
            Some(pairs) => pairs.clone(),
            None => self.synergy.iter().map(DrugPair::from).collect(),
        }
    }

    pub fn coverage(&self) -> CoverageReport {
        let cell_lines: Vec<String> = self.synergy.iter().map(|r| r.cell_line.clone()).collect();
        CoverageReport::check(
            &self.genes,
            &self.edges,
            &self.drug_targets,
            &self.pairs(),
            self.expression.as_ref().map(|e| (e, cell_lines.as_slice())),
        )
    }
}

/// Results of a full run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub coverage: CoverageReport,
    /// Pairs × genes combined targets
    pub combined: LabeledMatrix,
    /// Pairs × genes influence under the configured method
    pub influence: LabeledMatrix,
    /// Synergy records × expression genes, when an expression table is set.
    /// Always built from the target-as-0 influence, whatever the method.
    pub features: Option<LabeledMatrix>,
}

pub struct Pipeline<S = FileStore, B = RwrBackend> {
    config: PipelineConfig,
    cache: ResultCache<S>,
    kernel: KernelPropagator<B>,
}

impl Pipeline {
    /// File-backed pipeline with the random-walk backend
    pub fn new(config: PipelineConfig) -> DrugPropResult<Self> {
        let store = FileStore::new(config.artifact_root());
        let kernel = KernelPropagator::from_config(&config.kernel);
        Self::with_parts(config, store, kernel)
    }
}

impl<S: ArtifactStore, B: KernelBackend> Pipeline<S, B> {
    pub fn with_parts(
        config: PipelineConfig,
        store: S,
        kernel: KernelPropagator<B>,
    ) -> DrugPropResult<Self> {
        config.validate()?;
        let cache = ResultCache::new(store, config.renew.clone())
            .with_fingerprinting(config.fingerprint_artifacts);
        Ok(Self {
            config,
            cache,
            kernel,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResultCache<S> {
        &self.cache
    }

    pub fn read_edges(&self) -> DrugPropResult<Vec<Edge>> {
        let path = self.config.resolve(&self.config.inputs.network);
        Ok(table::read_edge_list(
            &path,
            self.config.edge_delimiter(),
            self.config.edge_list.has_headers,
        )?)
    }

    pub fn read_genes(&self) -> DrugPropResult<GeneUniverse> {
        Ok(table::read_gene_index(&self.config.resolve(&self.config.inputs.genes))?)
    }

    /// Genes × drugs table, built from chemicals when those are configured
    pub fn read_drug_targets(&self, genes: &GeneUniverse) -> DrugPropResult<LabeledMatrix> {
        match &self.config.inputs.chemicals {
            Some(path) => {
                let chemicals = table::read_chemicals(&self.config.resolve(path))?;
                build_drug_profiles_cached(&self.cache, &chemicals, genes)
            }
            None => Ok(table::read_matrix(
                &self.config.resolve(&self.config.inputs.drug_profiles),
            )?),
        }
    }

    pub fn load_inputs(&self) -> DrugPropResult<PipelineInputs> {
        let inputs = &self.config.inputs;
        let genes = self.read_genes()?;
        let edges = self.read_edges()?;
        let drug_targets = self.read_drug_targets(&genes)?;
        let synergy = table::read_synergy(&self.config.resolve(&inputs.synergy))?;
        let pair_list = match &inputs.pairs {
            Some(path) => Some(pairs_from_rows(&table::read_rows(&self.config.resolve(path))?)?),
            None => None,
        };
        let expression = match &inputs.expression {
            Some(path) => Some(table::read_matrix(&self.config.resolve(path))?),
            None => None,
        };

        info!(
            "Loaded {} genes, {} edges, {} drugs, {} synergy records",
            genes.len(),
            edges.len(),
            drug_targets.ncols(),
            synergy.len()
        );
        Ok(PipelineInputs {
            genes,
            edges,
            drug_targets,
            synergy,
            pair_list,
            expression,
        })
    }

    pub fn network_matrix(
        &self,
        inputs: &PipelineInputs,
        policy: DiagonalPolicy,
    ) -> DrugPropResult<LabeledMatrix> {
        NetworkMatrixBuilder::new(policy).build_cached(&self.cache, &inputs.edges, &inputs.genes)
    }

    /// Propagate a drugs × `G` target matrix with the configured method
    pub fn propagate(
        &self,
        inputs: &PipelineInputs,
        drug_target: &LabeledMatrix,
    ) -> DrugPropResult<LabeledMatrix> {
        let method = self.config.method;
        info!("Propagating {} rows with {}", drug_target.nrows(), method);

        match method {
            PropagationMethod::TargetAsOne => {
                self.propagate_with(&MaxProbabilityPropagator, inputs, drug_target)
            }
            PropagationMethod::TargetAsZero => Ok(target_as_zero(&self.propagate_with(
                &MaxProbabilityPropagator,
                inputs,
                drug_target,
            )?)),
            PropagationMethod::RwLike => {
                self.propagate_with(&DiffusionPropagator::rw_like(), inputs, drug_target)
            }
            PropagationMethod::PlainDiffusion => {
                self.propagate_with(&DiffusionPropagator::plain(), inputs, drug_target)
            }
            PropagationMethod::RandomWalk => {
                self.kernel
                    .propagate_cached(&self.cache, &drug_target.transpose(), &inputs.edges)
            }
        }
    }

    fn propagate_with<P: Propagator>(
        &self,
        propagator: &P,
        inputs: &PipelineInputs,
        drug_target: &LabeledMatrix,
    ) -> DrugPropResult<LabeledMatrix> {
        let network = self.network_matrix(inputs, propagator.diagonal_policy())?;
        propagator.propagate_cached(&self.cache, drug_target, &network)
    }

    /// Pairs × `G` union of each synergy pair's targets
    pub fn combined_targets(&self, inputs: &PipelineInputs) -> DrugPropResult<LabeledMatrix> {
        let per_drug = drug_target_matrix(&inputs.drug_targets, &inputs.genes).transpose();
        combine_cached(&self.cache, &inputs.pairs(), &per_drug)
    }

    /// Pairs × `G` influence the feature join scales: target-as-0
    /// max-probability, so target genes contribute nothing
    pub fn feature_influence(
        &self,
        inputs: &PipelineInputs,
        combined: &LabeledMatrix,
    ) -> DrugPropResult<LabeledMatrix> {
        Ok(target_as_zero(&self.propagate_with(
            &MaxProbabilityPropagator,
            inputs,
            combined,
        )?))
    }

    /// Load, combine, propagate and join
    pub fn run(&self) -> DrugPropResult<PipelineOutput> {
        let inputs = self.load_inputs()?;
        self.process(&inputs)
    }

    /// Combine, propagate and join already loaded inputs
    pub fn process(&self, inputs: &PipelineInputs) -> DrugPropResult<PipelineOutput> {
        let coverage = inputs.coverage();
        coverage.log();

        let combined = self.combined_targets(inputs)?;
        let influence = self.propagate(inputs, &combined)?;
        let features = match &inputs.expression {
            Some(expression) => {
                let feature_influence = match self.config.method {
                    PropagationMethod::TargetAsZero => influence.clone(),
                    _ => self.feature_influence(inputs, &combined)?,
                };
                Some(join_features_cached(
                    &self.cache,
                    &feature_influence,
                    expression,
                    &inputs.synergy,
                    &inputs.genes,
                )?)
            }
            None => None,
        };

        Ok(PipelineOutput {
            coverage,
            combined,
            influence,
            features,
        })
    }

    /// Kernel propagation of the configured drug-target table over the
    /// configured network, persisted as the kernel artifact
    pub fn run_kernel(&self) -> DrugPropResult<LabeledMatrix> {
        let edges = self.read_edges()?;
        let drug_targets = match self.config.inputs.chemicals {
            Some(_) => self.read_drug_targets(&self.read_genes()?)?,
            None => self.read_drug_targets(&GeneUniverse::default())?,
        };
        self.kernel.propagate_cached(&self.cache, &drug_targets, &edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use ndarray::array;

    fn inputs() -> PipelineInputs {
        PipelineInputs {
            genes: GeneUniverse::from_ids([1, 2, 3]),
            edges: vec![Edge::new(1, 2, 0.4), Edge::new(2, 3, 0.6)],
            drug_targets: LabeledMatrix::new(
                ["1", "2", "3"],
                ["A", "B"],
                array![[1.0, 0.0], [0.0, 0.0], [0.0, 1.0]],
            )
            .unwrap(),
            synergy: vec![SynergyRecord {
                drug_a: "A".into(),
                drug_b: "B".into(),
                cell_line: "HT29".into(),
                synergy: 3.5,
            }],
            pair_list: None,
            expression: None,
        }
    }

    fn pipeline(method: PropagationMethod) -> Pipeline<MemoryStore> {
        let config = PipelineConfig {
            method,
            ..PipelineConfig::default()
        };
        let kernel = KernelPropagator::from_config(&config.kernel);
        Pipeline::with_parts(config, MemoryStore::new(), kernel).unwrap()
    }

    #[test]
    fn test_combined_then_max_probability() {
        let p = pipeline(PropagationMethod::TargetAsOne);
        let inputs = inputs();
        let combined = p.combined_targets(&inputs).unwrap();
        assert_eq!(combined.row("A_B").unwrap().to_vec(), vec![1.0, 0.0, 1.0]);

        let influence = p.propagate(&inputs, &combined).unwrap();
        assert_eq!(influence.row("A_B").unwrap().to_vec(), vec![1.0, 0.6, 1.0]);
    }

    #[test]
    fn test_target_as_zero_method() {
        let p = pipeline(PropagationMethod::TargetAsZero);
        let inputs = inputs();
        let combined = p.combined_targets(&inputs).unwrap();
        let influence = p.propagate(&inputs, &combined).unwrap();
        let row = influence.row("A_B").unwrap();
        assert_eq!(row[0], 0.0);
        assert!((row[1] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_random_walk_method_covers_network_genes() {
        let p = pipeline(PropagationMethod::RandomWalk);
        let inputs = inputs();
        let combined = p.combined_targets(&inputs).unwrap();
        let influence = p.propagate(&inputs, &combined).unwrap();
        assert_eq!(influence.shape(), (1, 3));
        assert!(influence.values().iter().all(|&v| v > 0.0));
    }

    #[test]
    fn test_features_use_target_as_zero_for_every_method() {
        // A targets gene 1, B targets nothing
        let mut inputs = inputs();
        inputs.drug_targets = LabeledMatrix::new(
            ["1", "2", "3"],
            ["A", "B"],
            array![[1.0, 0.0], [0.0, 0.0], [0.0, 0.0]],
        )
        .unwrap();
        inputs.expression =
            Some(LabeledMatrix::new(["1", "2", "3"], ["HT29"], array![[1.0], [1.0], [1.0]]).unwrap());

        for method in [
            PropagationMethod::TargetAsOne,
            PropagationMethod::TargetAsZero,
            PropagationMethod::RwLike,
            PropagationMethod::PlainDiffusion,
        ] {
            let output = pipeline(method).process(&inputs).unwrap();
            let features = output.features.unwrap();
            let row = features.row("A_B_HT29").unwrap();
            assert_eq!(row[0], 0.0, "{}", method);
            assert!((row[1] - 0.6).abs() < 1e-12, "{}", method);
            assert_eq!(row[2], 1.0, "{}", method);
        }
    }

    #[test]
    fn test_pair_list_overrides_synergy_pairs() {
        let mut inputs = inputs();
        inputs.pair_list = Some(
            pairs_from_rows(&[vec!["B".to_string(), "A".to_string(), "ignored".to_string()]])
                .unwrap(),
        );
        let combined = pipeline(PropagationMethod::TargetAsOne)
            .combined_targets(&inputs)
            .unwrap();
        assert_eq!(combined.row_labels().iter().collect::<Vec<_>>(), vec!["B_A"]);
    }

    #[test]
    fn test_coverage_of_inputs() {
        let report = inputs().coverage();
        assert!(report.is_complete());
    }
}
