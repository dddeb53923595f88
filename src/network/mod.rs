//! Gene universe and network matrix construction
//!
//! The gene universe `G` fixes the index set (and its order) for every matrix
//! built in a run. The network matrix is the symmetric `|G|×|G|` association
//! matrix derived from a weighted, undirected gene-gene edge list.

use crate::cache::{ArtifactKind, ArtifactStore, Fingerprint, ResultCache};
use crate::error::DrugPropResult;
use crate::matrix::LabeledMatrix;
use indexmap::{IndexMap, IndexSet};
use ndarray::Array2;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Entrez gene identifier
pub type GeneId = u64;

/// A gene of the universe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gene {
    pub entrez: GeneId,
    pub symbol: Option<String>,
}

impl Gene {
    pub fn new(entrez: GeneId) -> Self {
        Self {
            entrez,
            symbol: None,
        }
    }

    pub fn with_symbol(entrez: GeneId, symbol: impl Into<String>) -> Self {
        Self {
            entrez,
            symbol: Some(symbol.into()),
        }
    }
}

/// Ordered, duplicate-free set of genes
#[derive(Debug, Clone, Default)]
pub struct GeneUniverse {
    genes: IndexMap<GeneId, Option<String>>,
    by_symbol: FxHashMap<String, GeneId>,
}

impl GeneUniverse {
    /// Build from genes in order. A repeated entrez id keeps its first
    /// position; a later symbol fills in a missing one.
    pub fn new<I>(genes: I) -> Self
    where
        I: IntoIterator<Item = Gene>,
    {
        let mut universe = Self::default();
        for gene in genes {
            let slot = universe.genes.entry(gene.entrez).or_insert(None);
            if slot.is_none() {
                if let Some(symbol) = gene.symbol {
                    universe.by_symbol.entry(symbol.clone()).or_insert(gene.entrez);
                    *slot = Some(symbol);
                }
            }
        }
        universe
    }

    /// Universe from bare entrez ids
    pub fn from_ids<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = GeneId>,
    {
        Self::new(ids.into_iter().map(Gene::new))
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn contains(&self, id: GeneId) -> bool {
        self.genes.contains_key(&id)
    }

    /// Index of a gene in the universe order
    pub fn position(&self, id: GeneId) -> Option<usize> {
        self.genes.get_index_of(&id)
    }

    /// Entrez ids in universe order
    pub fn ids(&self) -> impl Iterator<Item = GeneId> + '_ {
        self.genes.keys().copied()
    }

    pub fn symbol(&self, id: GeneId) -> Option<&str> {
        self.genes.get(&id).and_then(|s| s.as_deref())
    }

    /// Matrix labels (entrez ids rendered as strings) in universe order
    pub fn labels(&self) -> Vec<String> {
        self.ids().map(|id| id.to_string()).collect()
    }

    /// Resolve a table label that is either an entrez id or a gene symbol
    pub fn resolve(&self, label: &str) -> Option<GeneId> {
        let label = label.trim();
        if let Some(id) = parse_gene_id(label) {
            if self.contains(id) {
                return Some(id);
            }
        }
        self.by_symbol.get(label).copied()
    }

    pub(crate) fn fingerprint(&self, fingerprint: Fingerprint) -> Fingerprint {
        self.ids().fold(fingerprint.u64(self.len() as u64), |fp, id| fp.u64(id))
    }
}

/// Parse an entrez id, tolerating float renderings such as `1001.0`
pub fn parse_gene_id(raw: &str) -> Option<GeneId> {
    let raw = raw.trim();
    if let Ok(id) = raw.parse::<GeneId>() {
        return Some(id);
    }
    match raw.parse::<f64>() {
        Ok(v) if v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64 => Some(v as GeneId),
        _ => None,
    }
}

/// Undirected weighted gene-gene association
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub entrez_a: GeneId,
    pub entrez_b: GeneId,
    pub association: f64,
}

impl Edge {
    pub fn new(entrez_a: GeneId, entrez_b: GeneId, association: f64) -> Self {
        Self {
            entrez_a,
            entrez_b,
            association,
        }
    }
}

pub(crate) fn fingerprint_edges(edges: &[Edge], fingerprint: Fingerprint) -> Fingerprint {
    edges.iter().fold(fingerprint.u64(edges.len() as u64), |fp, e| {
        fp.u64(e.entrez_a).u64(e.entrez_b).f64(e.association)
    })
}

/// Self-association policy of the network matrix diagonal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagonalPolicy {
    /// Diagonal left at 0 (max-probability and RW-like diffusion)
    #[default]
    Zero,
    /// Diagonal seeded with 1 before edges are written (plain diffusion)
    SelfLoop,
}

impl DiagonalPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagonalPolicy::Zero => "zero_diagonal",
            DiagonalPolicy::SelfLoop => "self_loop",
        }
    }
}

/// Builds the `|G|×|G|` network matrix
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkMatrixBuilder {
    policy: DiagonalPolicy,
}

impl NetworkMatrixBuilder {
    pub fn new(policy: DiagonalPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DiagonalPolicy {
        self.policy
    }

    /// Build the matrix. Edges touching a gene outside `genes` are skipped;
    /// an empty edge list gives the zero matrix (or identity under
    /// `SelfLoop`).
    pub fn build(&self, edges: &[Edge], genes: &GeneUniverse) -> LabeledMatrix {
        let n = genes.len();
        let mut values = Array2::zeros((n, n));

        if self.policy == DiagonalPolicy::SelfLoop {
            values.diag_mut().fill(1.0);
        }

        let mut dropped = 0usize;
        for edge in edges {
            match (genes.position(edge.entrez_a), genes.position(edge.entrez_b)) {
                (Some(a), Some(b)) => {
                    values[[a, b]] = edge.association;
                    values[[b, a]] = edge.association;
                }
                _ => dropped += 1,
            }
        }
        if dropped > 0 {
            debug!(
                "Dropped {} of {} edges with an endpoint outside the gene universe",
                dropped,
                edges.len()
            );
        }

        let labels: IndexSet<String> = genes.labels().into_iter().collect();
        LabeledMatrix::from_label_sets(labels.clone(), labels, values)
    }

    /// `build`, memoized through the result cache
    pub fn build_cached<S: ArtifactStore>(
        &self,
        cache: &ResultCache<S>,
        edges: &[Edge],
        genes: &GeneUniverse,
    ) -> DrugPropResult<LabeledMatrix> {
        let fingerprint = fingerprint_edges(edges, genes.fingerprint(Fingerprint::new()));
        let key = cache
            .key(ArtifactKind::NetworkMatrix, fingerprint)
            .with_variant(self.policy.as_str());

        cache.get_or_compute(&key, || {
            debug!("Building {}x{} network matrix ({})", genes.len(), genes.len(), self.policy.as_str());
            Ok(self.build(edges, genes))
        })
    }
}
