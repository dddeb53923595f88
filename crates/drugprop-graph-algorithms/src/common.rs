//! Shared utilities for graph algorithms
//!
//! Provides a read-only, optimized view of an undirected weighted network for
//! algorithm execution.

use std::collections::{BTreeMap, HashMap};

/// Node Identifier type (u64, an entrez gene id in practice)
pub type NodeId = u64;

/// A dense, integer-indexed view of an undirected weighted network using
/// Compressed Sparse Row (CSR) format.
///
/// Every undirected edge is stored twice, once in each endpoint's row, so
/// `neighbors(i)` is the full neighborhood of `i`.
#[derive(Debug, Clone)]
pub struct GraphView {
    /// Number of nodes
    pub node_count: usize,
    /// Mapping from dense index (0..N) back to NodeId
    pub index_to_node: Vec<NodeId>,
    /// Mapping from NodeId to dense index
    pub node_to_index: HashMap<NodeId, usize>,

    /// Offsets into `neighbors`. Size = node_count + 1
    pub offsets: Vec<usize>,
    /// Contiguous array of neighbor node indices
    pub neighbors: Vec<usize>,
    /// Edge weights: aligned with `neighbors`
    pub weights: Vec<f64>,
}

impl GraphView {
    /// Build a view over `nodes` (in that order) from a weighted edge list.
    ///
    /// Edges with an endpoint outside `nodes` and self-loops are skipped. When
    /// the same unordered pair appears more than once, the last weight wins.
    pub fn from_edges<I>(nodes: &[NodeId], edges: I) -> Self
    where
        I: IntoIterator<Item = (NodeId, NodeId, f64)>,
    {
        let mut index_to_node = Vec::with_capacity(nodes.len());
        let mut node_to_index = HashMap::with_capacity(nodes.len());
        for &id in nodes {
            if !node_to_index.contains_key(&id) {
                node_to_index.insert(id, index_to_node.len());
                index_to_node.push(id);
            }
        }
        let node_count = index_to_node.len();

        // Keyed by (low, high) index so both orientations collapse
        let mut pairs: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for (a, b, w) in edges {
            let (Some(&u), Some(&v)) = (node_to_index.get(&a), node_to_index.get(&b)) else {
                continue;
            };
            if u == v {
                continue;
            }
            pairs.insert((u.min(v), u.max(v)), w);
        }

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); node_count];
        let mut adjacency_weights: Vec<Vec<f64>> = vec![Vec::new(); node_count];
        for ((u, v), w) in pairs {
            adjacency[u].push(v);
            adjacency_weights[u].push(w);
            adjacency[v].push(u);
            adjacency_weights[v].push(w);
        }

        Self::from_adjacency_list(
            node_count,
            index_to_node,
            node_to_index,
            adjacency,
            adjacency_weights,
        )
    }

    /// Helper to create a GraphView from adjacency lists (test support)
    pub fn from_adjacency_list(
        node_count: usize,
        index_to_node: Vec<NodeId>,
        node_to_index: HashMap<NodeId, usize>,
        adjacency: Vec<Vec<usize>>,
        adjacency_weights: Vec<Vec<f64>>,
    ) -> Self {
        let mut offsets = Vec::with_capacity(node_count + 1);
        let mut neighbors = Vec::new();
        let mut weights = Vec::new();

        offsets.push(0);
        for (row, row_weights) in adjacency.into_iter().zip(adjacency_weights) {
            neighbors.extend(row);
            weights.extend(row_weights);
            offsets.push(neighbors.len());
        }

        GraphView {
            node_count,
            index_to_node,
            node_to_index,
            offsets,
            neighbors,
            weights,
        }
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        self.neighbors.len() / 2
    }

    /// Unweighted degree of a node (by index)
    pub fn degree(&self, idx: usize) -> usize {
        self.offsets[idx + 1] - self.offsets[idx]
    }

    /// Sum of incident edge weights of a node (by index)
    pub fn weighted_degree(&self, idx: usize) -> f64 {
        self.neighbor_weights(idx).iter().sum()
    }

    /// Neighbor indices of a node
    pub fn neighbors(&self, idx: usize) -> &[usize] {
        &self.neighbors[self.offsets[idx]..self.offsets[idx + 1]]
    }

    /// Weights aligned with `neighbors(idx)`
    pub fn neighbor_weights(&self, idx: usize) -> &[f64] {
        &self.weights[self.offsets[idx]..self.offsets[idx + 1]]
    }
}
