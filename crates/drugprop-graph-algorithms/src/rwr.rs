//! Random walk with restart (network propagation)
//!
//! Each seed row `f0` is propagated to the fixed point of
//! `f = alpha · f · W + (1 - alpha) · f0`, where `W` is the degree-normalized
//! adjacency of the network. Propagating the identity matrix yields a kernel
//! whose rows can be recombined linearly for any later seed matrix.

use super::common::GraphView;
use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;

/// Random walk with restart configuration
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RwrConfig {
    /// Probability of continuing the walk (1 - restart probability)
    pub alpha: f64,
    /// `D^-1/2 A D^-1/2` instead of `D^-1 A`
    pub symmetric_norm: bool,
    /// Hard cap on iterations per seed row
    pub max_iterations: usize,
    /// Stop once the largest per-node change falls below this
    pub tolerance: f64,
}

impl Default for RwrConfig {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            symmetric_norm: false,
            max_iterations: 1000,
            tolerance: 1e-10,
        }
    }
}

/// Propagated scores plus convergence bookkeeping
#[derive(Debug, Clone)]
pub struct RwrResult {
    /// seeds.nrows() × node_count
    pub scores: Array2<f64>,
    /// Largest iteration count any row needed
    pub iterations: usize,
    /// Whether every row reached the tolerance
    pub converged: bool,
}

/// Propagate every row of `seeds` (columns aligned with the view's node
/// indices) over the network.
///
/// Rows are independent and solved in parallel; each row is deterministic.
/// Nodes without incident edges keep only their restart mass.
///
/// # Panics
/// Panics when `seeds` does not have one column per node.
pub fn random_walk_with_restart(
    view: &GraphView,
    seeds: &Array2<f64>,
    config: &RwrConfig,
) -> RwrResult {
    let n = view.node_count;
    assert_eq!(
        seeds.ncols(),
        n,
        "seed matrix has {} columns for {} nodes",
        seeds.ncols(),
        n
    );

    let degrees: Vec<f64> = (0..n).map(|i| view.weighted_degree(i)).collect();

    let solved: Vec<(Vec<f64>, usize, bool)> = (0..seeds.nrows())
        .into_par_iter()
        .map(|r| propagate_row(view, &degrees, seeds.row(r), config))
        .collect();

    let mut scores = Array2::zeros((seeds.nrows(), n));
    let mut iterations = 0;
    let mut converged = true;
    for (r, (row, iters, ok)) in solved.into_iter().enumerate() {
        for (j, v) in row.into_iter().enumerate() {
            scores[[r, j]] = v;
        }
        iterations = iterations.max(iters);
        converged &= ok;
    }

    RwrResult {
        scores,
        iterations,
        converged,
    }
}

fn propagate_row(
    view: &GraphView,
    degrees: &[f64],
    seed: ArrayView1<f64>,
    config: &RwrConfig,
) -> (Vec<f64>, usize, bool) {
    let n = view.node_count;
    let alpha = config.alpha;
    let restart: Vec<f64> = seed.iter().map(|&s| (1.0 - alpha) * s).collect();

    let mut scores: Vec<f64> = seed.to_vec();
    let mut next_scores = vec![0.0; n];

    for iteration in 1..=config.max_iterations {
        next_scores.copy_from_slice(&restart);

        for i in 0..n {
            let mass = scores[i];
            if mass == 0.0 || degrees[i] == 0.0 {
                continue;
            }
            for (&j, &w) in view.neighbors(i).iter().zip(view.neighbor_weights(i)) {
                let transition = if config.symmetric_norm {
                    w / (degrees[i] * degrees[j]).sqrt()
                } else {
                    w / degrees[i]
                };
                next_scores[j] += alpha * mass * transition;
            }
        }

        let max_diff = scores
            .iter()
            .zip(&next_scores)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);

        // Swap buffers
        std::mem::swap(&mut scores, &mut next_scores);

        if max_diff < config.tolerance {
            return (scores, iteration, true);
        }
    }

    (scores, config.max_iterations, false)
}

/// Propagate the identity over the network: row `i` holds the steady-state
/// scores of a walk restarting at node `i`.
pub fn propagation_kernel(view: &GraphView, config: &RwrConfig) -> RwrResult {
    let identity = Array2::eye(view.node_count);
    random_walk_with_restart(view, &identity, config)
}

/// Apply a precomputed kernel to a seed matrix (rows = samples, columns =
/// kernel nodes): `binary · kernel`.
///
/// # Panics
/// Panics when `binary` does not have one column per kernel row.
pub fn kernel_propagation(kernel: &Array2<f64>, binary: &Array2<f64>) -> Array2<f64> {
    assert_eq!(
        binary.ncols(),
        kernel.nrows(),
        "seed matrix has {} columns for a kernel over {} nodes",
        binary.ncols(),
        kernel.nrows()
    );
    binary.dot(kernel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn path_graph() -> GraphView {
        // 1 - 2 - 3
        GraphView::from_edges(&[1, 2, 3], vec![(1, 2, 0.4), (2, 3, 0.6)])
    }

    #[test]
    fn test_kernel_rows_conserve_mass() {
        let view = path_graph();
        let result = propagation_kernel(&view, &RwrConfig::default());

        assert!(result.converged);
        // Row-stochastic transitions on a connected graph conserve total mass
        for row in result.scores.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-8);
        }
    }

    #[test]
    fn test_kernel_matches_closed_form() {
        // Two nodes joined by one edge: W = [[0, 1], [1, 0]]
        // f = (1 - a) e_0 (I - aW)^-1 = (1 - a) / (1 - a²) · [1, a]
        let view = GraphView::from_edges(&[1, 2], vec![(1, 2, 0.9)]);
        let config = RwrConfig::default();
        let a = config.alpha;
        let kernel = propagation_kernel(&view, &config).scores;

        let expected_self = (1.0 - a) / (1.0 - a * a);
        assert!((kernel[[0, 0]] - expected_self).abs() < 1e-8);
        assert!((kernel[[0, 1]] - expected_self * a).abs() < 1e-8);
        assert!((kernel[[1, 1]] - expected_self).abs() < 1e-8);
    }

    #[test]
    fn test_isolated_node_keeps_restart_mass() {
        let view = GraphView::from_edges(&[1, 2, 3], vec![(1, 2, 1.0)]);
        let config = RwrConfig::default();
        let kernel = propagation_kernel(&view, &config).scores;

        assert!((kernel[[2, 2]] - (1.0 - config.alpha)).abs() < 1e-12);
        assert_eq!(kernel[[2, 0]], 0.0);
        assert_eq!(kernel[[0, 2]], 0.0);
    }

    #[test]
    fn test_kernel_propagation_is_linear_in_seeds() {
        let view = path_graph();
        let config = RwrConfig::default();
        let kernel = propagation_kernel(&view, &config).scores;

        let seeds = array![[1.0, 0.0, 1.0]];
        let via_kernel = kernel_propagation(&kernel, &seeds);
        let direct = random_walk_with_restart(&view, &seeds, &config).scores;

        for (a, b) in via_kernel.iter().zip(direct.iter()) {
            assert!((a - b).abs() < 1e-8);
        }
    }

    #[test]
    fn test_symmetric_norm_changes_transitions() {
        let view = path_graph();
        let plain = propagation_kernel(&view, &RwrConfig::default()).scores;
        let sym = propagation_kernel(
            &view,
            &RwrConfig {
                symmetric_norm: true,
                ..RwrConfig::default()
            },
        )
        .scores;

        assert!((plain[[0, 1]] - sym[[0, 1]]).abs() > 1e-6);
        // Symmetric normalization keeps the kernel symmetric
        assert!((sym[[0, 2]] - sym[[2, 0]]).abs() < 1e-8);
    }

    #[test]
    fn test_iteration_cap_reports_not_converged() {
        let view = path_graph();
        let config = RwrConfig {
            max_iterations: 1,
            ..RwrConfig::default()
        };
        let result = propagation_kernel(&view, &config);

        assert!(!result.converged);
        assert_eq!(result.iterations, 1);
    }
}
