//! Input coverage checks
//!
//! Reports references that the propagation steps will silently drop, so a
//! run over inconsistent inputs is visible in the log.

use crate::combine::DrugPair;
use crate::matrix::LabeledMatrix;
use crate::network::{Edge, GeneId, GeneUniverse};
use indexmap::IndexSet;
use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::info;

/// What each input lacks relative to the others
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoverageReport {
    /// Genes of the universe with no edge in the network
    pub genes_missing_from_network: Vec<GeneId>,
    /// Drug-target table rows that resolve to no gene of the universe
    pub unresolved_target_genes: Vec<String>,
    /// Drugs named by a pair but absent from the drug-target table
    pub drugs_missing_from_targets: Vec<String>,
    /// Expression rows that resolve to no gene of the universe
    pub unresolved_expression_genes: Vec<String>,
    /// Cell lines named by synergy records but absent from the expression table
    pub cell_lines_missing_from_expression: Vec<String>,
}

impl CoverageReport {
    /// Cross-check the inputs. `drug_target` is genes × drugs, `expression`
    /// genes × cell lines.
    pub fn check(
        genes: &GeneUniverse,
        edges: &[Edge],
        drug_target: &LabeledMatrix,
        pairs: &[DrugPair],
        expression: Option<(&LabeledMatrix, &[String])>,
    ) -> Self {
        let in_network: FxHashSet<GeneId> = edges
            .iter()
            .flat_map(|e| [e.entrez_a, e.entrez_b])
            .collect();
        let genes_missing_from_network = genes.ids().filter(|id| !in_network.contains(id)).collect();

        let unresolved_target_genes = unresolved_rows(drug_target, genes);

        let drugs: IndexSet<&str> = pairs
            .iter()
            .flat_map(|p| [p.drug_a.as_str(), p.drug_b.as_str()])
            .collect();
        let drugs_missing_from_targets = drugs
            .into_iter()
            .filter(|d| drug_target.col_position(d).is_none())
            .map(str::to_string)
            .collect();

        let (unresolved_expression_genes, cell_lines_missing_from_expression) = match expression {
            Some((table, cell_lines)) => {
                let wanted: IndexSet<&str> = cell_lines.iter().map(String::as_str).collect();
                let missing = wanted
                    .into_iter()
                    .filter(|c| table.col_position(c).is_none())
                    .map(str::to_string)
                    .collect();
                (unresolved_rows(table, genes), missing)
            }
            None => (Vec::new(), Vec::new()),
        };

        Self {
            genes_missing_from_network,
            unresolved_target_genes,
            drugs_missing_from_targets,
            unresolved_expression_genes,
            cell_lines_missing_from_expression,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.genes_missing_from_network.is_empty()
            && self.unresolved_target_genes.is_empty()
            && self.drugs_missing_from_targets.is_empty()
            && self.unresolved_expression_genes.is_empty()
            && self.cell_lines_missing_from_expression.is_empty()
    }

    /// One `info!` line per check
    pub fn log(&self) {
        log_check("genes in network", &self.genes_missing_from_network);
        log_check("drug target genes", &self.unresolved_target_genes);
        log_check("drugs in drug targets", &self.drugs_missing_from_targets);
        log_check("gene dependency genes", &self.unresolved_expression_genes);
        log_check("cell lines", &self.cell_lines_missing_from_expression);
    }
}

fn unresolved_rows(table: &LabeledMatrix, genes: &GeneUniverse) -> Vec<String> {
    table
        .row_labels()
        .iter()
        .filter(|label| genes.resolve(label).is_none())
        .cloned()
        .collect()
}

fn log_check<T: std::fmt::Debug>(what: &str, missing: &[T]) {
    if missing.is_empty() {
        info!("Found all {}", what);
    } else {
        info!("Unfound {} ({}): {:?}", what, missing.len(), missing);
    }
}
