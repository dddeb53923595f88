//! Feature matrix for the downstream synergy model
//!
//! Joins the combined pair influence with per-cell-line expression or
//! dependency scores: one row per synergy record, keyed
//! `drugA_drugB_cellline`, equal to the pair's influence over the expression
//! genes scaled elementwise by the cell line's scores.

use crate::cache::{ArtifactKind, ArtifactStore, Fingerprint, ResultCache};
use crate::combine::DrugPair;
use crate::error::DrugPropResult;
use crate::matrix::{LabeledMatrix, MatrixError};
use crate::network::GeneUniverse;
use crate::table::SynergyRecord;
use indexmap::IndexSet;
use ndarray::{Array2, Zip};
use tracing::debug;

/// Row key of one synergy record
pub fn feature_key(record: &SynergyRecord) -> String {
    format!("{}_{}", DrugPair::from(record).key(), record.cell_line)
}

/// Join pair influence (pairs × genes) with expression (genes × cell lines).
///
/// Every expression gene must resolve in `genes` and exist in the influence
/// columns, otherwise the gene axes disagree and the join fails with a
/// shape mismatch. Two rows resolving to the same gene are a mismatch too.
/// Repeated records keep their first occurrence.
pub fn join_features(
    influence: &LabeledMatrix,
    expression: &LabeledMatrix,
    records: &[SynergyRecord],
    genes: &GeneUniverse,
) -> DrugPropResult<LabeledMatrix> {
    // A symbol row and an entrez row naming the same gene count once
    let gene_labels: IndexSet<String> = expression
        .row_labels()
        .iter()
        .filter_map(|label| genes.resolve(label))
        .map(|id| id.to_string())
        .filter(|label| influence.col_position(label).is_some())
        .collect();
    if gene_labels.len() != expression.nrows() {
        return Err(MatrixError::ShapeMismatch {
            context: "propagated genes vs gene expression genes".to_string(),
            expected: expression.nrows(),
            found: gene_labels.len(),
        }
        .into());
    }
    let selected = influence.select_columns(&gene_labels)?;

    let mut keys = IndexSet::new();
    let mut rows = Vec::new();
    for record in records {
        if keys.insert(feature_key(record)) {
            rows.push(record);
        }
    }
    if rows.len() < records.len() {
        debug!("Skipped {} repeated synergy records", records.len() - rows.len());
    }

    let mut values = Array2::zeros((rows.len(), gene_labels.len()));
    for (i, record) in rows.iter().enumerate() {
        let pair = selected.row(&DrugPair::from(*record).key())?;
        let cell = expression.column(&record.cell_line)?;
        Zip::from(values.row_mut(i))
            .and(&pair)
            .and(&cell)
            .for_each(|out, &p, &c| *out = p * c);
    }

    debug!("Joined {} feature rows over {} genes", rows.len(), gene_labels.len());
    Ok(LabeledMatrix::new(keys, gene_labels.into_iter(), values)?)
}

/// `join_features`, memoized through the result cache
pub fn join_features_cached<S: ArtifactStore>(
    cache: &ResultCache<S>,
    influence: &LabeledMatrix,
    expression: &LabeledMatrix,
    records: &[SynergyRecord],
    genes: &GeneUniverse,
) -> DrugPropResult<LabeledMatrix> {
    let fingerprint = records.iter().fold(
        genes.fingerprint(Fingerprint::new().matrix(influence).matrix(expression)),
        |fp, r| fp.str(&feature_key(r)),
    );
    let key = cache.key(ArtifactKind::FeatureMatrix, fingerprint);
    cache.get_or_compute(&key, || join_features(influence, expression, records, genes))
}

/// Keep only columns whose values are not all equal.
///
/// A single-row matrix has no variance and loses every column.
pub fn drop_constant_columns(matrix: &LabeledMatrix) -> DrugPropResult<LabeledMatrix> {
    let values = matrix.values();
    let keep: Vec<&String> = matrix
        .col_labels()
        .iter()
        .enumerate()
        .filter(|(j, _)| {
            let column = values.column(*j);
            values.nrows() > 1 && column.iter().any(|&v| v != column[0])
        })
        .map(|(_, label)| label)
        .collect();

    debug!(
        "Dropped {} constant columns of {}",
        matrix.ncols() - keep.len(),
        matrix.ncols()
    );
    Ok(matrix.select_columns(keep)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DrugPropError;
    use crate::network::Gene;
    use ndarray::array;

    fn genes() -> GeneUniverse {
        GeneUniverse::new(vec![
            Gene::with_symbol(1, "TP53"),
            Gene::with_symbol(2, "KRAS"),
            Gene::with_symbol(3, "EGFR"),
        ])
    }

    fn influence() -> LabeledMatrix {
        LabeledMatrix::new(
            ["A_B", "B_C"],
            ["1", "2", "3"],
            array![[0.0, 0.6, 1.0], [0.5, 0.0, 0.2]],
        )
        .unwrap()
    }

    fn record(a: &str, b: &str, cell: &str) -> SynergyRecord {
        SynergyRecord {
            drug_a: a.to_string(),
            drug_b: b.to_string(),
            cell_line: cell.to_string(),
            synergy: 1.0,
        }
    }

    #[test]
    fn test_join_scales_influence_by_cell_line() {
        // Expression genes by symbol, in a different order than the influence
        let expression = LabeledMatrix::new(
            ["EGFR", "TP53"],
            ["HT29", "A375"],
            array![[2.0, 0.5], [4.0, 1.0]],
        )
        .unwrap();
        let records = vec![
            record("A", "B", "HT29"),
            record("B", "C", "A375"),
            record("A", "B", "HT29"),
        ];

        let out = join_features(&influence(), &expression, &records, &genes()).unwrap();
        assert_eq!(
            out.row_labels().iter().collect::<Vec<_>>(),
            vec!["A_B_HT29", "B_C_A375"]
        );
        assert_eq!(out.col_labels().iter().collect::<Vec<_>>(), vec!["3", "1"]);
        assert_eq!(out.values(), &array![[2.0, 0.0], [0.1, 0.5]]);
    }

    #[test]
    fn test_unknown_expression_gene_is_shape_mismatch() {
        let expression = LabeledMatrix::new(["TP53", "MYC"], ["HT29"], array![[1.0], [1.0]]).unwrap();
        let err = join_features(&influence(), &expression, &[], &genes()).unwrap_err();
        assert!(matches!(
            err,
            DrugPropError::Matrix(MatrixError::ShapeMismatch {
                expected: 2,
                found: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_gene_named_twice_is_shape_mismatch() {
        // TP53 by symbol and by entrez id
        let expression = LabeledMatrix::new(["TP53", "1"], ["HT29"], array![[1.0], [2.0]]).unwrap();
        let err = join_features(&influence(), &expression, &[], &genes()).unwrap_err();
        assert!(matches!(
            err,
            DrugPropError::Matrix(MatrixError::ShapeMismatch {
                expected: 2,
                found: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_pair_errors() {
        let expression = LabeledMatrix::new(["TP53"], ["HT29"], array![[1.0]]).unwrap();
        let err = join_features(&influence(), &expression, &[record("C", "A", "HT29")], &genes());
        assert!(err.is_err());
    }

    #[test]
    fn test_drop_constant_columns() {
        let m = LabeledMatrix::new(
            ["r1", "r2", "r3"],
            ["flat", "varies", "zero"],
            array![[1.0, 0.1, 0.0], [1.0, 0.2, 0.0], [1.0, 0.1, 0.0]],
        )
        .unwrap();
        let kept = drop_constant_columns(&m).unwrap();
        assert_eq!(kept.col_labels().iter().collect::<Vec<_>>(), vec!["varies"]);

        let single = m.select_rows(["r1"]).unwrap();
        assert_eq!(drop_constant_columns(&single).unwrap().ncols(), 0);
    }
}
