//! Drug-pair combination
//!
//! A pair's vector is the union of its two drugs' vectors: elementwise OR
//! for 0/1 targets, elementwise max for continuous influence.

use crate::cache::{ArtifactKind, ArtifactStore, Fingerprint, ResultCache};
use crate::error::{DrugPropError, DrugPropResult};
use crate::matrix::{LabeledMatrix, MatrixError};
use crate::table::SynergyRecord;
use indexmap::{IndexMap, IndexSet};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Ordered drug pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DrugPair {
    pub drug_a: String,
    pub drug_b: String,
}

impl DrugPair {
    pub fn new(drug_a: impl Into<String>, drug_b: impl Into<String>) -> Self {
        Self {
            drug_a: drug_a.into(),
            drug_b: drug_b.into(),
        }
    }

    /// Row key `drugA_drugB`. Order matters: `(B, A)` keys differently.
    pub fn key(&self) -> String {
        format!("{}_{}", self.drug_a, self.drug_b)
    }
}

impl fmt::Display for DrugPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl From<&SynergyRecord> for DrugPair {
    fn from(record: &SynergyRecord) -> Self {
        Self::new(record.drug_a.clone(), record.drug_b.clone())
    }
}

/// Pairs from raw table rows. Only the first two cells of a row are used;
/// wider rows are accepted with a warning.
pub fn pairs_from_rows(rows: &[Vec<String>]) -> DrugPropResult<Vec<DrugPair>> {
    let mut warned = false;
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            if row.len() < 2 {
                return Err(DrugPropError::MalformedPair {
                    row: i,
                    found: row.len(),
                });
            }
            if row.len() > 2 && !warned {
                warn!(
                    "Drug pair rows have {} columns, using the first two as drug A and drug B",
                    row.len()
                );
                warned = true;
            }
            Ok(DrugPair::new(row[0].clone(), row[1].clone()))
        })
        .collect()
}

/// Drop repeated pairs, keeping first occurrences in order
pub fn dedup_pairs<I>(pairs: I) -> Vec<DrugPair>
where
    I: IntoIterator<Item = DrugPair>,
{
    pairs.into_iter().collect::<IndexSet<_>>().into_iter().collect()
}

/// Combine per-drug columns into one row per unique pair.
///
/// `per_drug` is genes × drugs. The result is pairs × genes with rows in
/// deduplicated pair order and columns in the input gene order.
pub fn combine(pairs: &[DrugPair], per_drug: &LabeledMatrix) -> DrugPropResult<LabeledMatrix> {
    let unique = dedup_pairs(pairs.iter().cloned());
    if unique.len() < pairs.len() {
        debug!("Removed {} duplicate drug pairs", pairs.len() - unique.len());
    }
    let keys = pair_keys(&unique)?;

    let column = |drug: &str| {
        per_drug
            .col_position(drug)
            .ok_or_else(|| MatrixError::UnknownLabel {
                axis: "drug",
                label: drug.to_string(),
            })
    };

    let mut values = Array2::zeros((unique.len(), per_drug.nrows()));
    for (i, pair) in unique.iter().enumerate() {
        let a = per_drug.values().column(column(&pair.drug_a)?);
        let b = per_drug.values().column(column(&pair.drug_b)?);
        Zip::from(values.row_mut(i))
            .and(&a)
            .and(&b)
            .for_each(|out, &x, &y| *out = x.max(y));
    }

    debug!("Combined {} drug pairs over {} genes", unique.len(), per_drug.nrows());
    Ok(LabeledMatrix::new(
        keys,
        per_drug.row_labels().iter().cloned(),
        values,
    )?)
}

/// Row keys of distinct pairs; `("A_B", "C")` and `("A", "B_C")` collide
fn pair_keys(unique: &[DrugPair]) -> DrugPropResult<Vec<String>> {
    let mut seen: IndexMap<String, &DrugPair> = IndexMap::with_capacity(unique.len());
    for pair in unique {
        if let Some(first) = seen.insert(pair.key(), pair) {
            return Err(DrugPropError::PairKeyCollision {
                key: pair.key(),
                first: (first.drug_a.clone(), first.drug_b.clone()),
                second: (pair.drug_a.clone(), pair.drug_b.clone()),
            });
        }
    }
    Ok(seen.into_keys().collect())
}

/// `combine`, memoized through the result cache
pub fn combine_cached<S: ArtifactStore>(
    cache: &ResultCache<S>,
    pairs: &[DrugPair],
    per_drug: &LabeledMatrix,
) -> DrugPropResult<LabeledMatrix> {
    let fingerprint = pairs
        .iter()
        .fold(Fingerprint::new().matrix(per_drug), |fp, p| {
            fp.str(&p.drug_a).str(&p.drug_b)
        });
    let key = cache.key(ArtifactKind::CombinedDrugTarget, fingerprint);
    cache.get_or_compute(&key, || combine(pairs, per_drug))
}
