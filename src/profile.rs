//! Drug-target profiles from raw chemical records

use crate::cache::{ArtifactKind, ArtifactStore, Fingerprint, ResultCache};
use crate::error::DrugPropResult;
use crate::matrix::LabeledMatrix;
use crate::network::{parse_gene_id, GeneUniverse};
use crate::table::ChemicalRecord;
use indexmap::IndexMap;
use ndarray::Array2;
use tracing::debug;

/// Build the genes × drugs binary target table.
///
/// Rows follow the universe order. A drug listed more than once gets the
/// union of its target lists; a drug without targets keeps an all-zero
/// column. Targets outside the universe (or not parseable as entrez ids)
/// are dropped.
pub fn build_drug_profiles(
    chemicals: &[ChemicalRecord],
    genes: &GeneUniverse,
) -> DrugPropResult<LabeledMatrix> {
    let mut drugs: IndexMap<&str, Vec<usize>> = IndexMap::new();
    let mut dropped = 0usize;

    for chemical in chemicals {
        let targets = drugs.entry(chemical.name.as_str()).or_default();
        let Some(list) = chemical.targets.as_deref() else {
            continue;
        };
        for raw in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match parse_gene_id(raw).and_then(|id| genes.position(id)) {
                Some(position) => targets.push(position),
                None => dropped += 1,
            }
        }
    }
    if dropped > 0 {
        debug!("Dropped {} chemical targets outside the gene universe", dropped);
    }

    let mut values = Array2::zeros((genes.len(), drugs.len()));
    for (j, positions) in drugs.values().enumerate() {
        for &i in positions {
            values[[i, j]] = 1.0;
        }
    }

    Ok(LabeledMatrix::new(genes.labels(), drugs.keys().copied(), values)?)
}

/// `build_drug_profiles`, memoized through the result cache
pub fn build_drug_profiles_cached<S: ArtifactStore>(
    cache: &ResultCache<S>,
    chemicals: &[ChemicalRecord],
    genes: &GeneUniverse,
) -> DrugPropResult<LabeledMatrix> {
    let fingerprint = chemicals.iter().fold(
        genes.fingerprint(Fingerprint::new()),
        |fp, c| fp.str(&c.name).str(c.targets.as_deref().unwrap_or("")),
    );
    let key = cache.key(ArtifactKind::DrugProfiles, fingerprint);
    cache.get_or_compute(&key, || build_drug_profiles(chemicals, genes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chemical(name: &str, targets: Option<&str>) -> ChemicalRecord {
        ChemicalRecord {
            name: name.to_string(),
            targets: targets.map(str::to_string),
        }
    }

    #[test]
    fn test_profiles_mark_targets_in_universe() {
        let genes = GeneUniverse::from_ids([10, 20, 30]);
        let chemicals = vec![
            chemical("aspirin", Some("10,30, 77")),
            chemical("placebo", None),
            chemical("aspirin", Some("20")),
        ];

        let profiles = build_drug_profiles(&chemicals, &genes).unwrap();
        assert_eq!(profiles.shape(), (3, 2));
        assert_eq!(profiles.column("aspirin").unwrap().to_vec(), vec![1.0, 1.0, 1.0]);
        assert_eq!(profiles.column("placebo").unwrap().to_vec(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_unparseable_target_dropped() {
        let genes = GeneUniverse::from_ids([1]);
        let profiles = build_drug_profiles(&[chemical("x", Some("1,abc"))], &genes).unwrap();
        assert_eq!(profiles.get("1", "x"), Some(1.0));
    }
}
