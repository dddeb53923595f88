use drugprop::cache::{ArtifactKind, ArtifactStore, CacheKey, FileStore, Fingerprint, ResultCache};
use drugprop::combine::{combine_cached, DrugPair};
use drugprop::config::RenewFlags;
use drugprop::matrix::LabeledMatrix;
use drugprop::network::{Edge, GeneUniverse, NetworkMatrixBuilder};
use drugprop::propagation::{DiffusionPropagator, MaxProbabilityPropagator, Propagator};
use ndarray::array;
use std::cell::Cell;
use tempfile::TempDir;

fn genes() -> GeneUniverse {
    GeneUniverse::from_ids([1, 2, 3, 4])
}

fn edges() -> Vec<Edge> {
    vec![
        Edge::new(1, 2, 0.3),
        Edge::new(2, 3, 0.7),
        Edge::new(3, 4, 1.0 / 3.0),
        Edge::new(4, 1, 0.1),
    ]
}

fn drug_target() -> LabeledMatrix {
    LabeledMatrix::new(
        ["A", "B"],
        ["1", "2", "3", "4"],
        array![[1.0, 0.0, 0.0, 0.0], [0.0, 0.0, 1.0, 1.0]],
    )
    .unwrap()
}

#[test]
fn test_file_cache_hit_is_bit_identical() {
    let temp_dir = TempDir::new().unwrap();
    let network = NetworkMatrixBuilder::default().build(&edges(), &genes());

    let fresh = {
        let cache = ResultCache::new(FileStore::new(temp_dir.path()), RenewFlags::default());
        DiffusionPropagator::rw_like()
            .propagate_cached(&cache, &drug_target(), &network)
            .unwrap()
    };

    // A new cache over the same directory reads the artifact back
    let cache = ResultCache::new(FileStore::new(temp_dir.path()), RenewFlags::default());
    let key = cache.key(
        ArtifactKind::Diffusion,
        Fingerprint::new().matrix(&drug_target()).matrix(&network),
    );
    assert!(cache.store().contains(&key));

    let cached = cache
        .get_or_compute(&key, || panic!("artifact should have been reused"))
        .unwrap();
    assert_eq!(cached, fresh);
}

#[test]
fn test_renew_recomputes_despite_artifact() {
    let temp_dir = TempDir::new().unwrap();
    let network = NetworkMatrixBuilder::default().build(&edges(), &genes());
    let store = FileStore::new(temp_dir.path());

    let first = ResultCache::new(store.clone(), RenewFlags::default());
    let result = MaxProbabilityPropagator
        .propagate_cached(&first, &drug_target(), &network)
        .unwrap();

    let renew = RenewFlags {
        propagation: true,
        ..RenewFlags::default()
    };
    let cache = ResultCache::new(store, renew);
    let key = cache.key(
        ArtifactKind::MaxProbability,
        Fingerprint::new().matrix(&drug_target()).matrix(&network),
    );
    let calls = Cell::new(0);
    let again = cache
        .get_or_compute(&key, || {
            calls.set(calls.get() + 1);
            Ok(result.clone())
        })
        .unwrap();

    assert_eq!(calls.get(), 1);
    assert_eq!(again, result);
}

#[test]
fn test_malformed_artifact_is_a_miss() {
    let temp_dir = TempDir::new().unwrap();
    let cache = ResultCache::new(FileStore::new(temp_dir.path()), RenewFlags::default())
        .with_fingerprinting(false);
    let key = CacheKey::new(ArtifactKind::CombinedDrugTarget);
    std::fs::write(cache.store().path_for(&key), ",g1,g2\nA_B,1.0,oops\n").unwrap();

    let per_drug = LabeledMatrix::new(["g1", "g2"], ["A", "B"], array![[1.0, 0.0], [0.0, 1.0]]).unwrap();
    let combined = combine_cached(&cache, &[DrugPair::new("A", "B")], &per_drug).unwrap();

    assert_eq!(combined.row("A_B").unwrap().to_vec(), vec![1.0, 1.0]);
    // The unreadable file was replaced by the recomputed artifact
    assert_eq!(cache.store().load(&key).unwrap(), Some(combined));
}

#[test]
fn test_different_inputs_never_share_an_artifact() {
    let temp_dir = TempDir::new().unwrap();
    let cache = ResultCache::new(FileStore::new(temp_dir.path()), RenewFlags::default());

    let a = NetworkMatrixBuilder::default()
        .build_cached(&cache, &edges(), &genes())
        .unwrap();
    let mut changed = edges();
    changed[0].association = 0.9;
    let b = NetworkMatrixBuilder::default()
        .build_cached(&cache, &changed, &genes())
        .unwrap();

    assert_eq!(a.get("1", "2"), Some(0.3));
    assert_eq!(b.get("1", "2"), Some(0.9));
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 2);
}
