//! Result cache for expensive matrix computations
//!
//! Every artifact (network matrix, propagation results, combined drug pairs,
//! kernel output, features) is addressed by a [`CacheKey`]. A stored artifact
//! is trusted as-is unless the renew flag for its kind is set; an absent or
//! unreadable artifact is a miss and triggers recomputation followed by a
//! wholesale overwrite.

pub mod store;

pub use store::{ArtifactStore, FileStore, MemoryStore};

use crate::config::RenewFlags;
use crate::error::DrugPropResult;
use crate::matrix::LabeledMatrix;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::{debug, info};

/// Number of hex digits of the input digest kept in artifact names
const FINGERPRINT_LEN: usize = 16;

/// Kinds of persisted artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    NetworkMatrix,
    MaxProbability,
    Diffusion,
    PlainDiffusion,
    KernelPropagated,
    CombinedDrugTarget,
    DrugProfiles,
    FeatureMatrix,
}

impl ArtifactKind {
    /// Base file name of the artifact
    pub fn file_stem(&self) -> &'static str {
        match self {
            ArtifactKind::NetworkMatrix => "network_matrix",
            ArtifactKind::MaxProbability => "target_1_simulated_result_matrix",
            ArtifactKind::Diffusion => "normalized_simulated_result_matrix",
            ArtifactKind::PlainDiffusion => "simulated_result_matrix",
            ArtifactKind::KernelPropagated => "propagated_drug_target",
            ArtifactKind::CombinedDrugTarget => "combine_drug_target_matrix",
            ArtifactKind::DrugProfiles => "drug_profiles",
            ArtifactKind::FeatureMatrix => "gene_expression_simulated_result_matrix",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_stem())
    }
}

/// Deterministic address of one artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: ArtifactKind,
    /// Distinguishes artifacts of one kind built under different modes
    pub variant: Option<String>,
    /// Digest of the inputs, when fingerprinting is enabled
    pub fingerprint: Option<String>,
}

impl CacheKey {
    pub fn new(kind: ArtifactKind) -> Self {
        Self {
            kind,
            variant: None,
            fingerprint: None,
        }
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    /// `<stem>[_<variant>][-<fingerprint>].csv`
    pub fn file_name(&self) -> String {
        let mut name = self.kind.file_stem().to_string();
        if let Some(variant) = &self.variant {
            name.push('_');
            name.push_str(variant);
        }
        if let Some(fingerprint) = &self.fingerprint {
            name.push('-');
            name.push_str(fingerprint);
        }
        name.push_str(".csv");
        name
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// Incremental SHA-256 over computation inputs
#[derive(Clone, Default)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u64(mut self, value: u64) -> Self {
        self.hasher.update(value.to_le_bytes());
        self
    }

    pub fn f64(mut self, value: f64) -> Self {
        self.hasher.update(value.to_bits().to_le_bytes());
        self
    }

    /// Length-prefixed so adjacent strings cannot run together
    pub fn str(mut self, value: &str) -> Self {
        self.hasher.update((value.len() as u64).to_le_bytes());
        self.hasher.update(value.as_bytes());
        self
    }

    pub fn matrix(self, matrix: &LabeledMatrix) -> Self {
        let (rows, cols) = matrix.shape();
        let fp = self.u64(rows as u64).u64(cols as u64);
        let fp = matrix.row_labels().iter().fold(fp, |fp, l| fp.str(l));
        let fp = matrix.col_labels().iter().fold(fp, |fp, l| fp.str(l));
        matrix.values().iter().fold(fp, |fp, &v| fp.f64(v))
    }

    /// Truncated lowercase hex digest
    pub fn finish(self) -> String {
        let mut hex = format!("{:x}", self.hasher.finalize());
        hex.truncate(FINGERPRINT_LEN);
        hex
    }
}

/// Memoization layer over an [`ArtifactStore`]
pub struct ResultCache<S = FileStore> {
    store: S,
    renew: RenewFlags,
    fingerprinting: bool,
}

impl<S: ArtifactStore> ResultCache<S> {
    pub fn new(store: S, renew: RenewFlags) -> Self {
        Self {
            store,
            renew,
            fingerprinting: true,
        }
    }

    /// Toggle input fingerprints in artifact names. Without them the
    /// artifact path depends on the kind (and variant) only.
    pub fn with_fingerprinting(mut self, enabled: bool) -> Self {
        self.fingerprinting = enabled;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn renew_flags(&self) -> &RenewFlags {
        &self.renew
    }

    /// Key for `kind`, carrying the fingerprint when enabled
    pub fn key(&self, kind: ArtifactKind, fingerprint: Fingerprint) -> CacheKey {
        let key = CacheKey::new(kind);
        if self.fingerprinting {
            key.with_fingerprint(fingerprint.finish())
        } else {
            key
        }
    }

    /// Return the stored artifact for `key`, or run `compute` and persist its
    /// result. The renew flag for the key's kind forces the second path.
    pub fn get_or_compute<F>(&self, key: &CacheKey, compute: F) -> DrugPropResult<LabeledMatrix>
    where
        F: FnOnce() -> DrugPropResult<LabeledMatrix>,
    {
        if self.renew.for_kind(key.kind) {
            debug!("Renew requested for {}, recomputing", key);
        } else {
            match self.store.load(key) {
                Ok(Some(matrix)) => {
                    debug!("Cache hit for {}", key);
                    return Ok(matrix);
                }
                Ok(None) => debug!("Cache miss for {}", key),
                Err(e) => debug!("Unreadable artifact {}, recomputing: {}", key, e),
            }
        }

        let matrix = compute()?;
        self.store.save(key, &matrix)?;
        info!("Stored {} ({}x{})", key, matrix.nrows(), matrix.ncols());
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::cell::Cell;

    fn matrix(v: f64) -> LabeledMatrix {
        LabeledMatrix::new(["d"], ["1", "2"], array![[v, 0.0]]).unwrap()
    }

    #[test]
    fn test_key_file_names() {
        let key = CacheKey::new(ArtifactKind::NetworkMatrix)
            .with_variant("self_loop")
            .with_fingerprint("abc");
        assert_eq!(key.file_name(), "network_matrix_self_loop-abc.csv");
        assert_eq!(
            CacheKey::new(ArtifactKind::CombinedDrugTarget).file_name(),
            "combine_drug_target_matrix.csv"
        );
    }

    #[test]
    fn test_fingerprint_is_deterministic_and_input_sensitive() {
        let a = Fingerprint::new().str("x").f64(0.5).finish();
        let b = Fingerprint::new().str("x").f64(0.5).finish();
        let c = Fingerprint::new().str("x").f64(0.25).finish();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), FINGERPRINT_LEN);

        // Length prefix keeps ("ab", "c") apart from ("a", "bc")
        let d = Fingerprint::new().str("ab").str("c").finish();
        let e = Fingerprint::new().str("a").str("bc").finish();
        assert_ne!(d, e);
    }

    #[test]
    fn test_hit_skips_compute() {
        let cache = ResultCache::new(MemoryStore::new(), RenewFlags::default());
        let key = cache.key(ArtifactKind::Diffusion, Fingerprint::new().u64(1));
        let calls = Cell::new(0);

        let first = cache
            .get_or_compute(&key, || {
                calls.set(calls.get() + 1);
                Ok(matrix(0.5))
            })
            .unwrap();
        let second = cache
            .get_or_compute(&key, || {
                calls.set(calls.get() + 1);
                Ok(matrix(0.9))
            })
            .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn test_renew_always_recomputes() {
        let renew = RenewFlags {
            propagation: true,
            ..RenewFlags::default()
        };
        let cache = ResultCache::new(MemoryStore::new(), renew);
        let key = CacheKey::new(ArtifactKind::MaxProbability);
        cache.store().save(&key, &matrix(0.1)).unwrap();

        let out = cache.get_or_compute(&key, || Ok(matrix(0.7))).unwrap();
        assert_eq!(out, matrix(0.7));
        // The recomputed artifact replaced the stored one
        assert_eq!(cache.store().load(&key).unwrap(), Some(matrix(0.7)));
    }

    #[test]
    fn test_renew_is_per_kind() {
        let renew = RenewFlags {
            propagation: true,
            ..RenewFlags::default()
        };
        let cache = ResultCache::new(MemoryStore::new(), renew);
        let key = CacheKey::new(ArtifactKind::NetworkMatrix);
        cache.store().save(&key, &matrix(0.1)).unwrap();

        let out = cache.get_or_compute(&key, || Ok(matrix(0.7))).unwrap();
        assert_eq!(out, matrix(0.1));
    }

    #[test]
    fn test_compute_error_is_not_cached() {
        let cache = ResultCache::new(MemoryStore::new(), RenewFlags::default());
        let key = CacheKey::new(ArtifactKind::Diffusion);

        let err = cache.get_or_compute(&key, || {
            Err(crate::matrix::MatrixError::InvalidAxis("2".into()).into())
        });
        assert!(err.is_err());
        assert_eq!(cache.store().load(&key).unwrap(), None);
    }

    #[test]
    fn test_fingerprinting_disabled_uses_plain_name() {
        let cache =
            ResultCache::new(MemoryStore::new(), RenewFlags::default()).with_fingerprinting(false);
        let key = cache.key(ArtifactKind::Diffusion, Fingerprint::new().u64(3));
        assert_eq!(key.fingerprint, None);
    }
}
