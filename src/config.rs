//! Pipeline configuration
//!
//! One explicit value passed to every component; there is no process-wide
//! settings state. Loaded from YAML, every field has a default.

use crate::cache::ArtifactKind;
use crate::propagation::PropagationMethod;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Per-artifact cache bypass flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenewFlags {
    pub network_matrix: bool,
    /// Max-probability and diffusion results
    pub propagation: bool,
    pub kernel: bool,
    pub combined_drug_target: bool,
    pub drug_profiles: bool,
    pub gene_expression: bool,
}

impl RenewFlags {
    /// Every artifact recomputed
    pub fn all() -> Self {
        Self {
            network_matrix: true,
            propagation: true,
            kernel: true,
            combined_drug_target: true,
            drug_profiles: true,
            gene_expression: true,
        }
    }

    pub fn for_kind(&self, kind: ArtifactKind) -> bool {
        match kind {
            ArtifactKind::NetworkMatrix => self.network_matrix,
            ArtifactKind::MaxProbability
            | ArtifactKind::Diffusion
            | ArtifactKind::PlainDiffusion => self.propagation,
            ArtifactKind::KernelPropagated => self.kernel,
            ArtifactKind::CombinedDrugTarget => self.combined_drug_target,
            ArtifactKind::DrugProfiles => self.drug_profiles,
            ArtifactKind::FeatureMatrix => self.gene_expression,
        }
    }
}

/// Input files, relative paths resolve against the working directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputPaths {
    /// Gene-gene edge list
    pub network: PathBuf,
    /// Gene index (`entrez[,symbol]`)
    pub genes: PathBuf,
    /// Drug-target table, genes × drugs
    pub drug_profiles: PathBuf,
    /// Raw chemicals with target lists; when set, the drug-target table is
    /// built from it instead of read from `drug_profiles`
    pub chemicals: Option<PathBuf>,
    /// Synergy records, source of the drug pairs
    pub synergy: PathBuf,
    /// Drug pair list (drug A, drug B, extra columns ignored); when set,
    /// the combined target table covers these pairs instead of the synergy
    /// records' pairs
    pub pairs: Option<PathBuf>,
    /// Expression/dependency table, genes × cell lines
    pub expression: Option<PathBuf>,
}

impl Default for InputPaths {
    fn default() -> Self {
        Self {
            network: PathBuf::from("network/string_network"),
            genes: PathBuf::from("genes/genes.csv"),
            drug_profiles: PathBuf::from("chemicals/drug_profiles.csv"),
            chemicals: None,
            synergy: PathBuf::from("synergy_score/combin_data.csv"),
            pairs: None,
            expression: None,
        }
    }
}

/// Edge list layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeListFormat {
    pub delimiter: char,
    pub has_headers: bool,
}

impl Default for EdgeListFormat {
    fn default() -> Self {
        Self {
            delimiter: '\t',
            has_headers: false,
        }
    }
}

/// Random walk with restart kernel parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Walk continuation probability (restart = 1 - alpha)
    pub alpha: f64,
    pub symmetric_norm: bool,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            symmetric_norm: false,
            max_iterations: 1000,
            tolerance: 1e-10,
        }
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub working_dir: PathBuf,
    /// Where cache artifacts live, relative to `working_dir`
    pub artifact_dir: PathBuf,
    pub inputs: InputPaths,
    pub edge_list: EdgeListFormat,
    pub method: PropagationMethod,
    pub renew: RenewFlags,
    pub kernel: KernelConfig,
    /// Suffix artifact names with a digest of their inputs
    pub fingerprint_artifacts: bool,
    pub log_file: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            artifact_dir: PathBuf::from("artifacts"),
            inputs: InputPaths::default(),
            edge_list: EdgeListFormat::default(),
            method: PropagationMethod::default(),
            renew: RenewFlags::default(),
            kernel: KernelConfig::default(),
            fingerprint_artifacts: true,
            log_file: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// `load`, or defaults when `path` does not exist
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No config at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let alpha = self.kernel.alpha;
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "kernel.alpha must lie in (0, 1), got {}",
                alpha
            )));
        }
        if !(self.kernel.tolerance > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "kernel.tolerance must be positive, got {}",
                self.kernel.tolerance
            )));
        }
        if !self.edge_list.delimiter.is_ascii() {
            return Err(ConfigError::Invalid(format!(
                "edge_list.delimiter must be a single ASCII character, got {:?}",
                self.edge_list.delimiter
            )));
        }
        Ok(())
    }

    /// Resolve `path` against the working directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }

    pub fn artifact_root(&self) -> PathBuf {
        self.resolve(&self.artifact_dir)
    }

    pub fn edge_delimiter(&self) -> u8 {
        self.edge_list.delimiter as u8
    }
}
