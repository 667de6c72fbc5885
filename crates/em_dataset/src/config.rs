//! TOML configuration for loading and sampling.

use crate::aggregate::default_families;
use crate::family::DatasetFamily;
use crate::loader::LoadRequest;
use crate::sampler::SamplingWeights;
use crate::spec::{SampleSpec, StreamSpec};
use crate::types::{DatasetResult, EmDatasetError, SamplerMode};
use crate::volume::VolumeFormat;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_NAME: &str = "em-dataset.toml";
pub const CONFIG_ENV: &str = "EM_DATASET_CONFIG";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub base_dir: PathBuf,
    pub data_ids: Option<Vec<String>>,
    pub class_keys: Vec<String>,
    pub format: VolumeFormat,
    /// Built-in families first, then configured ones.
    pub families: Vec<DatasetFamily>,
    pub sampler: SamplerSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SamplerSection {
    pub seed: Option<u64>,
    pub mode: SamplerMode,
    pub weights: Option<SamplingWeights>,
    pub in_spec: StreamSpec,
    pub out_spec: StreamSpec,
}

impl Default for SamplerSection {
    fn default() -> Self {
        Self {
            seed: None,
            mode: SamplerMode::Train,
            weights: None,
            in_spec: BTreeMap::from([("input".to_string(), vec![1, 20, 256, 256])]),
            out_spec: BTreeMap::from([("mitochondria".to_string(), vec![1, 20, 256, 256])]),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_dir: expand_path("~/data"),
            data_ids: None,
            class_keys: vec!["mit".to_string()],
            format: VolumeFormat::default(),
            families: default_families(),
            sampler: SamplerSection::default(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    base_dir: Option<String>,
    data_ids: Option<Vec<String>>,
    class_keys: Option<Vec<String>>,
    format: Option<VolumeFormat>,
    families: Option<Vec<DatasetFamily>>,
    sampler: Option<SamplerSection>,
}

impl PipelineConfig {
    /// Load from `EM_DATASET_CONFIG`, else `em-dataset.toml` in the working
    /// directory, else defaults.
    pub fn load() -> DatasetResult<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::from_path(&expand_path(&path));
        }
        let default_path = Path::new(DEFAULT_CONFIG_NAME);
        if default_path.exists() {
            return Self::from_path(default_path);
        }
        Ok(Self::default())
    }

    pub fn from_path(path: &Path) -> DatasetResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| EmDatasetError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&raw).map_err(|e| match e {
            EmDatasetError::Config { msg, .. } => EmDatasetError::Config {
                path: path.to_path_buf(),
                msg,
            },
            other => other,
        })
    }

    pub fn from_toml_str(raw: &str) -> DatasetResult<Self> {
        let file: PipelineConfigFile = toml::from_str(raw).map_err(|e| EmDatasetError::Config {
            path: PathBuf::new(),
            msg: e.to_string(),
        })?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: PipelineConfigFile) -> Self {
        let defaults = Self::default();
        let mut families = defaults.families;
        families.extend(file.families.unwrap_or_default());
        Self {
            base_dir: file
                .base_dir
                .map(|v| expand_path(&v))
                .unwrap_or(defaults.base_dir),
            data_ids: file.data_ids,
            class_keys: file.class_keys.unwrap_or(defaults.class_keys),
            format: file.format.unwrap_or(defaults.format),
            families,
            sampler: file.sampler.unwrap_or_default(),
        }
    }

    pub fn request(&self) -> DatasetResult<LoadRequest> {
        LoadRequest::from_names(self.data_ids.as_deref(), &self.class_keys)
    }

    pub fn sample_spec(&self) -> DatasetResult<SampleSpec> {
        SampleSpec::from_specs(&self.sampler.in_spec, &self.sampler.out_spec)
    }
}

/// Expand a leading `~` and `${VAR}` references.
pub fn expand_path(raw: &str) -> PathBuf {
    let mut out = raw.to_string();
    if let Some(stripped) = out.strip_prefix('~') {
        if let Ok(home) = std::env::var("HOME") {
            out = format!("{home}{stripped}");
        }
    }
    PathBuf::from(expand_env(&out))
}

fn expand_env(input: &str) -> String {
    let mut out = String::new();
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match std::env::var(key) {
                    Ok(val) => out.push_str(&val),
                    Err(_) => out.push_str(&format!("${{{key}}}")),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
