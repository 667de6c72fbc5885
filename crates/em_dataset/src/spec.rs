//! Sampling windows per stream.

use crate::types::{DatasetResult, EmDatasetError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use em_contracts::StreamSpec;

/// Stream name -> `[z, y, x]` window drawn for that stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSpec {
    streams: BTreeMap<String, [usize; 3]>,
}

impl SampleSpec {
    /// Keep the last three axes of every entry and pair each output stream
    /// with a `<name>_mask` stream of the same extent.
    pub fn from_specs(in_spec: &StreamSpec, out_spec: &StreamSpec) -> DatasetResult<Self> {
        let mut streams = BTreeMap::new();
        for (name, dims) in in_spec {
            streams.insert(name.clone(), spatial(name, dims)?);
        }
        for (name, dims) in out_spec {
            let extent = spatial(name, dims)?;
            streams.insert(name.clone(), extent);
            streams.insert(mask_name(name), extent);
        }
        Ok(Self { streams })
    }

    pub fn get(&self, stream: &str) -> Option<[usize; 3]> {
        self.streams.get(stream).copied()
    }

    pub fn contains(&self, stream: &str) -> bool {
        self.streams.contains_key(stream)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, [usize; 3])> {
        self.streams.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.streams.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

pub fn mask_name(stream: &str) -> String {
    format!("{stream}_mask")
}

fn spatial(name: &str, dims: &[usize]) -> DatasetResult<[usize; 3]> {
    let n = dims.len();
    if n < 3 {
        return Err(EmDatasetError::InvalidSpec {
            stream: name.to_string(),
            msg: format!("needs at least 3 axes, got {dims:?}"),
        });
    }
    let extent = [dims[n - 3], dims[n - 2], dims[n - 1]];
    if extent.contains(&0) {
        return Err(EmDatasetError::InvalidSpec {
            stream: name.to_string(),
            msg: format!("zero-sized window {extent:?}"),
        });
    }
    Ok(extent)
}
