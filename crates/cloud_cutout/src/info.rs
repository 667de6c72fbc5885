//! Neuroglancer precomputed `info` documents.

use crate::geometry::Vec3;
use crate::CutoutResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    Uint8,
    Uint32,
    Float32,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Uint8 => "uint8",
            DataType::Uint32 => "uint32",
            DataType::Float32 => "float32",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    pub key: String,
    pub encoding: String,
    pub resolution: [u32; 3],
    pub voxel_offset: Vec3,
    pub size: Vec3,
    pub chunk_sizes: Vec<[u32; 3]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub num_channels: usize,
    #[serde(rename = "type")]
    pub layer_type: String,
    pub data_type: DataType,
    pub scales: Vec<Scale>,
}

impl VolumeInfo {
    /// Single-scale raw image layer.
    pub fn image(
        num_channels: usize,
        data_type: DataType,
        resolution: [u32; 3],
        voxel_offset: Vec3,
        size: Vec3,
        chunk_size: [u32; 3],
    ) -> Self {
        Self {
            num_channels,
            layer_type: "image".into(),
            data_type,
            scales: vec![Scale {
                key: resolution.map(|r| r.to_string()).join("_"),
                encoding: "raw".into(),
                resolution,
                voxel_offset,
                size,
                chunk_sizes: vec![chunk_size],
            }],
        }
    }

    pub fn scale(&self, mip: usize) -> Option<&Scale> {
        self.scales.get(mip)
    }

    /// Per-axis shrink from mip 0 to `mip`.
    pub fn downsample_ratio(&self, mip: usize) -> Option<Vec3> {
        let base = self.scales.first()?;
        let scale = self.scales.get(mip)?;
        Some([0, 1, 2].map(|d| i64::from(scale.resolution[d] / base.resolution[d].max(1)).max(1)))
    }

    pub fn to_json(&self) -> CutoutResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(s: &str) -> CutoutResult<Self> {
        Ok(serde_json::from_str(s)?)
    }
}
