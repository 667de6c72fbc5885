//! Core types, error definitions, and volume containers for em_dataset.

use em_contracts::{Channel, ContractError, VoxelType};
use ndarray::{ArrayD, Axis, IxDyn, Slice};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, EmDatasetError>;

#[derive(Debug, Error)]
pub enum EmDatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("npy decode error at {path}: {source}")]
    Npy {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpyError,
    },
    #[error("npy encode error at {path}: {source}")]
    NpyWrite {
        path: PathBuf,
        #[source]
        source: ndarray_npy::WriteNpyError,
    },
    #[error("hdf5 error at {path}: {msg}")]
    Hdf5 { path: PathBuf, msg: String },
    #[error("unsupported voxel type at {path}: {dtype}")]
    UnsupportedDtype { path: PathBuf, dtype: String },
    #[error("volume format {0} is not enabled in this build")]
    FormatUnavailable(String),
    #[error("at least one class key is required")]
    NoClassKeys,
    #[error("dataset {tag} not found at {path}")]
    MissingDataset { tag: String, path: PathBuf },
    #[error("dataset {tag}: required {channel} volume missing at {path}")]
    MissingFile {
        tag: String,
        channel: Channel,
        path: PathBuf,
    },
    #[error("dataset {tag}: no {mode_mask} or msk volume")]
    MissingMask { tag: String, mode_mask: Channel },
    #[error("dataset {tag}: missing {channel} volume")]
    MissingChannel { tag: String, channel: Channel },
    #[error("dataset {tag}: stream {stream} is not registered")]
    MissingStream { tag: String, stream: String },
    #[error("invalid sample spec for {stream}: {msg}")]
    InvalidSpec { stream: String, msg: String },
    #[error("invalid sampling weights: {0}")]
    InvalidWeights(String),
    #[error("dataset {tag}: {stream} patch {extent:?} exceeds volume {volume:?}")]
    PatchTooLarge {
        tag: String,
        stream: String,
        extent: [usize; 3],
        volume: Vec<usize>,
    },
    #[error("dataset {tag}: {msg}")]
    InvalidBundle { tag: String, msg: String },
    #[error("no datasets to sample from")]
    EmptyCollection,
    #[error("config error at {path}: {msg}")]
    Config { path: PathBuf, msg: String },
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error("invariant violated: {0}")]
    Invariant(String),
    #[error("{0}")]
    Other(String),
}

/// Dense 3-D or channel-first 4-D voxel array.
#[derive(Debug, Clone, PartialEq)]
pub enum Volume {
    U8(ArrayD<u8>),
    U32(ArrayD<u32>),
    F32(ArrayD<f32>),
}

macro_rules! each_array {
    ($vol:expr, $a:ident => $body:expr) => {
        match $vol {
            Volume::U8($a) => $body,
            Volume::U32($a) => $body,
            Volume::F32($a) => $body,
        }
    };
}

impl Volume {
    pub fn zeros(voxel_type: VoxelType, shape: &[usize]) -> Self {
        let dim = IxDyn(shape);
        match voxel_type {
            VoxelType::U8 => Volume::U8(ArrayD::zeros(dim)),
            VoxelType::U32 => Volume::U32(ArrayD::zeros(dim)),
            VoxelType::F32 => Volume::F32(ArrayD::zeros(dim)),
        }
    }

    pub fn voxel_type(&self) -> VoxelType {
        match self {
            Volume::U8(_) => VoxelType::U8,
            Volume::U32(_) => VoxelType::U32,
            Volume::F32(_) => VoxelType::F32,
        }
    }

    pub fn shape(&self) -> &[usize] {
        each_array!(self, a => a.shape())
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Extent of the last three axes, `None` for arrays with fewer than three.
    pub fn spatial_shape(&self) -> Option<[usize; 3]> {
        let s = self.shape();
        let n = s.len();
        (n >= 3).then(|| [s[n - 3], s[n - 2], s[n - 1]])
    }

    /// Numeric cast with `as` semantics (float to int saturates).
    pub fn cast(self, to: VoxelType) -> Self {
        if self.voxel_type() == to {
            return self;
        }
        match to {
            VoxelType::U8 => Volume::U8(each_array!(self, a => a.mapv(|v| v as u8))),
            VoxelType::U32 => Volume::U32(each_array!(self, a => a.mapv(|v| v as u32))),
            VoxelType::F32 => Volume::F32(each_array!(self, a => a.mapv(|v| v as f32))),
        }
    }

    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            Volume::F32(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<&ArrayD<u8>> {
        match self {
            Volume::U8(a) => Some(a),
            _ => None,
        }
    }

    /// Voxel value at a spatial index, reading the first channel of 4-D arrays.
    pub fn value_at(&self, zyx: [usize; 3]) -> f32 {
        let lead = self.ndim().saturating_sub(3);
        let mut idx = vec![0usize; lead];
        idx.extend_from_slice(&zyx);
        each_array!(self, a => a.get(IxDyn(&idx)).map(|v| *v as f32).unwrap_or(0.0))
    }

    /// Crop the last three axes to `start..start + size` and return a
    /// channel-first `f32` array (`[c, z, y, x]`).
    pub fn crop_f32(&self, start: [usize; 3], size: [usize; 3]) -> ArrayD<f32> {
        let lead = self.ndim().saturating_sub(3);
        let window = |i: usize| {
            if i < lead {
                Slice::from(..)
            } else {
                let d = i - lead;
                Slice::from(start[d]..start[d] + size[d])
            }
        };
        let patch = each_array!(self, a => a
            .slice_each_axis(|ax| window(ax.axis.index()))
            .mapv(|v| v as f32));
        if lead == 0 {
            patch.insert_axis(Axis(0))
        } else {
            patch
        }
    }
}

/// Co-registered volumes for one imaged region, keyed by channel.
#[derive(Debug, Clone, Default)]
pub struct VolumeBundle {
    volumes: BTreeMap<Channel, Arc<Volume>>,
    /// Location flag attached to the training mask.
    pub loc: bool,
}

impl VolumeBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, channel: Channel, volume: Volume) {
        self.volumes.insert(channel, Arc::new(volume));
    }

    pub fn get(&self, channel: Channel) -> Option<&Arc<Volume>> {
        self.volumes.get(&channel)
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.volumes.contains_key(&channel)
    }

    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.volumes.keys().copied()
    }

    pub fn has_mask(&self) -> bool {
        [Channel::Msk, Channel::MskTrain, Channel::MskVal]
            .iter()
            .any(|c| self.contains(*c))
    }

    /// Check the bundle invariants: normalized image present, some mask
    /// present, and every array sharing the image's spatial extent.
    pub fn validate(&self, tag: &str) -> DatasetResult<()> {
        let invalid = |msg: String| EmDatasetError::InvalidBundle {
            tag: tag.to_string(),
            msg,
        };
        let img = self.get(Channel::Img).ok_or_else(|| EmDatasetError::MissingChannel {
            tag: tag.to_string(),
            channel: Channel::Img,
        })?;
        if let Some(a) = img.as_f32() {
            if a.iter().any(|v| !(0.0..=1.0).contains(v)) {
                return Err(invalid("img values outside [0, 1]".into()));
            }
        } else {
            return Err(invalid(format!("img must be float32, got {}", img.voxel_type().as_str())));
        }
        if !self.has_mask() {
            return Err(EmDatasetError::MissingChannel {
                tag: tag.to_string(),
                channel: Channel::Msk,
            });
        }
        let extent = img
            .spatial_shape()
            .ok_or_else(|| invalid(format!("img has rank {}", img.ndim())))?;
        for (channel, vol) in &self.volumes {
            if vol.ndim() > 4 {
                return Err(invalid(format!("{channel} has rank {}", vol.ndim())));
            }
            if vol.spatial_shape() != Some(extent) {
                return Err(invalid(format!(
                    "{channel} shape {:?} does not match img extent {:?}",
                    vol.shape(),
                    extent
                )));
            }
        }
        Ok(())
    }
}

/// Dataset tag -> bundle. Merging with `extend` keeps the last writer.
pub type DatasetCollection = BTreeMap<String, VolumeBundle>;

/// Training or evaluation; selects which mode-specific mask is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplerMode {
    #[default]
    Train,
    Eval,
}

impl SamplerMode {
    pub fn is_train(&self) -> bool {
        matches!(self, SamplerMode::Train)
    }

    pub fn mask_channel(&self) -> Channel {
        match self {
            SamplerMode::Train => Channel::MskTrain,
            SamplerMode::Eval => Channel::MskVal,
        }
    }
}

/// Stream name -> `[c, z, y, x]` patch.
pub type StreamMap = BTreeMap<String, ArrayD<f32>>;

/// One drawn training example.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Tag of the dataset the patch came from.
    pub tag: String,
    pub streams: StreamMap,
}

impl Sample {
    pub fn get(&self, stream: &str) -> Option<&ArrayD<f32>> {
        self.streams.get(stream)
    }

    pub fn stream_names(&self) -> impl Iterator<Item = &str> {
        self.streams.keys().map(String::as_str)
    }
}
