//! Reading a region out of a store as a `[c, z, y, x]` array.

use crate::geometry::{format_path, Bbox, BoxRequest};
use crate::info::DataType;
use crate::store::VolumeStore;
use crate::{CutoutError, CutoutResult};
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CutoutOptions {
    /// Mip level to read from; the request is always in mip-0 coordinates.
    pub in_mip: usize,
    /// Substituted into `{}` placeholders of the store path.
    pub keywords: Vec<String>,
    pub request: BoxRequest,
    /// Element type of the returned array.
    pub data_type: DataType,
}

/// Cut-out voxels in the requested element type. Float-to-integer casts
/// saturate.
#[derive(Debug, Clone, PartialEq)]
pub enum CutoutData {
    U8(ArrayD<u8>),
    U32(ArrayD<u32>),
    F32(ArrayD<f32>),
}

impl CutoutData {
    fn cast(data: ArrayD<f32>, data_type: DataType) -> Self {
        match data_type {
            DataType::Uint8 => CutoutData::U8(data.mapv(|v| v as u8)),
            DataType::Uint32 => CutoutData::U32(data.mapv(|v| v as u32)),
            DataType::Float32 => CutoutData::F32(data),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            CutoutData::U8(_) => DataType::Uint8,
            CutoutData::U32(_) => DataType::Uint32,
            CutoutData::F32(_) => DataType::Float32,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            CutoutData::U8(a) => a.shape(),
            CutoutData::U32(a) => a.shape(),
            CutoutData::F32(a) => a.shape(),
        }
    }

    pub fn as_u8(&self) -> Option<&ArrayD<u8>> {
        match self {
            CutoutData::U8(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            CutoutData::F32(a) => Some(a),
            _ => None,
        }
    }

    /// Widen to `f32`, e.g. before handing the data to [`crate::ingest`].
    pub fn to_f32(&self) -> ArrayD<f32> {
        match self {
            CutoutData::U8(a) => a.mapv(f32::from),
            CutoutData::U32(a) => a.mapv(|v| v as f32),
            CutoutData::F32(a) => a.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Cutout {
    pub path: String,
    /// Resolved region in mip-0 coordinates.
    pub bbox: Bbox,
    /// The same region at the mip level that was read.
    pub mip_bbox: Bbox,
    /// `[c, z, y, x]` with singleton axes removed.
    pub data: CutoutData,
}

pub fn cutout(store: &dyn VolumeStore, path: &str, opts: &CutoutOptions) -> CutoutResult<Cutout> {
    let path = if path.contains("{}") {
        format_path(path, &opts.keywords)?
    } else {
        path.to_string()
    };
    tracing::info!(%path, mip = opts.in_mip, "cutout");

    let info = store.info(&path)?;
    let unknown_mip = |mip| CutoutError::UnknownMip {
        path: path.clone(),
        mip,
    };
    let base = info.scale(0).ok_or_else(|| unknown_mip(0))?;
    let bbox = opts.request.resolve(base.voxel_offset, base.size)?;
    let ratio = info
        .downsample_ratio(opts.in_mip)
        .ok_or_else(|| unknown_mip(opts.in_mip))?;
    let mip_bbox = bbox.downsample(ratio);
    tracing::info!(mip0 = %bbox, mip = opts.in_mip, at_mip = %mip_bbox, "resolved cutout region");

    let xyzc = store.read(&path, opts.in_mip, &mip_bbox)?;
    let czyx = xyzc.reversed_axes().as_standard_layout().into_owned().into_dyn();
    let squeezed: Vec<usize> = czyx.shape().iter().copied().filter(|&n| n != 1).collect();
    let data = CutoutData::cast(czyx.into_shape(IxDyn(&squeezed))?, opts.data_type);

    Ok(Cutout {
        path,
        bbox,
        mip_bbox,
        data,
    })
}
