//! Reading and writing volume files.
//!
//! HDF5 files store the array in the `/main` dataset; `.npy` files hold a
//! single array. HDF5 support is behind the `hdf5` feature.

use crate::types::{DatasetResult, EmDatasetError, Volume};
use ndarray::ArrayD;
use ndarray_npy::ReadNpyExt;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default dataset name inside HDF5 volume files.
pub const HDF5_DATASET: &str = "main";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeFormat {
    Hdf5,
    Npy,
}

/// HDF5 when the `hdf5` feature is enabled, `.npy` otherwise.
impl Default for VolumeFormat {
    fn default() -> Self {
        if cfg!(feature = "hdf5") {
            VolumeFormat::Hdf5
        } else {
            VolumeFormat::Npy
        }
    }
}

impl VolumeFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            VolumeFormat::Hdf5 => "h5",
            VolumeFormat::Npy => "npy",
        }
    }

    pub fn file_name(&self, stem: &str) -> String {
        format!("{stem}.{}", self.extension())
    }
}

impl std::str::FromStr for VolumeFormat {
    type Err = EmDatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "h5" | "hdf5" => Ok(VolumeFormat::Hdf5),
            "npy" => Ok(VolumeFormat::Npy),
            other => Err(EmDatasetError::Other(format!("unknown volume format {other:?}"))),
        }
    }
}

/// Source of dense volumes for the loaders.
pub trait VolumeReader {
    fn format(&self) -> VolumeFormat;
    fn read(&self, path: &Path) -> DatasetResult<Volume>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NpyReader;

impl VolumeReader for NpyReader {
    fn format(&self) -> VolumeFormat {
        VolumeFormat::Npy
    }

    fn read(&self, path: &Path) -> DatasetResult<Volume> {
        let bytes = fs::read(path).map_err(|e| EmDatasetError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        decode_npy(path, &bytes)
    }
}

fn decode_npy(path: &Path, bytes: &[u8]) -> DatasetResult<Volume> {
    // Wider integer and float types are narrowed to the three voxel types.
    if let Ok(a) = ArrayD::<u8>::read_npy(bytes) {
        return Ok(Volume::U8(a));
    }
    if let Ok(a) = ArrayD::<u32>::read_npy(bytes) {
        return Ok(Volume::U32(a));
    }
    if let Ok(a) = ArrayD::<u16>::read_npy(bytes) {
        return Ok(Volume::U32(a.mapv(u32::from)));
    }
    if let Ok(a) = ArrayD::<u64>::read_npy(bytes) {
        return Ok(Volume::U32(a.mapv(|v| v as u32)));
    }
    if let Ok(a) = ArrayD::<i64>::read_npy(bytes) {
        return Ok(Volume::U32(a.mapv(|v| v as u32)));
    }
    if let Ok(a) = ArrayD::<i32>::read_npy(bytes) {
        return Ok(Volume::U32(a.mapv(|v| v as u32)));
    }
    if let Ok(a) = ArrayD::<f64>::read_npy(bytes) {
        return Ok(Volume::F32(a.mapv(|v| v as f32)));
    }
    ArrayD::<f32>::read_npy(bytes)
        .map(Volume::F32)
        .map_err(|source| EmDatasetError::Npy {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(feature = "hdf5")]
#[derive(Debug, Clone)]
pub struct Hdf5Reader {
    pub dataset: String,
}

#[cfg(feature = "hdf5")]
impl Default for Hdf5Reader {
    fn default() -> Self {
        Self {
            dataset: HDF5_DATASET.to_string(),
        }
    }
}

#[cfg(feature = "hdf5")]
impl VolumeReader for Hdf5Reader {
    fn format(&self) -> VolumeFormat {
        VolumeFormat::Hdf5
    }

    fn read(&self, path: &Path) -> DatasetResult<Volume> {
        use hdf5::types::{FloatSize, IntSize, TypeDescriptor};

        let h5err = |e: hdf5::Error| EmDatasetError::Hdf5 {
            path: path.to_path_buf(),
            msg: e.to_string(),
        };
        let file = hdf5::File::open(path).map_err(h5err)?;
        let ds = file.dataset(&self.dataset).map_err(h5err)?;
        let desc = ds.dtype().and_then(|t| t.to_descriptor()).map_err(h5err)?;
        let vol = match desc {
            TypeDescriptor::Unsigned(IntSize::U1) => Volume::U8(ds.read_dyn::<u8>().map_err(h5err)?),
            TypeDescriptor::Unsigned(IntSize::U2) => {
                Volume::U32(ds.read_dyn::<u16>().map_err(h5err)?.mapv(u32::from))
            }
            TypeDescriptor::Unsigned(IntSize::U4) => Volume::U32(ds.read_dyn::<u32>().map_err(h5err)?),
            TypeDescriptor::Unsigned(IntSize::U8) => {
                Volume::U32(ds.read_dyn::<u64>().map_err(h5err)?.mapv(|v| v as u32))
            }
            TypeDescriptor::Integer(_) => {
                Volume::U32(ds.read_dyn::<i64>().map_err(h5err)?.mapv(|v| v as u32))
            }
            TypeDescriptor::Float(FloatSize::U4) => Volume::F32(ds.read_dyn::<f32>().map_err(h5err)?),
            TypeDescriptor::Float(FloatSize::U8) => {
                Volume::F32(ds.read_dyn::<f64>().map_err(h5err)?.mapv(|v| v as f32))
            }
            other => {
                return Err(EmDatasetError::UnsupportedDtype {
                    path: path.to_path_buf(),
                    dtype: format!("{other:?}"),
                })
            }
        };
        Ok(vol)
    }
}

/// Reader for `format`, or `FormatUnavailable` when the build lacks it.
pub fn reader_for(format: VolumeFormat) -> DatasetResult<Box<dyn VolumeReader>> {
    match format {
        VolumeFormat::Npy => Ok(Box::new(NpyReader)),
        #[cfg(feature = "hdf5")]
        VolumeFormat::Hdf5 => Ok(Box::new(Hdf5Reader::default())),
        #[cfg(not(feature = "hdf5"))]
        VolumeFormat::Hdf5 => Err(EmDatasetError::FormatUnavailable("hdf5".into())),
    }
}

/// Write a volume as `.npy`, keeping its element type.
pub fn write_npy(path: &Path, volume: &Volume) -> DatasetResult<()> {
    let res = match volume {
        Volume::U8(a) => ndarray_npy::write_npy(path, a),
        Volume::U32(a) => ndarray_npy::write_npy(path, a),
        Volume::F32(a) => ndarray_npy::write_npy(path, a),
    };
    res.map_err(|source| EmDatasetError::NpyWrite {
        path: path.to_path_buf(),
        source,
    })
}
