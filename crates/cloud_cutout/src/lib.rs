//! Cutout and ingest planning against chunked volume stores.
//!
//! Stores speak `[x, y, z, c]`; everything handed to or returned from this
//! crate's public functions is `[c, z, y, x]`, matching the sampler output.

pub mod cutout;
pub mod geometry;
pub mod info;
pub mod ingest;
pub mod store;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CutoutError {
    #[error("a centre needs a size")]
    CentreWithoutSize,
    #[error("empty box: begin {begin:?}, end {end:?}")]
    EmptyBox { begin: [i64; 3], end: [i64; 3] },
    #[error("template {template} has more placeholders than the {given} keywords given")]
    MissingKeyword { template: String, given: usize },
    #[error("no mip {mip} in {path}")]
    UnknownMip { path: String, mip: usize },
    #[error("no volume at {0}")]
    UnknownVolume(String),
    #[error("volume data must have 3 or 4 axes, got {0:?}")]
    DataRank(Vec<usize>),
    #[error("downsampling requested without a task queue")]
    NoQueue,
    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("info serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store error: {0}")]
    Store(String),
}

pub type CutoutResult<T> = std::result::Result<T, CutoutError>;

pub use cutout::{cutout, Cutout, CutoutData, CutoutOptions};
pub use geometry::{format_path, Bbox, BoxRequest, Vec3};
pub use info::{DataType, Scale, VolumeInfo};
pub use ingest::{ingest, plan_ingest, IngestOptions, IngestPlan};
pub use store::{DownsampleQueue, MemoryStore, RecordingQueue, VolumeStore};
