//! Storage seams: chunked volume stores and downsampling task queues.

use crate::geometry::{Bbox, Vec3};
use crate::info::VolumeInfo;
use crate::{CutoutError, CutoutResult};
use ndarray::{s, Array4, ArrayView4};
use std::collections::BTreeMap;

/// A chunked volume store addressed by path, storing `[x, y, z, c]` arrays.
pub trait VolumeStore {
    fn info(&self, path: &str) -> CutoutResult<VolumeInfo>;
    /// Read `bbox` (in `mip` coordinates). Unwritten voxels read as zero.
    fn read(&self, path: &str, mip: usize, bbox: &Bbox) -> CutoutResult<Array4<f32>>;
    /// Create or replace the volume's info.
    fn create(&mut self, path: &str, info: &VolumeInfo) -> CutoutResult<()>;
    fn write(&mut self, path: &str, mip: usize, offset: Vec3, data: ArrayView4<'_, f32>) -> CutoutResult<()>;
}

/// Accepts downsampling work for a freshly written volume.
pub trait DownsampleQueue {
    fn enqueue_downsample(&mut self, path: &str, mip: usize) -> CutoutResult<()>;
}

/// In-process store; later writes win where blocks overlap.
#[derive(Debug, Default)]
pub struct MemoryStore {
    infos: BTreeMap<String, VolumeInfo>,
    blocks: BTreeMap<(String, usize), Vec<(Bbox, Array4<f32>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.infos.keys().map(String::as_str)
    }

    fn checked_info(&self, path: &str, mip: usize) -> CutoutResult<&VolumeInfo> {
        let info = self
            .infos
            .get(path)
            .ok_or_else(|| CutoutError::UnknownVolume(path.to_string()))?;
        if info.scale(mip).is_none() {
            return Err(CutoutError::UnknownMip {
                path: path.to_string(),
                mip,
            });
        }
        Ok(info)
    }
}

fn local(range: (i64, i64), origin: i64) -> std::ops::Range<usize> {
    (range.0 - origin) as usize..(range.1 - origin) as usize
}

impl VolumeStore for MemoryStore {
    fn info(&self, path: &str) -> CutoutResult<VolumeInfo> {
        self.infos
            .get(path)
            .cloned()
            .ok_or_else(|| CutoutError::UnknownVolume(path.to_string()))
    }

    fn read(&self, path: &str, mip: usize, bbox: &Bbox) -> CutoutResult<Array4<f32>> {
        let channels = self.checked_info(path, mip)?.num_channels;
        let [sx, sy, sz] = bbox.size();
        let mut out = Array4::zeros((sx as usize, sy as usize, sz as usize, channels));
        let Some(blocks) = self.blocks.get(&(path.to_string(), mip)) else {
            return Ok(out);
        };
        for (block_box, block) in blocks {
            let Some(o) = bbox.intersect(block_box) else {
                continue;
            };
            let axis = |d: usize| (o.begin[d], o.end[d]);
            let src = block.slice(s![
                local(axis(0), block_box.begin[0]),
                local(axis(1), block_box.begin[1]),
                local(axis(2), block_box.begin[2]),
                ..
            ]);
            out.slice_mut(s![
                local(axis(0), bbox.begin[0]),
                local(axis(1), bbox.begin[1]),
                local(axis(2), bbox.begin[2]),
                ..
            ])
            .assign(&src);
        }
        Ok(out)
    }

    fn create(&mut self, path: &str, info: &VolumeInfo) -> CutoutResult<()> {
        tracing::debug!(%path, "creating volume info");
        self.infos.insert(path.to_string(), info.clone());
        Ok(())
    }

    fn write(&mut self, path: &str, mip: usize, offset: Vec3, data: ArrayView4<'_, f32>) -> CutoutResult<()> {
        let channels = self.checked_info(path, mip)?.num_channels;
        let (x, y, z, c) = data.dim();
        if c != channels {
            return Err(CutoutError::Store(format!(
                "{path} has {channels} channels, got data with {c}"
            )));
        }
        let bbox = Bbox::new(offset, [offset[0] + x as i64, offset[1] + y as i64, offset[2] + z as i64])?;
        self.blocks
            .entry((path.to_string(), mip))
            .or_default()
            .push((bbox, data.to_owned()));
        Ok(())
    }
}

/// Records enqueued downsampling requests instead of running them.
#[derive(Debug, Default)]
pub struct RecordingQueue {
    pub requests: Vec<(String, usize)>,
}

impl DownsampleQueue for RecordingQueue {
    fn enqueue_downsample(&mut self, path: &str, mip: usize) -> CutoutResult<()> {
        self.requests.push((path.to_string(), mip));
        Ok(())
    }
}
