//! Writing a `[c, z, y, x]` array back to a store as a new image layer.

use crate::geometry::{format_path, Bbox, BoxRequest, Vec3};
use crate::info::{DataType, VolumeInfo};
use crate::store::{DownsampleQueue, VolumeStore};
use crate::{CutoutError, CutoutResult};
use ndarray::{ArrayViewD, Ix4, IxDyn};

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Destination path; `{}` placeholders take `keywords`, or a coordinate
    /// string derived from `request` when no keywords are given.
    pub output_path: String,
    pub keywords: Vec<String>,
    pub request: BoxRequest,
    /// Mip-0 region the data was cut from.
    pub region: Bbox,
    /// Voxel offset of the written layer; defaults to `region.begin`.
    pub offset: Option<Vec3>,
    /// Set when `region` was read from a store at `in_mip`.
    pub from_store: bool,
    pub in_mip: u32,
    /// Model input and output patch sizes, `[z, y, x]`.
    pub input_size: Vec3,
    pub output_size: Vec3,
    pub resolution: [u32; 3],
    pub chunk_size: [u32; 3],
    pub data_type: DataType,
    pub tag: Option<String>,
    pub downsample: bool,
}

impl IngestOptions {
    pub fn new(output_path: impl Into<String>, region: Bbox) -> Self {
        Self {
            output_path: output_path.into(),
            keywords: Vec::new(),
            request: BoxRequest::default(),
            region,
            offset: None,
            from_store: false,
            in_mip: 0,
            input_size: [0; 3],
            output_size: [0; 3],
            resolution: [4, 4, 40],
            chunk_size: [64, 64, 64],
            data_type: DataType::default(),
            tag: None,
            downsample: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestPlan {
    pub path: String,
    pub offset: Vec3,
    pub info: VolumeInfo,
}

/// `[c, z, y, x]` from a 3- or 4-axis shape.
fn czyx(shape: &[usize]) -> CutoutResult<[usize; 4]> {
    match *shape {
        [z, y, x] => Ok([1, z, y, x]),
        [c, z, y, x] => Ok([c, z, y, x]),
        _ => Err(CutoutError::DataRank(shape.to_vec())),
    }
}

pub fn plan_ingest(data_shape: &[usize], opts: &IngestOptions) -> CutoutResult<IngestPlan> {
    let [c, z, y, x] = czyx(data_shape)?;

    let mut offset = opts.offset.unwrap_or(opts.region.begin);
    // The region is in mip-0 coordinates; the data is at `in_mip` in x/y.
    if opts.from_store && opts.in_mip > 0 {
        let p = 2i64.pow(opts.in_mip);
        offset = [offset[0].div_euclid(p), offset[1].div_euclid(p), offset[2]];
    }
    // Outputs smaller than the model input sit centred inside it.
    for d in 0..3 {
        offset[d] += (opts.input_size[2 - d] - opts.output_size[2 - d]) / 2;
    }

    let info = VolumeInfo::image(
        c,
        opts.data_type,
        opts.resolution,
        offset,
        [x as i64, y as i64, z as i64],
        opts.chunk_size,
    );

    let mut path = opts.output_path.clone();
    if path.contains("{}") {
        path = if opts.keywords.is_empty() {
            format_path(&path, &[opts.request.coord_string(&opts.region)])?
        } else {
            format_path(&path, &opts.keywords)?
        };
    }
    if let Some(tag) = &opts.tag {
        if !path.ends_with('/') {
            path.push('/');
        }
        path.push_str(tag);
    }
    tracing::info!(%path, ?offset, size = ?[x, y, z], channels = c, "planned ingest");
    Ok(IngestPlan { path, offset, info })
}

/// Plan, create the layer, write `data` at mip 0, and optionally queue downsampling.
pub fn ingest(
    store: &mut dyn VolumeStore,
    queue: Option<&mut dyn DownsampleQueue>,
    data: ArrayViewD<'_, f32>,
    opts: &IngestOptions,
) -> CutoutResult<IngestPlan> {
    if opts.downsample && queue.is_none() {
        return Err(CutoutError::NoQueue);
    }
    let plan = plan_ingest(data.shape(), opts)?;
    let shape = czyx(data.shape())?;
    let block = data
        .as_standard_layout()
        .into_owned()
        .into_shape(IxDyn(&shape))?
        .into_dimensionality::<Ix4>()?;
    let xyzc = block.reversed_axes();

    store.create(&plan.path, &plan.info)?;
    store.write(&plan.path, 0, plan.offset, xyzc.view())?;

    if opts.downsample {
        if let Some(queue) = queue {
            queue.enqueue_downsample(&plan.path, 0)?;
        }
    }
    Ok(plan)
}
