//! Ingest a prediction next to its source, then cut it back out.

use cloud_cutout::{
    cutout, ingest, BoxRequest, CutoutError, CutoutOptions, DataType, IngestOptions, MemoryStore,
    RecordingQueue, VolumeInfo, VolumeStore,
};
use ndarray::{Array, IxDyn};

#[test]
fn ingested_patch_reads_back_in_czyx() -> anyhow::Result<()> {
    let mut store = MemoryStore::new();
    let src_info = VolumeInfo::image(1, DataType::Uint8, [4, 4, 40], [0, 0, 0], [64, 64, 8], [64, 64, 8]);
    store.create("mem://basil/img", &src_info)?;

    let src = cutout(
        &store,
        "mem://basil/img",
        &CutoutOptions {
            request: BoxRequest::centered([32, 32, 4], [16, 16, 4]),
            ..Default::default()
        },
    )?;
    assert_eq!(src.data.shape(), &[4, 16, 16]);

    // Two-channel prediction over the same region, [c, z, y, x].
    let pred = Array::from_shape_fn(IxDyn(&[2, 4, 16, 16]), |i| (i[0] * 1000 + i[1] * 100 + i[2] * 10 + i[3]) as f32);
    let mut opts = IngestOptions::new("mem://basil/pred/{}", src.bbox);
    opts.request = BoxRequest::centered([32, 32, 4], [16, 16, 4]);
    opts.data_type = DataType::Float32;
    opts.tag = Some("mit".into());
    opts.downsample = true;

    let mut queue = RecordingQueue::default();
    let plan = ingest(&mut store, Some(&mut queue), pred.view(), &opts)?;
    assert_eq!(plan.path, "mem://basil/pred/x32_y32_z4_s16-16-4/mit");
    assert_eq!(plan.offset, [24, 24, 2]);
    assert_eq!(queue.requests, vec![(plan.path.clone(), 0)]);
    assert_eq!(store.info(&plan.path)?.scales[0].size, [16, 16, 4]);

    let back = cutout(
        &store,
        &plan.path,
        &CutoutOptions {
            data_type: DataType::Float32,
            ..Default::default()
        },
    )?;
    assert_eq!(back.data.shape(), pred.shape());
    assert_eq!(back.data.as_f32(), Some(&pred));

    // The default uint8 cut of the same prediction clamps at 255.
    let clamped = cutout(&store, &plan.path, &CutoutOptions::default())?;
    assert_eq!(clamped.data.to_f32(), pred.mapv(|v| v.min(255.0)));
    Ok(())
}

#[test]
fn downsampling_needs_a_queue() {
    let mut store = MemoryStore::new();
    let region = cloud_cutout::Bbox::new([0; 3], [2, 2, 2]).unwrap();
    let mut opts = IngestOptions::new("mem://out", region);
    opts.downsample = true;
    let data = Array::<f32, _>::zeros(IxDyn(&[2, 2, 2]));
    let err = ingest(&mut store, None, data.view(), &opts).unwrap_err();
    assert!(matches!(err, CutoutError::NoQueue));
    assert_eq!(store.paths().count(), 0);
}
