//! Sampler behaviour over small in-memory and on-disk collections.

use em_contracts::{Channel, ClassKey, VoxelType};
use em_dataset::{
    load_family, write_npy, AugmentPipeline, DatasetCollection, DatasetFamily, EmDatasetError,
    FlipAugment, LoadRequest, NpyReader, RecordingObserver, SampleSpec, Sampler, SamplerConfig,
    SamplerMode, StreamSpec, Volume, VolumeBundle,
};
use ndarray::{ArrayD, IxDyn};
use std::collections::BTreeMap;
use std::fs;

fn bundle(shape: [usize; 3], fill: f32) -> VolumeBundle {
    let mut b = VolumeBundle::new();
    b.insert(Channel::Img, Volume::F32(ArrayD::from_elem(IxDyn(&shape), fill)));
    b.insert(Channel::Msk, Volume::U8(ArrayD::from_elem(IxDyn(&shape), 1)));
    b.insert(Channel::Mit, Volume::zeros(VoxelType::U8, &shape));
    b
}

fn spec(input: &[usize], output: Option<&[usize]>) -> SampleSpec {
    let i: StreamSpec = [("input".to_string(), input.to_vec())].into();
    let o: StreamSpec = output
        .map(|dims| [("mitochondria".to_string(), dims.to_vec())].into())
        .unwrap_or_default();
    SampleSpec::from_specs(&i, &o).expect("valid spec")
}

#[test]
fn weighted_draws_follow_weights() -> anyhow::Result<()> {
    let data: DatasetCollection = [
        ("A".to_string(), bundle([4, 8, 8], 0.25)),
        ("B".to_string(), bundle([4, 8, 8], 0.75)),
    ]
    .into();
    let mut sampler = Sampler::new(
        &data,
        spec(&[1, 2, 4, 4], Some(&[1, 2, 4, 4])),
        SamplerConfig {
            weights: Some([("A".to_string(), 3.0), ("B".to_string(), 1.0)].into()),
            seed: Some(20240611),
            ..Default::default()
        },
    )?;
    assert_eq!(sampler.tags(), vec!["A", "B"]);
    assert_eq!(sampler.probabilities(), &[0.75, 0.25]);

    let draws = 20_000;
    let mut from_a = 0usize;
    for _ in 0..draws {
        let sample = sampler.sample()?;
        if sample.tag == "A" {
            from_a += 1;
            // The image stream must come from the dataset that was picked.
            assert_eq!(sample.get("input").unwrap()[[0, 0, 0, 0]], 0.25);
        }
    }
    let frac = from_a as f64 / draws as f64;
    assert!((frac - 0.75).abs() < 0.03, "fraction from A was {frac}");
    Ok(())
}

#[test]
fn samples_carry_exactly_the_spec_streams() -> anyhow::Result<()> {
    let data: DatasetCollection = [("A".to_string(), bundle([6, 10, 12], 0.5))].into();
    let spec = spec(&[1, 4, 8, 8], Some(&[3, 2, 6, 6]));
    let mut sampler = Sampler::new(&data, spec.clone(), SamplerConfig::default())?;
    for _ in 0..20 {
        let sample = sampler.sample()?;
        let names: Vec<&str> = sample.stream_names().collect();
        assert_eq!(names, spec.names().collect::<Vec<_>>());
        assert_eq!(sample.get("input").unwrap().shape(), &[1, 4, 8, 8]);
        assert_eq!(sample.get("mitochondria").unwrap().shape(), &[1, 2, 6, 6]);
        assert_eq!(sample.get("mitochondria_mask").unwrap().shape(), &[1, 2, 6, 6]);
        assert!(sample.get("mitochondria_mask").unwrap().iter().all(|v| *v == 1.0));
    }
    Ok(())
}

#[test]
fn missing_target_stream_is_an_invariant_error() -> anyhow::Result<()> {
    let data: DatasetCollection = [("A".to_string(), bundle([4, 4, 4], 0.5))].into();
    let mut sampler = Sampler::new(&data, spec(&[2, 2, 2], None), SamplerConfig::default())?;
    assert!(matches!(sampler.sample(), Err(EmDatasetError::Invariant(_))));
    Ok(())
}

#[test]
fn eval_mode_prefers_validation_mask() -> anyhow::Result<()> {
    let mut b = bundle([4, 4, 4], 0.5);
    b.insert(Channel::MskVal, Volume::zeros(VoxelType::U8, &[4, 4, 4]));
    let data: DatasetCollection = [("A".to_string(), b)].into();
    let mut sampler = Sampler::new(
        &data,
        spec(&[2, 2, 2], Some(&[2, 2, 2])),
        SamplerConfig {
            mode: SamplerMode::Eval,
            seed: Some(3),
            ..Default::default()
        },
    )?;
    let sample = sampler.sample()?;
    assert!(sample.get("mitochondria_mask").unwrap().iter().all(|v| *v == 0.0));
    Ok(())
}

#[test]
fn seeded_samplers_are_reproducible() -> anyhow::Result<()> {
    let ramp = ArrayD::from_shape_fn(IxDyn(&[8, 8, 8]), |i| (i[0] * 64 + i[1] * 8 + i[2]) as f32 / 512.0);
    let mut b = bundle([8, 8, 8], 0.0);
    b.insert(Channel::Img, Volume::F32(ramp));
    let data: DatasetCollection = [("A".to_string(), b)].into();
    let draw = || -> anyhow::Result<Vec<f32>> {
        let mut sampler = Sampler::new(
            &data,
            spec(&[2, 2, 2], Some(&[2, 2, 2])),
            SamplerConfig {
                seed: Some(77),
                ..Default::default()
            },
        )?;
        let mut firsts = Vec::new();
        for _ in 0..10 {
            firsts.push(sampler.sample()?.get("input").unwrap()[[0, 0, 0, 0]]);
        }
        Ok(firsts)
    };
    assert_eq!(draw()?, draw()?);
    Ok(())
}

#[test]
fn load_then_sample_with_augmentation() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let basil = DatasetFamily::basil();
    let mut weights = BTreeMap::new();
    for (i, tag) in ["basil003", "basil004"].into_iter().enumerate() {
        let dir = basil.dataset_dir(tmp.path(), tag);
        fs::create_dir_all(&dir)?;
        let shape = [4, 16, 16];
        write_npy(
            &dir.join("img.npy"),
            &Volume::U8(ArrayD::from_elem(IxDyn(&shape), 51 * (i as u8 + 1))),
        )?;
        write_npy(&dir.join("msk.npy"), &Volume::U8(ArrayD::from_elem(IxDyn(&shape), 1)))?;
        write_npy(&dir.join("mit.npy"), &Volume::U8(ArrayD::from_elem(IxDyn(&shape), 1)))?;
        weights.insert(tag.to_string(), 1.0);
    }
    let request = LoadRequest::new(
        Some(vec!["basil_superset".into()]),
        [ClassKey::Mit].into(),
    );
    let data = load_family(&basil, tmp.path(), &request, &NpyReader, &RecordingObserver::new())?;
    assert_eq!(data.len(), 2);

    let augment = AugmentPipeline::builder().flip(FlipAugment::default()).build();
    let mut sampler = Sampler::new(
        &data,
        spec(&[1, 2, 8, 8], Some(&[1, 2, 8, 8])),
        SamplerConfig {
            augment: Some(Box::new(augment)),
            weights: Some(weights),
            seed: Some(5),
            ..Default::default()
        },
    )?;
    for _ in 0..50 {
        let sample = sampler.sample()?;
        let expected = if sample.tag == "basil003" { 0.2 } else { 0.4 };
        let input = sample.get("input").unwrap();
        assert!(input.is_standard_layout());
        assert!(input.iter().all(|v| (v - expected).abs() < 1e-6));
        assert!(sample.get("mitochondria").unwrap().iter().all(|v| *v == 1.0));
    }
    Ok(())
}
