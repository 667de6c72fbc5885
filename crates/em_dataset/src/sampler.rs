//! Weighted random patch sampler over a dataset collection.

use crate::aug::Augment;
use crate::builder::{build_dataset, SampleDataset, TargetStream, INPUT_STREAM};
use crate::spec::SampleSpec;
use crate::types::{
    DatasetCollection, DatasetResult, EmDatasetError, Sample, SamplerMode, StreamMap,
};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

/// Tag -> relative draw weight.
pub type SamplingWeights = BTreeMap<String, f64>;

/// Centre draws tried against a location mask before falling back to uniform.
pub(crate) const LOC_ATTEMPTS: usize = 256;

#[derive(Debug, Default)]
pub struct SamplerConfig {
    pub mode: SamplerMode,
    pub target: TargetStream,
    pub augment: Option<Box<dyn Augment>>,
    /// `None` draws uniformly across tags.
    pub weights: Option<SamplingWeights>,
    /// Seed for reproducible draws; `None` seeds from the thread RNG.
    pub seed: Option<u64>,
}

#[derive(Debug)]
enum TagPicker {
    Uniform(usize),
    Weighted(WeightedIndex<f64>),
}

/// A dataset and the inclusive range of valid patch centres per axis.
#[derive(Debug)]
struct Window {
    dataset: SampleDataset,
    centres: [(usize, usize); 3],
}

#[derive(Debug)]
pub struct Sampler {
    windows: Vec<Window>,
    spec: SampleSpec,
    picker: TagPicker,
    probabilities: Vec<f64>,
    augment: Option<Box<dyn Augment>>,
    imgs: Vec<String>,
    segs: Vec<String>,
    target: TargetStream,
    mode: SamplerMode,
    rng: StdRng,
}

impl Sampler {
    pub fn new(data: &DatasetCollection, spec: SampleSpec, cfg: SamplerConfig) -> DatasetResult<Self> {
        if data.is_empty() {
            return Err(EmDatasetError::EmptyCollection);
        }
        if spec.is_empty() {
            return Err(EmDatasetError::InvalidSpec {
                stream: String::new(),
                msg: "no streams".into(),
            });
        }

        if cfg.augment.is_some() {
            check_shared_midpoints(&spec)?;
        }

        let mut windows = Vec::with_capacity(data.len());
        for (tag, bundle) in data {
            let dataset = build_dataset(tag, bundle, cfg.mode, &cfg.target)?;
            let centres = centre_range(&dataset, &spec)?;
            windows.push(Window { dataset, centres });
        }

        let (picker, probabilities) = match &cfg.weights {
            Some(weights) => {
                let ordered = ordered_weights(data, weights)?;
                let total: f64 = ordered.iter().sum();
                let index = WeightedIndex::new(&ordered)
                    .map_err(|e| EmDatasetError::InvalidWeights(e.to_string()))?;
                let probs = ordered.iter().map(|w| w / total).collect();
                (TagPicker::Weighted(index), probs)
            }
            None => {
                let n = windows.len();
                (TagPicker::Uniform(n), vec![1.0 / n as f64; n])
            }
        };

        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };

        let sampler = Self {
            windows,
            spec,
            picker,
            probabilities,
            augment: cfg.augment,
            imgs: vec![INPUT_STREAM.to_string()],
            segs: Vec::new(),
            target: cfg.target,
            mode: cfg.mode,
            rng,
        };
        tracing::info!("{}", sampler.describe());
        Ok(sampler)
    }

    /// Draw one patch from a weighted-random dataset, augment it, and return
    /// every spec stream as a `[c, z, y, x]` `f32` array.
    pub fn sample(&mut self) -> DatasetResult<Sample> {
        let idx = match &self.picker {
            TagPicker::Uniform(n) => self.rng.random_range(0..*n),
            TagPicker::Weighted(index) => index.sample(&mut self.rng),
        };
        let window = &self.windows[idx];
        let centre = pick_centre(window, &mut self.rng);

        let mut streams = StreamMap::new();
        for (name, extent) in self.spec.iter() {
            let stream = window
                .dataset
                .stream(name)
                .ok_or_else(|| EmDatasetError::MissingStream {
                    tag: window.dataset.tag.clone(),
                    stream: name.to_string(),
                })?;
            let start = [
                centre[0] - extent[0] / 2,
                centre[1] - extent[1] / 2,
                centre[2] - extent[2] / 2,
            ];
            streams.insert(name.to_string(), stream.volume.crop_f32(start, extent));
        }

        if let Some(augment) = &self.augment {
            augment.apply(&mut streams, &self.imgs, &mut self.rng);
        }

        if !streams.contains_key(&self.target.stream) {
            return Err(EmDatasetError::Invariant(format!(
                "sample from {} has no {} stream",
                window.dataset.tag, self.target.stream
            )));
        }

        for patch in streams.values_mut() {
            if !patch.is_standard_layout() {
                *patch = patch.as_standard_layout().into_owned();
            }
        }

        Ok(Sample {
            tag: window.dataset.tag.clone(),
            streams,
        })
    }

    /// Dataset tags in draw-index order.
    pub fn tags(&self) -> Vec<&str> {
        self.windows.iter().map(|w| w.dataset.tag.as_str()).collect()
    }

    /// Normalized draw probability per tag, aligned with [`Sampler::tags`].
    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    pub fn spec(&self) -> &SampleSpec {
        &self.spec
    }

    pub fn image_streams(&self) -> &[String] {
        &self.imgs
    }

    pub fn label_streams(&self) -> &[String] {
        &self.segs
    }

    pub fn describe(&self) -> String {
        let datasets = self
            .tags()
            .into_iter()
            .zip(&self.probabilities)
            .map(|(tag, p)| format!("{tag}(p={p:.3})"))
            .collect::<Vec<_>>()
            .join(", ");
        let streams = self
            .spec
            .iter()
            .map(|(name, e)| format!("{name}{e:?}"))
            .collect::<Vec<_>>()
            .join(", ");
        let augment = self
            .augment
            .as_ref()
            .map(|a| format!("{a:?}"))
            .unwrap_or_else(|| "none".to_string());
        format!(
            "Sampler mode={:?} datasets=[{datasets}] streams=[{streams}] imgs={:?} segs={:?} augment={augment}",
            self.mode, self.imgs, self.segs
        )
    }
}

fn ordered_weights(data: &DatasetCollection, weights: &SamplingWeights) -> DatasetResult<Vec<f64>> {
    data.keys()
        .map(|tag| {
            let w = weights
                .get(tag)
                .copied()
                .ok_or_else(|| EmDatasetError::InvalidWeights(format!("no weight for {tag}")))?;
            if !w.is_finite() || w < 0.0 {
                return Err(EmDatasetError::InvalidWeights(format!("{tag} has weight {w}")));
            }
            Ok(w)
        })
        .collect()
}

/// Windows are cut as `centre - e/2 .. centre - e/2 + e`, so streams only
/// share a midpoint (and flip onto each other) when extents agree in parity.
fn check_shared_midpoints(spec: &SampleSpec) -> DatasetResult<()> {
    let mut streams = spec.iter();
    let Some((first, reference)) = streams.next() else {
        return Ok(());
    };
    for (name, extent) in streams {
        if (0..3).any(|d| extent[d] % 2 != reference[d] % 2) {
            return Err(EmDatasetError::InvalidSpec {
                stream: name.to_string(),
                msg: format!(
                    "extent {extent:?} and {first} {reference:?} differ in parity; augmented patches would misalign"
                ),
            });
        }
    }
    Ok(())
}

fn centre_range(dataset: &SampleDataset, spec: &SampleSpec) -> DatasetResult<[(usize, usize); 3]> {
    let mut range = [(0usize, usize::MAX); 3];
    for (name, extent) in spec.iter() {
        let stream = dataset.stream(name).ok_or_else(|| EmDatasetError::MissingStream {
            tag: dataset.tag.clone(),
            stream: name.to_string(),
        })?;
        let too_large = || EmDatasetError::PatchTooLarge {
            tag: dataset.tag.clone(),
            stream: name.to_string(),
            extent,
            volume: stream.volume.shape().to_vec(),
        };
        let vol = stream.volume.spatial_shape().ok_or_else(too_large)?;
        for d in 0..3 {
            if extent[d] > vol[d] {
                return Err(too_large());
            }
            let lo = extent[d] / 2;
            let hi = vol[d] - extent[d] + extent[d] / 2;
            range[d] = (range[d].0.max(lo), range[d].1.min(hi));
        }
    }
    if range.iter().any(|(lo, hi)| lo > hi) {
        return Err(EmDatasetError::InvalidBundle {
            tag: dataset.tag.clone(),
            msg: "no patch centre fits every stream window".into(),
        });
    }
    Ok(range)
}

fn draw_centre(ranges: &[(usize, usize); 3], rng: &mut StdRng) -> [usize; 3] {
    let mut centre = [0usize; 3];
    for (c, (lo, hi)) in centre.iter_mut().zip(ranges) {
        *c = rng.random_range(*lo..=*hi);
    }
    centre
}

fn pick_centre(window: &Window, rng: &mut StdRng) -> [usize; 3] {
    if let Some(mask) = window.dataset.location_mask() {
        for _ in 0..LOC_ATTEMPTS {
            let centre = draw_centre(&window.centres, rng);
            if mask.value_at(centre) > 0.0 {
                return centre;
            }
        }
        tracing::debug!(tag = %window.dataset.tag, "no masked centre found, drawing uniformly");
    }
    draw_centre(&window.centres, rng)
}
