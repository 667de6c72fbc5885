//! Patch augmentation applied between cropping and tensor conversion.

use crate::types::StreamMap;
use ndarray::Axis;
use rand::{Rng, RngCore};
use std::fmt;

/// Transformation of a freshly cropped patch. `imgs` names the raw-intensity
/// streams; geometric ops touch every stream, intensity ops only `imgs`.
pub trait Augment: Send + Sync + fmt::Debug {
    fn apply(&self, sample: &mut StreamMap, imgs: &[String], rng: &mut dyn RngCore);
}

/// Random axis flips and y/x transpose, applied identically to every stream.
#[derive(Debug, Clone, PartialEq)]
pub struct FlipAugment {
    pub flip_z_prob: f32,
    pub flip_y_prob: f32,
    pub flip_x_prob: f32,
    /// Only applied when every stream is square in y/x.
    pub transpose_prob: f32,
}

impl Default for FlipAugment {
    fn default() -> Self {
        Self {
            flip_z_prob: 0.5,
            flip_y_prob: 0.5,
            flip_x_prob: 0.5,
            transpose_prob: 0.5,
        }
    }
}

impl Augment for FlipAugment {
    fn apply(&self, sample: &mut StreamMap, _imgs: &[String], rng: &mut dyn RngCore) {
        let flip_z = rng.random_range(0.0..1.0) < self.flip_z_prob;
        let flip_y = rng.random_range(0.0..1.0) < self.flip_y_prob;
        let flip_x = rng.random_range(0.0..1.0) < self.flip_x_prob;
        let square = sample.values().all(|a| {
            let n = a.ndim();
            n >= 2 && a.shape()[n - 2] == a.shape()[n - 1]
        });
        let transpose = square && rng.random_range(0.0..1.0) < self.transpose_prob;

        for a in sample.values_mut() {
            let n = a.ndim();
            if n < 3 {
                continue;
            }
            if flip_z {
                a.invert_axis(Axis(n - 3));
            }
            if flip_y {
                a.invert_axis(Axis(n - 2));
            }
            if flip_x {
                a.invert_axis(Axis(n - 1));
            }
            if transpose {
                a.swap_axes(n - 2, n - 1);
            }
        }
    }
}

/// Brightness/contrast jitter on intensity streams, clamped to [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityJitter {
    pub prob: f32,
    pub brightness: f32,
    pub contrast: f32,
}

impl Default for IntensityJitter {
    fn default() -> Self {
        Self {
            prob: 0.5,
            brightness: 0.1,
            contrast: 0.1,
        }
    }
}

impl Augment for IntensityJitter {
    fn apply(&self, sample: &mut StreamMap, imgs: &[String], rng: &mut dyn RngCore) {
        if rng.random_range(0.0..1.0) >= self.prob {
            return;
        }
        let b = rng.random_range(-self.brightness..=self.brightness);
        let c = 1.0 + rng.random_range(-self.contrast..=self.contrast);
        for key in imgs {
            if let Some(a) = sample.get_mut(key) {
                a.mapv_inplace(|v| ((v - 0.5) * c + 0.5 + b).clamp(0.0, 1.0));
            }
        }
    }
}

/// Ordered list of augmentations.
#[derive(Debug, Default)]
pub struct AugmentPipeline {
    steps: Vec<Box<dyn Augment>>,
}

impl AugmentPipeline {
    pub fn builder() -> AugmentPipelineBuilder {
        AugmentPipelineBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn describe(&self) -> String {
        if self.steps.is_empty() {
            return "none".to_string();
        }
        self.steps
            .iter()
            .map(|s| format!("{s:?}"))
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

impl Augment for AugmentPipeline {
    fn apply(&self, sample: &mut StreamMap, imgs: &[String], rng: &mut dyn RngCore) {
        for step in &self.steps {
            step.apply(sample, imgs, rng);
        }
    }
}

#[derive(Debug, Default)]
pub struct AugmentPipelineBuilder {
    inner: AugmentPipeline,
}

impl AugmentPipelineBuilder {
    pub fn flip(mut self, flip: FlipAugment) -> Self {
        self.inner.steps.push(Box::new(flip));
        self
    }

    pub fn intensity(mut self, prob: f32, brightness: f32, contrast: f32) -> Self {
        self.inner.steps.push(Box::new(IntensityJitter {
            prob,
            brightness,
            contrast,
        }));
        self
    }

    pub fn step(mut self, step: Box<dyn Augment>) -> Self {
        self.inner.steps.push(step);
        self
    }

    pub fn build(self) -> AugmentPipeline {
        self.inner
    }
}
