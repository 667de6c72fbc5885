//! EM volume dataset loading, patch sampling, and augmentation.
//!
//! This crate provides utilities for:
//! - Loading dataset families (image, masks, auxiliary labels) from disk
//! - Merging families into one tag-keyed collection
//! - Building named sample streams and drawing weighted random patches
//! - Patch augmentation
//! - Burn tensor conversion (feature `burn-runtime`)

pub mod aggregate;
pub mod aug;
pub mod builder;
pub mod config;
pub mod family;
pub mod loader;
pub mod observe;
pub mod sampler;
pub mod spec;
pub mod types;
pub mod volume;

#[cfg(feature = "burn-runtime")]
pub mod tensor;

pub use aggregate::{default_families, load_all, load_data, load_data_as};
pub use aug::{Augment, AugmentPipeline, AugmentPipelineBuilder, FlipAugment, IntensityJitter};
pub use builder::{build_dataset, mode_mask, SampleDataset, TargetStream, INPUT_STREAM};
pub use config::{expand_path, PipelineConfig};
pub use family::DatasetFamily;
pub use loader::{load_dataset, load_family, LoadRequest};
pub use observe::{init_tracing, LoadEvent, LoadObserver, RecordingObserver, TracingObserver};
pub use sampler::{Sampler, SamplerConfig, SamplingWeights};
pub use spec::{mask_name, SampleSpec, StreamSpec};
pub use types::*;
pub use volume::{reader_for, write_npy, NpyReader, VolumeFormat, VolumeReader};

#[cfg(feature = "burn-runtime")]
pub use tensor::collate;

#[cfg(feature = "hdf5")]
pub use volume::Hdf5Reader;
