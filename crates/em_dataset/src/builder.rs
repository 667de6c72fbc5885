//! Turning a volume bundle into a sampleable dataset with named streams.

use crate::spec::mask_name;
use crate::types::{DatasetResult, EmDatasetError, SamplerMode, Volume, VolumeBundle};
use em_contracts::Channel;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Stream the image is registered under.
pub const INPUT_STREAM: &str = "input";

/// Target stream name and the bundle channel that feeds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetStream {
    pub stream: String,
    pub channel: Channel,
}

impl Default for TargetStream {
    fn default() -> Self {
        Self {
            stream: "mitochondria".into(),
            channel: Channel::Mit,
        }
    }
}

impl TargetStream {
    pub fn mask_stream(&self) -> String {
        mask_name(&self.stream)
    }
}

#[derive(Debug, Clone)]
pub struct StreamData {
    pub volume: Arc<Volume>,
    pub is_mask: bool,
    /// Restrict patch centres to voxels where this mask is non-zero.
    pub loc: bool,
}

/// Named streams of one dataset, ready for patch sampling.
#[derive(Debug, Clone)]
pub struct SampleDataset {
    pub tag: String,
    streams: BTreeMap<String, StreamData>,
}

impl SampleDataset {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            streams: BTreeMap::new(),
        }
    }

    pub fn add_data(&mut self, key: impl Into<String>, volume: Arc<Volume>) {
        self.streams.insert(
            key.into(),
            StreamData {
                volume,
                is_mask: false,
                loc: false,
            },
        );
    }

    pub fn add_mask(&mut self, key: impl Into<String>, volume: Arc<Volume>, loc: bool) {
        self.streams.insert(
            key.into(),
            StreamData {
                volume,
                is_mask: true,
                loc,
            },
        );
    }

    pub fn stream(&self, key: &str) -> Option<&StreamData> {
        self.streams.get(key)
    }

    pub fn stream_names(&self) -> impl Iterator<Item = &str> {
        self.streams.keys().map(String::as_str)
    }

    /// First mask registered with the location flag.
    pub fn location_mask(&self) -> Option<&Arc<Volume>> {
        self.streams
            .values()
            .find(|s| s.is_mask && s.loc)
            .map(|s| &s.volume)
    }
}

/// Mode mask (`msk_train` / `msk_val`) if present, else the generic `msk`.
pub fn mode_mask(tag: &str, bundle: &VolumeBundle, mode: SamplerMode) -> DatasetResult<Arc<Volume>> {
    let mode_mask = mode.mask_channel();
    bundle
        .get(mode_mask)
        .or_else(|| bundle.get(Channel::Msk))
        .cloned()
        .ok_or_else(|| EmDatasetError::MissingMask {
            tag: tag.to_string(),
            mode_mask,
        })
}

pub fn build_dataset(
    tag: &str,
    bundle: &VolumeBundle,
    mode: SamplerMode,
    target: &TargetStream,
) -> DatasetResult<SampleDataset> {
    let channel = |c: Channel| {
        bundle.get(c).cloned().ok_or_else(|| EmDatasetError::MissingChannel {
            tag: tag.to_string(),
            channel: c,
        })
    };
    let img = channel(Channel::Img)?;
    let label = channel(target.channel)?;
    let msk = mode_mask(tag, bundle, mode)?;

    let mut dset = SampleDataset::new(tag);
    dset.add_data(INPUT_STREAM, img);
    dset.add_data(target.stream.clone(), label);
    dset.add_mask(target.mask_stream(), msk, bundle.loc);
    Ok(dset)
}
