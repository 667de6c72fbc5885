//! Loading a dataset family from its directory layout into bundles.

use crate::config::expand_path;
use crate::family::DatasetFamily;
use crate::observe::{LoadEvent, LoadObserver};
use crate::types::{DatasetCollection, DatasetResult, EmDatasetError, Volume, VolumeBundle};
use crate::volume::VolumeReader;
use em_contracts::{capabilities_for, parse_class_keys, Channel, ClassKey, MissingPolicy, VoxelType};
use std::collections::BTreeSet;
use std::path::Path;

/// Fixed dynamic range of raw 8-bit EM images.
pub const IMAGE_DYNAMIC_RANGE: f32 = 255.0;

/// Which datasets to load and which prediction targets they must support.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadRequest {
    /// `None` or empty loads nothing.
    pub data_ids: Option<Vec<String>>,
    pub class_keys: BTreeSet<ClassKey>,
}

impl LoadRequest {
    pub fn new(data_ids: Option<Vec<String>>, class_keys: BTreeSet<ClassKey>) -> Self {
        Self {
            data_ids,
            class_keys,
        }
    }

    /// Build a request from raw names, rejecting unknown class keys.
    pub fn from_names<S: AsRef<str>>(data_ids: Option<&[S]>, class_keys: &[S]) -> DatasetResult<Self> {
        Ok(Self {
            data_ids: data_ids.map(|ids| ids.iter().map(|s| s.as_ref().to_string()).collect()),
            class_keys: parse_class_keys(class_keys)?,
        })
    }

    pub fn ids(&self) -> &[String] {
        self.data_ids.as_deref().unwrap_or(&[])
    }
}

/// Load every requested dataset that belongs to `family`.
///
/// The family's superset id expands to all members present on disk; absent
/// members are skipped. A requested member whose directory is missing fails
/// the whole call. Ids that are not members of the family are ignored.
/// Class keys are only required once a dataset of this family is loaded.
pub fn load_family(
    family: &DatasetFamily,
    base_dir: &Path,
    request: &LoadRequest,
    reader: &dyn VolumeReader,
    observer: &dyn LoadObserver,
) -> DatasetResult<DatasetCollection> {
    let ids = request.ids();
    if ids.is_empty() {
        return Ok(DatasetCollection::new());
    }
    let base_dir = expand_path(&base_dir.to_string_lossy());
    let superset = family.superset_id();

    let mut data = DatasetCollection::new();
    for id in ids {
        if *id == superset {
            for tag in &family.members {
                if data.contains_key(tag) {
                    continue;
                }
                let dpath = family.dataset_dir(&base_dir, tag);
                if !dpath.exists() {
                    observer.observe(&LoadEvent::SkippedMember {
                        family: family.name.clone(),
                        tag: tag.clone(),
                        path: dpath,
                    });
                    continue;
                }
                let bundle = load_dataset(family, &dpath, tag, &request.class_keys, reader, observer)?;
                data.insert(tag.clone(), bundle);
            }
        } else if family.is_member(id) {
            if data.contains_key(id) {
                continue;
            }
            let dpath = family.dataset_dir(&base_dir, id);
            if !dpath.exists() {
                return Err(EmDatasetError::MissingDataset {
                    tag: id.clone(),
                    path: dpath,
                });
            }
            let bundle = load_dataset(family, &dpath, id, &request.class_keys, reader, observer)?;
            data.insert(id.clone(), bundle);
        }
    }
    Ok(data)
}

/// Load one dataset directory into a bundle.
pub fn load_dataset(
    family: &DatasetFamily,
    dpath: &Path,
    tag: &str,
    class_keys: &BTreeSet<ClassKey>,
    reader: &dyn VolumeReader,
    observer: &dyn LoadObserver,
) -> DatasetResult<VolumeBundle> {
    if class_keys.is_empty() {
        return Err(EmDatasetError::NoClassKeys);
    }
    observer.observe(&LoadEvent::ResolvedDataset {
        family: family.name.clone(),
        tag: tag.to_string(),
        path: dpath.to_path_buf(),
    });
    let format = reader.format();
    let read = |channel: Channel, stem: &str| -> DatasetResult<Option<Volume>> {
        let path = dpath.join(format.file_name(stem));
        if !path.exists() {
            return Ok(None);
        }
        observer.observe(&LoadEvent::ReadVolume {
            tag: tag.to_string(),
            channel,
            path: path.clone(),
        });
        reader.read(&path).map(Some)
    };
    let required = |channel: Channel, stem: &str| -> DatasetResult<Volume> {
        read(channel, stem)?.ok_or_else(|| EmDatasetError::MissingFile {
            tag: tag.to_string(),
            channel,
            path: dpath.join(format.file_name(stem)),
        })
    };

    let mut bundle = VolumeBundle::new();

    let mut img = required(Channel::Img, Channel::Img.file_stem())?.cast(VoxelType::F32);
    if let Volume::F32(a) = &mut img {
        a.mapv_inplace(|v| v / IMAGE_DYNAMIC_RANGE);
    }
    bundle.insert(Channel::Img, img);

    let msk = required(Channel::Msk, family.mask_stem(tag))?.cast(VoxelType::U8);
    bundle.insert(Channel::Msk, msk);

    // Mode-specific masks are optional refinements of `msk`.
    for channel in [Channel::MskTrain, Channel::MskVal] {
        if let Some(vol) = read(channel, channel.file_stem())? {
            bundle.insert(channel, vol.cast(VoxelType::U8));
        }
    }

    for cap in capabilities_for(class_keys) {
        let vol = match read(cap.channel, cap.channel.file_stem())? {
            Some(vol) => vol.cast(cap.voxel_type),
            None => match (cap.missing, bundle.get(Channel::Msk)) {
                (MissingPolicy::ZerosLikeMask, Some(msk)) => {
                    let shape = msk.shape().to_vec();
                    observer.observe(&LoadEvent::ZeroFilled {
                        tag: tag.to_string(),
                        channel: cap.channel,
                        shape: shape.clone(),
                    });
                    Volume::zeros(cap.voxel_type, &shape)
                }
                _ => {
                    return Err(EmDatasetError::MissingFile {
                        tag: tag.to_string(),
                        channel: cap.channel,
                        path: dpath.join(format.file_name(cap.channel.file_stem())),
                    })
                }
            },
        };
        bundle.insert(cap.channel, vol);
    }

    bundle.loc = family.loc;
    bundle.validate(tag)?;
    Ok(bundle)
}
