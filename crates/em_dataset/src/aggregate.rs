//! Merging several dataset families into one collection.

use crate::family::DatasetFamily;
use crate::loader::{load_family, LoadRequest};
use crate::observe::{LoadEvent, LoadObserver, TracingObserver};
use crate::types::{DatasetCollection, DatasetResult};
use crate::volume::{reader_for, VolumeFormat, VolumeReader};
use std::path::Path;

/// Families loaded by [`load_data`], in priority order.
pub fn default_families() -> Vec<DatasetFamily> {
    vec![DatasetFamily::basil()]
}

/// Load `request` from each family in order; later families overwrite earlier
/// ones on tag collisions.
pub fn load_all(
    families: &[DatasetFamily],
    base_dir: &Path,
    request: &LoadRequest,
    reader: &dyn VolumeReader,
    observer: &dyn LoadObserver,
) -> DatasetResult<DatasetCollection> {
    let mut data = DatasetCollection::new();
    for family in families {
        data.extend(load_family(family, base_dir, request, reader, observer)?);
    }
    for id in request.data_ids.iter().flatten() {
        if !families.iter().any(|f| f.claims(id)) {
            observer.observe(&LoadEvent::UnclaimedId { id: id.clone() });
        }
    }
    Ok(data)
}

/// Load the default families in the build's default [`VolumeFormat`],
/// logging through `tracing`.
pub fn load_data<S: AsRef<str>>(
    base_dir: &Path,
    data_ids: Option<&[S]>,
    class_keys: &[S],
) -> DatasetResult<DatasetCollection> {
    load_data_as(VolumeFormat::default(), base_dir, data_ids, class_keys)
}

/// [`load_data`] with an explicit volume format.
pub fn load_data_as<S: AsRef<str>>(
    format: VolumeFormat,
    base_dir: &Path,
    data_ids: Option<&[S]>,
    class_keys: &[S],
) -> DatasetResult<DatasetCollection> {
    let request = LoadRequest::from_names(data_ids, class_keys)?;
    if request.ids().is_empty() {
        return Ok(DatasetCollection::new());
    }
    let reader = reader_for(format)?;
    load_all(
        &default_families(),
        base_dir,
        &request,
        reader.as_ref(),
        &TracingObserver,
    )
}
