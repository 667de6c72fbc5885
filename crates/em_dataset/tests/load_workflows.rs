//! End-to-end loading from a synthetic basil-style directory tree.

use em_contracts::{Channel, ClassKey};
use em_dataset::{
    load_all, load_data, load_data_as, load_family, write_npy, DatasetFamily, EmDatasetError,
    LoadEvent, LoadRequest, NpyReader, RecordingObserver, Volume, VolumeFormat,
};
use ndarray::{Array, ArrayD, IxDyn};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

const SHAPE: [usize; 3] = [2, 4, 4];

/// Write `img` (ramp 0..=255 offset by `seed`) and `msk` for `tag`, plus any
/// extra channels listed.
fn write_dataset(
    family: &DatasetFamily,
    base: &Path,
    tag: &str,
    seed: u8,
    extra: &[&str],
) -> anyhow::Result<PathBuf> {
    let dir = family.dataset_dir(base, tag);
    fs::create_dir_all(&dir)?;
    let img = Array::from_shape_fn(SHAPE, |(z, y, x)| {
        ((z * 16 + y * 4 + x) as u8).wrapping_mul(8).wrapping_add(seed)
    })
    .into_dyn();
    write_npy(&dir.join("img.npy"), &Volume::U8(img))?;
    write_npy(
        &dir.join(format!("{}.npy", family.mask_stem(tag))),
        &Volume::U8(ArrayD::from_elem(IxDyn(&SHAPE), 1)),
    )?;
    for stem in extra {
        write_npy(
            &dir.join(format!("{stem}.npy")),
            &Volume::U8(ArrayD::from_elem(IxDyn(&SHAPE), 2)),
        )?;
    }
    Ok(dir)
}

fn request(ids: &[&str], keys: &[ClassKey]) -> LoadRequest {
    LoadRequest::new(
        Some(ids.iter().map(|s| s.to_string()).collect()),
        keys.iter().copied().collect::<BTreeSet<_>>(),
    )
}

#[test]
fn superset_skips_absent_members() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let basil = DatasetFamily::basil();
    write_dataset(&basil, tmp.path(), "basil003", 0, &[])?;
    write_dataset(&basil, tmp.path(), "basil005", 0, &[])?;

    let observer = RecordingObserver::new();
    let data = load_family(
        &basil,
        tmp.path(),
        &request(&["basil_superset"], &[ClassKey::Mye]),
        &NpyReader,
        &observer,
    )?;
    assert_eq!(data.keys().collect::<Vec<_>>(), vec!["basil003", "basil005"]);
    let skipped = observer
        .events()
        .into_iter()
        .filter(|e| matches!(e, LoadEvent::SkippedMember { .. }))
        .count();
    assert_eq!(skipped, 9);
    Ok(())
}

#[test]
fn missing_concrete_dataset_fails() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let basil = DatasetFamily::basil();
    write_dataset(&basil, tmp.path(), "basil003", 0, &[])?;
    let err = load_family(
        &basil,
        tmp.path(),
        &request(&["basil003", "basil004"], &[ClassKey::Mit]),
        &NpyReader,
        &RecordingObserver::new(),
    )
    .unwrap_err();
    assert!(matches!(err, EmDatasetError::MissingDataset { ref tag, .. } if tag == "basil004"));
    Ok(())
}

#[test]
fn absent_myelin_is_zero_filled_like_mask() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let basil = DatasetFamily::basil();
    write_dataset(&basil, tmp.path(), "basil006", 0, &["blv"])?;
    let observer = RecordingObserver::new();
    let data = load_family(
        &basil,
        tmp.path(),
        &request(&["basil006"], &[ClassKey::Mye, ClassKey::Blv]),
        &NpyReader,
        &observer,
    )?;
    let bundle = &data["basil006"];
    let mye = bundle.get(Channel::Mye).expect("mye present");
    assert_eq!(**mye, Volume::U8(ArrayD::zeros(IxDyn(&SHAPE))));
    let blv = bundle.get(Channel::Blv).expect("blv present");
    assert!(blv.as_u8().unwrap().iter().all(|v| *v == 2));
    assert!(observer.events().contains(&LoadEvent::ZeroFilled {
        tag: "basil006".into(),
        channel: Channel::Mye,
        shape: SHAPE.to_vec(),
    }));
    assert!(bundle.loc);
    Ok(())
}

#[test]
fn image_is_normalized_to_unit_range() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let basil = DatasetFamily::basil();
    let dir = write_dataset(&basil, tmp.path(), "basil007", 0, &[])?;
    // Overwrite with an image spanning the full 8-bit range.
    let img = Array::from_shape_fn(SHAPE, |(z, y, x)| if z + y + x == 0 { 0u8 } else { 255 }).into_dyn();
    write_npy(&dir.join("img.npy"), &Volume::U8(img))?;

    let data = load_family(
        &basil,
        tmp.path(),
        &request(&["basil007"], &[ClassKey::Mit]),
        &NpyReader,
        &RecordingObserver::new(),
    )?;
    let img = data["basil007"].get(Channel::Img).unwrap();
    let img = img.as_f32().expect("float image");
    assert!(img.iter().all(|v| (0.0..=1.0).contains(v)));
    assert_eq!(img[[0, 0, 0]], 0.0);
    assert_eq!(img[[1, 3, 3]], 1.0);
    Ok(())
}

#[test]
fn legacy_mask_override_is_used() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let basil = DatasetFamily::basil();
    let dir = write_dataset(&basil, tmp.path(), "basil001", 0, &[])?;
    assert!(dir.join("msk.d128.npy").exists());
    assert!(!dir.join("msk.npy").exists());

    let observer = RecordingObserver::new();
    load_family(
        &basil,
        tmp.path(),
        &request(&["basil001"], &[ClassKey::Mit]),
        &NpyReader,
        &observer,
    )?;
    assert_eq!(
        observer.read_paths(),
        vec![dir.join("img.npy"), dir.join("msk.d128.npy")]
    );
    Ok(())
}

#[test]
fn no_ids_means_no_io() -> anyhow::Result<()> {
    let basil = DatasetFamily::basil();
    let observer = RecordingObserver::new();
    let none = LoadRequest::new(None, BTreeSet::new());
    let data = load_family(&basil, Path::new("/does/not/exist"), &none, &NpyReader, &observer)?;
    assert!(data.is_empty());
    let empty = request(&[], &[ClassKey::Mit]);
    assert!(load_family(&basil, Path::new("/does/not/exist"), &empty, &NpyReader, &observer)?.is_empty());
    assert!(observer.events().is_empty());
    Ok(())
}

#[test]
fn class_keys_are_required_once_a_dataset_loads() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let basil = DatasetFamily::basil();
    write_dataset(&basil, tmp.path(), "basil003", 0, &[])?;
    let observer = RecordingObserver::new();
    let err = load_family(&basil, tmp.path(), &request(&["basil003"], &[]), &NpyReader, &observer).unwrap_err();
    assert!(matches!(err, EmDatasetError::NoClassKeys));
    assert!(observer.read_paths().is_empty());
    Ok(())
}

#[test]
fn foreign_ids_without_class_keys_load_nothing() -> anyhow::Result<()> {
    let data = load_family(
        &DatasetFamily::basil(),
        Path::new("/does/not/exist"),
        &request(&["minnie001"], &[]),
        &NpyReader,
        &RecordingObserver::new(),
    )?;
    assert!(data.is_empty());
    Ok(())
}

#[test]
fn load_data_without_ids_does_no_io() -> anyhow::Result<()> {
    let none = load_data(Path::new("/does/not/exist"), None::<&[&str]>, &["mit"])?;
    assert!(none.is_empty());
    let empty = load_data(Path::new("/does/not/exist"), Some(&[] as &[&str]), &["mit"])?;
    assert!(empty.is_empty());
    Ok(())
}

#[test]
fn load_data_as_reads_npy_trees() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let basil = DatasetFamily::basil();
    write_dataset(&basil, tmp.path(), "basil004", 0, &["mit"])?;
    let data = load_data_as(VolumeFormat::Npy, tmp.path(), Some(&["basil_superset"][..]), &["mit"][..])?;
    assert_eq!(data.keys().collect::<Vec<_>>(), vec!["basil004"]);
    assert!(data["basil004"].contains(Channel::Mit));
    Ok(())
}

#[cfg(not(feature = "hdf5"))]
#[test]
fn load_data_defaults_to_npy_without_hdf5() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let basil = DatasetFamily::basil();
    write_dataset(&basil, tmp.path(), "basil005", 0, &[])?;
    let data = load_data(tmp.path(), Some(&["basil005"][..]), &["mye"][..])?;
    assert_eq!(data.len(), 1);
    Ok(())
}

#[test]
fn affinity_requires_segmentation_file() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let basil = DatasetFamily::basil();
    write_dataset(&basil, tmp.path(), "basil008", 0, &[])?;
    let err = load_family(
        &basil,
        tmp.path(),
        &request(&["basil008"], &[ClassKey::Long]),
        &NpyReader,
        &RecordingObserver::new(),
    )
    .unwrap_err();
    assert!(matches!(err, EmDatasetError::MissingFile { channel: Channel::Seg, .. }));

    write_dataset(&basil, tmp.path(), "basil009", 0, &["seg"])?;
    let data = load_family(
        &basil,
        tmp.path(),
        &request(&["basil009"], &[ClassKey::Aff]),
        &NpyReader,
        &RecordingObserver::new(),
    )?;
    let seg = data["basil009"].get(Channel::Seg).unwrap();
    assert!(matches!(**seg, Volume::U32(_)));
    Ok(())
}

#[test]
fn missing_mask_fails_the_dataset() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let basil = DatasetFamily::basil();
    let dir = write_dataset(&basil, tmp.path(), "basil010", 0, &[])?;
    fs::remove_file(dir.join("msk.npy"))?;
    let err = load_family(
        &basil,
        tmp.path(),
        &request(&["basil010"], &[ClassKey::Mye]),
        &NpyReader,
        &RecordingObserver::new(),
    )
    .unwrap_err();
    assert!(matches!(err, EmDatasetError::MissingFile { channel: Channel::Msk, .. }));
    Ok(())
}

#[test]
fn mode_masks_are_loaded_when_present() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let basil = DatasetFamily::basil();
    write_dataset(&basil, tmp.path(), "basil011", 0, &["msk_train"])?;
    let data = load_family(
        &basil,
        tmp.path(),
        &request(&["basil011"], &[ClassKey::Mit]),
        &NpyReader,
        &RecordingObserver::new(),
    )?;
    let bundle = &data["basil011"];
    assert!(bundle.contains(Channel::MskTrain));
    assert!(!bundle.contains(Channel::MskVal));
    Ok(())
}

#[test]
fn later_family_wins_on_collision() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let family = |name: &str, data_dir: &str| DatasetFamily {
        name: name.into(),
        data_dir: data_dir.into(),
        resolution_dir: "mip0".into(),
        members: vec!["X".into()],
        superset_id: None,
        mask_overrides: Default::default(),
        loc: false,
    };
    let first = family("first", "a");
    let second = family("second", "b");
    write_dataset(&first, tmp.path(), "X", 0, &[])?;
    write_dataset(&second, tmp.path(), "X", 1, &[])?;

    let observer = RecordingObserver::new();
    let data = load_all(
        &[first, second],
        tmp.path(),
        &request(&["X", "minnie001"], &[ClassKey::Mit]),
        &NpyReader,
        &observer,
    )?;
    assert_eq!(data.len(), 1);
    let img = data["X"].get(Channel::Img).unwrap();
    assert_eq!(img.as_f32().unwrap()[[0, 0, 0]], 1.0 / 255.0);
    assert!(observer.events().contains(&LoadEvent::UnclaimedId {
        id: "minnie001".into()
    }));
    Ok(())
}
