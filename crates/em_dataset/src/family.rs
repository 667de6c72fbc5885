//! Dataset families: a fixed directory convention plus the member tags that
//! live under it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const BASIL_MEMBER_COUNT: usize = 11;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetFamily {
    pub name: String,
    /// Family directory relative to the base directory.
    pub data_dir: PathBuf,
    /// Resolution/padding directory under `data_dir`.
    pub resolution_dir: PathBuf,
    pub members: Vec<String>,
    /// Pseudo-id expanding to every member present on disk.
    /// Defaults to `<name>_superset`.
    #[serde(default)]
    pub superset_id: Option<String>,
    /// Tag -> mask file stem used instead of `msk`.
    #[serde(default)]
    pub mask_overrides: BTreeMap<String, String>,
    /// Location flag attached to every bundle of the family.
    #[serde(default = "default_loc")]
    pub loc: bool,
}

fn default_loc() -> bool {
    true
}

impl DatasetFamily {
    /// The basil ground-truth family (`basil001`..`basil011`).
    pub fn basil() -> Self {
        let mask_overrides = ["basil001", "basil002"]
            .into_iter()
            .map(|tag| (tag.to_string(), "msk.d128".to_string()))
            .collect();
        Self {
            name: "basil".into(),
            data_dir: PathBuf::from("basil/ground_truth"),
            resolution_dir: PathBuf::from("mip1/padded_x512_y512_z32"),
            members: (1..=BASIL_MEMBER_COUNT)
                .map(|i| format!("basil{i:03}"))
                .collect(),
            superset_id: None,
            mask_overrides,
            loc: true,
        }
    }

    pub fn superset_id(&self) -> String {
        self.superset_id
            .clone()
            .unwrap_or_else(|| format!("{}_superset", self.name))
    }

    pub fn is_member(&self, tag: &str) -> bool {
        self.members.iter().any(|m| m == tag)
    }

    /// Whether this family loads anything for `id`.
    pub fn claims(&self, id: &str) -> bool {
        self.is_member(id) || id == self.superset_id()
    }

    pub fn dataset_dir(&self, base_dir: &Path, tag: &str) -> PathBuf {
        base_dir
            .join(&self.data_dir)
            .join(&self.resolution_dir)
            .join(tag)
    }

    pub fn mask_stem(&self, tag: &str) -> &str {
        self.mask_overrides
            .get(tag)
            .map(String::as_str)
            .unwrap_or("msk")
    }
}
