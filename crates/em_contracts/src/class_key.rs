use crate::{ContractError, ContractResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Prediction target a model is trained to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKey {
    /// Nearest-neighbour affinity, derived from segmentation.
    Aff,
    /// Long-range affinity, derived from segmentation.
    Long,
    /// Myelin.
    Mye,
    /// Blood vessel.
    Blv,
    /// Mitochondria.
    Mit,
}

impl ClassKey {
    pub const ALL: [ClassKey; 5] = [
        ClassKey::Aff,
        ClassKey::Long,
        ClassKey::Mye,
        ClassKey::Blv,
        ClassKey::Mit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassKey::Aff => "aff",
            ClassKey::Long => "long",
            ClassKey::Mye => "mye",
            ClassKey::Blv => "blv",
            ClassKey::Mit => "mit",
        }
    }
}

impl fmt::Display for ClassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassKey {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClassKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| ContractError::UnknownClassKey(s.to_string()))
    }
}

/// Parse a list of class key names into a deduplicated, ordered set.
pub fn parse_class_keys<I, S>(keys: I) -> ContractResult<BTreeSet<ClassKey>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keys.into_iter().map(|k| k.as_ref().parse()).collect()
}
