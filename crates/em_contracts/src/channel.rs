use crate::ContractError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Semantic channel of a volume bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Img,
    Seg,
    Msk,
    MskTrain,
    MskVal,
    Mye,
    Blv,
    Mit,
}

impl Channel {
    pub const ALL: [Channel; 8] = [
        Channel::Img,
        Channel::Seg,
        Channel::Msk,
        Channel::MskTrain,
        Channel::MskVal,
        Channel::Mye,
        Channel::Blv,
        Channel::Mit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Img => "img",
            Channel::Seg => "seg",
            Channel::Msk => "msk",
            Channel::MskTrain => "msk_train",
            Channel::MskVal => "msk_val",
            Channel::Mye => "mye",
            Channel::Blv => "blv",
            Channel::Mit => "mit",
        }
    }

    /// File stem the channel is stored under inside a dataset directory.
    pub fn file_stem(&self) -> &'static str {
        self.as_str()
    }

    /// Element type the channel is cast to after loading.
    pub fn voxel_type(&self) -> VoxelType {
        match self {
            Channel::Img => VoxelType::F32,
            Channel::Seg => VoxelType::U32,
            _ => VoxelType::U8,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| ContractError::UnknownChannel(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoxelType {
    U8,
    U32,
    F32,
}

impl VoxelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoxelType::U8 => "uint8",
            VoxelType::U32 => "uint32",
            VoxelType::F32 => "float32",
        }
    }
}
