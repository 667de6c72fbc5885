//! Shared contracts for EM volume datasets: class keys, channels, and the
//! capability table that maps requested prediction targets to volume files.
//! Also the named stream shapes shared by samplers and models.

pub mod capability;
pub mod channel;
pub mod class_key;

pub use capability::{capabilities_for, Capability, MissingPolicy, CAPABILITIES};
pub use channel::{Channel, VoxelType};
pub use class_key::{parse_class_keys, ClassKey};

use std::collections::BTreeMap;
use thiserror::Error;

/// Stream name -> declared shape, possibly with leading channel axes
/// (`[.., c, z, y, x]`).
pub type StreamSpec = BTreeMap<String, Vec<usize>>;

pub type ContractResult<T> = Result<T, ContractError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContractError {
    #[error("unknown class key: {0:?}")]
    UnknownClassKey(String),
    #[error("unknown channel: {0:?}")]
    UnknownChannel(String),
}
