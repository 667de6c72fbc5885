//! Fixed table from requested class keys to the auxiliary volumes they need.

use crate::{Channel, ClassKey, VoxelType};
use std::collections::BTreeSet;

/// What to do when a capability's file is absent from a dataset directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPolicy {
    /// Absence is a precondition failure.
    Required,
    /// Substitute an all-zero volume shaped like the mask.
    ZerosLikeMask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    pub channel: Channel,
    pub requested_by: &'static [ClassKey],
    pub voxel_type: VoxelType,
    pub missing: MissingPolicy,
}

impl Capability {
    pub fn is_requested(&self, class_keys: &BTreeSet<ClassKey>) -> bool {
        self.requested_by.iter().any(|k| class_keys.contains(k))
    }
}

/// Auxiliary channels in load order. `img` and `msk` are always loaded and are
/// not part of the table.
pub const CAPABILITIES: &[Capability] = &[
    Capability {
        channel: Channel::Seg,
        requested_by: &[ClassKey::Aff, ClassKey::Long],
        voxel_type: VoxelType::U32,
        missing: MissingPolicy::Required,
    },
    Capability {
        channel: Channel::Mye,
        requested_by: &[ClassKey::Mye],
        voxel_type: VoxelType::U8,
        missing: MissingPolicy::ZerosLikeMask,
    },
    Capability {
        channel: Channel::Blv,
        requested_by: &[ClassKey::Blv],
        voxel_type: VoxelType::U8,
        missing: MissingPolicy::ZerosLikeMask,
    },
    Capability {
        channel: Channel::Mit,
        requested_by: &[ClassKey::Mit],
        voxel_type: VoxelType::U8,
        missing: MissingPolicy::ZerosLikeMask,
    },
];

/// Capabilities triggered by `class_keys`, in table order.
pub fn capabilities_for(class_keys: &BTreeSet<ClassKey>) -> impl Iterator<Item = &'static Capability> + '_ {
    CAPABILITIES.iter().filter(move |c| c.is_requested(class_keys))
}
