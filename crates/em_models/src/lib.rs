//! Burn building blocks for EM segmentation networks.
//!
//! - `SameConv3d`: 3-D convolution with "same" padding and Kaiming-normal weights.
//! - `CaffeBilinearUp`: fixed depthwise bilinear up-sampling by 2 in y/x.
//! - `InputBlock` / `OutputBlock`: the down-sample and multi-head up-sample ends of a net.
//! - `UpDownNet`: wraps a caller-supplied core between the two blocks.
//!
//! The core network itself is left to the caller; these modules only handle the
//! resolution change at the edges and the per-stream output heads.

pub mod layers;
pub mod updown;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("model takes a single input stream, got {0}")]
    InputCount(usize),
    #[error("output spec is empty")]
    NoOutputs,
    #[error("stream {stream} spec {dims:?} needs at least {needed} axes")]
    SpecRank {
        stream: String,
        dims: Vec<usize>,
        needed: usize,
    },
    #[error("bilinear up-sampling needs matching channels, got {in_channels} -> {out_channels}")]
    ChannelMismatch { in_channels: usize, out_channels: usize },
}

pub type ModelResult<T> = std::result::Result<T, ModelError>;

pub use layers::{
    bilinear_kernel, pad_same, CaffeBilinearUp, InputBlock, OutputBlock, SameConv3d,
    SameConv3dConfig,
};
pub use updown::{UpDownNet, UpDownNetConfig};

pub mod prelude {
    pub use super::{
        CaffeBilinearUp, InputBlock, ModelError, OutputBlock, SameConv3d, SameConv3dConfig,
        UpDownNet, UpDownNetConfig,
    };
}
