//! Convolution, up-sampling, and edge blocks shared by EM segmentation nets.

use crate::{ModelError, ModelResult};
use burn::module::{Module, Param};
use burn::nn::conv::{Conv3d, Conv3dConfig};
use burn::nn::pool::{AvgPool2d, AvgPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Initializer, PaddingConfig3d};
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::module::conv_transpose3d;
use burn::tensor::ops::ConvTransposeOptions;
use burn::tensor::{Tensor, TensorData};

/// Side length of the bilinear up-sampling kernel in y/x.
pub const UPSAMPLE_KERNEL: usize = 4;

/// Per-axis padding that keeps odd kernels shape-preserving.
pub fn pad_same(kernel: [usize; 3]) -> [usize; 3] {
    kernel.map(|k| k / 2)
}

/// Caffe-style bilinear interpolation weights, row-major `[size, size]`.
pub fn bilinear_kernel(size: usize) -> Vec<f32> {
    let f = size.div_ceil(2) as f32;
    let c = (size as f32 - 1.0) / (2.0 * f);
    let mut weights = Vec::with_capacity(size * size);
    for h in 0..size {
        for w in 0..size {
            let wy = 1.0 - (h as f32 / f - c).abs();
            let wx = 1.0 - (w as f32 / f - c).abs();
            weights.push(wx * wy);
        }
    }
    weights
}

#[derive(Debug, Clone)]
pub struct SameConv3dConfig {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel: [usize; 3],
    pub bias: bool,
}

impl SameConv3dConfig {
    pub fn new(in_channels: usize, out_channels: usize, kernel: [usize; 3]) -> Self {
        Self {
            in_channels,
            out_channels,
            kernel,
            bias: false,
        }
    }

    pub fn with_bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }

    /// Kaiming-normal weights (ReLU gain, fan-in); bias starts at zero.
    pub fn init<B: Backend>(&self, device: &B::Device) -> SameConv3d<B> {
        let [pz, py, px] = pad_same(self.kernel);
        let mut conv = Conv3dConfig::new([self.in_channels, self.out_channels], self.kernel)
            .with_padding(PaddingConfig3d::Explicit(pz, py, px))
            .with_bias(self.bias)
            .with_initializer(Initializer::KaimingNormal {
                gain: std::f64::consts::SQRT_2,
                fan_out_only: false,
            })
            .init(device);
        if self.bias {
            conv.bias = Some(Param::from_tensor(Tensor::zeros([self.out_channels], device)));
        }
        SameConv3d {
            conv,
            out_channels: self.out_channels,
        }
    }
}

#[derive(Debug, Module)]
pub struct SameConv3d<B: Backend> {
    conv: Conv3d<B>,
    out_channels: usize,
}

impl<B: Backend> SameConv3d<B> {
    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn forward(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        self.conv.forward(x)
    }
}

/// Fixed (non-learned) depthwise bilinear up-sampling by 2 in y and x.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaffeBilinearUp {
    channels: usize,
}

impl CaffeBilinearUp {
    pub fn new(in_channels: usize, out_channels: usize) -> ModelResult<Self> {
        if in_channels != out_channels {
            return Err(ModelError::ChannelMismatch {
                in_channels,
                out_channels,
            });
        }
        Ok(Self {
            channels: in_channels,
        })
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// `[b, c, z, y, x]` -> `[b, c, z, 2y, 2x]`.
    pub fn forward<B: Backend>(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        let k = UPSAMPLE_KERNEL;
        let plane = bilinear_kernel(k);
        let mut weights = Vec::with_capacity(self.channels * plane.len());
        for _ in 0..self.channels {
            weights.extend_from_slice(&plane);
        }
        let weight = Tensor::<B, 5>::from_data(
            TensorData::new(weights, [self.channels, 1, 1, k, k]),
            &x.device(),
        );
        let options = ConvTransposeOptions::new([1, 2, 2], [0, 1, 1], [0, 0, 0], [1, 1, 1], self.channels);
        conv_transpose3d(x, weight, None, options)
    }
}

/// (1, 2, 2) average down-sampling followed by a same-padded conv.
#[derive(Debug, Module)]
pub struct InputBlock<B: Backend> {
    down: AvgPool2d,
    conv: SameConv3d<B>,
}

impl<B: Backend> InputBlock<B> {
    pub fn new(in_channels: usize, out_channels: usize, kernel: [usize; 3], device: &B::Device) -> Self {
        Self {
            down: AvgPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            conv: SameConv3dConfig::new(in_channels, out_channels, kernel).init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 5>) -> Tensor<B, 5> {
        let [b, c, z, y, x_len] = x.dims();
        // Pool each (channel, section) plane independently.
        let planes = self.down.forward(x.reshape([b, c * z, y, x_len]));
        let [_, _, py, px] = planes.dims();
        self.conv.forward(planes.reshape([b, c, z, py, px]))
    }
}

/// Batch-norm and ReLU, then one conv + bilinear up-sampling head per output.
#[derive(Debug, Module)]
pub struct OutputBlock<B: Backend> {
    norm: BatchNorm<B, 3>,
    heads: Vec<SameConv3d<B>>,
}

impl<B: Backend> OutputBlock<B> {
    /// `head_channels` must already be in output-name order.
    pub fn new(in_channels: usize, head_channels: &[usize], kernel: [usize; 3], device: &B::Device) -> Self {
        let heads = head_channels
            .iter()
            .map(|&c| SameConv3dConfig::new(in_channels, c, kernel).with_bias(true).init(device))
            .collect();
        Self {
            norm: BatchNormConfig::new(in_channels).init(device),
            heads,
        }
    }

    pub fn num_heads(&self) -> usize {
        self.heads.len()
    }

    pub fn forward(&self, x: Tensor<B, 5>) -> Vec<Tensor<B, 5>> {
        let x = relu(self.norm.forward(x));
        self.heads
            .iter()
            .map(|head| {
                let up = CaffeBilinearUp {
                    channels: head.out_channels(),
                };
                up.forward(head.forward(x.clone()))
            })
            .collect()
    }
}
