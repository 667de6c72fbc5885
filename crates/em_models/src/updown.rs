//! Network wrapper that halves y/x resolution on the way in and restores it
//! per output stream on the way out.

use crate::layers::{InputBlock, OutputBlock};
use crate::{ModelError, ModelResult};
use burn::module::{Ignored, Module};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use em_contracts::StreamSpec;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct UpDownNetConfig {
    pub in_spec: StreamSpec,
    pub out_spec: StreamSpec,
    /// Channels handed to and expected back from the core.
    pub width: usize,
    pub kernel: [usize; 3],
}

impl UpDownNetConfig {
    pub fn new(in_spec: StreamSpec, out_spec: StreamSpec) -> Self {
        Self {
            in_spec,
            out_spec,
            width: 16,
            kernel: [1, 5, 5],
        }
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> ModelResult<UpDownNet<B>> {
        if self.in_spec.len() != 1 {
            return Err(ModelError::InputCount(self.in_spec.len()));
        }
        if self.out_spec.is_empty() {
            return Err(ModelError::NoOutputs);
        }
        let (in_name, in_dims) = self
            .in_spec
            .iter()
            .next()
            .ok_or(ModelError::InputCount(0))?;
        let in_channels = channel_axis(in_name, in_dims)?;

        // StreamSpec is a BTreeMap, so heads come out sorted by name.
        let mut names = Vec::with_capacity(self.out_spec.len());
        let mut channels = Vec::with_capacity(self.out_spec.len());
        for (name, dims) in &self.out_spec {
            names.push(name.clone());
            channels.push(channel_axis(name, dims)?);
        }
        tracing::debug!(input = %in_name, in_channels, outputs = ?names, width = self.width, "building up/down net");

        Ok(UpDownNet {
            input: InputBlock::new(in_channels, self.width, self.kernel, device),
            output: OutputBlock::new(self.width, &channels, self.kernel, device),
            input_name: Ignored(in_name.clone()),
            output_names: Ignored(names),
        })
    }
}

/// Channel count sits on the fourth-last axis of a `[.., c, z, y, x]` entry.
fn channel_axis(stream: &str, dims: &[usize]) -> ModelResult<usize> {
    if dims.len() < 4 {
        return Err(ModelError::SpecRank {
            stream: stream.to_string(),
            dims: dims.to_vec(),
            needed: 4,
        });
    }
    Ok(dims[dims.len() - 4])
}

#[derive(Debug, Module)]
pub struct UpDownNet<B: Backend> {
    input: InputBlock<B>,
    output: OutputBlock<B>,
    input_name: Ignored<String>,
    output_names: Ignored<Vec<String>>,
}

impl<B: Backend> UpDownNet<B> {
    pub fn input_name(&self) -> &str {
        &self.input_name.0
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names.0
    }

    pub fn input_block(&self) -> &InputBlock<B> {
        &self.input
    }

    pub fn output_block(&self) -> &OutputBlock<B> {
        &self.output
    }

    /// Run `core` between the input and output blocks. `core` receives and
    /// must return `width` channels at half the input y/x resolution.
    pub fn forward<F>(&self, x: Tensor<B, 5>, core: F) -> BTreeMap<String, Tensor<B, 5>>
    where
        F: FnOnce(Tensor<B, 5>) -> Tensor<B, 5>,
    {
        let hidden = core(self.input.forward(x));
        self.output_names
            .0
            .iter()
            .cloned()
            .zip(self.output.forward(hidden))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    fn spec(entries: &[(&str, &[usize])]) -> StreamSpec {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_vec()))
            .collect()
    }

    #[test]
    fn rejects_multiple_inputs() {
        let cfg = UpDownNetConfig::new(
            spec(&[("a", &[1, 4, 8, 8]), ("b", &[1, 4, 8, 8])]),
            spec(&[("out", &[1, 4, 8, 8])]),
        );
        let err = cfg.init::<B>(&Default::default()).unwrap_err();
        assert_eq!(err, ModelError::InputCount(2));
    }

    #[test]
    fn rejects_short_output_spec() {
        let cfg = UpDownNetConfig::new(spec(&[("input", &[1, 4, 8, 8])]), spec(&[("out", &[8, 8, 8])]));
        assert!(matches!(
            cfg.init::<B>(&Default::default()),
            Err(ModelError::SpecRank { ref stream, .. }) if stream == "out"
        ));
    }

    #[test]
    fn outputs_restore_input_resolution_sorted_by_name() {
        let device = Default::default();
        let net = UpDownNetConfig::new(
            spec(&[("input", &[1, 4, 16, 16])]),
            spec(&[("zeta", &[2, 4, 16, 16]), ("alpha", &[3, 4, 16, 16])]),
        )
        .with_width(8)
        .init::<B>(&device)
        .unwrap();
        assert_eq!(net.output_names(), &["alpha".to_string(), "zeta".to_string()]);

        let mut core_dims = None;
        let outs = net.forward(Tensor::ones([1, 1, 4, 16, 16], &device), |h| {
            core_dims = Some(h.dims());
            h
        });
        assert_eq!(core_dims, Some([1, 8, 4, 8, 8]));
        assert_eq!(outs["alpha"].dims(), [1, 3, 4, 16, 16]);
        assert_eq!(outs["zeta"].dims(), [1, 2, 4, 16, 16]);
    }

    #[test]
    fn net_is_a_module_carrying_every_conv() {
        fn as_module<M: Module<B>>(m: &M) -> usize {
            m.num_params()
        }

        let device = Default::default();
        let net = UpDownNetConfig::new(
            spec(&[("input", &[1, 4, 16, 16])]),
            spec(&[("alpha", &[3, 4, 16, 16]), ("zeta", &[2, 4, 16, 16])]),
        )
        .with_width(8)
        .init::<B>(&device)
        .unwrap();

        // Input conv: 8 x 1 x (1 x 5 x 5), no bias.
        assert_eq!(as_module(net.input_block()), 200);
        // Heads: 3 x 8 x 25 + 3 and 2 x 8 x 25 + 2, plus batch-norm affine terms.
        assert!(as_module(&net) >= 200 + 603 + 402);

        let moved = net.clone().to_device(&device);
        assert_eq!(moved.output_names(), net.output_names());
        assert_eq!(moved.input_name(), "input");
    }
}
