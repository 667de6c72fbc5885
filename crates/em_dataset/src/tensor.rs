//! Burn tensor conversion for drawn samples.

use crate::types::{DatasetResult, EmDatasetError, Sample};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use ndarray::ArrayD;
use std::collections::BTreeMap;

fn dims4(stream: &str, a: &ArrayD<f32>) -> DatasetResult<[usize; 4]> {
    <[usize; 4]>::try_from(a.shape()).map_err(|_| {
        EmDatasetError::Other(format!(
            "stream {stream} has shape {:?}, expected [c, z, y, x]",
            a.shape()
        ))
    })
}

fn flat(a: &ArrayD<f32>) -> Vec<f32> {
    a.as_standard_layout().iter().copied().collect()
}

impl Sample {
    /// One `[c, z, y, x]` tensor per stream.
    pub fn to_tensors<B: Backend>(
        &self,
        device: &B::Device,
    ) -> DatasetResult<BTreeMap<String, Tensor<B, 4>>> {
        self.streams
            .iter()
            .map(|(name, a)| {
                let dims = dims4(name, a)?;
                let data = TensorData::new(flat(a), dims);
                Ok((name.clone(), Tensor::<B, 4>::from_data(data, device)))
            })
            .collect()
    }
}

/// Stack samples into `[batch, c, z, y, x]` tensors per stream.
pub fn collate<B: Backend>(
    samples: &[Sample],
    device: &B::Device,
) -> DatasetResult<BTreeMap<String, Tensor<B, 5>>> {
    let Some(first) = samples.first() else {
        return Err(EmDatasetError::Other("cannot collate empty batch".into()));
    };
    let batch = samples.len();
    let mut out = BTreeMap::new();
    for (name, head) in &first.streams {
        let dims = dims4(name, head)?;
        let mut buf: Vec<f32> = Vec::with_capacity(batch * head.len());
        for sample in samples {
            let a = sample.get(name).ok_or_else(|| EmDatasetError::MissingStream {
                tag: sample.tag.clone(),
                stream: name.clone(),
            })?;
            if a.shape() != head.shape() {
                return Err(EmDatasetError::Other(format!(
                    "stream {name} shape {:?} differs within batch (expected {:?})",
                    a.shape(),
                    head.shape()
                )));
            }
            buf.extend(flat(a));
        }
        let data = TensorData::new(buf, [batch, dims[0], dims[1], dims[2], dims[3]]);
        out.insert(name.clone(), Tensor::<B, 5>::from_data(data, device));
    }
    if let Some(extra) = samples
        .iter()
        .find(|s| s.streams.len() != first.streams.len())
    {
        return Err(EmDatasetError::Other(format!(
            "sample from {} has {} streams, expected {}",
            extra.tag,
            extra.streams.len(),
            first.streams.len()
        )));
    }
    Ok(out)
}
