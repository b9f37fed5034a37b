use candle_core::{DType, Tensor};

use crate::error::{NnError, Result};

/// Categorical cross-entropy on raw logits.
///
/// Softmax is folded into the loss (log-softmax + negative log-likelihood),
/// so models emit unnormalized logits and labels are class indices.
pub struct CrossEntropyLoss;

impl CrossEntropyLoss {
    /// Mean loss over the batch, as a scalar tensor that can be backpropagated.
    ///
    /// `logits` — `[batch, num_classes]`
    /// `labels` — `[batch]`, u32 class indices
    pub fn loss(logits: &Tensor, labels: &Tensor) -> Result<Tensor> {
        let (batch, _) = logits.dims2()?;
        if labels.dims() != [batch] {
            return Err(NnError::ShapeMismatch {
                context: "cross-entropy labels".into(),
                expected: vec![batch],
                got: labels.dims().to_vec(),
            });
        }
        let labels = if labels.dtype() == DType::U32 { labels.clone() } else { labels.to_dtype(DType::U32)? };
        Ok(candle_nn::loss::cross_entropy(logits, &labels)?)
    }

    /// Scalar value of [`CrossEntropyLoss::loss`].
    pub fn value(logits: &Tensor, labels: &Tensor) -> Result<f32> {
        Ok(Self::loss(logits, labels)?.to_scalar::<f32>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn uniform_logits_give_log_num_classes() {
        let logits = Tensor::zeros((4, 10), DType::F32, &Device::Cpu).unwrap();
        let labels = Tensor::new(&[0u32, 3, 7, 9], &Device::Cpu).unwrap();
        let loss = CrossEntropyLoss::value(&logits, &labels).unwrap();
        approx::assert_relative_eq!(loss, 10f32.ln(), epsilon = 1e-5);
    }

    #[test]
    fn confident_correct_logits_approach_zero() {
        let logits = Tensor::new(&[[20f32, 0.0, 0.0], [0.0, 0.0, 20.0]], &Device::Cpu).unwrap();
        let labels = Tensor::new(&[0u32, 2], &Device::Cpu).unwrap();
        let loss = CrossEntropyLoss::value(&logits, &labels).unwrap();
        assert!(loss >= 0.0 && loss < 1e-6);
    }

    #[test]
    fn label_count_must_match_batch() {
        let logits = Tensor::zeros((2, 10), DType::F32, &Device::Cpu).unwrap();
        let labels = Tensor::new(&[1u32, 2, 3], &Device::Cpu).unwrap();
        assert!(matches!(
            CrossEntropyLoss::loss(&logits, &labels),
            Err(NnError::ShapeMismatch { .. })
        ));
    }
}
