use candle_core::{DType, Tensor, D};

use crate::error::{NnError, Result};

/// Epoch-scoped correct/total counters for classification accuracy.
///
/// Counts are integers, so accumulating batch by batch gives exactly the
/// same result as scoring all batches at once, in any order.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunningAccuracy {
    correct: usize,
    total: usize,
}

impl RunningAccuracy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scores one batch of logits against labels and returns how many
    /// predictions were correct.
    pub fn update(&mut self, logits: &Tensor, labels: &Tensor) -> Result<usize> {
        let (batch, _) = logits.dims2()?;
        if labels.dims() != [batch] {
            return Err(NnError::ShapeMismatch {
                context: "accuracy labels".into(),
                expected: vec![batch],
                got: labels.dims().to_vec(),
            });
        }
        let preds = predictions(logits)?;
        let correct = preds
            .eq(&labels.to_dtype(DType::U32)?)?
            .to_dtype(DType::U32)?
            .sum_all()?
            .to_scalar::<u32>()? as usize;
        self.record(correct, batch);
        Ok(correct)
    }

    pub fn record(&mut self, correct: usize, total: usize) {
        self.correct += correct;
        self.total += total;
    }

    pub fn merge(self, other: RunningAccuracy) -> RunningAccuracy {
        RunningAccuracy { correct: self.correct + other.correct, total: self.total + other.total }
    }

    pub fn correct(&self) -> usize {
        self.correct
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// `correct / total`. Fails when nothing was scored rather than
    /// reporting a misleading 0.
    pub fn accuracy(&self) -> Result<f64> {
        if self.total == 0 {
            return Err(NnError::EmptyEvaluation);
        }
        Ok(self.correct as f64 / self.total as f64)
    }
}

/// Arg-max over the class dimension: `[batch, classes]` -> u32 `[batch]`.
pub fn predictions(logits: &Tensor) -> Result<Tensor> {
    Ok(logits.argmax(D::Minus1)?)
}
