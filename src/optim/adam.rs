use candle_core::backprop::GradStore;
use candle_core::Var;
use candle_nn::{AdamW, Optimizer as _, ParamsAdamW};

use crate::error::Result;
use crate::optim::optimizer::OptimizerConfig;

/// Adam: per-parameter first/second moment estimates with bias correction.
///
/// Backed by candle's `AdamW` with weight decay fixed to the configured value
/// (0 by default, which makes the update plain Adam).
pub struct Adam {
    inner: AdamW,
}

impl Adam {
    pub fn new(vars: Vec<Var>, config: &OptimizerConfig) -> Result<Adam> {
        let params = ParamsAdamW {
            lr: config.learning_rate,
            beta1: config.beta1,
            beta2: config.beta2,
            eps: config.eps,
            weight_decay: config.weight_decay,
        };
        Ok(Adam { inner: AdamW::new(vars, params)? })
    }

    /// Applies one update using `grads`; variables without a gradient are left untouched.
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        Ok(self.inner.step(grads)?)
    }

    pub fn learning_rate(&self) -> f64 {
        self.inner.learning_rate()
    }
}
