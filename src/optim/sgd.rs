use candle_core::backprop::GradStore;
use candle_core::Var;
use candle_nn::{Optimizer as _, SGD};

use crate::error::Result;

/// Plain gradient descent: `w -= lr * grad`.
pub struct Sgd {
    inner: SGD,
}

impl Sgd {
    pub fn new(vars: Vec<Var>, learning_rate: f64) -> Result<Sgd> {
        Ok(Sgd { inner: SGD::new(vars, learning_rate)? })
    }

    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        Ok(self.inner.step(grads)?)
    }

    pub fn learning_rate(&self) -> f64 {
        self.inner.learning_rate()
    }
}
