use candle_core::backprop::GradStore;
use candle_core::{Tensor, Var};
use serde::{Deserialize, Serialize};

use crate::error::{NnError, Result};
use crate::optim::{adam::Adam, sgd::Sgd};

/// Selects the parameter update rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    #[default]
    Adam,
    Sgd,
}

/// Optimizer hyperparameters. The moment settings are ignored by SGD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub kind: OptimizerKind,
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    pub weight_decay: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            kind: OptimizerKind::Adam,
            learning_rate: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            weight_decay: 0.0,
        }
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(NnError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(0.0..1.0).contains(&self.beta1) || !(0.0..1.0).contains(&self.beta2) {
            return Err(NnError::InvalidConfig(format!(
                "betas must lie in [0, 1), got ({}, {})",
                self.beta1, self.beta2
            )));
        }
        Ok(())
    }

    /// Builds the optimizer over `vars`, which it updates in place.
    pub fn build(&self, vars: Vec<Var>) -> Result<Optimizer> {
        self.validate()?;
        Ok(match self.kind {
            OptimizerKind::Adam => Optimizer::Adam(Adam::new(vars, self)?),
            OptimizerKind::Sgd => Optimizer::Sgd(Sgd::new(vars, self.learning_rate)?),
        })
    }
}

/// A configured optimizer holding handles to the parameters it updates.
pub enum Optimizer {
    Adam(Adam),
    Sgd(Sgd),
}

impl Optimizer {
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        match self {
            Optimizer::Adam(o) => o.step(grads),
            Optimizer::Sgd(o) => o.step(grads),
        }
    }

    /// Clears gradients, backpropagates `loss` and applies one update.
    ///
    /// Gradients are never accumulated across calls: `backward` returns a
    /// fresh store holding only this loss's gradients.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        let grads = loss.backward()?;
        self.step(&grads)
    }

    pub fn learning_rate(&self) -> f64 {
        match self {
            Optimizer::Adam(o) => o.learning_rate(),
            Optimizer::Sgd(o) => o.learning_rate(),
        }
    }
}
