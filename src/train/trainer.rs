use std::time::{Duration, Instant};

use crate::data::{Batch, BatchLoader};
use crate::error::{NnError, Result};
use crate::loss::CrossEntropyLoss;
use crate::network::Network;
use crate::optim::Optimizer;
use crate::train::metrics::RunningAccuracy;

/// Outcome of one training pass over the loader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainSummary {
    pub last_loss: f64,
    pub mean_loss: f64,
    pub batches: usize,
    pub samples: usize,
    pub elapsed: Duration,
}

/// Outcome of one evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalSummary {
    pub metrics: RunningAccuracy,
    pub accuracy: f64,
    pub elapsed: Duration,
}

/// One optimization step on `batch`: forward in training mode,
/// cross-entropy against the labels, then clear/backprop/update.
///
/// Returns the batch loss before the update.
pub fn train_step(network: &Network, optimizer: &mut Optimizer, batch: &Batch) -> Result<f32> {
    let logits = network.forward_t(&batch.images, true)?;
    let loss = CrossEntropyLoss::loss(&logits, &batch.labels)?;
    optimizer.backward_step(&loss)?;
    Ok(loss.to_scalar::<f32>()?)
}

/// Runs one full pass of mini-batch training.
///
/// `log_every` > 0 emits a debug line every that many batches.
pub fn train_epoch(
    network: &Network,
    optimizer: &mut Optimizer,
    loader: &mut BatchLoader,
    log_every: usize,
) -> Result<TrainSummary> {
    let start = Instant::now();
    let mut last_loss = 0.0;
    let mut weighted_loss = 0.0;
    let mut batches = 0usize;
    let mut samples = 0usize;

    for batch in loader.iter() {
        let batch = batch?;
        let loss = train_step(network, optimizer, &batch)? as f64;
        if !loss.is_finite() {
            tracing::warn!(batch = batches, loss, "non-finite training loss");
        }

        last_loss = loss;
        weighted_loss += loss * batch.len() as f64;
        samples += batch.len();
        batches += 1;

        if log_every > 0 && batches % log_every == 0 {
            tracing::debug!(batch = batches, loss, "training");
        }
    }

    if samples == 0 {
        return Err(NnError::InvalidConfig("training split produced no samples".into()));
    }

    Ok(TrainSummary {
        last_loss,
        mean_loss: weighted_loss / samples as f64,
        batches,
        samples,
        elapsed: start.elapsed(),
    })
}

/// Scores the network on every batch of `loader` in eval mode.
///
/// Logits are detached, so no gradient graph outlives a batch.
pub fn evaluate(network: &Network, loader: &mut BatchLoader) -> Result<EvalSummary> {
    let start = Instant::now();
    let mut metrics = RunningAccuracy::new();
    for batch in loader.iter() {
        let batch = batch?;
        let logits = network.forward_t(&batch.images, false)?.detach();
        metrics.update(&logits, &batch.labels)?;
    }
    let accuracy = metrics.accuracy()?;
    Ok(EvalSummary { metrics, accuracy, elapsed: start.elapsed() })
}
