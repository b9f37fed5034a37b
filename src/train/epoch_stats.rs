use serde::{Deserialize, Serialize};

/// Per-epoch statistics emitted by `train_loop`.
///
/// When a `progress_tx` channel is configured in `TrainConfig`, the training
/// loop sends one `EpochStats` value at the end of every completed epoch,
/// i.e. after both its training and evaluation phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Total epochs requested for this run.
    pub total_epochs: usize,
    /// Loss of the last training batch of the epoch.
    pub last_loss: f64,
    /// Sample-weighted mean training loss over the epoch.
    pub mean_loss: f64,
    /// Wall-clock duration of the training phase in milliseconds.
    pub train_ms: u64,
    /// Test accuracy as a fraction in [0, 1].
    pub accuracy: f64,
    pub correct: usize,
    pub total: usize,
    /// Wall-clock duration of the evaluation phase in milliseconds.
    pub eval_ms: u64,
}
