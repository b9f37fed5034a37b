use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{atomic::AtomicBool, Arc};

use crate::train::epoch_stats::EpochStats;

/// Configuration for a `train_loop` run.
///
/// # Fields
/// - `epochs`      — total number of train + evaluate cycles
/// - `checkpoint`  — optional weights path; rewritten after every epoch
/// - `log_every`   — emit a debug line every this many training batches
///                   (`0` disables per-batch logging)
/// - `progress_tx` — optional channel sender; one `EpochStats` is sent per
///                   completed epoch.  If the receiver is dropped the loop
///                   terminates early (clean shutdown).
/// - `stop_flag`   — optional atomic flag; when set to `true` from another
///                   thread the loop terminates after the current phase.
pub struct TrainConfig {
    pub epochs: usize,
    pub checkpoint: Option<PathBuf>,
    pub log_every: usize,
    pub progress_tx: Option<mpsc::Sender<EpochStats>>,
    pub stop_flag: Option<Arc<AtomicBool>>,
}

impl TrainConfig {
    /// Creates a minimal `TrainConfig` with no checkpointing, no progress
    /// channel and no stop flag.
    pub fn new(epochs: usize) -> Self {
        TrainConfig {
            epochs,
            checkpoint: None,
            log_every: 0,
            progress_tx: None,
            stop_flag: None,
        }
    }
}
