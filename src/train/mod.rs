pub mod epoch_stats;
pub mod loop_fn;
pub mod metrics;
pub mod train_config;
pub mod trainer;

pub use epoch_stats::EpochStats;
pub use loop_fn::train_loop;
pub use metrics::{predictions, RunningAccuracy};
pub use train_config::TrainConfig;
pub use trainer::{evaluate, train_epoch, train_step, EvalSummary, TrainSummary};
