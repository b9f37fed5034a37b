pub mod config;
pub mod data;
pub mod device;
pub mod error;
pub mod layers;
pub mod loss;
pub mod network;
pub mod optim;
pub mod train;

// Convenience re-exports
pub use config::RunConfig;
pub use data::{BatchLoader, Cifar10, ImageDataset, Split};
pub use device::DeviceKind;
pub use error::{NnError, Result};
pub use loss::CrossEntropyLoss;
pub use network::{ModelKind, ModelSpec, Network, NetworkSpec};
pub use optim::{Optimizer, OptimizerConfig, OptimizerKind};
pub use train::{train_loop, EpochStats, TrainConfig};
