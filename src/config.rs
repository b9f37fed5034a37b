use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::device::DeviceKind;
use crate::error::{NnError, Result};
use crate::network::ModelSpec;
use crate::optim::OptimizerConfig;

/// Everything one training run needs, loadable from a JSON file.
///
/// Missing fields take their defaults, so a config file only has to name
/// what it changes. Command-line flags are applied on top afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory holding (or receiving) `cifar-10-batches-bin/`.
    pub data_dir: PathBuf,
    /// Fetch the dataset when the batch files are absent.
    pub download: bool,
    pub device: DeviceKind,
    pub device_ordinal: usize,
    pub model: ModelSpec,
    pub optimizer: OptimizerConfig,
    pub epochs: usize,
    pub batch_size: usize,
    /// Seeds the shuffle order of both loaders.
    pub seed: Option<u64>,
    /// Weights file rewritten after every epoch.
    pub checkpoint: Option<PathBuf>,
    /// JSON-lines file receiving one `EpochStats` per epoch.
    pub metrics: Option<PathBuf>,
    /// Debug-log every this many training batches; 0 disables.
    pub log_every: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            data_dir: PathBuf::from("cifar"),
            download: true,
            device: DeviceKind::Cpu,
            device_ordinal: 0,
            model: ModelSpec::default(),
            optimizer: OptimizerConfig::default(),
            epochs: 1000,
            batch_size: 200,
            seed: None,
            checkpoint: None,
            metrics: None,
            log_every: 50,
        }
    }
}

impl RunConfig {
    pub fn load_json(path: &Path) -> Result<RunConfig> {
        let file = std::fs::File::open(path)?;
        let config: RunConfig = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(config)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(NnError::InvalidConfig("epochs must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(NnError::InvalidConfig("batch_size must be at least 1".into()));
        }
        self.model.validate()?;
        self.optimizer.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::LeNet5Spec;
    use crate::optim::OptimizerKind;

    #[test]
    fn defaults_match_reference_run() {
        let config = RunConfig::default();
        assert_eq!(config.batch_size, 200);
        assert_eq!(config.epochs, 1000);
        assert_eq!(config.device, DeviceKind::Cpu);
        assert_eq!(config.data_dir, PathBuf::from("cifar"));
        assert!(config.download);
        assert!(matches!(config.model, ModelSpec::ResNet(_)));
        approx::assert_relative_eq!(config.optimizer.learning_rate, 1e-3);
        config.validate().unwrap();
    }

    #[test]
    fn json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let config = RunConfig {
            model: ModelSpec::LeNet5(LeNet5Spec::default()),
            optimizer: OptimizerConfig { kind: OptimizerKind::Sgd, learning_rate: 0.05, ..Default::default() },
            epochs: 3,
            seed: Some(7),
            checkpoint: Some(dir.path().join("w.safetensors")),
            ..Default::default()
        };
        config.save_json(&path).unwrap();
        assert_eq!(RunConfig::load_json(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{ "epochs": 5, "model": { "kind": "lenet5", "in_channels": 3, "input_side": 32, "conv_channels": [16, 32], "hidden": 32, "num_classes": 10 } }"#).unwrap();

        let config = RunConfig::load_json(&path).unwrap();
        assert_eq!(config.epochs, 5);
        assert_eq!(config.batch_size, 200);
        assert_eq!(config.model, ModelSpec::LeNet5(LeNet5Spec::default()));
    }

    #[test]
    fn zero_epochs_or_batch_size_is_rejected() {
        let zero_epochs = RunConfig { epochs: 0, ..Default::default() };
        assert!(matches!(zero_epochs.validate(), Err(NnError::InvalidConfig(_))));
        let zero_batch = RunConfig { batch_size: 0, ..Default::default() };
        assert!(matches!(zero_batch.validate(), Err(NnError::InvalidConfig(_))));
    }
}
