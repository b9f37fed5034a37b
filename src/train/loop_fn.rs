use std::sync::atomic::Ordering;

use crate::data::BatchLoader;
use crate::error::{NnError, Result};
use crate::network::{ModelMetadata, Network};
use crate::optim::Optimizer;
use crate::train::epoch_stats::EpochStats;
use crate::train::train_config::TrainConfig;
use crate::train::trainer::{evaluate, train_epoch};

/// Alternates a training pass and an evaluation pass for `config.epochs`
/// epochs and returns the stats of the last completed epoch.
///
/// The loop stops early, keeping every completed epoch, when:
/// - `config.stop_flag` is set (checked before each phase), or
/// - the `progress_tx` receiver has been dropped.
///
/// `Ok(None)` means no epoch completed. Any error aborts the run.
pub fn train_loop(
    network: &mut Network,
    optimizer: &mut Optimizer,
    train: &mut BatchLoader,
    test: &mut BatchLoader,
    config: &TrainConfig,
) -> Result<Option<EpochStats>> {
    check_device(network, train, "train")?;
    check_device(network, test, "test")?;
    if train.dataset().is_empty() {
        return Err(NnError::InvalidConfig("training split is empty".into()));
    }

    tracing::info!(
        network = %network.spec().name,
        epochs = config.epochs,
        train_samples = train.dataset().len(),
        test_samples = test.dataset().len(),
        batch_size = train.batch_size(),
        learning_rate = optimizer.learning_rate(),
        "starting training"
    );

    let mut last = None;
    for epoch in 1..=config.epochs {
        if stop_requested(config) {
            tracing::info!(epoch, "stop requested before training phase");
            break;
        }
        let summary = train_epoch(network, optimizer, train, config.log_every)?;
        tracing::info!(
            epoch,
            loss = summary.last_loss,
            mean_loss = summary.mean_loss,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "trained epoch"
        );

        if stop_requested(config) {
            tracing::info!(epoch, "stop requested before evaluation phase");
            break;
        }
        let eval = evaluate(network, test)?;
        tracing::info!(
            epoch,
            accuracy = eval.accuracy,
            correct = eval.metrics.correct(),
            total = eval.metrics.total(),
            elapsed_ms = eval.elapsed.as_millis() as u64,
            "evaluated epoch"
        );

        let stats = EpochStats {
            epoch,
            total_epochs: config.epochs,
            last_loss: summary.last_loss,
            mean_loss: summary.mean_loss,
            train_ms: summary.elapsed.as_millis() as u64,
            accuracy: eval.accuracy,
            correct: eval.metrics.correct(),
            total: eval.metrics.total(),
            eval_ms: eval.elapsed.as_millis() as u64,
        };

        if let Some(path) = &config.checkpoint {
            let metadata = network.spec_mut().metadata.get_or_insert_with(ModelMetadata::default);
            metadata.epoch = Some(epoch);
            metadata.accuracy = Some(eval.accuracy);
            network.save(path)?;
            tracing::info!(epoch, path = %path.display(), "wrote checkpoint");
        }

        last = Some(stats.clone());
        if let Some(tx) = &config.progress_tx {
            if tx.send(stats).is_err() {
                tracing::info!(epoch, "progress receiver dropped, stopping");
                break;
            }
        }
    }

    Ok(last)
}

fn stop_requested(config: &TrainConfig) -> bool {
    config.stop_flag.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed))
}

fn check_device(network: &Network, loader: &BatchLoader, split: &str) -> Result<()> {
    if network.device().same_device(loader.device()) {
        Ok(())
    } else {
        Err(NnError::InvalidConfig(format!(
            "{split} loader is on {:?} but the network is on {:?}",
            loader.device().location(),
            network.device().location()
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::{mpsc, Arc};

    use super::*;
    use crate::data::ImageDataset;
    use crate::network::{LeNet5Spec, ModelSpec, NetworkSpec};
    use crate::optim::OptimizerConfig;
    use candle_core::Device;

    fn dataset(n: usize) -> ImageDataset {
        let pixels = (0..n * 3 * 32 * 32).map(|i| (i * 13 % 256) as u8).collect();
        let labels = (0..n).map(|i| (i % 10) as u8).collect();
        ImageDataset::new(pixels, labels, (3, 32, 32), 10).unwrap()
    }

    fn setup() -> (Network, Optimizer, BatchLoader, BatchLoader) {
        let spec = NetworkSpec::new("lenet", ModelSpec::LeNet5(LeNet5Spec::default()));
        let net = Network::new(spec, &Device::Cpu).unwrap();
        let opt = OptimizerConfig::default().build(net.trainable_vars()).unwrap();
        let train = BatchLoader::new(dataset(8), 4, &Device::Cpu).unwrap().seed(1);
        let test = BatchLoader::new(dataset(5), 4, &Device::Cpu).unwrap().seed(2);
        (net, opt, train, test)
    }

    #[test]
    fn emits_one_stats_per_epoch() {
        let (mut net, mut opt, mut train, mut test) = setup();
        let (tx, rx) = mpsc::channel();
        let config = TrainConfig { progress_tx: Some(tx), ..TrainConfig::new(2) };

        let last = train_loop(&mut net, &mut opt, &mut train, &mut test, &config).unwrap().unwrap();
        drop(config);
        let all: Vec<EpochStats> = rx.iter().collect();
        assert_eq!(all.iter().map(|s| s.epoch).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(all[1], last);
        assert_eq!(last.total, 5);
    }

    #[test]
    fn preset_stop_flag_runs_no_epochs() {
        let (mut net, mut opt, mut train, mut test) = setup();
        let config = TrainConfig { stop_flag: Some(Arc::new(AtomicBool::new(true))), ..TrainConfig::new(3) };
        assert!(train_loop(&mut net, &mut opt, &mut train, &mut test, &config).unwrap().is_none());
    }

    #[test]
    fn dropped_receiver_stops_after_first_epoch() {
        let (mut net, mut opt, mut train, mut test) = setup();
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let config = TrainConfig { progress_tx: Some(tx), ..TrainConfig::new(5) };
        let last = train_loop(&mut net, &mut opt, &mut train, &mut test, &config).unwrap().unwrap();
        assert_eq!(last.epoch, 1);
    }

    #[test]
    fn checkpoint_records_epoch_and_accuracy() {
        let (mut net, mut opt, mut train, mut test) = setup();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lenet.safetensors");
        let config = TrainConfig { checkpoint: Some(path.clone()), ..TrainConfig::new(1) };
        let last = train_loop(&mut net, &mut opt, &mut train, &mut test, &config).unwrap().unwrap();

        let restored = Network::load(&path, &Device::Cpu).unwrap();
        let metadata = restored.spec().metadata.clone().unwrap();
        assert_eq!(metadata.epoch, Some(1));
        assert_eq!(metadata.accuracy, Some(last.accuracy));
    }

    #[test]
    fn empty_train_split_is_rejected() {
        let (mut net, mut opt, _, mut test) = setup();
        let empty = ImageDataset::new(vec![], vec![], (3, 32, 32), 10).unwrap();
        let mut train = BatchLoader::new(empty, 4, &Device::Cpu).unwrap();
        let config = TrainConfig::new(1);
        assert!(matches!(
            train_loop(&mut net, &mut opt, &mut train, &mut test, &config),
            Err(NnError::InvalidConfig(_))
        ));
    }
}
