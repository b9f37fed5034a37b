use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use anyhow::{bail, Context, Result};
use candle_core::{DType, Device, Tensor, D};
use clap::{Args, Parser, Subcommand};

use cifar_nn::data::transforms::image_file_to_tensor;
use cifar_nn::data::{BatchLoader, Cifar10, Split};
use cifar_nn::network::{Classifier, ModelMetadata};
use cifar_nn::{
    train_loop, DeviceKind, EpochStats, ModelKind, Network, NetworkSpec, OptimizerKind, RunConfig,
    TrainConfig,
};

/// Train and run small convolutional classifiers on CIFAR-10.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a model, evaluating on the test split after every epoch.
    Train(TrainArgs),
    /// Classify one image file with a saved checkpoint.
    Predict(PredictArgs),
    /// Print the layer shapes and parameter count of a model.
    Describe(DescribeArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// JSON run configuration; flags below override its values.
    #[clap(long, env = "CIFAR_NN_CONFIG")]
    config: Option<PathBuf>,
    /// Directory holding (or receiving) the CIFAR-10 binary batches.
    #[clap(long, env = "CIFAR_NN_DATA_DIR")]
    data_dir: Option<PathBuf>,
    #[clap(long, value_enum, env = "CIFAR_NN_DEVICE")]
    device: Option<DeviceKind>,
    /// Accelerator index for cuda/metal.
    #[clap(long)]
    device_ordinal: Option<usize>,
    /// Architecture to train; replaces the configured model when it differs.
    #[clap(long, value_enum)]
    model: Option<ModelKind>,
    #[clap(long)]
    epochs: Option<usize>,
    #[clap(long)]
    batch_size: Option<usize>,
    #[clap(long)]
    learning_rate: Option<f64>,
    #[clap(long, value_enum)]
    optimizer: Option<OptimizerKind>,
    /// Weights file rewritten after every epoch.
    #[clap(long)]
    checkpoint: Option<PathBuf>,
    /// JSON-lines file receiving one record per epoch.
    #[clap(long)]
    metrics: Option<PathBuf>,
    /// Fail instead of downloading missing dataset files.
    #[clap(long)]
    no_download: bool,
    /// Seed for the shuffle order.
    #[clap(long)]
    seed: Option<u64>,
    /// Write the effective configuration to this file and continue.
    #[clap(long)]
    save_config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PredictArgs {
    /// Weights file; its `.json` sidecar describes the architecture.
    #[clap(long)]
    checkpoint: PathBuf,
    /// Image to classify (png, jpeg, bmp or gif).
    #[clap(long)]
    image: PathBuf,
    /// Expected architecture; checked against the checkpoint.
    #[clap(long, value_enum)]
    model: Option<ModelKind>,
    #[clap(long, value_enum, default_value = "cpu", env = "CIFAR_NN_DEVICE")]
    device: DeviceKind,
    #[clap(long, default_value_t = 0)]
    device_ordinal: usize,
}

#[derive(Args, Debug)]
struct DescribeArgs {
    #[clap(long, value_enum, default_value = "resnet")]
    model: ModelKind,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Train(args) => train(args),
        Command::Predict(args) => predict(args),
        Command::Describe(args) => describe(args),
    }
}

fn resolve_config(args: &TrainArgs) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load_json(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => RunConfig::default(),
    };

    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(device) = args.device {
        config.device = device;
    }
    if let Some(ordinal) = args.device_ordinal {
        config.device_ordinal = ordinal;
    }
    if let Some(kind) = args.model {
        if config.model.kind() != kind {
            config.model = kind.default_spec();
        }
    }
    if let Some(epochs) = args.epochs {
        config.epochs = epochs;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(lr) = args.learning_rate {
        config.optimizer.learning_rate = lr;
    }
    if let Some(kind) = args.optimizer {
        config.optimizer.kind = kind;
    }
    if args.checkpoint.is_some() {
        config.checkpoint = args.checkpoint.clone();
    }
    if args.metrics.is_some() {
        config.metrics = args.metrics.clone();
    }
    if args.no_download {
        config.download = false;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    config.validate().context("invalid run configuration")?;
    Ok(config)
}

fn train(args: TrainArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    if let Some(path) = &args.save_config {
        config
            .save_json(path)
            .with_context(|| format!("failed to write config {}", path.display()))?;
        tracing::info!(path = %path.display(), "saved effective configuration");
    }

    let device = config.device.open(config.device_ordinal)?;
    tracing::info!(device = %config.device, ordinal = config.device_ordinal, "using device");

    let cifar = Cifar10::new(&config.data_dir, config.download);
    let train_set = cifar.load(Split::Train).context("failed to load the training split")?;
    let test_set = cifar.load(Split::Test).context("failed to load the test split")?;

    let mut train_loader = BatchLoader::new(train_set, config.batch_size, &device)?;
    let mut test_loader = BatchLoader::new(test_set, config.batch_size, &device)?;
    if let Some(seed) = config.seed {
        train_loader = train_loader.seed(seed);
        test_loader = test_loader.seed(seed.wrapping_add(1));
    }

    if let Some(first) = train_loader.iter().next() {
        let first = first?;
        tracing::info!(
            images = ?first.images.dims(),
            labels = ?first.labels.dims(),
            "first training batch"
        );
    }

    let mut spec = NetworkSpec::new(config.model.kind_name(), config.model.clone());
    spec.metadata = Some(ModelMetadata::cifar10());
    let mut network = Network::new(spec, &device)?;
    tracing::info!(
        model = network.spec().model.kind_name(),
        parameters = network.parameter_count(),
        "built model"
    );

    let mut optimizer = config.optimizer.build(network.trainable_vars())?;

    let (progress_tx, writer) = match &config.metrics {
        Some(path) => {
            let (tx, handle) = spawn_metrics_writer(path)?;
            (Some(tx), Some(handle))
        }
        None => (None, None),
    };

    let train_config = TrainConfig {
        checkpoint: config.checkpoint.clone(),
        log_every: config.log_every,
        progress_tx,
        ..TrainConfig::new(config.epochs)
    };

    let outcome = train_loop(&mut network, &mut optimizer, &mut train_loader, &mut test_loader, &train_config);
    drop(train_config);
    if let Some(handle) = writer {
        match handle.join() {
            Ok(written) => written.context("failed to write metrics")?,
            Err(_) => bail!("metrics writer thread panicked"),
        }
    }

    match outcome? {
        Some(last) => tracing::info!(
            epoch = last.epoch,
            accuracy = last.accuracy,
            loss = last.last_loss,
            "training finished"
        ),
        None => tracing::info!("training stopped before the first epoch completed"),
    }
    Ok(())
}

/// Appends every received `EpochStats` as one JSON line. Ends when the
/// sender side is dropped.
fn spawn_metrics_writer(
    path: &Path,
) -> Result<(mpsc::Sender<EpochStats>, thread::JoinHandle<std::io::Result<()>>)> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let (tx, rx) = mpsc::channel::<EpochStats>();
    let handle = thread::spawn(move || {
        let mut out = BufWriter::new(file);
        for stats in rx {
            serde_json::to_writer(&mut out, &stats)?;
            out.write_all(b"\n")?;
            out.flush()?;
        }
        Ok(())
    });
    Ok((tx, handle))
}

fn predict(args: PredictArgs) -> Result<()> {
    let device = args.device.open(args.device_ordinal)?;
    let network = Network::load(&args.checkpoint, &device)
        .with_context(|| format!("failed to load checkpoint {}", args.checkpoint.display()))?;
    if let Some(kind) = args.model {
        let stored = network.spec().model.kind();
        if stored != kind {
            bail!("checkpoint holds a {:?} model, not {:?}", stored, kind);
        }
    }

    let [_, side, _] = network.spec().model.input_shape();
    let image = image_file_to_tensor(&args.image, side as u32, &device)
        .with_context(|| format!("failed to read image {}", args.image.display()))?;
    let logits = network.forward_t(&image, false)?.detach();
    let probs = candle_nn::ops::softmax(&logits, D::Minus1)?.squeeze(0)?.to_vec1::<f32>()?;
    let class = logits.argmax(D::Minus1)?.squeeze(0)?.to_scalar::<u32>()? as usize;

    let metadata = network.spec().metadata.clone().unwrap_or_default();
    let confidence = probs.get(class).copied().unwrap_or(0.0);
    println!("{} ({:.1}%)", metadata.class_name(class), confidence * 100.0);
    Ok(())
}

fn describe(args: DescribeArgs) -> Result<()> {
    let model = args.model.default_spec();
    let spec = NetworkSpec::new(model.kind_name(), model);
    let network = Network::new(spec, &Device::Cpu)?;

    println!("model: {}", network.spec().model.kind_name());
    println!("{}", serde_json::to_string_pretty(&network.spec().model)?);
    for (name, var) in network.named_vars() {
        println!("  {name:<40} {:?}", var.dims());
    }
    println!("trainable parameters: {}", network.parameter_count());

    let probe = Tensor::zeros((2, 3, 32, 32), DType::F32, &Device::Cpu)?;
    if let Classifier::LeNet5(lenet) = network.model() {
        println!("conv stage output for {:?}: {:?}", probe.dims(), lenet.features(&probe)?.dims());
    }
    println!("logits for {:?}: {:?}", probe.dims(), network.forward_t(&probe, false)?.dims());
    Ok(())
}
