use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{NnError, Result};
use crate::network::metadata::ModelMetadata;

/// Shape of the compact residual network.
///
/// Fields:
/// - `in_channels`   — channels of the input images (3 for RGB)
/// - `input_side`    — input height and width
/// - `stem_channels` — output channels of the 3×3 stem convolution
/// - `block_widths`  — output channels of each residual block, in order; a
///                     block projects its shortcut when its width differs
///                     from the previous one
/// - `num_classes`   — number of logits produced by the head
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResNetSpec {
    pub in_channels: usize,
    pub input_side: usize,
    pub stem_channels: usize,
    pub block_widths: Vec<usize>,
    pub num_classes: usize,
}

impl Default for ResNetSpec {
    fn default() -> Self {
        ResNetSpec {
            in_channels: 3,
            input_side: 32,
            stem_channels: 16,
            block_widths: vec![16, 32],
            num_classes: 10,
        }
    }
}

impl ResNetSpec {
    /// `(ch_in, ch_out)` for every residual block.
    pub fn block_channels(&self) -> Vec<(usize, usize)> {
        let mut ch_in = self.stem_channels;
        self.block_widths
            .iter()
            .map(|&ch_out| {
                let pair = (ch_in, ch_out);
                ch_in = ch_out;
                pair
            })
            .collect()
    }

    /// Channels entering the classifier head.
    pub fn final_channels(&self) -> usize {
        self.block_widths.last().copied().unwrap_or(self.stem_channels)
    }

    /// Width of the flattened feature volume fed to the head. Every stage
    /// preserves the spatial size, so this is `channels * side * side`.
    pub fn head_in_features(&self) -> usize {
        self.final_channels() * self.input_side * self.input_side
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_widths.is_empty() {
            return Err(NnError::InvalidConfig("resnet needs at least one residual block".into()));
        }
        if [self.in_channels, self.input_side, self.stem_channels, self.num_classes].contains(&0)
            || self.block_widths.contains(&0)
        {
            return Err(NnError::InvalidConfig(format!("resnet dimensions must be non-zero: {self:?}")));
        }
        Ok(())
    }
}

/// Shape of the LeNet-5 style network: two 5×5 conv + 2×2 max-pool stages,
/// then `flatten -> hidden (ReLU) -> num_classes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeNet5Spec {
    pub in_channels: usize,
    pub input_side: usize,
    pub conv_channels: (usize, usize),
    pub hidden: usize,
    pub num_classes: usize,
}

impl Default for LeNet5Spec {
    fn default() -> Self {
        LeNet5Spec {
            in_channels: 3,
            input_side: 32,
            conv_channels: (16, 32),
            hidden: 32,
            num_classes: 10,
        }
    }
}

impl LeNet5Spec {
    pub const KERNEL: usize = 5;
    pub const POOL: usize = 2;

    /// Side length after both conv/pool stages, or `None` if the input is
    /// too small to survive them.
    pub fn feature_side(&self) -> Option<usize> {
        let stage = |side: usize| side.checked_sub(Self::KERNEL - 1).map(|s| s / Self::POOL);
        stage(self.input_side).and_then(stage).filter(|&s| s > 0)
    }

    /// Width of the flattened feature volume, e.g. `32 * 5 * 5` for 32×32 input.
    pub fn flat_features(&self) -> Option<usize> {
        self.feature_side().map(|s| self.conv_channels.1 * s * s)
    }

    pub fn validate(&self) -> Result<()> {
        if self.feature_side().is_none() {
            return Err(NnError::InvalidConfig(format!(
                "lenet5 input side {} is too small for two {}x{} conv + {}x{} pool stages",
                self.input_side,
                Self::KERNEL,
                Self::KERNEL,
                Self::POOL,
                Self::POOL
            )));
        }
        let (c1, c2) = self.conv_channels;
        if [self.in_channels, c1, c2, self.hidden, self.num_classes].contains(&0) {
            return Err(NnError::InvalidConfig(format!("lenet5 dimensions must be non-zero: {self:?}")));
        }
        Ok(())
    }
}

/// Architecture selector used on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ModelKind {
    #[value(name = "lenet5")]
    LeNet5,
    #[value(name = "resnet")]
    ResNet,
}

impl ModelKind {
    /// The default-shaped spec for this architecture.
    pub fn default_spec(self) -> ModelSpec {
        match self {
            ModelKind::LeNet5 => ModelSpec::LeNet5(LeNet5Spec::default()),
            ModelKind::ResNet => ModelSpec::ResNet(ResNetSpec::default()),
        }
    }
}

/// Which classifier to build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    #[serde(rename = "lenet5")]
    LeNet5(LeNet5Spec),
    #[serde(rename = "resnet")]
    ResNet(ResNetSpec),
}

impl Default for ModelSpec {
    fn default() -> Self {
        ModelSpec::ResNet(ResNetSpec::default())
    }
}

impl ModelSpec {
    pub fn validate(&self) -> Result<()> {
        match self {
            ModelSpec::LeNet5(s) => s.validate(),
            ModelSpec::ResNet(s) => s.validate(),
        }
    }

    /// `[channels, height, width]` of one input sample.
    pub fn input_shape(&self) -> [usize; 3] {
        match self {
            ModelSpec::LeNet5(s) => [s.in_channels, s.input_side, s.input_side],
            ModelSpec::ResNet(s) => [s.in_channels, s.input_side, s.input_side],
        }
    }

    pub fn num_classes(&self) -> usize {
        match self {
            ModelSpec::LeNet5(s) => s.num_classes,
            ModelSpec::ResNet(s) => s.num_classes,
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            ModelSpec::LeNet5(_) => ModelKind::LeNet5,
            ModelSpec::ResNet(_) => ModelKind::ResNet,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ModelSpec::LeNet5(_) => "lenet5",
            ModelSpec::ResNet(_) => "resnet",
        }
    }
}

/// A serializable description of a trained (or to-be-trained) network: its
/// architecture plus optional metadata.
///
/// Written next to every checkpoint so the weights can be reloaded into the
/// exact architecture they were trained with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Human-readable name used in logs.
    pub name: String,
    pub model: ModelSpec,
    #[serde(default)]
    pub metadata: Option<ModelMetadata>,
}

impl NetworkSpec {
    pub fn new(name: impl Into<String>, model: ModelSpec) -> Self {
        NetworkSpec { name: name.into(), model, metadata: None }
    }

    /// Serializes the spec to a pretty-printed JSON file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a `NetworkSpec` from a JSON file.
    pub fn load_json(path: &Path) -> Result<NetworkSpec> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_resnet_head_is_32_by_32_by_32() {
        let spec = ResNetSpec::default();
        assert_eq!(spec.block_channels(), vec![(16, 16), (16, 32)]);
        assert_eq!(spec.head_in_features(), 32 * 32 * 32);
    }

    #[test]
    fn head_width_follows_block_configuration() {
        let spec = ResNetSpec { block_widths: vec![16, 32, 64], input_side: 16, ..Default::default() };
        assert_eq!(spec.block_channels(), vec![(16, 16), (16, 32), (32, 64)]);
        assert_eq!(spec.head_in_features(), 64 * 16 * 16);
    }

    #[test]
    fn lenet_features_for_cifar_are_32x5x5() {
        let spec = LeNet5Spec::default();
        assert_eq!(spec.feature_side(), Some(5));
        assert_eq!(spec.flat_features(), Some(800));
    }

    #[test]
    fn lenet_rejects_tiny_inputs() {
        let spec = LeNet5Spec { input_side: 12, ..Default::default() };
        assert!(matches!(spec.validate(), Err(NnError::InvalidConfig(_))));
    }

    #[test]
    fn empty_block_list_is_invalid() {
        let spec = ModelSpec::ResNet(ResNetSpec { block_widths: vec![], ..Default::default() });
        assert!(spec.validate().is_err());
    }

    #[test]
    fn model_spec_json_is_tagged_by_kind() {
        let json = serde_json::to_value(ModelSpec::LeNet5(LeNet5Spec::default())).unwrap();
        assert_eq!(json["kind"], "lenet5");
        let back: ModelSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, ModelSpec::LeNet5(LeNet5Spec::default()));
    }

    #[test]
    fn network_spec_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.json");
        let spec = NetworkSpec::new("cifar-resnet", ModelSpec::default());
        spec.save_json(&path).unwrap();
        assert_eq!(NetworkSpec::load_json(&path).unwrap(), spec);
    }
}
