use candle_core::{Module, ModuleT, Result, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, Linear, VarBuilder};

use crate::network::spec::LeNet5Spec;

/// LeNet-5 style classifier.
///
/// `[B, 3, 32, 32]` -> conv5 -> pool2 -> conv5 -> pool2 -> `[B, 32, 5, 5]`
/// -> flatten (800) -> linear (32) -> ReLU -> linear (10).
#[derive(Debug, Clone)]
pub struct LeNet5 {
    conv1: Conv2d,
    conv2: Conv2d,
    fc1: Linear,
    fc2: Linear,
    spec: LeNet5Spec,
    flat_features: usize,
}

impl LeNet5 {
    pub fn new(spec: &LeNet5Spec, vb: VarBuilder) -> Result<LeNet5> {
        let flat_features = match spec.flat_features() {
            Some(n) => n,
            None => candle_core::bail!("lenet5 input side {} is too small", spec.input_side),
        };
        let (c1, c2) = spec.conv_channels;
        let cfg = Conv2dConfig::default();
        let conv1 = candle_nn::conv2d(spec.in_channels, c1, LeNet5Spec::KERNEL, cfg, vb.pp("conv1"))?;
        let conv2 = candle_nn::conv2d(c1, c2, LeNet5Spec::KERNEL, cfg, vb.pp("conv2"))?;
        let fc1 = candle_nn::linear(flat_features, spec.hidden, vb.pp("fc1"))?;
        let fc2 = candle_nn::linear(spec.hidden, spec.num_classes, vb.pp("fc2"))?;
        Ok(LeNet5 { conv1, conv2, fc1, fc2, spec: spec.clone(), flat_features })
    }

    /// Output of the conv/pool stages, before flattening.
    pub fn features(&self, xs: &Tensor) -> Result<Tensor> {
        let pool = LeNet5Spec::POOL;
        self.conv1
            .forward(xs)?
            .max_pool2d_with_stride(pool, pool)?
            .apply(&self.conv2)?
            .max_pool2d_with_stride(pool, pool)
    }

    pub fn spec(&self) -> &LeNet5Spec {
        &self.spec
    }
}

// No dropout or batch norm, so train and eval share one path.
impl ModuleT for LeNet5 {
    fn forward_t(&self, xs: &Tensor, _train: bool) -> Result<Tensor> {
        let features = self.features(xs)?;
        let batch = features.dim(0)?;
        let flat = features.flatten_from(1)?;
        if flat.dim(1)? != self.flat_features {
            candle_core::bail!(
                "lenet5 head expects [{batch}, {}], conv stages produced {:?} from input {:?}",
                self.flat_features,
                features.dims(),
                xs.dims()
            );
        }
        self.fc2.forward(&self.fc1.forward(&flat)?.relu()?)
    }
}
