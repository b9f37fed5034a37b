use candle_core::{ModuleT, Result, Tensor};
use candle_nn::VarBuilder;

use crate::network::lenet::LeNet5;
use crate::network::resnet::ResNet;
use crate::network::spec::ModelSpec;

/// The selectable image classifiers. Both map `[B, 3, 32, 32]` to `[B, 10]`
/// logits, so the training loop treats them interchangeably.
#[derive(Debug, Clone)]
pub enum Classifier {
    LeNet5(LeNet5),
    ResNet(ResNet),
}

impl Classifier {
    pub fn build(spec: &ModelSpec, vb: VarBuilder) -> Result<Classifier> {
        Ok(match spec {
            ModelSpec::LeNet5(s) => Classifier::LeNet5(LeNet5::new(s, vb.pp("lenet5"))?),
            ModelSpec::ResNet(s) => Classifier::ResNet(ResNet::new(s, vb.pp("resnet"))?),
        })
    }
}

impl ModuleT for Classifier {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        match self {
            Classifier::LeNet5(m) => m.forward_t(xs, train),
            Classifier::ResNet(m) => m.forward_t(xs, train),
        }
    }
}
