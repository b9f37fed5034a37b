use std::path::{Path, PathBuf};
use std::sync::PoisonError;

use candle_core::{DType, Device, ModuleT, Tensor, Var, D};
use candle_nn::{VarBuilder, VarMap};

use crate::error::Result;
use crate::network::classifier::Classifier;
use crate::network::spec::NetworkSpec;

/// A classifier together with the parameter store that owns its weights.
///
/// Parameters are created on `device` at construction and only ever mutated
/// in place by an optimizer holding handles from [`Network::trainable_vars`].
pub struct Network {
    varmap: VarMap,
    model: Classifier,
    spec: NetworkSpec,
    device: Device,
}

impl Network {
    /// Builds a freshly initialized network on `device`.
    pub fn new(spec: NetworkSpec, device: &Device) -> Result<Network> {
        spec.model.validate()?;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let model = Classifier::build(&spec.model, vb)?;
        tracing::debug!(name = %spec.name, kind = spec.model.kind_name(), "built network");
        Ok(Network { varmap, model, spec, device: device.clone() })
    }

    /// Logits for a `[B, C, H, W]` batch. `train` selects batch statistics
    /// (and updates running statistics) in batch-norm layers.
    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        Ok(self.model.forward_t(xs, train)?)
    }

    /// Arg-max class per sample, computed in eval mode.
    pub fn predict(&self, xs: &Tensor) -> Result<Vec<u32>> {
        let logits = self.forward_t(xs, false)?.detach();
        Ok(logits.argmax(D::Minus1)?.to_vec1::<u32>()?)
    }

    /// Every stored variable, sorted by name.
    pub fn named_vars(&self) -> Vec<(String, Var)> {
        let data = self.varmap.data().lock().unwrap_or_else(PoisonError::into_inner);
        let mut vars: Vec<_> = data.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        vars.sort_by(|a, b| a.0.cmp(&b.0));
        vars
    }

    /// Variables the optimizer updates. Batch-norm running statistics are
    /// stored alongside but excluded here.
    pub fn trainable_vars(&self) -> Vec<Var> {
        self.named_vars()
            .into_iter()
            .filter(|(name, _)| !is_running_stat(name))
            .map(|(_, var)| var)
            .collect()
    }

    /// Number of trainable scalars.
    pub fn parameter_count(&self) -> usize {
        self.trainable_vars().iter().map(|v| v.elem_count()).sum()
    }

    pub fn model(&self) -> &Classifier {
        &self.model
    }

    pub fn spec(&self) -> &NetworkSpec {
        &self.spec
    }

    pub fn spec_mut(&mut self) -> &mut NetworkSpec {
        &mut self.spec
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Writes the weights as safetensors to `weights_path` and the
    /// [`NetworkSpec`] as JSON next to it (same stem, `.json` extension).
    pub fn save(&self, weights_path: &Path) -> Result<()> {
        if let Some(parent) = weights_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        self.varmap.save(weights_path)?;
        self.spec.save_json(&spec_path(weights_path))?;
        tracing::debug!(path = %weights_path.display(), "saved checkpoint");
        Ok(())
    }

    /// Rebuilds the network described by the JSON sidecar of
    /// `weights_path` and loads the stored weights into it.
    pub fn load(weights_path: &Path, device: &Device) -> Result<Network> {
        let spec = NetworkSpec::load_json(&spec_path(weights_path))?;
        let mut network = Network::new(spec, device)?;
        network.varmap.load(weights_path)?;
        Ok(network)
    }
}

impl ModuleT for Network {
    fn forward_t(&self, xs: &Tensor, train: bool) -> candle_core::Result<Tensor> {
        self.model.forward_t(xs, train)
    }
}

/// JSON sidecar path for a checkpoint file.
pub fn spec_path(weights_path: &Path) -> PathBuf {
    weights_path.with_extension("json")
}

fn is_running_stat(name: &str) -> bool {
    name.ends_with(".running_mean") || name.ends_with(".running_var")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::spec::{LeNet5Spec, ModelSpec};

    fn lenet() -> Network {
        let spec = NetworkSpec::new("lenet", ModelSpec::LeNet5(LeNet5Spec::default()));
        Network::new(spec, &Device::Cpu).unwrap()
    }

    #[test]
    fn lenet_parameter_count_matches_layer_shapes() {
        let expected = (3 * 16 * 25 + 16) + (16 * 32 * 25 + 32) + (800 * 32 + 32) + (32 * 10 + 10);
        assert_eq!(lenet().parameter_count(), expected);
    }

    #[test]
    fn running_statistics_are_not_trainable() {
        let net = Network::new(NetworkSpec::new("resnet", ModelSpec::default()), &Device::Cpu).unwrap();
        let all = net.named_vars();
        assert!(all.iter().any(|(n, _)| n.ends_with("running_mean")));
        assert!(net.trainable_vars().len() < all.len());
    }

    #[test]
    fn predict_returns_one_class_per_sample() {
        let net = lenet();
        let xs = Tensor::randn(0f32, 1f32, (3, 3, 32, 32), &Device::Cpu).unwrap();
        let preds = net.predict(&xs).unwrap();
        assert_eq!(preds.len(), 3);
        assert!(preds.iter().all(|&p| p < 10));
        assert_eq!(net.predict(&xs).unwrap(), preds);
    }

    #[test]
    fn save_then_load_reproduces_logits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ckpt").join("lenet.safetensors");
        let net = lenet();
        net.save(&path).unwrap();
        assert!(spec_path(&path).is_file());

        let restored = Network::load(&path, &Device::Cpu).unwrap();
        assert_eq!(restored.spec(), net.spec());

        let xs = Tensor::randn(0f32, 1f32, (2, 3, 32, 32), &Device::Cpu).unwrap();
        let a = net.forward_t(&xs, false).unwrap();
        let b = restored.forward_t(&xs, false).unwrap();
        let diff = (a - b).unwrap().abs().unwrap().max_keepdim(1).unwrap().flatten_all().unwrap();
        for d in diff.to_vec1::<f32>().unwrap() {
            approx::assert_abs_diff_eq!(d, 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn invalid_spec_is_rejected_before_building() {
        let spec = NetworkSpec::new("tiny", ModelSpec::LeNet5(LeNet5Spec { input_side: 8, ..Default::default() }));
        assert!(matches!(Network::new(spec, &Device::Cpu), Err(crate::NnError::InvalidConfig(_))));
    }
}
