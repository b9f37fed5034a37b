use serde::{Deserialize, Serialize};

use crate::data::CIFAR10_CLASSES;

/// Optional annotations attached to a saved network.
/// All fields are optional so specs without metadata deserialize cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ModelMetadata {
    pub description: Option<String>,
    /// Human-readable class labels, indexed by logit position.
    pub class_names: Option<Vec<String>>,
    /// Last completed epoch when the checkpoint was written.
    pub epoch: Option<usize>,
    /// Test accuracy measured right after that epoch.
    pub accuracy: Option<f64>,
}

impl ModelMetadata {
    pub fn cifar10() -> Self {
        ModelMetadata {
            description: Some("CIFAR-10 image classifier".into()),
            class_names: Some(CIFAR10_CLASSES.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }
    }

    /// Label for class `index`, falling back to the index itself.
    pub fn class_name(&self, index: usize) -> String {
        self.class_names
            .as_ref()
            .and_then(|names| names.get(index).cloned())
            .unwrap_or_else(|| index.to_string())
    }
}
