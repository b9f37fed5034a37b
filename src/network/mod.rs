pub mod classifier;
pub mod lenet;
pub mod metadata;
pub mod network;
pub mod resnet;
pub mod spec;

pub use classifier::Classifier;
pub use lenet::LeNet5;
pub use metadata::ModelMetadata;
pub use network::Network;
pub use resnet::ResNet;
pub use spec::{LeNet5Spec, ModelKind, ModelSpec, NetworkSpec, ResNetSpec};
