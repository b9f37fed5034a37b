//! Dataset loading, batching and image preprocessing.
//!
//! - [`Cifar10`]: locates (and optionally downloads) the CIFAR-10 binary
//!   release and decodes a split into an [`ImageDataset`]
//! - [`BatchLoader`]: shuffling mini-batch iterator producing device tensors
//! - [`transforms`]: resize + normalize for arbitrary image files

pub mod cifar;
pub mod dataset;
pub mod download;
pub mod error;
pub mod loader;
pub mod transforms;

pub use cifar::{Cifar10, Split, CIFAR10_CLASSES};
pub use dataset::ImageDataset;
pub use error::DataError;
pub use loader::{Batch, BatchLoader};
