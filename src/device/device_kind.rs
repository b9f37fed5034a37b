use std::fmt;

use candle_core::Device;
use serde::{Deserialize, Serialize};

use crate::error::{NnError, Result};

/// Which compute device parameters and batches live on.
///
/// - `Cuda`  — discrete accelerator (needs the `cuda` feature)
/// - `Metal` — integrated accelerator (needs the `metal` feature)
/// - `Cpu`   — always available
///
/// The choice is made once per run and threaded explicitly through model
/// construction and batch loading. An unavailable accelerator is an error;
/// there is no silent fallback to another device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Cuda,
    Metal,
    #[default]
    Cpu,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceKind::Cuda => "cuda",
            DeviceKind::Metal => "metal",
            DeviceKind::Cpu => "cpu",
        };
        f.write_str(name)
    }
}

impl DeviceKind {
    /// Opens the device. `ordinal` is ignored for `Cpu`.
    pub fn open(self, ordinal: usize) -> Result<Device> {
        let opened = match self {
            DeviceKind::Cpu => return Ok(Device::Cpu),
            DeviceKind::Cuda => Device::new_cuda(ordinal),
            DeviceKind::Metal => Device::new_metal(ordinal),
        };
        opened.map_err(|source| NnError::DeviceUnavailable { kind: self, ordinal, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_always_opens() {
        let device = DeviceKind::Cpu.open(3).unwrap();
        assert!(device.is_cpu());
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn cuda_without_support_is_an_error() {
        let err = DeviceKind::Cuda.open(0).unwrap_err();
        assert!(matches!(err, NnError::DeviceUnavailable { kind: DeviceKind::Cuda, .. }));
    }

    #[test]
    fn serde_uses_snake_case_names() {
        let json = serde_json::to_string(&DeviceKind::Metal).unwrap();
        assert_eq!(json, "\"metal\"");
        let back: DeviceKind = serde_json::from_str("\"cuda\"").unwrap();
        assert_eq!(back, DeviceKind::Cuda);
    }
}
