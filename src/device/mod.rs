pub mod device_kind;

pub use device_kind::DeviceKind;
