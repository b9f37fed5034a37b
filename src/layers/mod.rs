pub mod conv_bn;
pub mod residual;

pub use conv_bn::ConvBn;
pub use residual::{ResidualBlock, Shortcut};
