use candle_core::{Module, ModuleT, Result, Tensor};
use candle_nn::{BatchNorm, BatchNormConfig, Conv2d, Conv2dConfig, VarBuilder};

/// Convolution (stride 1) followed by batch normalization.
///
/// Parameters live under `<prefix>.conv` and `<prefix>.bn`.
#[derive(Debug, Clone)]
pub struct ConvBn {
    conv: Conv2d,
    bn: BatchNorm,
    in_channels: usize,
    out_channels: usize,
}

impl ConvBn {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        padding: usize,
        vb: VarBuilder,
    ) -> Result<ConvBn> {
        let cfg = Conv2dConfig { padding, stride: 1, ..Default::default() };
        let conv = candle_nn::conv2d(in_channels, out_channels, kernel, cfg, vb.pp("conv"))?;
        let bn = candle_nn::batch_norm(out_channels, BatchNormConfig::default(), vb.pp("bn"))?;
        Ok(ConvBn { conv, bn, in_channels, out_channels })
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }
}

impl ModuleT for ConvBn {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        self.conv.forward(xs)?.apply_t(&self.bn, train)
    }
}
