use candle_core::{Module, ModuleT, Result, Tensor};
use candle_nn::{Linear, VarBuilder};

use crate::layers::{ConvBn, ResidualBlock};
use crate::network::spec::ResNetSpec;

/// Compact ResNet for 32×32 images.
///
/// Forward order: stem (3×3 conv + bn) -> ReLU -> residual blocks ->
/// flatten -> linear head. No stage changes the spatial size, so the head
/// sees `final_channels * side * side` features.
#[derive(Debug, Clone)]
pub struct ResNet {
    stem: ConvBn,
    blocks: Vec<ResidualBlock>,
    head: Linear,
    spec: ResNetSpec,
}

impl ResNet {
    pub fn new(spec: &ResNetSpec, vb: VarBuilder) -> Result<ResNet> {
        let stem = ConvBn::new(spec.in_channels, spec.stem_channels, 3, 1, vb.pp("stem"))?;
        let blocks = spec
            .block_channels()
            .into_iter()
            .enumerate()
            .map(|(i, (ch_in, ch_out))| ResidualBlock::new(ch_in, ch_out, vb.pp(format!("blk{}", i + 1))))
            .collect::<Result<Vec<_>>>()?;
        let head = candle_nn::linear(spec.head_in_features(), spec.num_classes, vb.pp("head"))?;
        Ok(ResNet { stem, blocks, head, spec: spec.clone() })
    }

    pub fn blocks(&self) -> &[ResidualBlock] {
        &self.blocks
    }

    pub fn spec(&self) -> &ResNetSpec {
        &self.spec
    }
}

impl ModuleT for ResNet {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let (_, c, h, w) = xs.dims4()?;
        let side = self.spec.input_side;
        if (c, h, w) != (self.spec.in_channels, side, side) {
            candle_core::bail!(
                "resnet expects input [B, {}, {side}, {side}], got {:?}",
                self.spec.in_channels,
                xs.dims()
            );
        }

        let mut xs = self.stem.forward_t(xs, train)?.relu()?;
        for block in &self.blocks {
            xs = block.forward_t(&xs, train)?;
        }

        let features = xs.flatten_from(1)?;
        let width = features.dim(1)?;
        if width != self.spec.head_in_features() {
            candle_core::bail!(
                "classifier head expects {} features, got feature map {:?}",
                self.spec.head_in_features(),
                xs.dims()
            );
        }
        self.head.forward(&features)
    }
}
