use candle_core::{ModuleT, Result, Tensor};
use candle_nn::VarBuilder;

use crate::layers::conv_bn::ConvBn;

/// Skip path of a [`ResidualBlock`].
#[derive(Debug, Clone)]
pub enum Shortcut {
    /// Input passed through unchanged (`ch_in == ch_out`).
    Identity,
    /// 1×1 convolution + batch norm mapping `ch_in -> ch_out`.
    Projection(ConvBn),
}

impl ModuleT for Shortcut {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        match self {
            Shortcut::Identity => Ok(xs.clone()),
            Shortcut::Projection(proj) => proj.forward_t(xs, train),
        }
    }
}

/// Two 3×3 conv + batch-norm stages with a skip connection.
///
/// `[B, ch_in, H, W] -> [B, ch_out, H, W]`: both convolutions use stride 1
/// and padding 1, so spatial size is preserved. The sum of the main and skip
/// paths is returned as-is, without a trailing ReLU.
#[derive(Debug, Clone)]
pub struct ResidualBlock {
    stage1: ConvBn,
    stage2: ConvBn,
    shortcut: Shortcut,
}

impl ResidualBlock {
    pub fn new(ch_in: usize, ch_out: usize, vb: VarBuilder) -> Result<ResidualBlock> {
        let stage1 = ConvBn::new(ch_in, ch_out, 3, 1, vb.pp("stage1"))?;
        let stage2 = ConvBn::new(ch_out, ch_out, 3, 1, vb.pp("stage2"))?;
        let shortcut = if ch_in == ch_out {
            Shortcut::Identity
        } else {
            Shortcut::Projection(ConvBn::new(ch_in, ch_out, 1, 0, vb.pp("shortcut"))?)
        };
        Ok(ResidualBlock { stage1, stage2, shortcut })
    }

    pub fn ch_in(&self) -> usize {
        self.stage1.in_channels()
    }

    pub fn ch_out(&self) -> usize {
        self.stage2.out_channels()
    }

    pub fn shortcut(&self) -> &Shortcut {
        &self.shortcut
    }
}

impl ModuleT for ResidualBlock {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let (_, c, _, _) = xs.dims4()?;
        if c != self.ch_in() {
            candle_core::bail!(
                "residual block {}->{} expects {} input channels, got input shape {:?}",
                self.ch_in(),
                self.ch_out(),
                self.ch_in(),
                xs.dims()
            );
        }
        let out = self.stage1.forward_t(xs, train)?.relu()?;
        let out = self.stage2.forward_t(&out, train)?;
        let skip = self.shortcut.forward_t(xs, train)?;
        out.add(&skip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn block(ch_in: usize, ch_out: usize) -> (VarMap, ResidualBlock) {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let blk = ResidualBlock::new(ch_in, ch_out, vb).unwrap();
        (varmap, blk)
    }

    #[test]
    fn equal_channels_preserve_shape_and_use_identity() {
        let (_vm, blk) = block(3, 3);
        assert!(matches!(blk.shortcut(), Shortcut::Identity));
        let xs = Tensor::randn(0f32, 1f32, (2, 3, 32, 32), &Device::Cpu).unwrap();
        for train in [true, false] {
            let ys = blk.forward_t(&xs, train).unwrap();
            assert_eq!(ys.dims(), xs.dims());
        }
    }

    #[test]
    fn widening_block_projects_the_shortcut() {
        let (_vm, blk) = block(16, 32);
        assert!(matches!(blk.shortcut(), Shortcut::Projection(_)));
        for (b, h, w) in [(1, 8, 8), (3, 5, 7)] {
            let xs = Tensor::randn(0f32, 1f32, (b, 16, h, w), &Device::Cpu).unwrap();
            let ys = blk.forward_t(&xs, true).unwrap();
            assert_eq!(ys.dims(), &[b, 32, h, w]);
        }
    }

    #[test]
    fn projection_adds_conv_parameters_under_shortcut_prefix() {
        let (identity_vars, _) = block(16, 16);
        let (projected_vars, _) = block(16, 32);
        let names = |vm: &VarMap| {
            let data = vm.data().lock().unwrap();
            data.keys().filter(|k| k.starts_with("shortcut.")).count()
        };
        assert_eq!(names(&identity_vars), 0);
        assert!(names(&projected_vars) > 0);
    }

    #[test]
    fn wrong_input_channels_fail_with_shape() {
        let (_vm, blk) = block(16, 32);
        let xs = Tensor::zeros((1, 8, 4, 4), DType::F32, &Device::Cpu).unwrap();
        let err = blk.forward_t(&xs, false).unwrap_err().to_string();
        assert!(err.contains("[1, 8, 4, 4]"), "{err}");
    }

    #[test]
    fn identity_block_output_is_main_path_plus_input() {
        let (_vm, blk) = block(4, 4);
        let xs = Tensor::randn(0f32, 1f32, (1, 4, 3, 3), &Device::Cpu).unwrap();
        let main = blk
            .stage2
            .forward_t(&blk.stage1.forward_t(&xs, false).unwrap().relu().unwrap(), false)
            .unwrap();
        let expected = (main + &xs).unwrap();
        let ys = blk.forward_t(&xs, false).unwrap();
        let diff = (ys - expected).unwrap().abs().unwrap().sum_all().unwrap();
        approx::assert_abs_diff_eq!(diff.to_scalar::<f32>().unwrap(), 0.0, epsilon = 1e-6);
    }
}
