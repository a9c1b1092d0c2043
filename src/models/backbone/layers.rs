//! Building blocks shared by convolutional backbones.

use candle_core::{Device, Result, Tensor};
use candle_nn::{BatchNorm, Conv2d, Conv2dConfig, Module, ModuleT, VarBuilder};

/// Batch-norm epsilon used by the Inception family.
pub const BN_EPS: f64 = 1e-3;

/// Convolution without bias, batch normalization, then ReLU.
///
/// Rectangular kernels (1x7, 7x1, ...) get rectangular zero padding, applied
/// before the convolution because candle's conv padding is symmetric in both
/// spatial dimensions.
#[derive(Debug, Clone)]
pub struct ConvBn {
    name: String,
    conv: Conv2d,
    bn: BatchNorm,
    /// Explicit `(height, width)` padding when it differs per axis.
    pad: Option<(usize, usize)>,
}

impl ConvBn {
    /// Loads a convolution block with a `(height, width)` kernel and padding.
    pub fn load(
        in_channels: usize,
        out_channels: usize,
        kernel: (usize, usize),
        stride: usize,
        padding: (usize, usize),
        vb: VarBuilder,
    ) -> Result<Self> {
        let symmetric = padding.0 == padding.1;
        let cfg = Conv2dConfig {
            stride,
            padding: if symmetric { padding.0 } else { 0 },
            ..Default::default()
        };
        let weight = vb.pp("conv").get_with_hints(
            (out_channels, in_channels, kernel.0, kernel.1),
            "weight",
            candle_nn::init::DEFAULT_KAIMING_NORMAL,
        )?;
        let conv = Conv2d::new(weight, None, cfg);
        let bn = candle_nn::batch_norm(out_channels, BN_EPS, vb.pp("bn"))?;

        Ok(Self {
            name: vb.prefix(),
            conv,
            bn,
            pad: (!symmetric).then_some(padding),
        })
    }

    /// Square-kernel shorthand for [`ConvBn::load`].
    pub fn square(
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        Self::load(
            in_channels,
            out_channels,
            (kernel, kernel),
            stride,
            (padding, padding),
            vb,
        )
    }

    /// Number of output channels.
    pub fn out_channels(&self) -> usize {
        self.conv.weight().dim(0).unwrap_or(0)
    }

    /// Names of the layers in this block.
    pub fn layer_names(&self) -> Vec<String> {
        vec![
            format!("{}.conv", self.name),
            format!("{}.bn", self.name),
            format!("{}.relu", self.name),
        ]
    }
}

impl ModuleT for ConvBn {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let xs = match self.pad {
            Some((ph, pw)) => xs.pad_with_zeros(2, ph, ph)?.pad_with_zeros(3, pw, pw)?,
            None => xs.clone(),
        };
        let xs = self.conv.forward(&xs)?;
        self.bn.forward_t(&xs, train)?.relu()
    }
}

/// Runs a chain of convolution blocks in order.
pub fn forward_chain(chain: &[ConvBn], xs: &Tensor, train: bool) -> Result<Tensor> {
    chain
        .iter()
        .try_fold(xs.clone(), |acc, block| block.forward_t(&acc, train))
}

/// 3x3 max pooling with stride 2 and no padding.
///
/// Taken as the elementwise maximum of the nine strided windows rather than
/// candle's `max_pool2d`, which has no backward pass when kernel and stride
/// differ.
pub fn max_pool_3x3_s2(xs: &Tensor) -> Result<Tensor> {
    let (_, _, h, w) = xs.dims4()?;
    if h < 3 || w < 3 {
        candle_core::bail!("max pooling needs at least 3x3 input, got {h}x{w}");
    }
    let (oh, ow) = ((h - 3) / 2 + 1, (w - 3) / 2 + 1);
    let mut pooled: Option<Tensor> = None;
    for di in 0..3 {
        let rows = xs.index_select(&strided_index(di, oh, xs.device())?, 2)?;
        for dj in 0..3 {
            let window = rows.index_select(&strided_index(dj, ow, xs.device())?, 3)?;
            pooled = Some(match pooled {
                Some(acc) => acc.maximum(&window)?,
                None => window,
            });
        }
    }
    pooled.ok_or_else(|| candle_core::Error::Msg("empty pooling window".to_string()))
}

/// Indices `start, start + 2, ...` of length `len`.
fn strided_index(start: usize, len: usize, device: &Device) -> Result<Tensor> {
    let index: Vec<u32> = (0..len).map(|k| (start + 2 * k) as u32).collect();
    Tensor::from_vec(index, len, device)
}

/// 3x3 average pooling with stride 1 and "same" padding.
///
/// Padded positions are excluded from the average, so border outputs are the
/// mean of the in-bounds values only.
pub fn avg_pool_3x3_same(xs: &Tensor) -> Result<Tensor> {
    let (_, _, h, w) = xs.dims4()?;
    let sums = window_sum_3x3_same(xs)?;
    let ones = Tensor::ones((1, 1, h, w), xs.dtype(), xs.device())?;
    let counts = window_sum_3x3_same(&ones)?;
    sums.broadcast_div(&counts)
}

/// Sum over each 3x3 neighbourhood, zero padded to keep the spatial size.
fn window_sum_3x3_same(xs: &Tensor) -> Result<Tensor> {
    let (_, _, h, w) = xs.dims4()?;
    let padded = pad_hw(xs, 1)?;
    let mut sum: Option<Tensor> = None;
    for di in 0..3 {
        let rows = padded.narrow(2, di, h)?;
        for dj in 0..3 {
            let window = rows.narrow(3, dj, w)?;
            sum = Some(match sum {
                Some(acc) => (acc + window)?,
                None => window,
            });
        }
    }
    sum.ok_or_else(|| candle_core::Error::Msg("empty pooling window".to_string()))
}

fn pad_hw(xs: &Tensor, pad: usize) -> Result<Tensor> {
    xs.pad_with_zeros(2, pad, pad)?.pad_with_zeros(3, pad, pad)
}
