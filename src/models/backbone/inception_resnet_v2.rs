//! InceptionResNetV2 feature extractor.
//!
//! Implements the network from "Inception-v4, Inception-ResNet and the Impact
//! of Residual Connections on Learning" (Szegedy et al., 2016) without its
//! classification top and without global pooling. For a 299x299 input the
//! output feature map is `(batch, 1536, 8, 8)`.
//!
//! Parameter names follow the `timm/inception_resnet_v2.tf_in1k` checkpoint,
//! so the published ImageNet weights copy over by name.

use candle_core::{Result, Tensor};
use candle_nn::{Conv2d, Module, ModuleT, VarBuilder};
use tracing::debug;

use super::layers::{ConvBn, avg_pool_3x3_same, forward_chain, max_pool_3x3_s2};
use super::{Backbone, BackboneProvider};
use crate::core::{ArchResult, DEFAULT_INPUT_SIZE, InputShape};
use crate::models::weights::{INCEPTION_RESNET_V2_IMAGENET, PretrainedWeights};
use crate::processors::PreprocessMode;

/// Number of channels in the final feature map.
pub const NUM_FEATURES: usize = 1536;

/// Smallest height or width the stride pattern supports.
pub const MIN_INPUT_SIZE: usize = 75;

const BLOCK35_REPEATS: usize = 10;
const BLOCK17_REPEATS: usize = 20;
const BLOCK8_REPEATS: usize = 9;

const BLOCK35_SCALE: f64 = 0.17;
const BLOCK17_SCALE: f64 = 0.10;
const BLOCK8_SCALE: f64 = 0.20;

/// Provider for the InceptionResNetV2 backbone.
#[derive(Debug, Clone, Copy, Default)]
pub struct InceptionResNetV2;

impl BackboneProvider for InceptionResNetV2 {
    fn name(&self) -> &'static str {
        "InceptionResNetV2"
    }

    fn native_input_size(&self) -> (usize, usize) {
        DEFAULT_INPUT_SIZE
    }

    fn preprocess_mode(&self) -> PreprocessMode {
        PreprocessMode::Tf
    }

    fn pretrained_weights(&self) -> Option<&'static PretrainedWeights> {
        Some(&INCEPTION_RESNET_V2_IMAGENET)
    }

    fn build(&self, input: &InputShape, vb: VarBuilder) -> ArchResult<Box<dyn Backbone>> {
        debug!("Building InceptionResNetV2 for input {}", input);
        let features = InceptionResNetV2Features::load(input.channels, vb)?;
        Ok(Box::new(features))
    }
}

/// One parallel path of a mixed block.
#[derive(Debug, Clone)]
enum Branch {
    Convs(Vec<ConvBn>),
    MaxPool,
    AvgPoolThen(Vec<ConvBn>),
}

impl Branch {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        match self {
            Branch::Convs(chain) => forward_chain(chain, xs, train),
            Branch::MaxPool => max_pool_3x3_s2(xs),
            Branch::AvgPoolThen(chain) => forward_chain(chain, &avg_pool_3x3_same(xs)?, train),
        }
    }

    fn layer_names(&self, name: &str, index: usize) -> Vec<String> {
        match self {
            Branch::Convs(chain) => chain.iter().flat_map(ConvBn::layer_names).collect(),
            Branch::MaxPool => vec![format!("{name}.branch{index}.max_pool")],
            Branch::AvgPoolThen(chain) => std::iter::once(format!("{name}.branch{index}.avg_pool"))
                .chain(chain.iter().flat_map(ConvBn::layer_names))
                .collect(),
        }
    }
}

/// Parallel branches concatenated along the channel axis
/// (`mixed_5b`, and the reductions `mixed_6a` and `mixed_7a`).
#[derive(Debug, Clone)]
struct MixedBlock {
    name: String,
    branches: Vec<Branch>,
}

impl MixedBlock {
    fn mixed_5b(vb: VarBuilder) -> Result<Self> {
        let branches = vec![
            Branch::Convs(vec![ConvBn::square(192, 96, 1, 1, 0, vb.pp("branch0"))?]),
            Branch::Convs(vec![
                ConvBn::square(192, 48, 1, 1, 0, vb.pp("branch1.0"))?,
                ConvBn::square(48, 64, 5, 1, 2, vb.pp("branch1.1"))?,
            ]),
            Branch::Convs(vec![
                ConvBn::square(192, 64, 1, 1, 0, vb.pp("branch2.0"))?,
                ConvBn::square(64, 96, 3, 1, 1, vb.pp("branch2.1"))?,
                ConvBn::square(96, 96, 3, 1, 1, vb.pp("branch2.2"))?,
            ]),
            Branch::AvgPoolThen(vec![ConvBn::square(192, 64, 1, 1, 0, vb.pp("branch3.1"))?]),
        ];
        Ok(Self {
            name: vb.prefix(),
            branches,
        })
    }

    fn mixed_6a(vb: VarBuilder) -> Result<Self> {
        let branches = vec![
            Branch::Convs(vec![ConvBn::square(320, 384, 3, 2, 0, vb.pp("branch0"))?]),
            Branch::Convs(vec![
                ConvBn::square(320, 256, 1, 1, 0, vb.pp("branch1.0"))?,
                ConvBn::square(256, 256, 3, 1, 1, vb.pp("branch1.1"))?,
                ConvBn::square(256, 384, 3, 2, 0, vb.pp("branch1.2"))?,
            ]),
            Branch::MaxPool,
        ];
        Ok(Self {
            name: vb.prefix(),
            branches,
        })
    }

    fn mixed_7a(vb: VarBuilder) -> Result<Self> {
        let branches = vec![
            Branch::Convs(vec![
                ConvBn::square(1088, 256, 1, 1, 0, vb.pp("branch0.0"))?,
                ConvBn::square(256, 384, 3, 2, 0, vb.pp("branch0.1"))?,
            ]),
            Branch::Convs(vec![
                ConvBn::square(1088, 256, 1, 1, 0, vb.pp("branch1.0"))?,
                ConvBn::square(256, 288, 3, 2, 0, vb.pp("branch1.1"))?,
            ]),
            Branch::Convs(vec![
                ConvBn::square(1088, 256, 1, 1, 0, vb.pp("branch2.0"))?,
                ConvBn::square(256, 288, 3, 1, 1, vb.pp("branch2.1"))?,
                ConvBn::square(288, 320, 3, 2, 0, vb.pp("branch2.2"))?,
            ]),
            Branch::MaxPool,
        ];
        Ok(Self {
            name: vb.prefix(),
            branches,
        })
    }

    fn layer_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .branches
            .iter()
            .enumerate()
            .flat_map(|(i, branch)| branch.layer_names(&self.name, i))
            .collect();
        names.push(format!("{}.concat", self.name));
        names
    }
}

impl ModuleT for MixedBlock {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let outputs = self
            .branches
            .iter()
            .map(|branch| branch.forward_t(xs, train))
            .collect::<Result<Vec<_>>>()?;
        Tensor::cat(&outputs, 1)
    }
}

/// Residual Inception block: concatenated branches, a biased 1x1
/// up-projection back to the input width, scaled and added to the input.
#[derive(Debug, Clone)]
struct ResidualBlock {
    name: String,
    branches: Vec<Vec<ConvBn>>,
    up: Conv2d,
    scale: f64,
    relu: bool,
}

impl ResidualBlock {
    fn finish(
        branches: Vec<Vec<ConvBn>>,
        channels: usize,
        scale: f64,
        relu: bool,
        vb: VarBuilder,
    ) -> Result<Self> {
        let mixed: usize = branches
            .iter()
            .filter_map(|chain| chain.last().map(ConvBn::out_channels))
            .sum();
        let up = candle_nn::conv2d(mixed, channels, 1, Default::default(), vb.pp("conv2d"))?;
        Ok(Self {
            name: vb.prefix(),
            branches,
            up,
            scale,
            relu,
        })
    }

    /// Inception-ResNet-A, 35x35 grid, 320 channels.
    fn block35(scale: f64, vb: VarBuilder) -> Result<Self> {
        let branches = vec![
            vec![ConvBn::square(320, 32, 1, 1, 0, vb.pp("branch0"))?],
            vec![
                ConvBn::square(320, 32, 1, 1, 0, vb.pp("branch1.0"))?,
                ConvBn::square(32, 32, 3, 1, 1, vb.pp("branch1.1"))?,
            ],
            vec![
                ConvBn::square(320, 32, 1, 1, 0, vb.pp("branch2.0"))?,
                ConvBn::square(32, 48, 3, 1, 1, vb.pp("branch2.1"))?,
                ConvBn::square(48, 64, 3, 1, 1, vb.pp("branch2.2"))?,
            ],
        ];
        Self::finish(branches, 320, scale, true, vb)
    }

    /// Inception-ResNet-B, 17x17 grid, 1088 channels.
    fn block17(scale: f64, vb: VarBuilder) -> Result<Self> {
        let branches = vec![
            vec![ConvBn::square(1088, 192, 1, 1, 0, vb.pp("branch0"))?],
            vec![
                ConvBn::square(1088, 128, 1, 1, 0, vb.pp("branch1.0"))?,
                ConvBn::load(128, 160, (1, 7), 1, (0, 3), vb.pp("branch1.1"))?,
                ConvBn::load(160, 192, (7, 1), 1, (3, 0), vb.pp("branch1.2"))?,
            ],
        ];
        Self::finish(branches, 1088, scale, true, vb)
    }

    /// Inception-ResNet-C, 8x8 grid, 2080 channels.
    fn block8(scale: f64, relu: bool, vb: VarBuilder) -> Result<Self> {
        let branches = vec![
            vec![ConvBn::square(2080, 192, 1, 1, 0, vb.pp("branch0"))?],
            vec![
                ConvBn::square(2080, 192, 1, 1, 0, vb.pp("branch1.0"))?,
                ConvBn::load(192, 224, (1, 3), 1, (0, 1), vb.pp("branch1.1"))?,
                ConvBn::load(224, 256, (3, 1), 1, (1, 0), vb.pp("branch1.2"))?,
            ],
        ];
        Self::finish(branches, 2080, scale, relu, vb)
    }

    fn layer_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .branches
            .iter()
            .flatten()
            .flat_map(ConvBn::layer_names)
            .collect();
        names.push(format!("{}.concat", self.name));
        names.push(format!("{}.conv2d", self.name));
        names.push(format!("{}.scale_add", self.name));
        if self.relu {
            names.push(format!("{}.relu", self.name));
        }
        names
    }
}

impl ModuleT for ResidualBlock {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let outputs = self
            .branches
            .iter()
            .map(|chain| forward_chain(chain, xs, train))
            .collect::<Result<Vec<_>>>()?;
        let mixed = Tensor::cat(&outputs, 1)?;
        let up = self.up.forward(&mixed)?;
        let ys = ((up * self.scale)? + xs)?;
        if self.relu { ys.relu() } else { Ok(ys) }
    }
}

/// The InceptionResNetV2 convolutional body.
#[derive(Debug, Clone)]
pub struct InceptionResNetV2Features {
    stem_a: Vec<ConvBn>,
    stem_b: Vec<ConvBn>,
    mixed_5b: MixedBlock,
    repeat: Vec<ResidualBlock>,
    mixed_6a: MixedBlock,
    repeat_1: Vec<ResidualBlock>,
    mixed_7a: MixedBlock,
    repeat_2: Vec<ResidualBlock>,
    block8: ResidualBlock,
    conv2d_7b: ConvBn,
}

impl InceptionResNetV2Features {
    /// Loads the backbone for images with `in_channels` channels.
    pub fn load(in_channels: usize, vb: VarBuilder) -> Result<Self> {
        let stem_a = vec![
            ConvBn::square(in_channels, 32, 3, 2, 0, vb.pp("conv2d_1a"))?,
            ConvBn::square(32, 32, 3, 1, 0, vb.pp("conv2d_2a"))?,
            ConvBn::square(32, 64, 3, 1, 1, vb.pp("conv2d_2b"))?,
        ];
        let stem_b = vec![
            ConvBn::square(64, 80, 1, 1, 0, vb.pp("conv2d_3b"))?,
            ConvBn::square(80, 192, 3, 1, 0, vb.pp("conv2d_4a"))?,
        ];
        let mixed_5b = MixedBlock::mixed_5b(vb.pp("mixed_5b"))?;
        let repeat = (0..BLOCK35_REPEATS)
            .map(|i| ResidualBlock::block35(BLOCK35_SCALE, vb.pp("repeat").pp(i)))
            .collect::<Result<Vec<_>>>()?;
        let mixed_6a = MixedBlock::mixed_6a(vb.pp("mixed_6a"))?;
        let repeat_1 = (0..BLOCK17_REPEATS)
            .map(|i| ResidualBlock::block17(BLOCK17_SCALE, vb.pp("repeat_1").pp(i)))
            .collect::<Result<Vec<_>>>()?;
        let mixed_7a = MixedBlock::mixed_7a(vb.pp("mixed_7a"))?;
        let repeat_2 = (0..BLOCK8_REPEATS)
            .map(|i| ResidualBlock::block8(BLOCK8_SCALE, true, vb.pp("repeat_2").pp(i)))
            .collect::<Result<Vec<_>>>()?;
        let block8 = ResidualBlock::block8(1.0, false, vb.pp("block8"))?;
        let conv2d_7b = ConvBn::square(2080, NUM_FEATURES, 1, 1, 0, vb.pp("conv2d_7b"))?;

        Ok(Self {
            stem_a,
            stem_b,
            mixed_5b,
            repeat,
            mixed_6a,
            repeat_1,
            mixed_7a,
            repeat_2,
            block8,
            conv2d_7b,
        })
    }
}

impl ModuleT for InceptionResNetV2Features {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let xs = forward_chain(&self.stem_a, xs, train)?;
        let xs = max_pool_3x3_s2(&xs)?;
        let xs = forward_chain(&self.stem_b, &xs, train)?;
        let xs = max_pool_3x3_s2(&xs)?;
        let mut xs = self.mixed_5b.forward_t(&xs, train)?;
        for block in &self.repeat {
            xs = block.forward_t(&xs, train)?;
        }
        xs = self.mixed_6a.forward_t(&xs, train)?;
        for block in &self.repeat_1 {
            xs = block.forward_t(&xs, train)?;
        }
        xs = self.mixed_7a.forward_t(&xs, train)?;
        for block in &self.repeat_2 {
            xs = block.forward_t(&xs, train)?;
        }
        xs = self.block8.forward_t(&xs, train)?;
        self.conv2d_7b.forward_t(&xs, train)
    }
}

impl Backbone for InceptionResNetV2Features {
    fn num_features(&self) -> usize {
        NUM_FEATURES
    }

    fn layer_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stem_a.iter().flat_map(ConvBn::layer_names).collect();
        names.push("maxpool_3a".to_string());
        names.extend(self.stem_b.iter().flat_map(ConvBn::layer_names));
        names.push("maxpool_5a".to_string());
        names.extend(self.mixed_5b.layer_names());
        names.extend(self.repeat.iter().flat_map(ResidualBlock::layer_names));
        names.extend(self.mixed_6a.layer_names());
        names.extend(self.repeat_1.iter().flat_map(ResidualBlock::layer_names));
        names.extend(self.mixed_7a.layer_names());
        names.extend(self.repeat_2.iter().flat_map(ResidualBlock::layer_names));
        names.extend(self.block8.layer_names());
        names.extend(self.conv2d_7b.layer_names());
        names
    }
}
