//! A small backbone for exercising the builder and head without the cost of
//! a full network.

use candle_core::{Result, Tensor};
use candle_nn::{ModuleT, VarBuilder};

use super::backbone::layers::ConvBn;
use super::backbone::{Backbone, BackboneProvider};
use crate::core::{ArchResult, InputShape};
use crate::processors::PreprocessMode;

#[derive(Debug, Clone, Copy)]
pub(crate) struct TinyBackbone;

#[derive(Debug)]
pub(crate) struct TinyFeatures {
    conv: ConvBn,
}

impl BackboneProvider for TinyBackbone {
    fn name(&self) -> &'static str {
        "TinyBackbone"
    }

    fn native_input_size(&self) -> (usize, usize) {
        (16, 16)
    }

    fn preprocess_mode(&self) -> PreprocessMode {
        PreprocessMode::Torch
    }

    fn build(&self, input: &InputShape, vb: VarBuilder) -> ArchResult<Box<dyn Backbone>> {
        let conv = ConvBn::square(input.channels, 8, 3, 2, 1, vb.pp("conv"))?;
        Ok(Box::new(TinyFeatures { conv }))
    }
}

impl ModuleT for TinyFeatures {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        self.conv.forward_t(xs, train)
    }
}

impl Backbone for TinyFeatures {
    fn num_features(&self) -> usize {
        8
    }

    fn layer_names(&self) -> Vec<String> {
        self.conv.layer_names()
    }
}
