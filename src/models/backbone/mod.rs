//! Backbone providers.
//!
//! A backbone turns an image batch into a spatial feature map. The model
//! builder only ever talks to the [`BackboneProvider`] trait, so alternative
//! architectures can be plugged in without touching the head or the builder.

pub mod inception_resnet_v2;
pub mod layers;

pub use inception_resnet_v2::{InceptionResNetV2, InceptionResNetV2Features};

use candle_nn::{ModuleT, VarBuilder};

use crate::core::{ArchResult, DEFAULT_INPUT_SIZE, InputShape};
use crate::models::weights::PretrainedWeights;
use crate::processors::PreprocessMode;

/// A feature extractor built in "no top" mode.
///
/// Takes channels-first input `(batch, channels, height, width)` and returns a
/// feature map `(batch, num_features, h', w')` without any global pooling.
pub trait Backbone: ModuleT + std::fmt::Debug + Send + Sync {
    /// Channel count of the produced feature map.
    fn num_features(&self) -> usize;

    /// Names of the layers in execution order.
    fn layer_names(&self) -> Vec<String>;

    /// Number of layers in the backbone.
    fn layer_count(&self) -> usize {
        self.layer_names().len()
    }
}

/// Factory for a backbone architecture.
pub trait BackboneProvider: std::fmt::Debug + Send + Sync {
    /// Architecture name, as used by the registry.
    fn name(&self) -> &'static str;

    /// The `(height, width)` resolution the architecture was designed for.
    fn native_input_size(&self) -> (usize, usize) {
        DEFAULT_INPUT_SIZE
    }

    /// Pixel normalization expected by the pretrained weights.
    fn preprocess_mode(&self) -> PreprocessMode;

    /// The published weight set, if the architecture has one.
    fn pretrained_weights(&self) -> Option<&'static PretrainedWeights> {
        None
    }

    /// Builds the backbone for `input`, creating its parameters through `vb`.
    fn build(&self, input: &InputShape, vb: VarBuilder) -> ArchResult<Box<dyn Backbone>>;
}
