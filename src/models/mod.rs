//! Model construction.
//!
//! - [`backbone`] - Backbone providers and their building blocks
//! - [`head`] - The classification head
//! - [`architecture`] - The model builder
//! - [`classifier`] - The composed model returned by the builder
//! - [`weights`] - Pretrained weight sources
//! - [`registry`] - Backbone lookup by name

pub mod activation;
pub mod architecture;
pub mod backbone;
pub mod classifier;
pub mod head;
pub mod registry;
pub mod weights;

#[cfg(test)]
pub(crate) mod testing;

pub use activation::OutputActivation;
pub use architecture::Architecture;
pub use backbone::{Backbone, BackboneProvider, InceptionResNetV2};
pub use classifier::ClassifierModel;
pub use head::{ClassificationHead, FCL_DROPOUT_RATE, FCL_UNITS};
pub use weights::{INCEPTION_RESNET_V2_IMAGENET, PretrainedWeights, WeightSource};
