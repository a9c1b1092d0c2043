//! The model builder.
//!
//! An [`Architecture`] fixes a backbone and an input shape; each call to
//! [`Architecture::create_model`] returns a new, independent classifier.
//!
//! ```rust,no_run
//! use medarch::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let architecture = Architecture::inception_resnet_v2(3).with_input_shape((299, 299));
//! let model = architecture.create_model(5, &HeadConfig::default())?;
//! assert_eq!(model.output_units(), 5);
//! # Ok(())
//! # }
//! ```

use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use std::path::PathBuf;
use tracing::{debug, info};

use super::activation::OutputActivation;
use super::backbone::{BackboneProvider, InceptionResNetV2};
use super::classifier::{BACKBONE_PREFIX, ClassifierModel, HEAD_PREFIX};
use super::head::ClassificationHead;
use super::registry;
use super::weights::{WeightSource, load_into_varmap};
use crate::core::{ArchError, ArchResult, ArchitectureConfig, HeadConfig, InputShape};
use crate::processors::ImagePreprocessor;

/// Builds classifiers from a backbone provider and a fixed input shape.
#[derive(Debug)]
pub struct Architecture {
    provider: Box<dyn BackboneProvider>,
    input: InputShape,
    device: Device,
    dtype: DType,
    cache_dir: Option<PathBuf>,
    weight_source: Option<WeightSource>,
}

impl Architecture {
    /// Creates a builder for `channels`-channel images at the backbone's
    /// native resolution.
    pub fn new<P: BackboneProvider + 'static>(provider: P, channels: usize) -> Self {
        Self::from_boxed(Box::new(provider), channels)
    }

    /// Like [`Architecture::new`], for an already boxed provider.
    pub fn from_boxed(provider: Box<dyn BackboneProvider>, channels: usize) -> Self {
        let input = InputShape::new(provider.native_input_size(), channels);
        Self {
            provider,
            input,
            device: Device::Cpu,
            dtype: DType::F32,
            cache_dir: None,
            weight_source: None,
        }
    }

    /// InceptionResNetV2 builder at 299x299.
    ///
    /// # Arguments
    ///
    /// * `channels` - Channel count of the input images, e.g. 1 for greyscale scans.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use medarch::models::Architecture;
    ///
    /// let architecture = Architecture::inception_resnet_v2(1);
    /// assert_eq!(architecture.input_shape().to_string(), "299x299x1");
    /// ```
    pub fn inception_resnet_v2(channels: usize) -> Self {
        Self::new(InceptionResNetV2, channels)
    }

    /// Creates a builder from a configuration, looking the backbone up by name.
    ///
    /// # Arguments
    ///
    /// * `config` - Architecture name, channels, input shape and hub cache directory.
    ///
    /// # Errors
    ///
    /// Returns [`ArchError::UnknownArchitecture`] when the name is not registered.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use medarch::core::ArchitectureConfig;
    /// use medarch::models::Architecture;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = ArchitectureConfig::from_path("model.json")?;
    /// let architecture = Architecture::from_config(&config)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_config(config: &ArchitectureConfig) -> ArchResult<Self> {
        let provider = registry::backbone_by_name(&config.architecture)?;
        let mut architecture = Self::from_boxed(provider, config.channels);
        architecture.input = config.input();
        architecture.cache_dir = config.cache_dir.clone();
        Ok(architecture)
    }

    /// Overrides the `(height, width)` of the input; the channel count is kept.
    ///
    /// # Arguments
    ///
    /// * `input_shape` - Image height and width. InceptionResNetV2 needs at least 75x75.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use medarch::models::Architecture;
    ///
    /// let architecture = Architecture::inception_resnet_v2(3).with_input_shape((224, 256));
    /// assert_eq!(architecture.input_shape().to_string(), "224x256x3");
    /// ```
    pub fn with_input_shape(mut self, input_shape: (usize, usize)) -> Self {
        self.input = InputShape::new(input_shape, self.input.channels);
        self
    }

    /// Device on which parameters are allocated.
    ///
    /// # Arguments
    ///
    /// * `device` - Target device, see [`crate::utils::parse_device`].
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use medarch::models::Architecture;
    /// use medarch::utils::parse_device;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let architecture = Architecture::inception_resnet_v2(3).with_device(parse_device("cuda:0")?);
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Parameter dtype.
    ///
    /// # Arguments
    ///
    /// * `dtype` - Floating-point type of every parameter. Defaults to `F32`.
    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.dtype = dtype;
        self
    }

    /// Hub cache directory used when downloading pretrained weights.
    ///
    /// # Arguments
    ///
    /// * `cache_dir` - Directory replacing the `HF_HOME` based default.
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(cache_dir.into());
        self
    }

    /// Replaces the provider's published weights as the pretrained source.
    ///
    /// # Arguments
    ///
    /// * `source` - Hub descriptor or local safetensors file keyed by backbone parameter names.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use medarch::prelude::*;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let architecture = Architecture::inception_resnet_v2(3)
    ///     .with_weight_source(WeightSource::File("irv2_finetuned.safetensors".into()));
    /// let model = architecture.create_model(2, &HeadConfig::new().pretrained_weights(true))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_weight_source(mut self, source: WeightSource) -> Self {
        self.weight_source = Some(source);
        self
    }

    /// The stored input shape.
    pub fn input_shape(&self) -> InputShape {
        self.input
    }

    pub fn provider(&self) -> &dyn BackboneProvider {
        self.provider.as_ref()
    }

    /// A preprocessor matching this builder's input shape and the backbone's
    /// normalization.
    pub fn preprocessor(&self) -> ImagePreprocessor {
        ImagePreprocessor::new(self.input, self.provider.preprocess_mode())
    }

    /// Builds a classifier with `n_labels` outputs.
    ///
    /// # Arguments
    ///
    /// * `n_labels` - Width of the output layer.
    /// * `config` - Head options: dense + dropout block, output activation, pretrained weights.
    ///
    /// # Errors
    ///
    /// * [`ArchError::UnknownActivation`] for an unsupported `out_activation`.
    /// * [`ArchError::NoPretrainedWeights`] when weights are requested but the backbone has none.
    /// * [`ArchError::WeightFetch`] when the download fails.
    /// * [`ArchError::Candle`] when the checkpoint is missing a tensor or its shapes differ.
    ///
    /// The backbone is created without its top, followed by global average
    /// pooling, the optional 512-unit dense + 30% dropout block, an
    /// `n_labels`-unit output layer and the configured activation. With
    /// `pretrained_weights` set, every backbone parameter is overwritten from
    /// the pretrained checkpoint; otherwise parameters keep candle's default
    /// initializers. Errors leave nothing behind.
    pub fn create_model(&self, n_labels: usize, config: &HeadConfig) -> ArchResult<ClassifierModel> {
        let activation: OutputActivation = config.out_activation.parse()?;
        let weights = if config.pretrained_weights {
            Some(self.resolve_weights()?)
        } else {
            None
        };

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, self.dtype, &self.device);
        let backbone = self.provider.build(&self.input, vb.pp(BACKBONE_PREFIX))?;
        let head = ClassificationHead::load(
            backbone.num_features(),
            n_labels,
            config.fcl_dropout,
            activation,
            vb.pp(HEAD_PREFIX),
        )?;

        if let Some(path) = weights {
            let copied = load_into_varmap(&varmap, &format!("{BACKBONE_PREFIX}."), &path)?;
            debug!("Initialized {} backbone tensors from {}", copied, path.display());
        }

        info!(
            "Created {} classifier: input {}, {} labels, fcl_dropout={}, activation={}, pretrained={}",
            self.provider.name(),
            self.input,
            n_labels,
            config.fcl_dropout,
            activation,
            config.pretrained_weights
        );

        Ok(ClassifierModel::new(
            self.provider.name(),
            self.input,
            backbone,
            head,
            varmap,
            self.device.clone(),
            self.dtype,
        ))
    }

    fn resolve_weights(&self) -> ArchResult<PathBuf> {
        let cache_dir = self.cache_dir.as_deref();
        match &self.weight_source {
            Some(source) => source.resolve(cache_dir),
            None => match self.provider.pretrained_weights() {
                Some(weights) => weights.fetch(cache_dir),
                None => Err(ArchError::NoPretrainedWeights {
                    architecture: self.provider.name().to_string(),
                }),
            },
        }
    }
}
