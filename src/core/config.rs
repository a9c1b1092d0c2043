//! Configuration types for model construction.
//!
//! [`InputShape`] fixes the tensor shape a model is built for, [`HeadConfig`]
//! carries the options of the classification head, and [`ArchitectureConfig`]
//! bundles everything needed to build a model from a JSON file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::errors::ArchResult;

/// Default image height and width, the native resolution of the Inception family.
pub const DEFAULT_INPUT_SIZE: (usize, usize) = (299, 299);

fn default_true() -> bool {
    true
}

fn default_activation() -> String {
    "softmax".to_string()
}

fn default_input_shape() -> (usize, usize) {
    DEFAULT_INPUT_SIZE
}

fn default_architecture() -> String {
    "InceptionResNetV2".to_string()
}

/// Shape of a single input image: height, width and channel count.
///
/// Nothing here is validated; a shape the backbone cannot handle fails when
/// the model is built or first run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl InputShape {
    /// Combines a `(height, width)` pair with a channel count.
    pub fn new(input_shape: (usize, usize), channels: usize) -> Self {
        Self {
            height: input_shape.0,
            width: input_shape.1,
            channels,
        }
    }

    /// Channels-last batch shape `(batch, height, width, channels)`.
    pub fn batch_nhwc(&self, batch: usize) -> (usize, usize, usize, usize) {
        (batch, self.height, self.width, self.channels)
    }
}

impl std::fmt::Display for InputShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.height, self.width, self.channels)
    }
}

/// Options of the classification head appended to a backbone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadConfig {
    /// Insert a 512-unit dense layer followed by 30% dropout before the output layer.
    #[serde(default = "default_true")]
    pub fcl_dropout: bool,
    /// Name of the activation applied to the output layer, e.g. `softmax` or `sigmoid`.
    #[serde(default = "default_activation")]
    pub out_activation: String,
    /// Initialize the backbone from its published ImageNet weights.
    #[serde(default)]
    pub pretrained_weights: bool,
}

impl Default for HeadConfig {
    fn default() -> Self {
        Self {
            fcl_dropout: true,
            out_activation: default_activation(),
            pretrained_weights: false,
        }
    }
}

impl HeadConfig {
    /// Creates the default head configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the dense + dropout block is inserted.
    pub fn fcl_dropout(mut self, enabled: bool) -> Self {
        self.fcl_dropout = enabled;
        self
    }

    /// Sets the output activation by name.
    pub fn out_activation(mut self, name: impl Into<String>) -> Self {
        self.out_activation = name.into();
        self
    }

    /// Sets whether the backbone starts from pretrained weights.
    pub fn pretrained_weights(mut self, enabled: bool) -> Self {
        self.pretrained_weights = enabled;
        self
    }
}

/// Complete description of a model to build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureConfig {
    /// Registered backbone name.
    #[serde(default = "default_architecture")]
    pub architecture: String,
    pub channels: usize,
    #[serde(default = "default_input_shape")]
    pub input_shape: (usize, usize),
    pub n_labels: usize,
    #[serde(default)]
    pub head: HeadConfig,
    /// Overrides the hub cache directory used for pretrained downloads.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl ArchitectureConfig {
    /// Loads a configuration from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> ArchResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses a configuration from a JSON string.
    pub fn from_json(content: &str) -> ArchResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// The input shape described by this configuration.
    pub fn input(&self) -> InputShape {
        InputShape::new(self.input_shape, self.channels)
    }
}
