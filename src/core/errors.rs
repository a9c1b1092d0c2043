//! Error types for model construction.
//!
//! Failures raised by the tensor framework are carried through untouched in
//! [`ArchError::Candle`]; the remaining variants cover the few places where the
//! crate itself resolves something by name or talks to the outside world.

use thiserror::Error;

/// Convenient result alias for model construction and inference.
pub type ArchResult<T> = Result<T, ArchError>;

/// Enum representing the errors that can occur while building or running a model.
#[derive(Error, Debug)]
pub enum ArchError {
    /// Error raised by candle: bad shapes, missing tensors, shape mismatches
    /// while copying weights, device failures.
    #[error(transparent)]
    Candle(#[from] candle_core::Error),

    /// Downloading a pretrained weight file failed.
    #[error("failed to fetch '{file}' from '{repo}'")]
    WeightFetch {
        /// Hub repository the weights were requested from.
        repo: String,
        /// File within the repository.
        file: String,
        /// The underlying hub error.
        #[source]
        source: hf_hub::api::sync::ApiError,
    },

    /// The requested output activation has no implementation.
    #[error("unknown activation function: '{name}'")]
    UnknownActivation {
        /// The name that failed to resolve.
        name: String,
    },

    /// The requested architecture is not registered.
    #[error("unknown architecture: '{name}'")]
    UnknownArchitecture {
        /// The name that failed to resolve.
        name: String,
    },

    /// Pretrained weights were requested for a backbone that publishes none.
    #[error("no pretrained weights available for {architecture}")]
    NoPretrainedWeights {
        /// Name of the backbone.
        architecture: String,
    },

    /// Error occurred while loading an image.
    #[error("image load")]
    ImageLoad(#[from] image::ImageError),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },
}

impl ArchError {
    /// Creates an ArchError for configuration errors.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Creates an ArchError for invalid input.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates an ArchError for a failed hub download.
    pub fn weight_fetch(
        repo: impl Into<String>,
        file: impl Into<String>,
        source: hf_hub::api::sync::ApiError,
    ) -> Self {
        Self::WeightFetch {
            repo: repo.into(),
            file: file.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for ArchError {
    fn from(error: serde_json::Error) -> Self {
        Self::ConfigError {
            message: error.to_string(),
        }
    }
}
