//! # medarch
//!
//! Image-classification models assembled from a convolutional backbone and a
//! configurable classification head, built on [candle](https://github.com/huggingface/candle).
//!
//! ## Features
//!
//! - InceptionResNetV2 backbone for any channel count and input resolution
//!   down to 75x75
//! - Classification head with global average pooling, an optional
//!   512-unit dense + dropout block and a named output activation
//! - Optional ImageNet weights fetched from the Hugging Face Hub
//! - Image preprocessing matching each backbone's normalization
//!
//! ## Modules
//!
//! * [`core`] - Configuration types, error handling and tracing setup
//! * [`models`] - Backbones, the classification head and the model builder
//! * [`processors`] - Image normalization and top-k post-processing
//! * [`utils`] - Image loading and device selection
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use medarch::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let architecture = Architecture::inception_resnet_v2(3).with_input_shape((224, 224));
//! let model = architecture.create_model(
//!     4,
//!     &HeadConfig::new().out_activation("sigmoid").pretrained_weights(true),
//! )?;
//!
//! let image = load_image("scan.png")?;
//! let scores = model.predict_images(&[image], &architecture.preprocessor())?;
//! let best = Topk::new().process(&scores, 1)?;
//! println!("label {} ({:.3})", best[0].indexes[0], best[0].scores[0]);
//! # Ok(())
//! # }
//! ```
//!
//! ### JSON Configuration
//!
//! ```rust,no_run
//! use medarch::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ArchitectureConfig::from_json(r#"
//! {
//!   "architecture": "InceptionResNetV2",
//!   "channels": 1,
//!   "input_shape": [256, 256],
//!   "n_labels": 2,
//!   "head": { "fcl_dropout": false, "out_activation": "softmax" }
//! }
//! "#)?;
//!
//! let model = Architecture::from_config(&config)?.create_model(config.n_labels, &config.head)?;
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod core;
pub mod models;

pub mod processors;
pub mod utils;

/// Prelude module for convenient imports.
///
/// ```rust
/// use medarch::prelude::*;
/// ```
///
/// Includes the builder and its configuration, the model type, error types
/// and image helpers. Building blocks such as [`models::head::ClassificationHead`]
/// or the weight loaders are imported from their modules.
pub mod prelude {
    // Model building (essential)
    pub use crate::core::{ArchitectureConfig, HeadConfig, InputShape};
    pub use crate::models::{
        Architecture, BackboneProvider, ClassifierModel, InceptionResNetV2, OutputActivation,
        WeightSource,
    };

    // Error Handling (essential)
    pub use crate::core::{ArchError, ArchResult};

    // Pre/post-processing
    pub use crate::processors::{ImagePreprocessor, PreprocessMode, Topk};
    pub use crate::utils::{load_image, load_images};
}
