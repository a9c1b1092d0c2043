//! Image preprocessing and output postprocessing.
//!
//! - [`normalization`] - Resizing, pixel normalization and batching of input images
//! - [`topk`] - Best-label extraction from classifier outputs

pub mod normalization;
pub mod topk;

pub use normalization::{ImagePreprocessor, PreprocessMode};
pub use topk::{Topk, TopkResult};
