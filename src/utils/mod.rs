//! Utility functions for loading images and choosing devices.

pub mod device;
pub mod image;

pub use device::parse_device;
pub use image::{load_image, load_images};
