//! Image loading helpers.

use crate::core::ArchResult;
use image::DynamicImage;
use std::path::Path;

/// Loads an image from a file path.
///
/// Any format supported by the `image` crate is accepted; channel conversion
/// is left to the preprocessor.
pub fn load_image(path: impl AsRef<Path>) -> ArchResult<DynamicImage> {
    Ok(image::open(path)?)
}

/// Loads several images, failing on the first one that cannot be read.
pub fn load_images<P: AsRef<Path>>(paths: &[P]) -> ArchResult<Vec<DynamicImage>> {
    paths.iter().map(load_image).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ArchError;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_load_image_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.png");
        RgbImage::from_pixel(7, 5, Rgb([10, 20, 30])).save(&path).unwrap();

        let image = load_image(&path).unwrap();
        assert_eq!((image.width(), image.height()), (7, 5));
        assert_eq!(load_images(&[&path, &path]).unwrap().len(), 2);
    }

    #[test]
    fn test_load_missing_image() {
        let err = load_image("/nonexistent/scan.png").unwrap_err();
        assert!(matches!(err, ArchError::ImageLoad(_)));
    }
}
