//! Lookup of backbone providers by architecture name.

use super::backbone::{BackboneProvider, InceptionResNetV2};
use crate::core::{ArchError, ArchResult};

/// Names of the registered architectures.
pub fn available() -> &'static [&'static str] {
    &["InceptionResNetV2"]
}

/// Returns the provider registered under `name`.
///
/// Matching ignores case and underscores, so `InceptionResNetV2` and
/// `inception_resnet_v2` both resolve.
pub fn backbone_by_name(name: &str) -> ArchResult<Box<dyn BackboneProvider>> {
    let key: String = name
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    match key.as_str() {
        "inceptionresnetv2" => Ok(Box::new(InceptionResNetV2)),
        _ => Err(ArchError::UnknownArchitecture {
            name: name.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_listed_name_resolves() {
        for name in available() {
            let provider = backbone_by_name(name).unwrap();
            assert_eq!(provider.name(), *name);
        }
    }

    #[test]
    fn test_name_matching_is_lenient() {
        for name in ["inception_resnet_v2", "INCEPTIONRESNETV2", "inception-resnet-v2"] {
            assert_eq!(backbone_by_name(name).unwrap().name(), "InceptionResNetV2");
        }
    }

    #[test]
    fn test_unknown_name() {
        let err = backbone_by_name("VGG16").unwrap_err();
        assert!(matches!(err, ArchError::UnknownArchitecture { ref name } if name == "VGG16"));
    }
}
