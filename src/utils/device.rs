//! Device selection.

use candle_core::Device;

use crate::core::{ArchError, ArchResult};

#[cfg(not(feature = "cuda"))]
fn cuda_not_enabled() -> ArchError {
    ArchError::config_error("CUDA support not enabled. Compile with --features cuda")
}

/// Parses a device string into a candle [`Device`].
///
/// # Supported formats
///
/// - `"cpu"` -> CPU device
/// - `"cuda"` or `"gpu"` -> CUDA device 0
/// - `"cuda:N"` -> CUDA device N
pub fn parse_device(device_str: &str) -> ArchResult<Device> {
    let device_str = device_str.to_lowercase();
    match device_str.as_str() {
        "cpu" => Ok(Device::Cpu),
        "cuda" | "gpu" => {
            #[cfg(feature = "cuda")]
            {
                Ok(Device::new_cuda(0)?)
            }
            #[cfg(not(feature = "cuda"))]
            {
                Err(cuda_not_enabled())
            }
        }
        s if s.starts_with("cuda:") => {
            let ordinal: usize = s["cuda:".len()..].parse().map_err(|_| {
                ArchError::config_error(format!("Invalid CUDA device ordinal in '{}'", s))
            })?;
            #[cfg(feature = "cuda")]
            {
                Ok(Device::new_cuda(ordinal)?)
            }
            #[cfg(not(feature = "cuda"))]
            {
                let _ = ordinal;
                Err(cuda_not_enabled())
            }
        }
        _ => Err(ArchError::config_error(format!(
            "Unknown device: {}. Use 'cpu', 'cuda', or 'cuda:N'",
            device_str
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu() {
        assert!(matches!(parse_device("CPU").unwrap(), Device::Cpu));
    }

    #[test]
    fn test_parse_invalid_device() {
        assert!(parse_device("tpu").is_err());
        assert!(parse_device("cuda:x").is_err());
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_cuda_requires_feature() {
        assert!(matches!(
            parse_device("cuda:0"),
            Err(ArchError::ConfigError { .. })
        ));
    }
}
