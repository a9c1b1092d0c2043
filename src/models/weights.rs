//! Pretrained weight sources.
//!
//! Weights are published as safetensors files on the Hugging Face hub. They
//! are fetched through `hf-hub`, which keeps a process-wide cache on disk, so
//! only the first request for a weight set touches the network.

use candle_core::Device;
use candle_nn::VarMap;
use hf_hub::api::sync::{Api, ApiBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::{ArchError, ArchResult};

/// Describes a published set of pretrained weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PretrainedWeights {
    pub name: &'static str,
    pub description: &'static str,
    /// Hub repository holding the checkpoint.
    pub repo_id: &'static str,
    /// Checkpoint file within the repository.
    pub filename: &'static str,
}

/// InceptionResNetV2 trained on ImageNet-1k, ported from the TensorFlow release.
pub static INCEPTION_RESNET_V2_IMAGENET: PretrainedWeights = PretrainedWeights {
    name: "inception_resnet_v2.tf_in1k",
    description: "InceptionResNetV2 pretrained on ImageNet-1k",
    repo_id: "timm/inception_resnet_v2.tf_in1k",
    filename: "model.safetensors",
};

impl PretrainedWeights {
    /// Downloads the checkpoint, or returns the cached copy.
    ///
    /// `cache_dir` overrides the hub cache location; otherwise the usual
    /// `HF_HOME` resolution applies.
    pub fn fetch(&self, cache_dir: Option<&Path>) -> ArchResult<PathBuf> {
        let api = match cache_dir {
            Some(dir) => ApiBuilder::new().with_cache_dir(dir.to_path_buf()).build(),
            None => ApiBuilder::from_env().build(),
        }
        .map_err(|e| ArchError::weight_fetch(self.repo_id, self.filename, e))?;
        self.fetch_with(&api)
    }

    fn fetch_with(&self, api: &Api) -> ArchResult<PathBuf> {
        info!("Fetching {} from {}", self.name, self.repo_id);
        api.model(self.repo_id.to_string())
            .get(self.filename)
            .map_err(|e| ArchError::weight_fetch(self.repo_id, self.filename, e))
    }
}

/// Where backbone weights come from when pretrained initialization is requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightSource {
    /// A published checkpoint on the hub.
    Hub(&'static PretrainedWeights),
    /// A local safetensors file.
    File(PathBuf),
}

impl WeightSource {
    /// Resolves the source to a local file path, downloading if needed.
    pub fn resolve(&self, cache_dir: Option<&Path>) -> ArchResult<PathBuf> {
        match self {
            WeightSource::Hub(weights) => weights.fetch(cache_dir),
            WeightSource::File(path) => Ok(path.clone()),
        }
    }
}

/// Copies tensors from a safetensors checkpoint into the variables of `varmap`
/// whose names start with `prefix`.
///
/// Checkpoint keys are matched against the variable names with the prefix
/// stripped. Every selected variable must be present in the checkpoint with
/// the same shape; checkpoint entries nothing asks for are ignored. Returns the
/// number of variables updated.
pub fn load_into_varmap(varmap: &VarMap, prefix: &str, path: &Path) -> ArchResult<usize> {
    let tensors = candle_core::safetensors::load(path, &Device::Cpu)?;
    let data = varmap
        .data()
        .lock()
        .map_err(|_| ArchError::config_error("parameter map lock poisoned"))?;

    let mut copied = 0usize;
    for (name, var) in data.iter() {
        let Some(key) = name.strip_prefix(prefix) else {
            continue;
        };
        let tensor = tensors
            .get(key)
            .ok_or_else(|| candle_core::Error::CannotFindTensor {
                path: key.to_string(),
            })?;
        let tensor = tensor.to_dtype(var.dtype())?.to_device(var.device())?;
        var.set(&tensor)?;
        copied += 1;
    }

    debug!(
        "Copied {} tensors from {} ({} checkpoint entries unused)",
        copied,
        path.display(),
        tensors.len().saturating_sub(copied)
    );
    Ok(copied)
}
