//! The composed classifier: backbone plus classification head.

use candle_core::{DType, Device, Result, Tensor, Var};
use candle_nn::{ModuleT, VarMap};
use image::DynamicImage;
use std::path::Path;
use std::sync::PoisonError;

use super::backbone::Backbone;
use super::head::ClassificationHead;
use super::weights::load_into_varmap;
use crate::core::{ArchResult, InputShape};
use crate::processors::ImagePreprocessor;

/// Variable-name prefix of backbone parameters.
pub const BACKBONE_PREFIX: &str = "backbone";
/// Variable-name prefix of head parameters.
pub const HEAD_PREFIX: &str = "head";

/// Name fragment of batch-norm running mean and variance.
const RUNNING_STAT_MARKER: &str = ".running_";

/// A fully wired image classifier.
///
/// Takes channels-last input `(batch, height, width, channels)` matching the
/// shape the model was built for and returns `(batch, n_labels)`. The model
/// owns every parameter in a [`VarMap`], so it can be handed to a candle
/// optimizer, saved, or reloaded.
pub struct ClassifierModel {
    architecture: &'static str,
    input: InputShape,
    backbone: Box<dyn Backbone>,
    head: ClassificationHead,
    varmap: VarMap,
    device: Device,
    dtype: DType,
}

impl std::fmt::Debug for ClassifierModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierModel")
            .field("architecture", &self.architecture)
            .field("input", &self.input)
            .field("n_labels", &self.head.n_labels())
            .field("activation", &self.head.activation())
            .field("device", &self.device)
            .finish()
    }
}

impl ClassifierModel {
    pub(crate) fn new(
        architecture: &'static str,
        input: InputShape,
        backbone: Box<dyn Backbone>,
        head: ClassificationHead,
        varmap: VarMap,
        device: Device,
        dtype: DType,
    ) -> Self {
        Self {
            architecture,
            input,
            backbone,
            head,
            varmap,
            device,
            dtype,
        }
    }

    /// Name of the backbone architecture.
    pub fn architecture(&self) -> &'static str {
        self.architecture
    }

    /// The per-image input shape the model was built for.
    pub fn input_shape(&self) -> InputShape {
        self.input
    }

    /// Width of the output layer.
    pub fn output_units(&self) -> usize {
        self.head.n_labels()
    }

    pub fn head(&self) -> &ClassificationHead {
        &self.head
    }

    pub fn backbone(&self) -> &dyn Backbone {
        self.backbone.as_ref()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Names of all layers, backbone first, head last.
    pub fn layer_names(&self) -> Vec<String> {
        let mut names = self.backbone.layer_names();
        names.extend(self.head.layer_names().into_iter().map(str::to_string));
        names
    }

    /// Total number of layers.
    pub fn layer_count(&self) -> usize {
        self.backbone.layer_count() + self.head.layer_names().len()
    }

    /// The parameter store backing this model.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Variables an optimizer should update, e.g. for `candle_nn::AdamW::new`.
    ///
    /// Batch-norm running statistics live in the same [`VarMap`] but are
    /// excluded.
    pub fn trainable_vars(&self) -> Vec<Var> {
        let data = self.varmap.data().lock().unwrap_or_else(PoisonError::into_inner);
        let mut vars: Vec<(&String, &Var)> = data
            .iter()
            .filter(|(name, _)| !name.contains(RUNNING_STAT_MARKER))
            .collect();
        vars.sort_by(|a, b| a.0.cmp(b.0));
        vars.into_iter().map(|(_, var)| var.clone()).collect()
    }

    /// Inference-mode forward pass (dropout disabled, batch norm uses running statistics).
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        self.forward_t(xs, false)
    }

    /// Runs inference and returns the output rows as `f32` vectors.
    pub fn predict(&self, xs: &Tensor) -> ArchResult<Vec<Vec<f32>>> {
        let ys = self.forward(xs)?.to_dtype(DType::F32)?;
        Ok(ys.to_vec2()?)
    }

    /// Preprocesses and classifies a batch of images.
    pub fn predict_images(
        &self,
        images: &[DynamicImage],
        preprocessor: &ImagePreprocessor,
    ) -> ArchResult<Vec<Vec<f32>>> {
        let batch = preprocessor
            .preprocess(images, &self.device)?
            .to_dtype(self.dtype)?;
        self.predict(&batch)
    }

    /// Saves every parameter to a safetensors file.
    pub fn save(&self, path: impl AsRef<Path>) -> ArchResult<()> {
        self.varmap.save(path)?;
        Ok(())
    }

    /// Restores every parameter from a file written by [`ClassifierModel::save`].
    pub fn load(&mut self, path: impl AsRef<Path>) -> ArchResult<()> {
        self.varmap.load(path)?;
        Ok(())
    }

    /// Overwrites the backbone parameters from a checkpoint keyed by
    /// backbone-relative names. Returns the number of tensors copied.
    pub fn load_backbone_weights(&self, path: impl AsRef<Path>) -> ArchResult<usize> {
        load_into_varmap(&self.varmap, &format!("{BACKBONE_PREFIX}."), path.as_ref())
    }
}

impl ModuleT for ClassifierModel {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let dims = xs.dims4()?;
        let expected = self.input.batch_nhwc(dims.0);
        if dims != expected {
            candle_core::bail!("expected input of shape {:?}, got {:?}", expected, xs.dims());
        }
        let xs = xs.permute((0, 3, 1, 2))?.contiguous()?;
        let features = self.backbone.forward_t(&xs, train)?;
        self.head.forward_t(&features, train)
    }
}
