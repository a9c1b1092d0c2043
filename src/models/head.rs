//! Classification head placed on top of a backbone feature map.
//!
//! ```text
//! features (B, C, H, W) → avg_pool → [dense 512 → dropout 0.3] → preds (n_labels) → probs
//! ```

use candle_core::{D, Result, Tensor};
use candle_nn::{Dropout, Linear, Module, ModuleT, VarBuilder};

use super::activation::OutputActivation;

/// Width of the optional fully-connected layer.
pub const FCL_UNITS: usize = 512;

/// Dropout rate following the fully-connected layer.
pub const FCL_DROPOUT_RATE: f32 = 0.3;

/// Global average pooling, optional dense + dropout block, output projection
/// and output activation.
#[derive(Debug, Clone)]
pub struct ClassificationHead {
    fcl: Option<(Linear, Dropout)>,
    preds: Linear,
    activation: OutputActivation,
    n_labels: usize,
}

impl ClassificationHead {
    /// Creates the head for a backbone producing `in_features` channels.
    pub fn load(
        in_features: usize,
        n_labels: usize,
        fcl_dropout: bool,
        activation: OutputActivation,
        vb: VarBuilder,
    ) -> Result<Self> {
        let (fcl, preds_in) = if fcl_dropout {
            let dense = candle_nn::linear(in_features, FCL_UNITS, vb.pp("dense"))?;
            (Some((dense, Dropout::new(FCL_DROPOUT_RATE))), FCL_UNITS)
        } else {
            (None, in_features)
        };
        let preds = candle_nn::linear(preds_in, n_labels, vb.pp("preds"))?;

        Ok(Self {
            fcl,
            preds,
            activation,
            n_labels,
        })
    }

    /// Number of output units.
    pub fn n_labels(&self) -> usize {
        self.n_labels
    }

    /// The activation applied last.
    pub fn activation(&self) -> OutputActivation {
        self.activation
    }

    /// Whether the dense + dropout block is present.
    pub fn has_fcl_dropout(&self) -> bool {
        self.fcl.is_some()
    }

    /// Names of the head layers in execution order.
    pub fn layer_names(&self) -> Vec<&'static str> {
        let mut names = vec!["avg_pool"];
        if self.fcl.is_some() {
            names.extend(["dense", "dropout"]);
        }
        names.extend(["preds", "probs"]);
        names
    }
}

impl ModuleT for ClassificationHead {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let mut xs = xs.mean(D::Minus1)?.mean(D::Minus1)?;
        if let Some((dense, dropout)) = &self.fcl {
            xs = dense.forward(&xs)?;
            xs = dropout.forward(&xs, train)?;
        }
        let logits = self.preds.forward(&xs)?;
        self.activation.apply(&logits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn head(fcl_dropout: bool, activation: OutputActivation) -> (VarMap, ClassificationHead) {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let head = ClassificationHead::load(16, 4, fcl_dropout, activation, vb).unwrap();
        (varmap, head)
    }

    #[test]
    fn test_head_output_width_is_label_count() {
        let (_, head) = head(true, OutputActivation::Softmax);
        let xs = Tensor::randn(0f32, 1.0, (3, 16, 5, 5), &Device::Cpu).unwrap();
        let ys = head.forward_t(&xs, false).unwrap();
        assert_eq!(ys.dims2().unwrap(), (3, 4));
        assert_eq!(head.n_labels(), 4);
    }

    #[test]
    fn test_fcl_block_adds_two_layers_and_dense_weights() {
        let (with_vars, with) = head(true, OutputActivation::Softmax);
        let (without_vars, without) = head(false, OutputActivation::Softmax);
        assert_eq!(with.layer_names().len(), without.layer_names().len() + 2);
        assert_eq!(
            without.layer_names(),
            vec!["avg_pool", "preds", "probs"]
        );

        let with_data = with_vars.data().lock().unwrap();
        assert_eq!(with_data.get("dense.weight").unwrap().as_tensor().dims(), &[512, 16]);
        assert_eq!(with_data.get("preds.weight").unwrap().as_tensor().dims(), &[4, 512]);
        let without_data = without_vars.data().lock().unwrap();
        assert!(!without_data.contains_key("dense.weight"));
        assert_eq!(without_data.get("preds.weight").unwrap().as_tensor().dims(), &[4, 16]);
    }

    #[test]
    fn test_global_average_pooling_ignores_spatial_layout() {
        let (_, head) = head(false, OutputActivation::Linear);
        let constant = Tensor::ones((1, 16, 1, 1), DType::F32, &Device::Cpu).unwrap();
        let spread = Tensor::ones((1, 16, 6, 3), DType::F32, &Device::Cpu).unwrap();
        let a: Vec<Vec<f32>> = head.forward_t(&constant, false).unwrap().to_vec2().unwrap();
        let b: Vec<Vec<f32>> = head.forward_t(&spread, false).unwrap().to_vec2().unwrap();
        for (x, y) in a[0].iter().zip(&b[0]) {
            assert!((x - y).abs() < 1e-5);
        }
    }

    #[test]
    fn test_dropout_only_active_in_training() {
        let (_, head) = head(true, OutputActivation::Linear);
        let xs = Tensor::randn(0f32, 1.0, (2, 16, 2, 2), &Device::Cpu).unwrap();
        let first: Vec<Vec<f32>> = head.forward_t(&xs, false).unwrap().to_vec2().unwrap();
        let second: Vec<Vec<f32>> = head.forward_t(&xs, false).unwrap().to_vec2().unwrap();
        assert_eq!(first, second);

        let train_a: Vec<Vec<f32>> = head.forward_t(&xs, true).unwrap().to_vec2().unwrap();
        let train_b: Vec<Vec<f32>> = head.forward_t(&xs, true).unwrap().to_vec2().unwrap();
        assert_ne!(train_a, train_b);
        assert_ne!(train_a, first);
    }

    #[test]
    fn test_dense_layers_use_default_initializers() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        ClassificationHead::load(256, 4, true, OutputActivation::Softmax, vb).unwrap();
        let data = varmap.data().lock().unwrap();

        let weight: Vec<f32> = data["dense.weight"].as_tensor().flatten_all().unwrap().to_vec1().unwrap();
        let n = weight.len() as f32;
        let mean = weight.iter().sum::<f32>() / n;
        let std = (weight.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n).sqrt();
        let expected = (2.0f32 / 256.0).sqrt();
        assert!(mean.abs() < 0.01, "mean {mean}");
        assert!((std - expected).abs() / expected < 0.05, "std {std} vs {expected}");

        let bound = 1.0 / 256f32.sqrt();
        let bias: Vec<f32> = data["dense.bias"].as_tensor().to_vec1().unwrap();
        assert!(bias.iter().all(|b| b.abs() <= bound));
    }
}
