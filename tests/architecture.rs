//! End-to-end construction of classifiers through the public API.

use candle_core::{DType, Device, Result, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, Module, ModuleT, Optimizer, SGD, VarBuilder};
use medarch::models::Backbone;
use medarch::prelude::*;

/// Single strided convolution, enough to exercise the head and the builder.
#[derive(Debug)]
struct StridedConv;

#[derive(Debug)]
struct StridedConvFeatures {
    conv: Conv2d,
}

impl BackboneProvider for StridedConv {
    fn name(&self) -> &'static str {
        "StridedConv"
    }

    fn preprocess_mode(&self) -> PreprocessMode {
        PreprocessMode::Caffe
    }

    fn build(&self, input: &InputShape, vb: VarBuilder) -> ArchResult<Box<dyn Backbone>> {
        let config = Conv2dConfig {
            stride: 4,
            ..Default::default()
        };
        let conv = candle_nn::conv2d(input.channels, 6, 4, config, vb.pp("conv"))?;
        Ok(Box::new(StridedConvFeatures { conv }))
    }
}

impl ModuleT for StridedConvFeatures {
    fn forward_t(&self, xs: &Tensor, _train: bool) -> Result<Tensor> {
        self.conv.forward(xs)?.relu()
    }
}

impl Backbone for StridedConvFeatures {
    fn num_features(&self) -> usize {
        6
    }

    fn layer_names(&self) -> Vec<String> {
        vec!["conv".to_string()]
    }
}

fn var_values(model: &ClassifierModel, name: &str) -> Vec<f32> {
    let data = model.varmap().data().lock().unwrap();
    data.get(name)
        .unwrap()
        .as_tensor()
        .flatten_all()
        .unwrap()
        .to_vec1()
        .unwrap()
}

fn assert_probability_rows(rows: &[Vec<f32>], n_labels: usize) {
    for row in rows {
        assert_eq!(row.len(), n_labels);
        assert!(row.iter().all(|&p| p >= 0.0));
        assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-4);
    }
}

#[test]
fn custom_provider_defaults_to_native_resolution() {
    let architecture = Architecture::new(StridedConv, 3);
    assert_eq!(architecture.input_shape(), InputShape::new((299, 299), 3));
    assert_eq!(architecture.preprocessor().mode(), PreprocessMode::Caffe);
}

#[test]
fn custom_provider_model_layers() {
    let architecture = Architecture::new(StridedConv, 2).with_input_shape((32, 24));
    let model = architecture
        .create_model(3, &HeadConfig::default().out_activation("sigmoid"))
        .unwrap();
    assert_eq!(
        model.layer_names(),
        vec!["conv", "avg_pool", "dense", "dropout", "preds", "probs"]
    );

    let xs = Tensor::randn(0f32, 1.0, (5, 32, 24, 2), &Device::Cpu).unwrap();
    let rows = model.predict(&xs).unwrap();
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().flatten().all(|&p| (0.0..=1.0).contains(&p)));
}

#[test]
fn wrong_input_layout_is_rejected() {
    let model = Architecture::new(StridedConv, 3)
        .with_input_shape((16, 16))
        .create_model(2, &HeadConfig::default())
        .unwrap();
    let channels_first = Tensor::zeros((1, 3, 16, 16), DType::F32, &Device::Cpu).unwrap();
    assert!(model.forward(&channels_first).is_err());
}

#[test]
fn training_forward_applies_dropout() {
    let model = Architecture::new(StridedConv, 3)
        .with_input_shape((16, 16))
        .create_model(4, &HeadConfig::default().out_activation("linear"))
        .unwrap();
    let xs = Tensor::ones((1, 16, 16, 3), DType::F32, &Device::Cpu).unwrap();
    let eval_a = model.forward_t(&xs, false).unwrap();
    let eval_b = model.forward_t(&xs, false).unwrap();
    let diff: f32 = (&eval_a - &eval_b)
        .unwrap()
        .abs()
        .unwrap()
        .sum_all()
        .unwrap()
        .to_scalar()
        .unwrap();
    assert_eq!(diff, 0.0);

    let train_a: Vec<Vec<f32>> = model.forward_t(&xs, true).unwrap().to_vec2().unwrap();
    let train_b: Vec<Vec<f32>> = model.forward_t(&xs, true).unwrap().to_vec2().unwrap();
    assert_eq!(train_a[0].len(), 4);
    assert_ne!(train_a, train_b);
    let eval: Vec<Vec<f32>> = eval_a.to_vec2().unwrap();
    assert_ne!(train_a, eval);
}

#[test]
fn save_and_load_restore_parameters() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.safetensors");
    let architecture = Architecture::new(StridedConv, 3).with_input_shape((16, 16));

    let saved = architecture.create_model(3, &HeadConfig::default()).unwrap();
    saved.save(&path).unwrap();

    let mut restored = architecture.create_model(3, &HeadConfig::default()).unwrap();
    assert_ne!(
        var_values(&saved, "head.preds.weight"),
        var_values(&restored, "head.preds.weight")
    );
    restored.load(&path).unwrap();
    for name in ["backbone.conv.weight", "head.dense.weight", "head.preds.bias"] {
        assert_eq!(var_values(&saved, name), var_values(&restored, name));
    }
}

#[test]
fn load_backbone_weights_after_construction() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backbone.safetensors");
    let architecture = Architecture::new(StridedConv, 3).with_input_shape((16, 16));
    let model = architecture.create_model(2, &HeadConfig::default()).unwrap();

    let mut tensors = std::collections::HashMap::new();
    tensors.insert(
        "conv.weight".to_string(),
        Tensor::full(0.5f32, (6, 3, 4, 4), &Device::Cpu).unwrap(),
    );
    tensors.insert(
        "conv.bias".to_string(),
        Tensor::zeros(6, DType::F32, &Device::Cpu).unwrap(),
    );
    candle_core::safetensors::save(&tensors, &path).unwrap();

    assert_eq!(model.load_backbone_weights(&path).unwrap(), 2);
    assert!(var_values(&model, "backbone.conv.weight").iter().all(|&v| v == 0.5));
}

#[test]
fn inception_resnet_v2_at_minimum_resolution() {
    let architecture = Architecture::inception_resnet_v2(3).with_input_shape((75, 75));
    let model = architecture.create_model(4, &HeadConfig::default()).unwrap();
    assert_eq!(model.output_units(), 4);

    let xs = Tensor::randn(0f32, 1.0, (2, 75, 75, 3), &Device::Cpu).unwrap();
    assert_probability_rows(&model.predict(&xs).unwrap(), 4);
}

#[test]
fn inception_resnet_v2_sgd_step_updates_backbone_and_head() {
    let model = Architecture::inception_resnet_v2(3)
        .with_input_shape((75, 75))
        .create_model(3, &HeadConfig::default().out_activation("log_softmax"))
        .unwrap();
    let trainable = model.trainable_vars();
    assert!(trainable.len() < model.varmap().all_vars().len());

    let stem = "backbone.conv2d_1a.conv.weight";
    let stem_before = var_values(&model, stem);
    let preds_before = var_values(&model, "head.preds.weight");
    let running_before = var_values(&model, "backbone.conv2d_1a.bn.running_var");

    let mut sgd = SGD::new(trainable, 0.1).unwrap();
    let xs = Tensor::randn(0f32, 1.0, (2, 75, 75, 3), &Device::Cpu).unwrap();
    let targets = Tensor::new(&[0u32, 2], &Device::Cpu).unwrap();
    let log_probs = model.forward(&xs).unwrap();
    let loss = candle_nn::loss::nll(&log_probs, &targets).unwrap();
    sgd.backward_step(&loss).unwrap();

    assert_ne!(var_values(&model, stem), stem_before);
    assert_ne!(var_values(&model, "head.preds.weight"), preds_before);
    assert_eq!(
        var_values(&model, "backbone.conv2d_1a.bn.running_var"),
        running_before
    );
}

#[test]
fn head_only_fine_tuning_backpropagates_through_backbone() {
    let model = Architecture::inception_resnet_v2(3)
        .with_input_shape((75, 75))
        .create_model(
            2,
            &HeadConfig::default()
                .fcl_dropout(false)
                .out_activation("linear"),
        )
        .unwrap();
    let head_vars: Vec<_> = {
        let data = model.varmap().data().lock().unwrap();
        data.iter()
            .filter(|(name, _)| name.starts_with("head."))
            .map(|(_, var)| var.clone())
            .collect()
    };
    assert_eq!(head_vars.len(), 2);
    let preds_before = var_values(&model, "head.preds.weight");

    let mut sgd = SGD::new(head_vars, 0.1).unwrap();
    let xs = Tensor::randn(0f32, 1.0, (2, 75, 75, 3), &Device::Cpu).unwrap();
    let logits = model.forward(&xs).unwrap();
    let loss = logits.narrow(1, 0, 1).unwrap().sum_all().unwrap();
    sgd.backward_step(&loss).unwrap();

    assert_ne!(var_values(&model, "head.preds.weight"), preds_before);
}

#[test]
fn inception_resnet_v2_greyscale_without_fcl() {
    let with = Architecture::inception_resnet_v2(1)
        .with_input_shape((80, 96))
        .create_model(2, &HeadConfig::default())
        .unwrap();
    let without = Architecture::inception_resnet_v2(1)
        .with_input_shape((80, 96))
        .create_model(2, &HeadConfig::default().fcl_dropout(false))
        .unwrap();
    assert_eq!(with.layer_count(), without.layer_count() + 2);

    let xs = Tensor::randn(0f32, 1.0, (1, 80, 96, 1), &Device::Cpu).unwrap();
    assert_eq!(without.forward(&xs).unwrap().dims2().unwrap(), (1, 2));
}

#[test]
#[ignore = "builds the full-resolution network, slow on CPU"]
fn inception_resnet_v2_native_resolution_softmax() {
    let model = Architecture::inception_resnet_v2(3)
        .with_input_shape((299, 299))
        .create_model(5, &HeadConfig::default())
        .unwrap();
    let xs = Tensor::randn(0f32, 1.0, (2, 299, 299, 3), &Device::Cpu).unwrap();
    assert_probability_rows(&model.predict(&xs).unwrap(), 5);
}

#[test]
#[ignore = "downloads ImageNet weights from the Hugging Face hub"]
fn inception_resnet_v2_pretrained_weights_replace_random_init() {
    let architecture = Architecture::inception_resnet_v2(3).with_input_shape((75, 75));
    let random = architecture.create_model(3, &HeadConfig::default()).unwrap();
    let pretrained = architecture
        .create_model(3, &HeadConfig::default().pretrained_weights(true))
        .unwrap();

    let name = "backbone.conv2d_1a.conv.weight";
    assert_ne!(var_values(&random, name), var_values(&pretrained, name));
    let running_var = var_values(&pretrained, "backbone.conv2d_7b.bn.running_var");
    assert!(running_var.iter().any(|&v| v != 1.0));
}

#[test]
#[ignore = "downloads ImageNet weights from the Hugging Face hub"]
fn inception_resnet_v2_pretrained_rejects_greyscale() {
    let result = Architecture::inception_resnet_v2(1)
        .with_input_shape((75, 75))
        .create_model(3, &HeadConfig::default().pretrained_weights(true));
    assert!(matches!(result, Err(ArchError::Candle(_))));
}
