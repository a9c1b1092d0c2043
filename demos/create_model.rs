//! Model Creation Example
//!
//! This example demonstrates how to build a classifier with the medarch
//! library, print a summary of it and optionally classify images.
//!
//! Usage:
//! ```
//! cargo run --example create_model -- --labels 4 --channels 3
//! ```
//!
//! To start from ImageNet weights and classify images:
//! ```
//! cargo run --example create_model -- --labels 4 --pretrained <image_paths>...
//! ```

use clap::Parser;
use medarch::core::init_tracing;
use medarch::prelude::*;
use medarch::utils::parse_device;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Command-line arguments for the model creation example
#[derive(Parser)]
#[command(name = "create_model")]
#[command(about = "Model Creation Example - builds a classifier and runs it on images")]
struct Args {
    /// Backbone architecture name
    #[arg(short, long, default_value = "InceptionResNetV2")]
    architecture: String,

    /// Number of image channels
    #[arg(short, long, default_value_t = 3)]
    channels: usize,

    /// Input height
    #[arg(long, default_value_t = 299)]
    height: usize,

    /// Input width
    #[arg(long, default_value_t = 299)]
    width: usize,

    /// Number of output labels
    #[arg(short, long)]
    labels: usize,

    /// Drop the dense + dropout block from the head
    #[arg(long)]
    no_fcl_dropout: bool,

    /// Output activation name
    #[arg(long, default_value = "softmax")]
    activation: String,

    /// Initialize the backbone from pretrained weights
    #[arg(short, long)]
    pretrained: bool,

    /// Device to run on (cpu, cuda, cuda:N)
    #[arg(short, long, default_value = "cpu")]
    device: String,

    /// Hub cache directory for pretrained weights
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Save the model parameters to this safetensors file
    #[arg(long)]
    save: Option<PathBuf>,

    /// Number of labels reported per image
    #[arg(long, default_value_t = 3)]
    topk: usize,

    /// Image file paths to classify
    images: Vec<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging
    init_tracing();

    let args = Args::parse();

    info!("Model Creation Example");

    let config = ArchitectureConfig {
        architecture: args.architecture.clone(),
        channels: args.channels,
        input_shape: (args.height, args.width),
        n_labels: args.labels,
        head: HeadConfig::new()
            .fcl_dropout(!args.no_fcl_dropout)
            .out_activation(args.activation.clone())
            .pretrained_weights(args.pretrained),
        cache_dir: args.cache_dir.clone(),
    };

    let device = parse_device(&args.device)?;
    let architecture = Architecture::from_config(&config)?.with_device(device);
    let model = architecture.create_model(config.n_labels, &config.head)?;

    info!("Architecture: {}", model.architecture());
    info!("Input shape: {}", model.input_shape());
    info!("Layers: {}", model.layer_count());
    info!("Head: {:?}", model.head().layer_names());
    info!("Output units: {}", model.output_units());

    // Filter out non-existent image files and log errors for missing files
    let existing_images: Vec<&String> = args
        .images
        .iter()
        .filter(|path| {
            let exists = Path::new(path).exists();
            if !exists {
                error!("Image file not found: {}", path);
            }
            exists
        })
        .collect();

    if !existing_images.is_empty() {
        let images = load_images(&existing_images)?;
        let scores = model.predict_images(&images, &architecture.preprocessor())?;
        let results = Topk::new().process(&scores, args.topk)?;
        for (i, (path, result)) in existing_images.iter().zip(&results).enumerate() {
            info!("{}. {}", i + 1, path);
            for (label, score) in result.indexes.iter().zip(&result.scores) {
                info!("   label {}: {:.4}", label, score);
            }
        }
    }

    if let Some(path) = &args.save {
        model.save(path)?;
        info!("Saved parameters to {}", path.display());
    }

    Ok(())
}
