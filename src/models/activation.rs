//! Output activations applied as the last transformation of a classifier.

use candle_core::{D, Tensor};
use std::str::FromStr;

use crate::core::ArchError;

/// Pointwise (or row-wise, for the softmax family) activation applied to the
/// output layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputActivation {
    /// Normalized exponential over the label axis; rows sum to one.
    Softmax,
    LogSoftmax,
    /// Independent sigmoid per label, for multi-label problems.
    Sigmoid,
    /// Identity; the model returns logits.
    Linear,
    Relu,
    Relu6,
    Tanh,
    Elu,
    Selu,
    Softplus,
    Softsign,
    Exponential,
    Gelu,
    Silu,
    HardSigmoid,
}

const SELU_ALPHA: f64 = 1.673_263_242_354_377_3;
const SELU_SCALE: f64 = 1.050_700_987_355_480_5;

impl OutputActivation {
    /// Canonical name of the activation.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Softmax => "softmax",
            Self::LogSoftmax => "log_softmax",
            Self::Sigmoid => "sigmoid",
            Self::Linear => "linear",
            Self::Relu => "relu",
            Self::Relu6 => "relu6",
            Self::Tanh => "tanh",
            Self::Elu => "elu",
            Self::Selu => "selu",
            Self::Softplus => "softplus",
            Self::Softsign => "softsign",
            Self::Exponential => "exponential",
            Self::Gelu => "gelu",
            Self::Silu => "silu",
            Self::HardSigmoid => "hard_sigmoid",
        }
    }

    /// Applies the activation to a `(batch, units)` tensor.
    pub fn apply(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            Self::Softmax => candle_nn::ops::softmax(xs, D::Minus1),
            Self::LogSoftmax => candle_nn::ops::log_softmax(xs, D::Minus1),
            Self::Sigmoid => candle_nn::ops::sigmoid(xs),
            Self::Linear => Ok(xs.clone()),
            Self::Relu => xs.relu(),
            Self::Relu6 => xs.clamp(0f32, 6f32),
            Self::Tanh => xs.tanh(),
            Self::Elu => xs.elu(1.0),
            Self::Selu => xs.elu(SELU_ALPHA)? * SELU_SCALE,
            // log(1 + e^x) written as relu(x) + log(1 + e^-|x|) to stay finite for large x
            Self::Softplus => {
                let tail = (xs.abs()?.neg()?.exp()? + 1.0)?.log()?;
                xs.relu()? + tail
            }
            Self::Softsign => xs.broadcast_div(&(xs.abs()? + 1.0)?),
            Self::Exponential => xs.exp(),
            Self::Gelu => xs.gelu_erf(),
            Self::Silu => xs.silu(),
            Self::HardSigmoid => ((xs / 6.0)? + 0.5)?.clamp(0f32, 1f32),
        }
    }
}

impl FromStr for OutputActivation {
    type Err = ArchError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let activation = match name {
            "softmax" => Self::Softmax,
            "log_softmax" => Self::LogSoftmax,
            "sigmoid" => Self::Sigmoid,
            "linear" => Self::Linear,
            "relu" => Self::Relu,
            "relu6" => Self::Relu6,
            "tanh" => Self::Tanh,
            "elu" => Self::Elu,
            "selu" => Self::Selu,
            "softplus" => Self::Softplus,
            "softsign" => Self::Softsign,
            "exponential" => Self::Exponential,
            "gelu" => Self::Gelu,
            "silu" | "swish" => Self::Silu,
            "hard_sigmoid" => Self::HardSigmoid,
            _ => {
                return Err(ArchError::UnknownActivation {
                    name: name.to_string(),
                });
            }
        };
        Ok(activation)
    }
}

impl std::fmt::Display for OutputActivation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
