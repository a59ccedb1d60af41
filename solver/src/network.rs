//! The move-ordering network.
//!
//! A small feed-forward network trained offline; the solver only calls
//! [`predict`] and only relies on the ordering of its outputs, never on the
//! absolute values.
//!
//! [`predict`]: Network::predict

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::features::FEATURE_COUNT;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Network {
    /// Which of the nine board features this network was trained on.  The
    /// feature extractor skips masked ones entirely.
    pub inputs_used: [bool; FEATURE_COUNT],
    layers: Vec<Layer>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct Layer {
    /// Row-major: `weights[out][in]`.
    weights: Vec<Vec<f32>>,
    biases: Vec<f32>,
    activation: Activation,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
enum Activation {
    Relu,
    Tanh,
    Identity,
}

impl Network {
    /// Read a network from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> io::Result<Network> {
        let file = BufReader::new(File::open(path)?);
        let network: Network = serde_json::from_reader(file)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

        for layer in &network.layers {
            if layer.weights.len() != layer.biases.len() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "layer weight and bias sizes disagree",
                ));
            }
        }

        Ok(network)
    }

    /// A single linear layer: the score is just `weights · features`.
    /// Useful as a hand-written heuristic and in tests.
    pub fn linear(inputs_used: [bool; FEATURE_COUNT], weights: [f32; FEATURE_COUNT]) -> Network {
        Network {
            inputs_used,
            layers: vec![Layer {
                weights: vec![weights.to_vec()],
                biases: vec![0.0],
                activation: Activation::Identity,
            }],
        }
    }

    /// Run the network forward.  The output is a single ordering score;
    /// higher means the board is more promising.
    pub fn predict(&self, features: &[f32; FEATURE_COUNT]) -> f32 {
        let mut values = features.to_vec();

        for layer in &self.layers {
            let mut next = Vec::with_capacity(layer.biases.len());

            for (weights, &bias) in layer.weights.iter().zip(&layer.biases) {
                let sum: f32 = weights.iter().zip(&values).map(|(w, v)| w * v).sum();
                next.push(layer.activation.apply(sum + bias));
            }

            values = next;
        }

        values[0]
    }
}

impl Activation {
    fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Relu => x.max(0.0),
            Activation::Tanh => x.tanh(),
            Activation::Identity => x,
        }
    }
}
