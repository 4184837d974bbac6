//! Two-layer perceptron feature extractor

use super::{Linear, Module};
use crate::autograd::ops::relu;
use crate::Tensor;
use rand::Rng;

/// linear → relu → linear, the default feature extractor for adaptation.
pub struct Mlp {
    hidden: Linear,
    output: Linear,
}

impl Mlp {
    pub fn new(in_dim: usize, hidden_dim: usize, out_dim: usize, rng: &mut impl Rng) -> Self {
        Self {
            hidden: Linear::new(in_dim, hidden_dim, rng),
            output: Linear::new(hidden_dim, out_dim, rng),
        }
    }
}

impl Module for Mlp {
    fn forward(&self, input: &Tensor, batch: usize) -> Tensor {
        let h = self.hidden.forward(input, batch);
        let h = relu(&h);
        self.output.forward(&h, batch)
    }

    fn params(&self) -> Vec<Tensor> {
        let mut params = self.hidden.params();
        params.extend(self.output.params());
        params
    }

    fn set_training(&mut self, training: bool) {
        self.hidden.set_training(training);
        self.output.set_training(training);
    }

    fn input_dim(&self) -> usize {
        self.hidden.input_dim()
    }

    fn output_dim(&self) -> usize {
        self.output.output_dim()
    }
}
