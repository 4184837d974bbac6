//! Fully-connected layer

use super::Module;
use crate::autograd::ops::{add_bias, matmul};
use crate::Tensor;
use rand::Rng;

/// Dense layer computing `x @ W + b` over row-major batches.
pub struct Linear {
    weight: Tensor, // in_dim × out_dim, row-major
    bias: Tensor,   // out_dim
    in_dim: usize,
    out_dim: usize,
    training: bool,
}

impl Linear {
    /// Create a layer with Xavier-uniform weights and zero bias.
    pub fn new(in_dim: usize, out_dim: usize, rng: &mut impl Rng) -> Self {
        let limit = (6.0 / (in_dim + out_dim) as f32).sqrt();
        let weights: Vec<f32> = (0..in_dim * out_dim)
            .map(|_| rng.gen_range(-limit..limit))
            .collect();

        Self {
            weight: Tensor::from_vec(weights, true),
            bias: Tensor::from_vec(vec![0.0; out_dim], true),
            in_dim,
            out_dim,
            training: true,
        }
    }
}

impl Module for Linear {
    fn forward(&self, input: &Tensor, batch: usize) -> Tensor {
        // Eval mode detaches parameters so no backward graph accumulates.
        let (w, b) = if self.training {
            (self.weight.clone(), self.bias.clone())
        } else {
            (self.weight.detach(), self.bias.detach())
        };
        let out = matmul(input, &w, batch, self.in_dim, self.out_dim);
        add_bias(&out, &b, batch, self.out_dim)
    }

    fn params(&self) -> Vec<Tensor> {
        vec![self.weight.clone(), self.bias.clone()]
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn input_dim(&self) -> usize {
        self.in_dim
    }

    fn output_dim(&self) -> usize {
        self.out_dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::backward;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_linear_forward_shape() {
        let mut rng = StdRng::seed_from_u64(0);
        let layer = Linear::new(3, 2, &mut rng);
        let input = Tensor::from_vec(vec![1.0; 12], false);
        let out = layer.forward(&input, 4);
        assert_eq!(out.len(), 8);
    }

    #[test]
    fn test_linear_known_weights() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut layer = Linear::new(2, 1, &mut rng);
        *layer.weight.data_mut() = ndarray::arr1(&[2.0, -1.0]);
        *layer.bias.data_mut() = ndarray::arr1(&[0.5]);

        let input = Tensor::from_vec(vec![3.0, 4.0], false);
        let out = layer.forward(&input, 1);
        // 3*2 + 4*(-1) + 0.5 = 2.5
        assert_relative_eq!(out.data()[0], 2.5, epsilon = 1e-6);
    }

    #[test]
    fn test_linear_gradients_reach_params() {
        let mut rng = StdRng::seed_from_u64(1);
        let layer = Linear::new(2, 2, &mut rng);
        let input = Tensor::from_vec(vec![1.0, -1.0], false);
        let out = layer.forward(&input, 1);
        let mut loss = crate::autograd::ops::sum(&out);
        backward(&mut loss, None);

        assert!(layer.weight.grad().is_some());
        assert!(layer.bias.grad().is_some());
        // Bias gradient for a sum loss is all ones.
        assert_eq!(layer.bias.grad().unwrap().to_vec(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_linear_eval_mode_builds_no_graph() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut layer = Linear::new(2, 2, &mut rng);
        layer.set_training(false);

        let input = Tensor::from_vec(vec![1.0, -1.0], false);
        let out = layer.forward(&input, 1);
        assert!(!out.requires_grad());
    }

    #[test]
    fn test_linear_xavier_within_bound() {
        let mut rng = StdRng::seed_from_u64(3);
        let layer = Linear::new(10, 10, &mut rng);
        let limit = (6.0f32 / 20.0).sqrt();
        for &w in layer.weight.data().iter() {
            assert!(w.abs() <= limit);
        }
    }
}
