//! Loss terms for the JDOT objective
//!
//! The composed objective is
//! `task + anneal(epoch) * domain + pseudo_task`, where the domain and
//! pseudo-task terms are plan-weighted means of the two cost matrices
//! (built with [`weighted_mean`](crate::autograd::ops::weighted_mean)) and
//! the task term comes from one of the sample-weighted losses below.
//! Only the domain term is annealed; the pseudo-task term enters at full
//! strength from the first epoch, matching the published algorithm.

use crate::autograd::{BackwardOp, Tensor};
use ndarray::{arr1, Array1};
use std::cell::RefCell;
use std::rc::Rc;

// Must be large enough that 1.0 - PROB_FLOOR < 1.0 in f32, or the upper
// clamp cannot pull saturated probabilities off exactly 1.0.
const PROB_FLOOR: f32 = 1e-7;

/// Sigmoid ramp for the domain-alignment term: 0 at the start of training,
/// approaching 1 as `epoch` nears `num_epochs`.
pub fn anneal_coefficient(epoch: usize, num_epochs: usize) -> f32 {
    let progress = -10.0 * epoch as f32 / (num_epochs + 1) as f32;
    2.0 / (1.0 + progress.exp()) - 1.0
}

/// Sample-weighted binary cross-entropy over predicted probabilities.
///
/// `probs[i]` is the predicted probability of class 1 for row i; the loss
/// is `mean_i(w_i * -(y_i ln p_i + (1 - y_i) ln(1 - p_i)))`.
pub fn weighted_bce(probs: &Tensor, targets: &Array1<f32>, weights: &Array1<f32>) -> Tensor {
    let n = probs.len();
    assert_eq!(n, targets.len(), "weighted_bce: one target per probability");
    assert_eq!(n, weights.len(), "weighted_bce: one weight per probability");

    let p = probs.data();
    let mut total = 0.0f32;
    for i in 0..n {
        let pi = clamp_prob(p[i]);
        total -= weights[i] * (targets[i] * pi.ln() + (1.0 - targets[i]) * (1.0 - pi).ln());
    }

    let requires_grad = probs.requires_grad();
    let mut result = Tensor::new(arr1(&[total / n as f32]), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(WeightedBceBackward {
            probs: probs.clone(),
            targets: targets.clone(),
            weights: weights.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct WeightedBceBackward {
    probs: Tensor,
    targets: Array1<f32>,
    weights: Array1<f32>,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for WeightedBceBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.probs.requires_grad() {
                let g0 = grad[0];
                let p = self.probs.data();
                let n = p.len();
                let mut grad_p = Array1::zeros(n);
                for i in 0..n {
                    let pi = clamp_prob(p[i]);
                    let y = self.targets[i];
                    // d/dp of -(y ln p + (1-y) ln(1-p))
                    grad_p[i] = g0 * self.weights[i] * (-y / pi + (1.0 - y) / (1.0 - pi))
                        / n as f32;
                }
                self.probs.accumulate_grad(grad_p);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.probs.clone()]
    }
}

/// Sample-weighted negative log likelihood over categorical distributions.
///
/// `probs` is batch×classes row-major; the loss is
/// `mean_i(w_i * -ln probs[i, labels_i])`.
pub fn weighted_nll(
    probs: &Tensor,
    labels: &[usize],
    classes: usize,
    weights: &Array1<f32>,
) -> Tensor {
    let n = labels.len();
    assert_eq!(probs.len(), n * classes, "weighted_nll: probs size mismatch");
    assert_eq!(n, weights.len(), "weighted_nll: one weight per row");
    for &y in labels {
        assert!(y < classes, "weighted_nll: label {y} out of range");
    }

    let p = probs.data();
    let mut total = 0.0f32;
    for (i, &y) in labels.iter().enumerate() {
        let pi = clamp_prob(p[i * classes + y]);
        total -= weights[i] * pi.ln();
    }

    let requires_grad = probs.requires_grad();
    let mut result = Tensor::new(arr1(&[total / n as f32]), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(WeightedNllBackward {
            probs: probs.clone(),
            labels: labels.to_vec(),
            classes,
            weights: weights.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct WeightedNllBackward {
    probs: Tensor,
    labels: Vec<usize>,
    classes: usize,
    weights: Array1<f32>,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for WeightedNllBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.probs.requires_grad() {
                let g0 = grad[0];
                let p = self.probs.data();
                let n = self.labels.len();
                let mut grad_p = Array1::zeros(p.len());
                for (i, &y) in self.labels.iter().enumerate() {
                    let pi = clamp_prob(p[i * self.classes + y]);
                    grad_p[i * self.classes + y] = -g0 * self.weights[i] / (pi * n as f32);
                }
                self.probs.accumulate_grad(grad_p);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.probs.clone()]
    }
}

fn clamp_prob(p: f32) -> f32 {
    p.clamp(PROB_FLOOR, 1.0 - PROB_FLOOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::backward;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_anneal_starts_at_zero() {
        assert_relative_eq!(anneal_coefficient(0, 100), 0.0, epsilon = 1e-7);
    }

    #[test]
    fn test_anneal_monotone_and_bounded() {
        let mut last = -1.0f32;
        for epoch in 0..500 {
            let a = anneal_coefficient(epoch, 500);
            assert!(a >= last);
            assert!((0.0..1.0).contains(&a));
            last = a;
        }
    }

    #[test]
    fn test_anneal_approaches_one() {
        assert!(anneal_coefficient(999, 1000) > 0.99);
    }

    #[test]
    fn test_bce_matches_hand_computation() {
        let probs = Tensor::from_vec(vec![0.9, 0.2], false);
        let targets = arr1(&[1.0, 0.0]);
        let weights = arr1(&[1.0, 1.0]);
        let loss = weighted_bce(&probs, &targets, &weights);

        let expected = (-(0.9f32.ln()) - (0.8f32.ln())) / 2.0;
        assert_relative_eq!(loss.data()[0], expected, epsilon = 1e-5);
    }

    #[test]
    fn test_bce_gradient() {
        let probs = Tensor::from_vec(vec![0.8], true);
        let targets = arr1(&[1.0]);
        let weights = arr1(&[1.0]);
        let mut loss = weighted_bce(&probs, &targets, &weights);
        backward(&mut loss, None);

        // d/dp of -ln(p) at p = 0.8 is -1.25
        assert_relative_eq!(probs.grad().unwrap()[0], -1.25, epsilon = 1e-5);
    }

    #[test]
    fn test_bce_weights_scale_contribution() {
        let probs = Tensor::from_vec(vec![0.7, 0.7], false);
        let targets = arr1(&[1.0, 1.0]);
        let unit = arr1(&[1.0, 1.0]);
        let halved = arr1(&[0.5, 0.5]);

        let full = weighted_bce(&probs, &targets, &unit);
        let half = weighted_bce(&probs, &targets, &halved);
        assert_relative_eq!(half.data()[0], full.data()[0] / 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_clamp_moves_saturated_probabilities_off_the_boundary() {
        let hi = clamp_prob(1.0);
        assert!(hi < 1.0);
        assert!((1.0 - hi).ln().is_finite());

        let lo = clamp_prob(0.0);
        assert!(lo > 0.0);
        assert!(lo.ln().is_finite());
    }

    #[test]
    fn test_bce_finite_at_extreme_probabilities() {
        let probs = Tensor::from_vec(vec![0.0, 1.0], true);
        let targets = arr1(&[1.0, 0.0]);
        let weights = arr1(&[1.0, 1.0]);
        let mut loss = weighted_bce(&probs, &targets, &weights);
        assert!(loss.data()[0].is_finite());
        backward(&mut loss, None);
        for &g in probs.grad().unwrap().iter() {
            assert!(g.is_finite());
        }
    }

    #[test]
    fn test_nll_matches_hand_computation() {
        // rows: [0.7, 0.3], [0.2, 0.8]; labels [0, 1]
        let probs = Tensor::from_vec(vec![0.7, 0.3, 0.2, 0.8], false);
        let weights = arr1(&[1.0, 1.0]);
        let loss = weighted_nll(&probs, &[0, 1], 2, &weights);

        let expected = (-(0.7f32.ln()) - (0.8f32.ln())) / 2.0;
        assert_relative_eq!(loss.data()[0], expected, epsilon = 1e-5);
    }

    #[test]
    fn test_nll_gradient_targets_picked_class_only() {
        let probs = Tensor::from_vec(vec![0.25, 0.75], true);
        let weights = arr1(&[2.0]);
        let mut loss = weighted_nll(&probs, &[1], 2, &weights);
        backward(&mut loss, None);

        let grad = probs.grad().unwrap();
        assert_eq!(grad[0], 0.0);
        assert_relative_eq!(grad[1], -2.0 / 0.75, epsilon = 1e-4);
    }

    proptest! {
        #[test]
        fn prop_anneal_in_unit_interval(
            num_epochs in 1usize..10_000,
            epoch_seed in any::<usize>(),
        ) {
            // The engine only evaluates epochs 0..num_epochs.
            let epoch = epoch_seed % num_epochs;
            let a = anneal_coefficient(epoch, num_epochs);
            prop_assert!((0.0..1.0).contains(&a));
        }

        #[test]
        fn prop_bce_nonnegative(
            p in proptest::collection::vec(0.0f32..=1.0, 1..20),
            y_bits in proptest::collection::vec(any::<bool>(), 20),
        ) {
            let n = p.len();
            let targets = Array1::from(
                y_bits.iter().take(n).map(|&b| if b { 1.0 } else { 0.0 }).collect::<Vec<f32>>()
            );
            let weights = Array1::from_elem(n, 1.0);
            let probs = Tensor::from_vec(p, false);
            let loss = weighted_bce(&probs, &targets, &weights);
            prop_assert!(loss.data()[0] >= 0.0);
        }
    }
}
