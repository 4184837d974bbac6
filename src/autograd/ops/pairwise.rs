//! Pairwise cost-matrix autograd operations
//!
//! These build the two halves of the JDOT transport cost: the pairwise
//! feature-distance matrix and the broadcast label-cost matrix. Both are
//! row-major [n_t × n_s] with the target sample indexing rows.

use crate::autograd::{BackwardOp, Tensor};
use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

// Distances below this propagate no gradient (the L2 norm is not
// differentiable at zero).
const DIST_EPS: f32 = 1e-8;

// Probability floor for the label cost, matching the cross-entropy clamp.
const PROB_FLOOR: f32 = 1e-10;

/// Pairwise Euclidean distance matrix between two row sets.
///
/// `target` is n_t×dim and `source` is n_s×dim (both flattened row-major);
/// the result is n_t×n_s with `out[i,j] = ||target_i - source_j||₂`.
/// Gradients flow into both feature sets.
pub fn pairwise_l2(target: &Tensor, source: &Tensor, n_t: usize, n_s: usize, dim: usize) -> Tensor {
    assert_eq!(target.len(), n_t * dim, "pairwise_l2: target size mismatch");
    assert_eq!(source.len(), n_s * dim, "pairwise_l2: source size mismatch");

    let t = target.data();
    let s = source.data();
    let mut out = vec![0.0f32; n_t * n_s];
    for i in 0..n_t {
        for j in 0..n_s {
            let mut sq = 0.0f32;
            for k in 0..dim {
                let d = t[i * dim + k] - s[j * dim + k];
                sq += d * d;
            }
            out[i * n_s + j] = sq.sqrt();
        }
    }

    let requires_grad = target.requires_grad() || source.requires_grad();
    let output = Array1::from(out);
    let mut result = Tensor::new(output.clone(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(PairwiseL2Backward {
            target: target.clone(),
            source: source.clone(),
            output,
            n_t,
            n_s,
            dim,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct PairwiseL2Backward {
    target: Tensor,
    source: Tensor,
    output: Array1<f32>,
    n_t: usize,
    n_s: usize,
    dim: usize,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for PairwiseL2Backward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            let t = self.target.data();
            let s = self.source.data();
            let mut grad_t = vec![0.0f32; self.n_t * self.dim];
            let mut grad_s = vec![0.0f32; self.n_s * self.dim];

            for i in 0..self.n_t {
                for j in 0..self.n_s {
                    let d_ij = self.output[i * self.n_s + j];
                    if d_ij <= DIST_EPS {
                        continue;
                    }
                    // ∂d/∂t_ik = (t_ik - s_jk) / d, ∂d/∂s_jk = -(t_ik - s_jk) / d
                    let g = grad[i * self.n_s + j] / d_ij;
                    for k in 0..self.dim {
                        let diff = t[i * self.dim + k] - s[j * self.dim + k];
                        grad_t[i * self.dim + k] += g * diff;
                        grad_s[j * self.dim + k] -= g * diff;
                    }
                }
            }

            if self.target.requires_grad() {
                self.target.accumulate_grad(Array1::from(grad_t));
            }
            if self.source.requires_grad() {
                self.source.accumulate_grad(Array1::from(grad_s));
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.target.clone(), self.source.clone()]
    }
}

/// Broadcast label-cost matrix: every target prediction against every
/// source label.
///
/// `probs` is n_t×classes (rows are categorical distributions) and `labels`
/// holds n_s class indices; the result is n_t×n_s with
/// `out[i,j] = -ln(probs[i, labels[j]])`. This is the outer-product-style
/// cross-entropy expansion of the JDOT cost, not a batched cross-entropy.
pub fn label_cost_matrix(probs: &Tensor, labels: &[usize], n_t: usize, classes: usize) -> Tensor {
    assert_eq!(probs.len(), n_t * classes, "label_cost_matrix: probs size mismatch");
    assert!(classes >= 2, "label_cost_matrix: need a distribution over >= 2 classes");
    for &y in labels {
        assert!(y < classes, "label_cost_matrix: label {y} out of range");
    }

    let n_s = labels.len();
    let p = probs.data();
    let mut out = vec![0.0f32; n_t * n_s];
    for i in 0..n_t {
        for (j, &y) in labels.iter().enumerate() {
            let p_iy = (p[i * classes + y] + PROB_FLOOR).max(f32::MIN_POSITIVE);
            out[i * n_s + j] = -p_iy.ln();
        }
    }

    let requires_grad = probs.requires_grad();
    let mut result = Tensor::from_vec(out, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(LabelCostBackward {
            probs: probs.clone(),
            labels: labels.to_vec(),
            n_t,
            classes,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct LabelCostBackward {
    probs: Tensor,
    labels: Vec<usize>,
    n_t: usize,
    classes: usize,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for LabelCostBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.probs.requires_grad() {
                let p = self.probs.data();
                let n_s = self.labels.len();
                let mut grad_p = vec![0.0f32; self.n_t * self.classes];
                for i in 0..self.n_t {
                    for (j, &y) in self.labels.iter().enumerate() {
                        // ∂(-ln p)/∂p = -1/p
                        let p_iy = (p[i * self.classes + y] + PROB_FLOOR).max(f32::MIN_POSITIVE);
                        grad_p[i * self.classes + y] -= grad[i * n_s + j] / p_iy;
                    }
                }
                self.probs.accumulate_grad(Array1::from(grad_p));
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.probs.clone()]
    }
}
