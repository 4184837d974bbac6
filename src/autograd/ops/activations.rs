//! Activation autograd operations: relu, sigmoid, row softmax, and the
//! binary probability expansion used by the transport cost matrix

use crate::autograd::{BackwardOp, Tensor};
use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

/// ReLU activation
pub fn relu(a: &Tensor) -> Tensor {
    let data = a.data().mapv(|x| x.max(0.0));
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ReluBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ReluBackward {
    a: Tensor,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for ReluBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂a = ∂L/∂out * (a > 0)
                let grad_a = grad * &self.a.data().mapv(|x| if x > 0.0 { 1.0 } else { 0.0 });
                self.a.accumulate_grad(grad_a);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Sigmoid activation: 1 / (1 + e^(-x))
pub fn sigmoid(a: &Tensor) -> Tensor {
    let data = a.data().mapv(|x| 1.0 / (1.0 + (-x).exp()));
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data.clone(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(SigmoidBackward {
            a: a.clone(),
            output: data,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct SigmoidBackward {
    a: Tensor,
    output: Array1<f32>,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for SigmoidBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂σ/∂x = σ(x)(1 - σ(x))
                let grad_a = grad * &self.output.mapv(|s| s * (1.0 - s));
                self.a.accumulate_grad(grad_a);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Row-wise softmax over a rows×cols matrix, with max subtraction for
/// numerical stability
pub fn softmax_rows(a: &Tensor, rows: usize, cols: usize) -> Tensor {
    assert_eq!(a.len(), rows * cols, "softmax_rows: size mismatch");

    let data = a.data();
    let mut out = vec![0.0f32; rows * cols];
    for r in 0..rows {
        let row = &data.as_slice().expect("contiguous")[r * cols..(r + 1) * cols];
        let max = row.iter().fold(f32::NEG_INFINITY, |m, &x| m.max(x));
        let mut denom = 0.0;
        for (c, &x) in row.iter().enumerate() {
            let e = (x - max).exp();
            out[r * cols + c] = e;
            denom += e;
        }
        for c in 0..cols {
            out[r * cols + c] /= denom;
        }
    }

    let requires_grad = a.requires_grad();
    let output = Array1::from(out);
    let mut result = Tensor::new(output.clone(), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(SoftmaxRowsBackward {
            a: a.clone(),
            output,
            rows,
            cols,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct SoftmaxRowsBackward {
    a: Tensor,
    output: Array1<f32>,
    rows: usize,
    cols: usize,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for SoftmaxRowsBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // Per row: ∂L/∂x_i = s_i * (g_i - Σ_j g_j s_j)
                let mut grad_a = vec![0.0f32; self.rows * self.cols];
                for r in 0..self.rows {
                    let base = r * self.cols;
                    let mut dot = 0.0;
                    for c in 0..self.cols {
                        dot += grad[base + c] * self.output[base + c];
                    }
                    for c in 0..self.cols {
                        grad_a[base + c] = self.output[base + c] * (grad[base + c] - dot);
                    }
                }
                self.a.accumulate_grad(Array1::from(grad_a));
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Expand a vector of binary positive-class probabilities into two-column
/// categorical distributions: p_i -> [1 - p_i, p_i].
///
/// The transport label cost requires a categorical distribution over at
/// least two classes, so single-output classifiers are widened here.
pub fn expand_binary(p: &Tensor) -> Tensor {
    let data = p.data();
    let n = data.len();
    let mut out = vec![0.0f32; 2 * n];
    for i in 0..n {
        out[2 * i] = 1.0 - data[i];
        out[2 * i + 1] = data[i];
    }

    let requires_grad = p.requires_grad();
    let mut result = Tensor::from_vec(out, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ExpandBinaryBackward {
            p: p.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ExpandBinaryBackward {
    p: Tensor,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for ExpandBinaryBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.p.requires_grad() {
                // out[2i] = 1 - p_i, out[2i+1] = p_i
                let n = self.p.len();
                let mut grad_p = vec![0.0f32; n];
                for i in 0..n {
                    grad_p[i] = grad[2 * i + 1] - grad[2 * i];
                }
                self.p.accumulate_grad(Array1::from(grad_p));
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.p.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::backward;
    use approx::assert_relative_eq;
    use ndarray::arr1;

    #[test]
    fn test_relu() {
        let a = Tensor::from_vec(vec![-1.0, 0.0, 2.0], true);
        let mut out = relu(&a);
        assert_eq!(out.data().to_vec(), vec![0.0, 0.0, 2.0]);

        backward(&mut out, Some(arr1(&[1.0, 1.0, 1.0])));
        assert_eq!(a.grad().unwrap().to_vec(), vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_sigmoid_values() {
        let a = Tensor::from_vec(vec![0.0, 100.0, -100.0], false);
        let out = sigmoid(&a);
        assert_relative_eq!(out.data()[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(out.data()[1], 1.0, epsilon = 1e-6);
        assert_relative_eq!(out.data()[2], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_sigmoid_gradient() {
        let a = Tensor::from_vec(vec![0.0], true);
        let mut out = sigmoid(&a);
        backward(&mut out, Some(arr1(&[1.0])));
        // σ'(0) = 0.25
        assert_relative_eq!(a.grad().unwrap()[0], 0.25, epsilon = 1e-6);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, -1.0, 0.0, 1.0], false);
        let out = softmax_rows(&a, 2, 3);
        let data = out.data();
        for r in 0..2 {
            let s: f32 = (0..3).map(|c| data[r * 3 + c]).sum();
            assert_relative_eq!(s, 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_softmax_rows_stability() {
        let a = Tensor::from_vec(vec![1000.0, 1001.0, 1002.0], false);
        let out = softmax_rows(&a, 1, 3);
        for &p in out.data().iter() {
            assert!(p.is_finite());
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_softmax_rows_gradient_sums_to_zero() {
        // Softmax gradient rows always sum to zero
        let a = Tensor::from_vec(vec![0.5, -0.2, 0.1], true);
        let mut out = softmax_rows(&a, 1, 3);
        backward(&mut out, Some(arr1(&[1.0, 0.0, 0.0])));

        let grad = a.grad().unwrap();
        let s: f32 = grad.iter().sum();
        assert_relative_eq!(s, 0.0, epsilon = 1e-5);
        assert!(grad[0] > 0.0);
    }

    #[test]
    fn test_expand_binary_is_distribution() {
        let p = Tensor::from_vec(vec![0.3, 0.9], false);
        let out = expand_binary(&p);
        let data = out.data();
        assert_relative_eq!(data[0], 0.7, epsilon = 1e-6);
        assert_relative_eq!(data[1], 0.3, epsilon = 1e-6);
        assert_relative_eq!(data[2], 0.1, epsilon = 1e-6);
        assert_relative_eq!(data[3], 0.9, epsilon = 1e-6);
        assert_relative_eq!(data[0] + data[1], 1.0, epsilon = 1e-6);
        assert_relative_eq!(data[2] + data[3], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_expand_binary_gradient() {
        let p = Tensor::from_vec(vec![0.5], true);
        let mut out = expand_binary(&p);
        backward(&mut out, Some(arr1(&[2.0, 5.0])));
        // ∂/∂p (1-p)*2 + p*5 -> 5 - 2 = 3
        assert_relative_eq!(p.grad().unwrap()[0], 3.0, epsilon = 1e-6);
    }
}
