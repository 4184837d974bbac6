//! Basic autograd operations: add, scale, sum, weighted mean

use crate::autograd::{BackwardOp, Tensor};
use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

/// Add two tensors
pub fn add(a: &Tensor, b: &Tensor) -> Tensor {
    assert_eq!(a.len(), b.len(), "add: length mismatch");
    let data = a.data() + b.data();
    let requires_grad = a.requires_grad() || b.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(AddBackward {
            a: a.clone(),
            b: b.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct AddBackward {
    a: Tensor,
    b: Tensor,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for AddBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                self.a.accumulate_grad(grad.clone());
            }
            if self.b.requires_grad() {
                self.b.accumulate_grad(grad.clone());
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone(), self.b.clone()]
    }
}

/// Scale tensor by a scalar
pub fn scale(a: &Tensor, factor: f32) -> Tensor {
    let data = a.data() * factor;
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(ScaleBackward {
            a: a.clone(),
            factor,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct ScaleBackward {
    a: Tensor,
    factor: f32,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for ScaleBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂a = ∂L/∂out * factor
                let grad_a = grad * self.factor;
                self.a.accumulate_grad(grad_a);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Sum all elements
pub fn sum(a: &Tensor) -> Tensor {
    let data = Array1::from(vec![a.data().sum()]);
    let requires_grad = a.requires_grad();

    let mut result = Tensor::new(data, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(SumBackward {
            a: a.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct SumBackward {
    a: Tensor,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for SumBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂a = ∂L/∂sum * 1 (broadcast)
                let grad_val = grad[0];
                let grad_a = Array1::from(vec![grad_val; self.a.len()]);
                self.a.accumulate_grad(grad_a);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

/// Mean of `a` weighted elementwise by constant `weights`:
/// `sum(weights * a) / len(a)`.
///
/// This is the `mean(plan ⊙ cost)` primitive of the JDOT losses: the
/// transport plan enters as fixed weights, so gradients flow only into the
/// cost entries.
pub fn weighted_mean(a: &Tensor, weights: &Array1<f32>) -> Tensor {
    assert_eq!(a.len(), weights.len(), "weighted_mean: length mismatch");
    let n = a.len() as f32;
    let value = (a.data() * weights).sum() / n;
    let requires_grad = a.requires_grad();

    let mut result = Tensor::from_vec(vec![value], requires_grad);

    if requires_grad {
        let backward_op = Rc::new(WeightedMeanBackward {
            a: a.clone(),
            weights: weights.clone(),
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct WeightedMeanBackward {
    a: Tensor,
    weights: Array1<f32>,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for WeightedMeanBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.a.requires_grad() {
                // ∂L/∂a_i = ∂L/∂out * w_i / n
                let n = self.a.len() as f32;
                let grad_a = &self.weights * (grad[0] / n);
                self.a.accumulate_grad(grad_a);
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::backward;
    use approx::assert_relative_eq;
    use ndarray::arr1;

    #[test]
    fn test_add() {
        let a = Tensor::from_vec(vec![1.0, 2.0], true);
        let b = Tensor::from_vec(vec![3.0, 4.0], true);
        let mut c = add(&a, &b);
        assert_eq!(c.data().to_vec(), vec![4.0, 6.0]);

        backward(&mut c, Some(arr1(&[1.0, 1.0])));
        assert_eq!(a.grad().unwrap().to_vec(), vec![1.0, 1.0]);
        assert_eq!(b.grad().unwrap().to_vec(), vec![1.0, 1.0]);
    }

    #[test]
    #[should_panic(expected = "length mismatch")]
    fn test_add_length_mismatch() {
        let a = Tensor::from_vec(vec![1.0], true);
        let b = Tensor::from_vec(vec![1.0, 2.0], true);
        add(&a, &b);
    }

    #[test]
    fn test_scale() {
        let a = Tensor::from_vec(vec![2.0, -3.0], true);
        let mut b = scale(&a, 0.5);
        assert_eq!(b.data().to_vec(), vec![1.0, -1.5]);

        backward(&mut b, Some(arr1(&[1.0, 2.0])));
        assert_eq!(a.grad().unwrap().to_vec(), vec![0.5, 1.0]);
    }

    #[test]
    fn test_sum() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0], true);
        let mut s = sum(&a);
        assert_eq!(s.data()[0], 6.0);

        backward(&mut s, None);
        assert_eq!(a.grad().unwrap().to_vec(), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_weighted_mean_value() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], true);
        let w = arr1(&[0.25, 0.25, 0.25, 0.25]);
        let m = weighted_mean(&a, &w);
        // sum(w*a)/n = 2.5 / 4
        assert_relative_eq!(m.data()[0], 0.625, epsilon = 1e-6);
    }

    #[test]
    fn test_weighted_mean_gradient() {
        let a = Tensor::from_vec(vec![1.0, 2.0], true);
        let w = arr1(&[0.3, 0.7]);
        let mut m = weighted_mean(&a, &w);
        backward(&mut m, None);

        let grad = a.grad().unwrap();
        assert_relative_eq!(grad[0], 0.15, epsilon = 1e-6);
        assert_relative_eq!(grad[1], 0.35, epsilon = 1e-6);
    }

    #[test]
    fn test_weighted_mean_no_grad() {
        let a = Tensor::from_vec(vec![1.0, 2.0], false);
        let w = arr1(&[1.0, 1.0]);
        let m = weighted_mean(&a, &w);
        assert!(m.backward_op().is_none());
    }
}
