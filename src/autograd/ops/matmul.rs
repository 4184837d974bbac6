//! Matrix multiplication and bias-add autograd operations
//!
//! Matrices are stored row-major in flat tensors; dimensions are passed
//! explicitly at the call site. Both forward and backward use a plain CPU
//! GEMM.

use crate::autograd::{BackwardOp, Tensor};
use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

/// Transpose a row-major matrix (rows x cols) to (cols x rows)
#[inline]
pub fn transpose(data: &[f32], rows: usize, cols: usize) -> Vec<f32> {
    let mut transposed = vec![0.0f32; rows * cols];
    for r in 0..rows {
        for c in 0..cols {
            transposed[c * rows + r] = data[r * cols + c];
        }
    }
    transposed
}

/// Row-major GEMM: C = A @ B with A m×k, B k×n
fn gemm(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
    let mut c = vec![0.0f32; m * n];
    for i in 0..m {
        for p in 0..k {
            let a_ip = a[i * k + p];
            if a_ip == 0.0 {
                continue;
            }
            for j in 0..n {
                c[i * n + j] += a_ip * b[p * n + j];
            }
        }
    }
    c
}

/// Matrix multiplication
///
/// Computes C = A @ B where:
/// - A is m×k (flattened to length m*k)
/// - B is k×n (flattened to length k*n)
/// - C is m×n (flattened to length m*n)
pub fn matmul(a: &Tensor, b: &Tensor, m: usize, k: usize, n: usize) -> Tensor {
    assert_eq!(a.len(), m * k, "Matrix A size mismatch");
    assert_eq!(b.len(), k * n, "Matrix B size mismatch");

    let a_data = a.data();
    let b_data = b.data();
    let result_data = gemm(
        a_data.as_slice().expect("matrix A must be contiguous"),
        b_data.as_slice().expect("matrix B must be contiguous"),
        m,
        k,
        n,
    );

    let requires_grad = a.requires_grad() || b.requires_grad();
    let mut result = Tensor::new(Array1::from(result_data), requires_grad);

    if requires_grad {
        let backward_op = Rc::new(MatmulBackward {
            a: a.clone(),
            b: b.clone(),
            m,
            k,
            n,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct MatmulBackward {
    a: Tensor,
    b: Tensor,
    m: usize,
    k: usize,
    n: usize,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for MatmulBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            let grad_slice = grad.as_slice().expect("gradient must be contiguous");

            if self.a.requires_grad() {
                // ∂L/∂A = ∂L/∂C @ Bᵀ  (m×n @ n×k)
                let b_data = self.b.data();
                let b_t = transpose(b_data.as_slice().expect("contiguous"), self.k, self.n);
                let grad_a = gemm(grad_slice, &b_t, self.m, self.n, self.k);
                self.a.accumulate_grad(Array1::from(grad_a));
            }
            if self.b.requires_grad() {
                // ∂L/∂B = Aᵀ @ ∂L/∂C  (k×m @ m×n)
                let a_data = self.a.data();
                let a_t = transpose(a_data.as_slice().expect("contiguous"), self.m, self.k);
                let grad_b = gemm(&a_t, grad_slice, self.k, self.m, self.n);
                self.b.accumulate_grad(Array1::from(grad_b));
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.a.clone(), self.b.clone()]
    }
}

/// Broadcast-add a bias row to every row of a rows×cols matrix
pub fn add_bias(x: &Tensor, bias: &Tensor, rows: usize, cols: usize) -> Tensor {
    assert_eq!(x.len(), rows * cols, "add_bias: matrix size mismatch");
    assert_eq!(bias.len(), cols, "add_bias: bias size mismatch");

    let x_data = x.data();
    let bias_data = bias.data();
    let mut out = x_data.to_vec();
    for r in 0..rows {
        for c in 0..cols {
            out[r * cols + c] += bias_data[c];
        }
    }

    let requires_grad = x.requires_grad() || bias.requires_grad();
    let mut result = Tensor::from_vec(out, requires_grad);

    if requires_grad {
        let backward_op = Rc::new(AddBiasBackward {
            x: x.clone(),
            bias: bias.clone(),
            rows,
            cols,
            result_grad: result.grad_cell(),
        });
        result.set_backward_op(backward_op);
    }

    result
}

struct AddBiasBackward {
    x: Tensor,
    bias: Tensor,
    rows: usize,
    cols: usize,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl BackwardOp for AddBiasBackward {
    fn backward(&self) {
        if let Some(grad) = self.result_grad.borrow().as_ref() {
            if self.x.requires_grad() {
                self.x.accumulate_grad(grad.clone());
            }
            if self.bias.requires_grad() {
                // ∂L/∂bias_c = sum over rows of ∂L/∂out[r,c]
                let mut grad_bias = vec![0.0f32; self.cols];
                for r in 0..self.rows {
                    for c in 0..self.cols {
                        grad_bias[c] += grad[r * self.cols + c];
                    }
                }
                self.bias.accumulate_grad(Array1::from(grad_bias));
            }
        }
    }

    fn inputs(&self) -> Vec<Tensor> {
        vec![self.x.clone(), self.bias.clone()]
    }
}
