//! Tensor with shared storage and gradient cell
//!
//! Storage is a flat `Array1<f32>`; matrix-shaped values carry their
//! dimensions explicitly at the call site (see `ops::matmul`). Cloning a
//! tensor shares the underlying storage, gradient cell and backward node,
//! which is how model parameters stay shared between forward passes and
//! the optimizer.

use super::BackwardOp;
use ndarray::Array1;
use std::cell::{RefCell, RefMut};
use std::rc::Rc;

/// A 1-D tensor with optional gradient tracking
#[derive(Clone)]
pub struct Tensor {
    data: Rc<RefCell<Array1<f32>>>,
    grad: Rc<RefCell<Option<Array1<f32>>>>,
    requires_grad: bool,
    backward_op: Rc<RefCell<Option<Rc<dyn BackwardOp>>>>,
}

impl Tensor {
    /// Create a tensor from an ndarray
    pub fn new(data: Array1<f32>, requires_grad: bool) -> Self {
        Self {
            data: Rc::new(RefCell::new(data)),
            grad: Rc::new(RefCell::new(None)),
            requires_grad,
            backward_op: Rc::new(RefCell::new(None)),
        }
    }

    /// Create a tensor from a Vec
    pub fn from_vec(data: Vec<f32>, requires_grad: bool) -> Self {
        Self::new(Array1::from(data), requires_grad)
    }

    /// Create a zero-filled tensor of length `n`
    pub fn zeros(n: usize, requires_grad: bool) -> Self {
        Self::new(Array1::zeros(n), requires_grad)
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    /// True if the tensor holds no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the underlying data
    pub fn data(&self) -> Array1<f32> {
        self.data.borrow().clone()
    }

    /// Mutable access to the underlying data
    pub fn data_mut(&self) -> RefMut<'_, Array1<f32>> {
        self.data.borrow_mut()
    }

    /// Whether this tensor tracks gradients
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Copy of the current gradient, if any
    pub fn grad(&self) -> Option<Array1<f32>> {
        self.grad.borrow().clone()
    }

    /// Shared handle to the gradient cell, used by backward nodes
    pub fn grad_cell(&self) -> Rc<RefCell<Option<Array1<f32>>>> {
        Rc::clone(&self.grad)
    }

    /// Replace the gradient
    pub fn set_grad(&self, grad: Array1<f32>) {
        *self.grad.borrow_mut() = Some(grad);
    }

    /// Add into the gradient, initializing it if unset
    pub fn accumulate_grad(&self, grad: Array1<f32>) {
        let mut cell = self.grad.borrow_mut();
        if let Some(existing) = cell.as_mut() {
            *existing = &*existing + &grad;
        } else {
            *cell = Some(grad);
        }
    }

    /// Clear the gradient
    pub fn zero_grad(&self) {
        *self.grad.borrow_mut() = None;
    }

    /// Backward node that produced this tensor, if any
    pub fn backward_op(&self) -> Option<Rc<dyn BackwardOp>> {
        self.backward_op.borrow().clone()
    }

    /// Attach the backward node that produced this tensor
    pub fn set_backward_op(&mut self, op: Rc<dyn BackwardOp>) {
        *self.backward_op.borrow_mut() = Some(op);
    }

    /// View of the same storage without gradient tracking.
    ///
    /// Forward passes through a detached parameter build no tape, which is
    /// how evaluation mode disables gradient tracking.
    pub fn detach(&self) -> Tensor {
        Tensor {
            data: Rc::clone(&self.data),
            grad: Rc::new(RefCell::new(None)),
            requires_grad: false,
            backward_op: Rc::new(RefCell::new(None)),
        }
    }
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("data", &self.data.borrow())
            .field("requires_grad", &self.requires_grad)
            .finish()
    }
}
