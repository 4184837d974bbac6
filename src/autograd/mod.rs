//! Tape-based autograd engine
//!
//! Provides automatic differentiation using a computational graph with
//! gradient tape. Every differentiable operation returns a fresh [`Tensor`]
//! holding an `Rc` to a backward node; [`backward`] replays those nodes in
//! reverse topological order, so a tensor consumed by several downstream
//! operations (a shared feature extractor's output feeds both the task head
//! and the transport cost matrix) receives its full gradient before
//! propagating it further.

mod backward;
pub mod ops;
mod tensor;

pub use backward::BackwardOp;
pub use ops::*;
pub use tensor::Tensor;

use std::collections::HashSet;
use std::rc::Rc;

/// Perform backward pass on a tensor
pub fn backward(tensor: &mut Tensor, grad_output: Option<ndarray::Array1<f32>>) {
    if let Some(grad) = grad_output {
        tensor.set_grad(grad);
    } else {
        // Initialize with ones for scalar loss
        let ones = ndarray::Array1::ones(tensor.data().len());
        tensor.set_grad(ones);
    }

    if let Some(root) = tensor.backward_op() {
        for op in tape(root) {
            op.backward();
        }
    }
}

/// Collect the backward nodes reachable from `root` in execution order:
/// every node runs only after all of its consumers have deposited their
/// gradient contributions into its result tensor.
fn tape(root: Rc<dyn BackwardOp>) -> Vec<Rc<dyn BackwardOp>> {
    let mut seen = HashSet::new();
    let mut post_order = Vec::new();
    visit(root, &mut seen, &mut post_order);
    post_order.reverse();
    post_order
}

fn visit(
    op: Rc<dyn BackwardOp>,
    seen: &mut HashSet<*const ()>,
    post_order: &mut Vec<Rc<dyn BackwardOp>>,
) {
    let key = Rc::as_ptr(&op) as *const ();
    if !seen.insert(key) {
        return;
    }
    for input in op.inputs() {
        if let Some(child) = input.backward_op() {
            visit(child, seen, post_order);
        }
    }
    post_order.push(op);
}
