//! Backward operation trait for the gradient tape

use super::Tensor;

/// A node on the gradient tape.
///
/// `backward` reads the operation's result gradient and accumulates it into
/// the input tensors' gradients. It must NOT recurse into its inputs; the
/// tape walker in [`super::backward`] schedules every node exactly once,
/// after all of its consumers have run.
pub trait BackwardOp {
    /// Propagate the result gradient into the input gradients
    fn backward(&self);

    /// Input tensors of this operation, used for tape construction
    fn inputs(&self) -> Vec<Tensor>;
}
