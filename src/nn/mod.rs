//! Neural network building blocks
//!
//! Minimal layers for the adaptation models: a [`Module`] trait, a
//! fully-connected [`Linear`] layer, and a two-layer [`Mlp`] used as the
//! default feature extractor.

mod linear;
mod mlp;

pub use linear::Linear;
pub use mlp::Mlp;

use crate::Tensor;

/// A differentiable model over flattened row-major batches.
pub trait Module {
    /// Forward pass over `batch` rows of `input_dim` values each.
    fn forward(&self, input: &Tensor, batch: usize) -> Tensor;

    /// All trainable parameters, sharing storage with the module.
    fn params(&self) -> Vec<Tensor>;

    /// Switch between training (graph-building) and eval mode.
    fn set_training(&mut self, training: bool);

    /// Number of input features per row.
    fn input_dim(&self) -> usize;

    /// Number of output features per row.
    fn output_dim(&self) -> usize;

    /// Enable training mode.
    fn train(&mut self) {
        self.set_training(true);
    }

    /// Enable eval mode: forward passes detach parameters and build no
    /// backward graph.
    fn eval(&mut self) {
        self.set_training(false);
    }
}
