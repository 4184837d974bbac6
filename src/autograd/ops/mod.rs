//! Autograd operations

mod activations;
mod basic;
mod matmul;
mod pairwise;

pub use activations::{expand_binary, relu, sigmoid, softmax_rows};
pub use basic::{add, scale, sum, weighted_mean};
pub use matmul::{add_bias, matmul, transpose};
pub use pairwise::{label_cost_matrix, pairwise_l2};
