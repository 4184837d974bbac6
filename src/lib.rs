//! Optimal-transport domain adaptation for neural classifiers.
//!
//! `adaptar` trains a task classifier on a labeled source domain so that it
//! generalizes to an unlabeled target domain. The core algorithm is DeepJDOT
//! (<https://arxiv.org/abs/1803.10081>): every minibatch solves an exact
//! discrete optimal-transport problem over a cost matrix that mixes
//! feature-space distance with pseudo-label disagreement, then uses the
//! transport plan to weight a domain-alignment loss and a pseudo-task loss,
//! all differentiated jointly through a shared feature extractor.
//!
//! Modules:
//! - [`autograd`] — tape-based automatic differentiation over flat f32 tensors
//! - [`optim`] — SGD and Adam optimizers
//! - [`ot`] — exact earth-mover's-distance solver (transportation simplex)
//! - [`nn`] — minimal parametric modules (Linear, Mlp)
//! - [`data`] — in-memory domain datasets, loaders, synthetic two-moons data
//! - [`adapt`] — the JDOT training engine, cost builder, loss composer,
//!   task-classifier adapters and early stopping

pub mod adapt;
pub mod autograd;
pub mod data;
pub mod nn;
pub mod optim;
pub mod ot;

pub use autograd::Tensor;
