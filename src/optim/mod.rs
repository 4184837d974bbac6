//! Optimization algorithms
//!
//! The JDOT engine drives two independent optimizers (feature extractor and
//! task classifier), each implementing the [`Optimizer`] trait.

mod adam;
mod optimizer;
mod sgd;

pub use adam::Adam;
pub use optimizer::Optimizer;
pub use sgd::SGD;
