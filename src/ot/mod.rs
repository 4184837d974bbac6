//! Optimal transport
//!
//! Exact earth mover's distance (EMD) plans between discrete distributions,
//! computed with the transportation simplex. The JDOT engine calls
//! [`emd`] once per minibatch with uniform marginals and the joint
//! feature/label cost matrix.

mod emd;
mod error;

pub use emd::{emd, uniform};
pub use error::TransportError;
