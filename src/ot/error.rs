//! Optimal transport error types

use thiserror::Error;

/// Errors from the exact transport solver
#[derive(Debug, Error)]
pub enum TransportError {
    /// Cost matrix shape does not match the marginal lengths
    #[error("cost matrix is {rows}x{cols} but marginals have {a_len} and {b_len} entries")]
    ShapeMismatch {
        rows: usize,
        cols: usize,
        a_len: usize,
        b_len: usize,
    },

    /// A marginal is not a probability vector
    #[error("{side} marginal sums to {sum} (expected 1 within tolerance)")]
    BadMarginal { side: &'static str, sum: f64 },

    /// A marginal entry is negative
    #[error("{side} marginal has negative entry {value} at index {index}")]
    NegativeWeight {
        side: &'static str,
        index: usize,
        value: f64,
    },

    /// Cost matrix contains NaN or infinity
    #[error("cost matrix entry at ({row}, {col}) is not finite")]
    NonFiniteCost { row: usize, col: usize },

    /// Simplex failed to converge within the pivot budget
    #[error("transport simplex exceeded {0} pivots without converging")]
    PivotLimit(usize),

    /// The basis lost spanning-tree connectivity during pivoting
    #[error("transport basis disconnected while pivoting at ({row}, {col})")]
    BasisDisconnected { row: usize, col: usize },
}
