//! Adaptation training errors

use crate::ot::TransportError;
use thiserror::Error;

/// Errors surfaced by a `fit` call. All are fatal for the call; there is no
/// retry or partial recovery.
#[derive(Debug, Error)]
pub enum FitError {
    /// Configuration rejected at entry
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Source and target batches disagree on feature dimensionality
    #[error("feature dimension mismatch: source has {source_dim}, target has {target_dim}")]
    FeatureDimMismatch { source_dim: usize, target_dim: usize },

    /// The composed loss became NaN or infinite; continuing would corrupt
    /// the parameters
    #[error("loss became non-finite at epoch {epoch}")]
    NonFiniteLoss { epoch: usize },

    /// The per-batch transport problem failed
    #[error(transparent)]
    Transport(#[from] TransportError),
}
