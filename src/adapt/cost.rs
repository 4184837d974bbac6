//! Per-batch transport cost construction
//!
//! Combines a pairwise feature-distance matrix with a broadcast label-cost
//! matrix into the joint cost the transport solver minimizes. The two
//! halves stay as separate autograd tensors because the plan weights them
//! with different coefficients in the composed loss.

use super::TaskClassifier;
use crate::autograd::ops::{label_cost_matrix, pairwise_l2};
use crate::Tensor;
use ndarray::Array2;

/// The two halves of the JDOT cost for one batch, each [n_t × n_s].
pub struct CostMatrices {
    /// L2 distances between target and source features.
    pub feature_dist: Tensor,
    /// Cross-entropy of each target prediction against each source label.
    pub label_cost: Tensor,
    pub n_t: usize,
    pub n_s: usize,
}

impl CostMatrices {
    /// Build both cost halves from extracted features and predictions.
    ///
    /// `target_dist` is the target predictions expanded to a categorical
    /// distribution per row (see
    /// [`TaskClassifier::cost_distribution`]); `source_labels` are decoded
    /// class indices.
    pub fn build<C: TaskClassifier + ?Sized>(
        classifier: &C,
        target_features: &Tensor,
        source_features: &Tensor,
        target_dist: &Tensor,
        source_labels: &[usize],
        n_t: usize,
        n_s: usize,
        feature_dim: usize,
    ) -> Self {
        let feature_dist = pairwise_l2(target_features, source_features, n_t, n_s, feature_dim);
        let label_cost =
            label_cost_matrix(target_dist, source_labels, n_t, classifier.num_classes());
        Self {
            feature_dist,
            label_cost,
            n_t,
            n_s,
        }
    }

    /// Sum both halves into the host-resident f64 matrix the transport
    /// solver consumes. Detached from the autograd graph by construction;
    /// non-finite entries are caught by the solver's own validation.
    pub fn host_cost(&self) -> Array2<f64> {
        let fd = self.feature_dist.data();
        let lc = self.label_cost.data();
        let mut cost = Array2::zeros((self.n_t, self.n_s));
        for i in 0..self.n_t {
            for j in 0..self.n_s {
                let idx = i * self.n_s + j;
                cost[[i, j]] = f64::from(fd[idx]) + f64::from(lc[idx]);
            }
        }
        cost
    }
}
