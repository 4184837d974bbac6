//! Confidence-based pseudo-label weights

use ndarray::{Array1, ArrayView2};

const CONFIDENCE_THR: f32 = 0.75;
const ALPHA: i32 = 1;

/// Per-sample weights from predicted task probabilities.
///
/// Confident predictions (above the threshold, or for binary below its
/// complement) get weight 1; uncertain ones are down-weighted toward
/// `p^alpha + (1 - thr)` so they still contribute, just less.
///
/// `task_probs` holds one column of probabilities for binary heads or one
/// column per class for multiclass heads.
pub fn pseudo_label_weights(task_probs: &ArrayView2<'_, f32>) -> Array1<f32> {
    let n = task_probs.nrows();
    let mut weights = Array1::zeros(n);

    if task_probs.ncols() == 1 {
        for i in 0..n {
            let p = task_probs[[i, 0]];
            weights[i] = if p > CONFIDENCE_THR || p < 1.0 - CONFIDENCE_THR {
                1.0
            } else if p > 0.5 {
                p.powi(ALPHA) + (1.0 - CONFIDENCE_THR)
            } else {
                (1.0 - p).powi(ALPHA) + (1.0 - CONFIDENCE_THR)
            };
        }
    } else {
        for i in 0..n {
            let p_max = task_probs
                .row(i)
                .iter()
                .copied()
                .fold(f32::NEG_INFINITY, f32::max);
            weights[i] = if p_max > CONFIDENCE_THR {
                1.0
            } else {
                p_max.powi(ALPHA) + (1.0 - CONFIDENCE_THR)
            };
        }
    }

    weights
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr2;

    #[test]
    fn test_confident_binary_predictions_get_full_weight() {
        let probs = arr2(&[[0.9], [0.1], [0.8]]);
        let w = pseudo_label_weights(&probs.view());
        assert_eq!(w.to_vec(), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_uncertain_binary_predictions_downweighted() {
        let probs = arr2(&[[0.6], [0.4]]);
        let w = pseudo_label_weights(&probs.view());
        assert_relative_eq!(w[0], 0.6 + 0.25, epsilon = 1e-6);
        assert_relative_eq!(w[1], 0.6 + 0.25, epsilon = 1e-6);
    }

    #[test]
    fn test_uncertain_weight_below_one() {
        let probs = arr2(&[[0.5]]);
        let w = pseudo_label_weights(&probs.view());
        assert!(w[0] < 1.0);
        assert_relative_eq!(w[0], 0.75, epsilon = 1e-6);
    }

    #[test]
    fn test_multiclass_uses_max_probability() {
        let probs = arr2(&[[0.8, 0.1, 0.1], [0.4, 0.35, 0.25]]);
        let w = pseudo_label_weights(&probs.view());
        assert_eq!(w[0], 1.0);
        assert_relative_eq!(w[1], 0.4 + 0.25, epsilon = 1e-6);
    }
}
