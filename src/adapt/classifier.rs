//! Task classifier adapters
//!
//! Binary and multiclass heads differ in label encoding, loss function,
//! and how predictions enter the transport cost. Each adapter hides its
//! own encoding behind the shared [`TaskClassifier`] interface so the
//! engine never branches on output arity.

use super::loss::{weighted_bce, weighted_nll};
use crate::autograd::ops::{expand_binary, sigmoid, softmax_rows};
use crate::nn::{Linear, Module};
use crate::Tensor;
use ndarray::{Array1, ArrayView2};
use rand::Rng;

/// Classification head over extracted features.
pub trait TaskClassifier {
    /// Raw head width: 1 for binary, C for multiclass.
    fn output_size(&self) -> usize;

    /// Number of task classes (always ≥ 2).
    fn num_classes(&self) -> usize;

    /// Predicted probabilities for `batch` feature rows. Binary heads
    /// return one probability per row; multiclass heads return a
    /// row-major batch×classes block.
    fn predict_proba(&self, features: &Tensor, batch: usize) -> Tensor;

    /// Expand `predict_proba` output into a full categorical distribution
    /// per row, as required by the label-cost broadcast.
    fn cost_distribution(&self, probs: &Tensor, batch: usize) -> Tensor;

    /// Hard class predictions for `batch` feature rows.
    fn predict(&self, features: &Tensor, batch: usize) -> Vec<usize>;

    /// Decode stored task-label columns into class indices.
    fn decode_labels(&self, task_labels: &ArrayView2<'_, f32>) -> Vec<usize>;

    /// Sample-weighted supervised loss against stored task labels.
    fn task_loss(
        &self,
        probs: &Tensor,
        task_labels: &ArrayView2<'_, f32>,
        weights: &Array1<f32>,
    ) -> Tensor;

    /// Trainable parameters, shared with the head's storage.
    fn params(&self) -> Vec<Tensor>;

    /// Toggle training / eval mode.
    fn set_training(&mut self, training: bool);
}

/// Single-logit head: sigmoid probability, BCE loss, 0.5 decision
/// threshold. Cost distributions expand p into [1-p, p].
pub struct BinaryClassifier {
    head: Linear,
}

impl BinaryClassifier {
    pub fn new(feature_dim: usize, rng: &mut impl Rng) -> Self {
        Self {
            head: Linear::new(feature_dim, 1, rng),
        }
    }
}

impl TaskClassifier for BinaryClassifier {
    fn output_size(&self) -> usize {
        1
    }

    fn num_classes(&self) -> usize {
        2
    }

    fn predict_proba(&self, features: &Tensor, batch: usize) -> Tensor {
        let logits = self.head.forward(features, batch);
        sigmoid(&logits)
    }

    fn cost_distribution(&self, probs: &Tensor, _batch: usize) -> Tensor {
        expand_binary(probs)
    }

    fn predict(&self, features: &Tensor, batch: usize) -> Vec<usize> {
        let probs = self.predict_proba(features, batch);
        probs
            .data()
            .iter()
            .map(|&p| usize::from(p > 0.5))
            .collect()
    }

    fn decode_labels(&self, task_labels: &ArrayView2<'_, f32>) -> Vec<usize> {
        task_labels
            .column(0)
            .iter()
            .map(|&y| usize::from(y > 0.5))
            .collect()
    }

    fn task_loss(
        &self,
        probs: &Tensor,
        task_labels: &ArrayView2<'_, f32>,
        weights: &Array1<f32>,
    ) -> Tensor {
        let targets = task_labels.column(0).to_owned();
        weighted_bce(probs, &targets, weights)
    }

    fn params(&self) -> Vec<Tensor> {
        self.head.params()
    }

    fn set_training(&mut self, training: bool) {
        self.head.set_training(training);
    }
}

/// Softmax head over C ≥ 2 classes with NLL loss and argmax decoding.
pub struct MulticlassClassifier {
    head: Linear,
    classes: usize,
}

impl MulticlassClassifier {
    pub fn new(feature_dim: usize, classes: usize, rng: &mut impl Rng) -> Self {
        assert!(classes >= 2, "multiclass head needs at least 2 classes");
        Self {
            head: Linear::new(feature_dim, classes, rng),
            classes,
        }
    }
}

impl TaskClassifier for MulticlassClassifier {
    fn output_size(&self) -> usize {
        self.classes
    }

    fn num_classes(&self) -> usize {
        self.classes
    }

    fn predict_proba(&self, features: &Tensor, batch: usize) -> Tensor {
        let logits = self.head.forward(features, batch);
        softmax_rows(&logits, batch, self.classes)
    }

    fn cost_distribution(&self, probs: &Tensor, _batch: usize) -> Tensor {
        probs.clone()
    }

    fn predict(&self, features: &Tensor, batch: usize) -> Vec<usize> {
        let probs = self.predict_proba(features, batch);
        let data = probs.data();
        (0..batch)
            .map(|i| {
                let mut best = 0;
                for c in 1..self.classes {
                    if data[i * self.classes + c] > data[i * self.classes + best] {
                        best = c;
                    }
                }
                best
            })
            .collect()
    }

    fn decode_labels(&self, task_labels: &ArrayView2<'_, f32>) -> Vec<usize> {
        task_labels
            .column(0)
            .iter()
            .map(|&y| y as usize)
            .collect()
    }

    fn task_loss(
        &self,
        probs: &Tensor,
        task_labels: &ArrayView2<'_, f32>,
        weights: &Array1<f32>,
    ) -> Tensor {
        let labels = self.decode_labels(task_labels);
        weighted_nll(probs, &labels, self.classes, weights)
    }

    fn params(&self) -> Vec<Tensor> {
        self.head.params()
    }

    fn set_training(&mut self, training: bool) {
        self.head.set_training(training);
    }
}
