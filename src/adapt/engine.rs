//! JDOT training loop

use super::{
    anneal_coefficient, pseudo_label_weights, CostMatrices, EarlyStopping, FitError, JdotConfig,
    TaskClassifier,
};
use crate::autograd::ops::{add, scale, weighted_mean};
use crate::autograd::{backward, Tensor};
use crate::data::{DomainBatch, DomainLoader};
use crate::nn::Module;
use crate::optim::Optimizer;
use crate::ot;
use ndarray::{Array1, Array2};

/// Trains a shared feature extractor and task classifier by DeepJDOT.
///
/// The extractor and classifier are owned for the lifetime of the trainer;
/// both forward passes of a batch read the same parameter set, which is
/// what lets the alignment gradient shape the task representation.
pub struct JdotTrainer<F: Module, C: TaskClassifier> {
    feature_extractor: F,
    classifier: C,
    feature_opt: Box<dyn Optimizer>,
    task_opt: Box<dyn Optimizer>,
    config: JdotConfig,
    task_losses: Vec<f32>,
    domain_losses: Vec<f32>,
    pseudo_losses: Vec<f32>,
}

impl<F: Module, C: TaskClassifier> JdotTrainer<F, C> {
    pub fn new(
        feature_extractor: F,
        classifier: C,
        feature_opt: Box<dyn Optimizer>,
        task_opt: Box<dyn Optimizer>,
        config: JdotConfig,
    ) -> Self {
        Self {
            feature_extractor,
            classifier,
            feature_opt,
            task_opt,
            config,
            task_losses: Vec::new(),
            domain_losses: Vec::new(),
            pseudo_losses: Vec::new(),
        }
    }

    /// Run the adaptation loop: per epoch, zip one pass over each loader
    /// (the longer loader's tail is dropped), train on every batch pair,
    /// then evaluate on the fixed held-out target set.
    ///
    /// Returns the per-epoch evaluation accuracies. The history is shorter
    /// than `num_epochs` when the early-stopping monitor or the hard epoch
    /// cutoff fires.
    pub fn fit(
        &mut self,
        source_loader: &mut DomainLoader,
        target_loader: &mut DomainLoader,
        eval_x: &Array2<f32>,
        eval_y: &Array1<f32>,
    ) -> Result<Vec<f32>, FitError> {
        self.config.validate()?;
        let source_dim = source_loader.dataset().num_features();
        let target_dim = target_loader.dataset().num_features();
        if source_dim != target_dim {
            return Err(FitError::FeatureDimMismatch {
                source_dim,
                target_dim,
            });
        }

        let mut monitor = EarlyStopping::new(self.config.patience, 0.0);
        let mut history = Vec::new();
        let mut lr_changed = false;

        for epoch in 0..self.config.num_epochs {
            if self.config.stop_during_epochs && epoch + 2 >= self.config.epoch_thr_for_stopping {
                break;
            }
            if self.config.changing_lr
                && !lr_changed
                && epoch + 1 >= self.config.epoch_thr_for_changing_lr
            {
                self.feature_opt.set_lr(self.config.changed_lrs[0]);
                self.task_opt.set_lr(self.config.changed_lrs[1]);
                lr_changed = true;
            }

            let anneal = anneal_coefficient(epoch, self.config.num_epochs);
            self.feature_extractor.set_training(true);
            self.classifier.set_training(true);

            let source_batches = source_loader.epoch();
            let target_batches = target_loader.epoch();
            for (source, target) in source_batches.iter().zip(target_batches.iter()) {
                self.train_batch(source, target, anneal, epoch)?;
            }

            let accuracy = self.evaluate(eval_x, eval_y);
            history.push(accuracy);
            if self.config.do_print {
                println!(
                    "epoch {}/{} eval accuracy {accuracy:.4}",
                    epoch + 1,
                    self.config.num_epochs
                );
            }

            monitor.observe(accuracy);
            if self.config.do_early_stop && monitor.stopped() {
                break;
            }
        }

        Ok(history)
    }

    /// One gradient step on a source/target batch pair.
    fn train_batch(
        &mut self,
        source: &DomainBatch,
        target: &DomainBatch,
        anneal: f32,
        epoch: usize,
    ) -> Result<(), FitError> {
        let n_s = source.len();
        let n_t = target.len();

        let source_x = Tensor::from_vec(source.features_flat(), false);
        let target_x = Tensor::from_vec(target.features_flat(), false);

        // Both domains flow through one parameter set.
        let source_features = self.feature_extractor.forward(&source_x, n_s);
        let target_features = self.feature_extractor.forward(&target_x, n_t);
        let feature_dim = self.feature_extractor.output_dim();

        let source_probs = self.classifier.predict_proba(&source_features, n_s);
        let target_probs = self.classifier.predict_proba(&target_features, n_t);
        let target_dist = self.classifier.cost_distribution(&target_probs, n_t);

        let source_task = source.task_labels();
        let source_labels = self.classifier.decode_labels(&source_task);

        let costs = CostMatrices::build(
            &self.classifier,
            &target_features,
            &source_features,
            &target_dist,
            &source_labels,
            n_t,
            n_s,
            feature_dim,
        );
        let plan = ot::emd(&ot::uniform(n_t), &ot::uniform(n_s), &costs.host_cost())?;
        let plan_weights = Array1::from(plan.iter().map(|&p| p as f32).collect::<Vec<_>>());

        let domain_loss = weighted_mean(&costs.feature_dist, &plan_weights);
        let pseudo_loss = weighted_mean(&costs.label_cost, &plan_weights);

        let sample_weights = if self.config.pseudo_weights {
            pseudo_label_weights(&source_task)
        } else {
            Array1::from_elem(n_s, 1.0)
        };
        let task_loss = self
            .classifier
            .task_loss(&source_probs, &source_task, &sample_weights);

        // Only the domain-alignment term is annealed; the pseudo-task term
        // enters at full strength from the first epoch.
        let mut total = add(&add(&task_loss, &scale(&domain_loss, anneal)), &pseudo_loss);
        if !total.data()[0].is_finite() {
            return Err(FitError::NonFiniteLoss { epoch: epoch + 1 });
        }

        self.task_losses.push(task_loss.data()[0]);
        self.domain_losses.push(domain_loss.data()[0]);
        self.pseudo_losses.push(pseudo_loss.data()[0]);

        let mut feature_params = self.feature_extractor.params();
        let mut task_params = self.classifier.params();
        self.feature_opt.zero_grad(&mut feature_params);
        self.task_opt.zero_grad(&mut task_params);
        backward(&mut total, None);
        self.feature_opt.step(&mut feature_params);
        self.task_opt.step(&mut task_params);

        Ok(())
    }

    /// Accuracy on a labeled evaluation set, in eval mode with no backward
    /// graph. Leaves both networks in eval mode.
    pub fn evaluate(&mut self, x: &Array2<f32>, y: &Array1<f32>) -> f32 {
        let n = x.nrows();
        if n == 0 {
            return 0.0;
        }
        self.feature_extractor.set_training(false);
        self.classifier.set_training(false);

        let input = Tensor::from_vec(x.iter().copied().collect(), false);
        let features = self.feature_extractor.forward(&input, n);
        let predictions = self.classifier.predict(&features, n);

        let correct = predictions
            .iter()
            .zip(y.iter())
            .filter(|(pred, label)| **pred == **label as usize)
            .count();
        correct as f32 / n as f32
    }

    /// Supervised source-only baseline: the same loop shape without the
    /// transport terms, for measuring what adaptation adds.
    pub fn fit_source_only(
        &mut self,
        source_loader: &mut DomainLoader,
        eval_x: &Array2<f32>,
        eval_y: &Array1<f32>,
    ) -> Result<Vec<f32>, FitError> {
        self.config.validate()?;
        let mut history = Vec::new();

        for epoch in 0..self.config.num_epochs {
            self.feature_extractor.set_training(true);
            self.classifier.set_training(true);

            for batch in source_loader.epoch() {
                let n = batch.len();
                let x = Tensor::from_vec(batch.features_flat(), false);
                let features = self.feature_extractor.forward(&x, n);
                let probs = self.classifier.predict_proba(&features, n);

                let task_labels = batch.task_labels();
                let weights = Array1::from_elem(n, 1.0);
                let mut loss = self.classifier.task_loss(&probs, &task_labels, &weights);
                if !loss.data()[0].is_finite() {
                    return Err(FitError::NonFiniteLoss { epoch: epoch + 1 });
                }
                self.task_losses.push(loss.data()[0]);

                let mut feature_params = self.feature_extractor.params();
                let mut task_params = self.classifier.params();
                self.feature_opt.zero_grad(&mut feature_params);
                self.task_opt.zero_grad(&mut task_params);
                backward(&mut loss, None);
                self.feature_opt.step(&mut feature_params);
                self.task_opt.step(&mut task_params);
            }

            history.push(self.evaluate(eval_x, eval_y));
        }

        Ok(history)
    }

    /// Per-batch supervised task losses recorded so far.
    pub fn task_losses(&self) -> &[f32] {
        &self.task_losses
    }

    /// Per-batch plan-weighted feature-alignment losses.
    pub fn domain_losses(&self) -> &[f32] {
        &self.domain_losses
    }

    /// Per-batch plan-weighted pseudo-label losses.
    pub fn pseudo_losses(&self) -> &[f32] {
        &self.pseudo_losses
    }

    /// Hand back the trained networks.
    pub fn into_parts(self) -> (F, C) {
        (self.feature_extractor, self.classifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapt::BinaryClassifier;
    use crate::data::{rotate_2d, two_moons, DomainDataset};
    use crate::nn::Mlp;
    use crate::optim::Adam;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn make_trainer(config: JdotConfig, seed: u64) -> JdotTrainer<Mlp, BinaryClassifier> {
        let mut rng = StdRng::seed_from_u64(seed);
        let extractor = Mlp::new(2, 16, 8, &mut rng);
        let classifier = BinaryClassifier::new(8, &mut rng);
        JdotTrainer::new(
            extractor,
            classifier,
            Box::new(Adam::default_params(1e-2)),
            Box::new(Adam::default_params(1e-2)),
            config,
        )
    }

    fn make_loaders(seed: u64) -> (DomainLoader, DomainLoader, Array2<f32>, Array1<f32>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let (source_x, source_y) = two_moons(60, 0.05, &mut rng);
        let (target_raw, target_y) = two_moons(60, 0.05, &mut rng);
        let target_x = rotate_2d(&target_raw, -30.0);

        let source = DomainDataset::source(source_x, &source_y, 0.0);
        let target = DomainDataset::target(target_x.clone(), 1.0);
        let source_loader = DomainLoader::new(source, 20, true, seed);
        let target_loader = DomainLoader::new(target, 20, true, seed + 1);
        (source_loader, target_loader, target_x, target_y)
    }

    #[test]
    fn test_hard_stop_returns_empty_history() {
        let config = JdotConfig {
            num_epochs: 10,
            stop_during_epochs: true,
            epoch_thr_for_stopping: 2,
            ..Default::default()
        };
        let mut trainer = make_trainer(config, 0);
        let (mut source, mut target, eval_x, eval_y) = make_loaders(0);

        let history = trainer.fit(&mut source, &mut target, &eval_x, &eval_y).unwrap();
        assert!(history.is_empty());
        assert!(trainer.task_losses().is_empty());
    }

    #[test]
    fn test_history_length_matches_epochs() {
        let config = JdotConfig {
            num_epochs: 3,
            ..Default::default()
        };
        let mut trainer = make_trainer(config, 1);
        let (mut source, mut target, eval_x, eval_y) = make_loaders(1);

        let history = trainer.fit(&mut source, &mut target, &eval_x, &eval_y).unwrap();
        assert_eq!(history.len(), 3);
        for &acc in &history {
            assert!((0.0..=1.0).contains(&acc));
        }
        // 3 batches per loader, 3 epochs
        assert_eq!(trainer.task_losses().len(), 9);
        assert_eq!(trainer.domain_losses().len(), 9);
        assert_eq!(trainer.pseudo_losses().len(), 9);
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let mut trainer = make_trainer(JdotConfig::default(), 2);
        let (_, _, eval_x, eval_y) = make_loaders(2);

        let first = trainer.evaluate(&eval_x, &eval_y);
        let second = trainer.evaluate(&eval_x, &eval_y);
        assert_eq!(first, second);
    }

    #[test]
    fn test_feature_dim_mismatch_rejected() {
        let config = JdotConfig {
            num_epochs: 1,
            ..Default::default()
        };
        let mut trainer = make_trainer(config, 3);

        let source = DomainDataset::source(Array2::zeros((8, 2)), &Array1::zeros(8), 0.0);
        let target = DomainDataset::target(Array2::zeros((8, 3)), 1.0);
        let mut source_loader = DomainLoader::new(source, 4, false, 0);
        let mut target_loader = DomainLoader::new(target, 4, false, 0);

        let result = trainer.fit(
            &mut source_loader,
            &mut target_loader,
            &Array2::zeros((4, 2)),
            &Array1::zeros(4),
        );
        match result {
            Err(FitError::FeatureDimMismatch {
                source_dim,
                target_dim,
            }) => {
                assert_eq!(source_dim, 2);
                assert_eq!(target_dim, 3);
            }
            other => panic!("expected FeatureDimMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_config_rejected_at_entry() {
        let config = JdotConfig {
            num_epochs: 0,
            ..Default::default()
        };
        let mut trainer = make_trainer(config, 4);
        let (mut source, mut target, eval_x, eval_y) = make_loaders(4);

        let result = trainer.fit(&mut source, &mut target, &eval_x, &eval_y);
        assert!(matches!(result, Err(FitError::InvalidConfig(_))));
    }

    #[test]
    fn test_lr_step_down_applies_once() {
        let config = JdotConfig {
            num_epochs: 4,
            changing_lr: true,
            epoch_thr_for_changing_lr: 2,
            changed_lrs: [5e-5, 6e-5],
            ..Default::default()
        };
        let mut trainer = make_trainer(config, 5);
        let (mut source, mut target, eval_x, eval_y) = make_loaders(5);

        trainer.fit(&mut source, &mut target, &eval_x, &eval_y).unwrap();
        assert_eq!(trainer.feature_opt.lr(), 5e-5);
        assert_eq!(trainer.task_opt.lr(), 6e-5);
    }

    #[test]
    fn test_fit_source_only_trains() {
        let config = JdotConfig {
            num_epochs: 20,
            ..Default::default()
        };
        let mut trainer = make_trainer(config, 6);
        let mut rng = StdRng::seed_from_u64(6);
        let (x, y) = two_moons(80, 0.05, &mut rng);
        let eval_x = x.clone();
        let eval_y = y.clone();
        let mut loader = DomainLoader::new(DomainDataset::source(x, &y, 0.0), 20, true, 6);

        let history = trainer.fit_source_only(&mut loader, &eval_x, &eval_y).unwrap();
        assert_eq!(history.len(), 20);
        // Supervised training on its own data should beat chance easily.
        assert!(*history.last().unwrap() > 0.7, "final accuracy {:?}", history.last());
    }
}
