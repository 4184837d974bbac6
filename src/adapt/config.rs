//! JDOT training configuration

use super::FitError;
use serde::{Deserialize, Serialize};

/// Configuration for [`JdotTrainer::fit`](super::JdotTrainer::fit).
///
/// All fields have defaults; deserialization fills missing keys from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JdotConfig {
    /// Total training epochs.
    pub num_epochs: usize,

    /// Weight the source task loss by pseudo-label confidence.
    pub pseudo_weights: bool,

    /// Step both learning rates down once, at `epoch_thr_for_changing_lr`.
    pub changing_lr: bool,
    /// 1-based epoch at which the step-down applies.
    pub epoch_thr_for_changing_lr: usize,
    /// New learning rates after the step-down: [feature extractor, task
    /// classifier].
    pub changed_lrs: [f32; 2],

    /// Hard epoch cutoff, independent of the early-stopping monitor.
    pub stop_during_epochs: bool,
    /// 1-based epoch threshold for the hard cutoff. Training halts before
    /// the epoch preceding this threshold runs any batch.
    pub epoch_thr_for_stopping: usize,

    /// Gate the early-stopping monitor.
    pub do_early_stop: bool,
    /// Consecutive non-improving evaluations tolerated before stopping.
    pub patience: usize,

    /// Print per-epoch evaluation accuracy.
    pub do_print: bool,
}

impl Default for JdotConfig {
    fn default() -> Self {
        Self {
            num_epochs: 1000,
            pseudo_weights: false,
            changing_lr: false,
            epoch_thr_for_changing_lr: 200,
            changed_lrs: [5e-5, 5e-5],
            stop_during_epochs: false,
            epoch_thr_for_stopping: 2,
            do_early_stop: false,
            patience: 7,
            do_print: false,
        }
    }
}

impl JdotConfig {
    /// Check the configuration before any training state is touched.
    pub fn validate(&self) -> Result<(), FitError> {
        if self.num_epochs == 0 {
            return Err(FitError::InvalidConfig("num_epochs must be at least 1".into()));
        }
        if self.patience == 0 {
            return Err(FitError::InvalidConfig("patience must be at least 1".into()));
        }
        for &lr in &self.changed_lrs {
            if !lr.is_finite() || lr <= 0.0 {
                return Err(FitError::InvalidConfig(format!(
                    "changed_lrs entries must be positive and finite, got {lr}"
                )));
            }
        }
        if self.changing_lr && self.epoch_thr_for_changing_lr == 0 {
            return Err(FitError::InvalidConfig(
                "epoch_thr_for_changing_lr must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = JdotConfig::default();
        assert_eq!(config.num_epochs, 1000);
        assert!(!config.pseudo_weights);
        assert_eq!(config.epoch_thr_for_changing_lr, 200);
        assert_eq!(config.changed_lrs, [5e-5, 5e-5]);
        assert_eq!(config.patience, 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_epochs() {
        let config = JdotConfig {
            num_epochs: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(FitError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_nonpositive_lr() {
        let config = JdotConfig {
            changed_lrs: [0.0, 1e-4],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: JdotConfig = serde_json::from_str(r#"{"num_epochs": 50}"#).unwrap();
        assert_eq!(config.num_epochs, 50);
        assert_eq!(config.patience, 7);
        assert!(!config.do_early_stop);
    }

    #[test]
    fn test_roundtrip_through_json() {
        let config = JdotConfig {
            num_epochs: 42,
            do_early_stop: true,
            ..Default::default()
        };
        let text = serde_json::to_string(&config).unwrap();
        let back: JdotConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back.num_epochs, 42);
        assert!(back.do_early_stop);
    }
}
