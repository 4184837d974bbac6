//! Joint distribution optimal transport (JDOT) domain adaptation
//!
//! Implements the DeepJDOT training algorithm
//! (<https://arxiv.org/abs/1803.10081>): per minibatch, an exact optimal
//! transport plan couples target and source samples under a cost that mixes
//! feature distance with predicted-label disagreement, and the plan weights
//! the alignment and pseudo-label loss terms that are backpropagated jointly
//! with the supervised source task loss.

mod classifier;
mod config;
mod cost;
mod engine;
mod error;
mod loss;
mod monitor;
mod pseudo;

pub use classifier::{BinaryClassifier, MulticlassClassifier, TaskClassifier};
pub use config::JdotConfig;
pub use cost::CostMatrices;
pub use engine::JdotTrainer;
pub use error::FitError;
pub use loss::{anneal_coefficient, weighted_bce, weighted_nll};
pub use monitor::EarlyStopping;
pub use pseudo::pseudo_label_weights;
